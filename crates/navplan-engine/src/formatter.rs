use crate::runner::RunResult;
use navplan_common::NavigationPlan;
use std::collections::HashMap;

pub fn format_plan(plan: &NavigationPlan) -> String {
    let mut output = format!(
        "Plan for {}\nTask: {}",
        plan.app_url, plan.task_understanding
    );

    if !plan.assumptions.is_empty() {
        output.push_str("\n\nAssumptions:");
        for assumption in &plan.assumptions {
            output.push_str(&format!("\n- {}", assumption));
        }
    }

    if !plan.high_level_plan.is_empty() {
        output.push_str("\n\nOverview:");
        for (i, line) in plan.high_level_plan.iter().enumerate() {
            output.push_str(&format!("\n{}. {}", i + 1, line));
        }
    }

    output.push_str("\n\nSteps:");
    for step in &plan.ui_navigation_plan {
        output.push_str(&format!("\n[{}] {}", step.step, step.goal));
        for action in &step.actions {
            output.push_str(&format!("\n    {}", action));
        }
    }
    output
}

pub fn format_run_result(result: &RunResult) -> String {
    let status = if result.success { "completed" } else { "aborted" };
    let mut output = format!("Task '{}' {}.", result.task_name, status);

    for step in &result.steps {
        let mark = if step.success { "ok" } else { "FAILED" };
        output.push_str(&format!(
            "\n  step {:>2} {:<6} {} ({} run, {} failed, {} skipped)",
            step.number, mark, step.goal, step.executed, step.failed, step.skipped
        ));
        if let Some(target) = step.branched_to {
            output.push_str(&format!(" -> step {}", target));
        }
    }

    if !result.artifacts.is_empty() {
        output.push_str(&format!("\n\n{} screenshots:", result.artifacts.len()));
        for artifact in &result.artifacts {
            output.push_str(&format!("\n- {}", artifact.path.display()));
        }
    }

    if let Some(error) = &result.error {
        output.push_str(&format!("\n\nError: {}", error));
    }
    output
}

/// Replace every credential value in `text` with asterisks.
pub fn mask_credentials(text: &str, credentials: &HashMap<String, String>) -> String {
    let mut masked = text.to_string();
    for value in credentials.values().filter(|v| !v.is_empty()) {
        masked = masked.replace(value.as_str(), "********");
    }
    masked
}
