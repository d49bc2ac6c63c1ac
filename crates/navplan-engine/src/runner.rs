//! Walks a navigation plan step by step.

use crate::artifacts::Artifact;
use crate::config::EngineConfig;
use crate::context::ExecutionContext;
use crate::driver::PageDriver;
use crate::error::{ActionError, RunError};
use crate::interpreter::{ActionInterpreter, Signal, StepScope};
use crate::login::{is_login_action, is_login_goal, LoginOutcome};
use crate::resolution::ResolutionError;
use navplan_common::{DriverError, NavigationPlan, Step};
use serde::Serialize;
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize)]
pub struct StepReport {
    pub number: u32,
    pub goal: String,
    pub success: bool,
    pub executed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub branched_to: Option<u32>,
}

/// Outcome of a whole run.
#[derive(Debug, Clone, Serialize)]
pub struct RunResult {
    pub task_name: String,
    /// The plan ran to completion. Individual steps may still have failed.
    pub success: bool,
    pub steps: Vec<StepReport>,
    pub artifacts: Vec<Artifact>,
    pub error: Option<String>,
}

impl RunResult {
    pub fn failed(task_name: &str, error: impl ToString) -> Self {
        Self {
            task_name: task_name.to_string(),
            success: false,
            steps: Vec::new(),
            artifacts: Vec::new(),
            error: Some(error.to_string()),
        }
    }
}

pub struct PlanRunner<'a> {
    config: &'a EngineConfig,
    interpreter: ActionInterpreter<'a>,
}

impl<'a> PlanRunner<'a> {
    pub fn new(config: &'a EngineConfig) -> Self {
        Self {
            config,
            interpreter: ActionInterpreter::new(config),
        }
    }

    /// Run every step of `plan`, following branches. Never fails; problems are
    /// reported in the returned [`RunResult`].
    pub async fn run<D: PageDriver + ?Sized>(
        &self,
        driver: &mut D,
        plan: &NavigationPlan,
        task_name: &str,
        ctx: &mut ExecutionContext,
    ) -> RunResult {
        tracing::info!(
            "Running '{}' ({} steps) against {}",
            task_name,
            plan.ui_navigation_plan.len(),
            plan.app_url
        );

        let mut reports = Vec::new();
        let outcome = self.walk(driver, plan, ctx, &mut reports).await;

        if self.config.runner.final_pause_ms > 0 {
            driver
                .pause(Duration::from_millis(self.config.runner.final_pause_ms))
                .await;
        }

        let artifacts = ctx.artifacts.finish().await;
        let error = match outcome {
            Ok(()) => None,
            Err(e) => {
                tracing::error!("Run aborted: {}", e);
                Some(e.to_string())
            }
        };
        RunResult {
            task_name: task_name.to_string(),
            success: error.is_none(),
            steps: reports,
            artifacts,
            error,
        }
    }

    async fn walk<D: PageDriver + ?Sized>(
        &self,
        driver: &mut D,
        plan: &NavigationPlan,
        ctx: &mut ExecutionContext,
        reports: &mut Vec<StepReport>,
    ) -> Result<(), RunError> {
        let steps = &plan.ui_navigation_plan;
        let mut index = 0;
        let mut transitions = 0;

        while index < steps.len() {
            transitions += 1;
            if transitions > self.config.runner.max_transitions {
                return Err(RunError::TransitionLimit(self.config.runner.max_transitions));
            }

            ctx.enter_step(index);
            let step = &steps[index];
            let report = self.run_step(driver, step, ctx).await?;
            let branch = report.branched_to;
            reports.push(report);

            if let Some(target) = branch {
                match plan.step_index(target) {
                    Some(next) => {
                        tracing::info!("Step {} branches to step {}", step.step, target);
                        index = next;
                        continue;
                    }
                    None => tracing::warn!(
                        "Step {} branches to unknown step {}, continuing in order",
                        step.step,
                        target
                    ),
                }
            }
            index += 1;
        }
        Ok(())
    }

    async fn run_step<D: PageDriver + ?Sized>(
        &self,
        driver: &mut D,
        step: &Step,
        ctx: &mut ExecutionContext,
    ) -> Result<StepReport, RunError> {
        tracing::info!("Step {}: {}", step.step, step.goal);
        let login = self.interpreter.login();
        let login_step = is_login_goal(&step.goal);
        let mut report = StepReport {
            number: step.step,
            goal: step.goal.clone(),
            success: true,
            ..Default::default()
        };

        let mut skip_next = false;
        for (action_index, raw) in step.actions.iter().enumerate() {
            if skip_next {
                skip_next = false;
                if !raw.trim_start().starts_with("else") {
                    tracing::info!("Skipping guarded action: {}", raw);
                    report.skipped += 1;
                    continue;
                }
            }

            if !ctx.login_completed() && self.on_login_page(driver).await? {
                self.handshake(driver, ctx, step).await?;
            }

            let login_action = is_login_action(raw, &step.goal);
            let login_done = ctx.login_completed() || ctx.skip_remaining_login_actions;
            if login_done && (login_step || login_action) {
                tracing::info!("Login already handled, skipping: {}", raw);
                report.skipped += 1;
                continue;
            }

            if login_action {
                tracing::info!("Login action encountered, looking for a login page: {}", raw);
                let resolver = self.interpreter.text_resolver();
                tolerate(login.approach(driver, &resolver).await)?;
                if self.on_login_page(driver).await? {
                    self.handshake(driver, ctx, step).await?;
                }
                if ctx.login_completed() {
                    report.skipped += 1;
                    continue;
                }
                tracing::info!("No login page showed up, running the action as written");
            }

            let action = match self.interpreter.prepare(raw, ctx) {
                Ok(action) => action,
                Err(e) => {
                    tracing::warn!("Ignoring unparseable action '{}': {}", raw, e);
                    report.skipped += 1;
                    continue;
                }
            };

            tracing::info!("  -> {}", raw);
            let scope = StepScope {
                number: step.step,
                goal: &step.goal,
                action_index,
            };
            match self.interpreter.execute(driver, ctx, scope, &action).await {
                Ok(signal) => {
                    report.executed += 1;
                    match signal {
                        Signal::BranchTo(target) => {
                            report.branched_to = Some(target);
                            break;
                        }
                        Signal::SkipNext => skip_next = true,
                        Signal::Continue | Signal::ConditionFalse => {}
                    }
                }
                Err(e) if e.is_fatal() => return Err(fatal(e)),
                Err(e) => {
                    tracing::warn!("Action failed in step {}: {} ({})", step.step, raw, e);
                    report.failed += 1;
                    report.success = false;
                }
            }
        }

        if report.success && login_step && ctx.login_completed() {
            ctx.artifacts
                .capture(driver, step.step, &step.goal, Some("complete"))
                .await;
        }
        Ok(report)
    }
}

impl PlanRunner<'_> {
    async fn on_login_page<D: PageDriver + ?Sized>(&self, driver: &mut D) -> Result<bool, RunError> {
        let login = self.interpreter.login();
        Ok(tolerate(login.is_login_page(driver).await)?.unwrap_or(false))
    }

    async fn handshake<D: PageDriver + ?Sized>(
        &self,
        driver: &mut D,
        ctx: &mut ExecutionContext,
        step: &Step,
    ) -> Result<(), RunError> {
        let login = self.interpreter.login();
        if let Some(LoginOutcome::TimedOut) =
            tolerate(login.run(driver, ctx, step.step, &step.goal).await)?
        {
            tracing::warn!("Proceeding without a confirmed login");
        }
        Ok(())
    }
}

/// Fatal driver errors abort the run; anything else is logged and dropped.
fn tolerate<T>(result: Result<T, DriverError>) -> Result<Option<T>, RunError> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.is_fatal() => Err(RunError::DriverFatal(e)),
        Err(e) => {
            tracing::warn!("Ignoring driver error: {}", e);
            Ok(None)
        }
    }
}

fn fatal(error: ActionError) -> RunError {
    match error {
        ActionError::Driver(e) => RunError::DriverFatal(e),
        ActionError::Resolution(ResolutionError::Driver(e)) => {
            RunError::DriverFatal(e)
        }
        other => RunError::DriverFatal(DriverError::Other(other.to_string())),
    }
}
