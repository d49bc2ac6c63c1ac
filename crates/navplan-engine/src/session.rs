use crate::artifacts::ArtifactStore;
use crate::config::EngineConfig;
use crate::context::ExecutionContext;
use crate::driver::PageDriver;
use crate::error::RunError;
use crate::formatter::{format_plan, mask_credentials};
use crate::planner::Planner;
use crate::runner::{PlanRunner, RunResult};
use navplan_common::NavigationPlan;
use std::collections::HashMap;

#[derive(Clone, Copy)]
pub struct OutputHandlers {
    pub out: fn(&str),
    pub err: fn(&str),
}

impl Default for OutputHandlers {
    fn default() -> Self {
        Self {
            out: |_| {},
            err: |_| {},
        }
    }
}

/// Plans a task and runs the plan against a page.
pub struct Session {
    config: EngineConfig,
    planner: Box<dyn Planner>,
    output: OutputHandlers,
}

impl Session {
    pub fn new(config: EngineConfig, planner: Box<dyn Planner>, output: OutputHandlers) -> Self {
        Self {
            config,
            planner,
            output,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub async fn run_task<D: PageDriver + ?Sized>(
        &self,
        driver: &mut D,
        task: &str,
        app_url: Option<&str>,
        credentials: HashMap<String, String>,
    ) -> RunResult {
        let task_name = sanitize_task_name(task);
        let plan = match self.planner.generate_plan(task, app_url).await {
            Ok(plan) => plan,
            Err(e) => {
                let error = RunError::Planner(e);
                (self.output.err)(&format!("Error: {}", error));
                return RunResult::failed(&task_name, error);
            }
        };
        if app_url.is_none() {
            tracing::info!("Planner chose app URL {}", plan.app_url);
        }
        (self.output.out)(&format_plan(&plan));

        self.run_plan(driver, &plan, &task_name, credentials).await
    }

    /// `task_name` is used as-is; callers holding a raw task pass it through
    /// [`sanitize_task_name`] first.
    pub async fn run_plan<D: PageDriver + ?Sized>(
        &self,
        driver: &mut D,
        plan: &NavigationPlan,
        task_name: &str,
        credentials: HashMap<String, String>,
    ) -> RunResult {
        let artifacts = match ArtifactStore::create(&self.config.artifacts).await {
            Ok(store) => store,
            Err(e) => {
                tracing::warn!("Screenshots disabled: {}", e);
                ArtifactStore::disabled()
            }
        };
        let mut ctx = ExecutionContext::new(credentials, artifacts);

        let mut result = PlanRunner::new(&self.config)
            .run(driver, plan, task_name, &mut ctx)
            .await;
        if let Some(error) = result.error.take() {
            let masked = mask_credentials(&error, &ctx.credentials);
            (self.output.err)(&format!("Error: {}", masked));
            result.error = Some(masked);
        }
        result
    }
}

/// Lowercase the task, map everything outside `[a-z0-9]` to `_` and cap it at 50 characters.
pub fn sanitize_task_name(task: &str) -> String {
    task.to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_lowercase() || c.is_ascii_digit() { c } else { '_' })
        .take(50)
        .collect()
}
