use super::{Planner, PlannerError};
use async_trait::async_trait;
use navplan_common::NavigationPlan;
use std::path::PathBuf;

/// Reads a pre-written plan from disk.
pub struct FilePlanner {
    path: PathBuf,
}

impl FilePlanner {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl Planner for FilePlanner {
    async fn generate_plan(
        &self,
        task: &str,
        app_url_hint: Option<&str>,
    ) -> Result<NavigationPlan, PlannerError> {
        let content = tokio::fs::read_to_string(&self.path).await?;
        let mut plan = NavigationPlan::from_json(&content)?;
        if let Some(hint) = app_url_hint {
            if hint.trim_end_matches('/') != plan.app_url.trim_end_matches('/') {
                tracing::warn!(
                    "Plan targets {} but {} was requested; keeping the plan's URL",
                    plan.app_url,
                    hint
                );
            }
        }
        if plan.task_understanding.trim().is_empty() {
            plan.task_understanding = task.to_string();
        }
        tracing::info!("Loaded plan from {}", self.path.display());
        Ok(plan)
    }
}
