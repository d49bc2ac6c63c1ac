use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlanError {
    #[error("Malformed plan JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("app_url is not an absolute URL: {0}")]
    InvalidAppUrl(String),
    #[error("Plan contains no steps")]
    NoSteps,
    #[error("Step number {0} appears more than once")]
    DuplicateStep(u32),
}

/// A structured plan produced by a planner for a single task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NavigationPlan {
    pub app_url: String,
    pub task_understanding: String,
    #[serde(default)]
    pub assumptions: Vec<String>,
    /// Advisory only; the runner never consults it.
    #[serde(default)]
    pub url_patterns: serde_json::Value,
    #[serde(default)]
    pub high_level_plan: Vec<String>,
    pub ui_navigation_plan: Vec<Step>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step {
    pub step: u32,
    pub goal: String,
    #[serde(default)]
    pub actions: Vec<String>,
    #[serde(default)]
    pub notes: String,
}

impl NavigationPlan {
    pub fn from_json(json: &str) -> Result<Self, PlanError> {
        let plan: NavigationPlan = serde_json::from_str(json)?;
        plan.validate()?;
        Ok(plan)
    }

    pub fn validate(&self) -> Result<(), PlanError> {
        match url::Url::parse(&self.app_url) {
            Ok(parsed) if parsed.has_host() => {}
            _ => return Err(PlanError::InvalidAppUrl(self.app_url.clone())),
        }

        if self.ui_navigation_plan.is_empty() {
            return Err(PlanError::NoSteps);
        }

        let mut seen = HashSet::new();
        for step in &self.ui_navigation_plan {
            if !seen.insert(step.step) {
                return Err(PlanError::DuplicateStep(step.step));
            }
        }
        Ok(())
    }

    /// Position of the step carrying `number`, if any.
    pub fn step_index(&self, number: u32) -> Option<usize> {
        self.ui_navigation_plan.iter().position(|s| s.step == number)
    }
}
