pub mod file;
pub mod openai;
pub mod prompt;

pub use file::FilePlanner;
pub use openai::OpenAiPlanner;

use async_trait::async_trait;
use navplan_common::{NavigationPlan, PlanError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlannerError {
    #[error("Failed to read plan: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid plan: {0}")]
    InvalidPlan(#[from] PlanError),

    #[error("Planner request failed: {0}")]
    Http(String),

    #[error("Planner response missing {0}")]
    MissingField(&'static str),

    #[error("OPENAI_API_KEY is not set")]
    MissingApiKey,
}

/// Turns a natural-language task into a [`NavigationPlan`].
#[async_trait]
pub trait Planner: Send + Sync {
    async fn generate_plan(
        &self,
        task: &str,
        app_url_hint: Option<&str>,
    ) -> Result<NavigationPlan, PlannerError>;
}

/// Pull the outermost JSON object out of free-form model output.
pub fn extract_json_object(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let mut depth = 0i32;
    let mut in_string = false;
    let mut escaped = false;
    for (offset, ch) in raw[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&raw[start..=start + offset]);
                }
            }
            _ => {}
        }
    }
    None
}
