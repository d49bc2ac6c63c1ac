use crate::planner::PlannerError;
use crate::resolution::ResolutionError;
use navplan_common::DriverError;
use navplan_parser::ParseError;
use thiserror::Error;

/// Failure of a single plan action.
#[derive(Debug, Error)]
pub enum ActionError {
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("Resolution error: {0}")]
    Resolution(#[from] ResolutionError),

    #[error("Driver error: {0}")]
    Driver(#[from] DriverError),

    #[error("Assertion failed: {0} not present")]
    AssertionFailed(String),

    #[error("No fillable field found for {0}")]
    TypeFailed(String),
}

impl ActionError {
    pub fn is_fatal(&self) -> bool {
        match self {
            ActionError::Driver(e) => e.is_fatal(),
            ActionError::Resolution(e) => e.is_fatal(),
            _ => false,
        }
    }
}

/// Errors that end a run before it completes.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("Planning failed: {0}")]
    Planner(#[from] PlannerError),

    #[error("Page session lost: {0}")]
    DriverFatal(DriverError),

    #[error("Exceeded {0} step transitions; the plan probably branches in a cycle")]
    TransitionLimit(usize),
}

impl From<DriverError> for RunError {
    fn from(e: DriverError) -> Self {
        RunError::DriverFatal(e)
    }
}
