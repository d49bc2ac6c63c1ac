pub mod artifacts;
pub mod config;
pub mod context;
pub mod driver;
pub mod error;
pub mod fields;
pub mod formatter;
pub mod interpreter;
pub mod login;
pub mod planner;
pub mod resolution;
pub mod runner;
pub mod session;
pub mod url_state;

pub use navplan_common::{
    DriverError, ElementHandle, ElementInfo, NavigationPlan, PlanError, Rect, Step,
};
pub use navplan_parser as parser;
