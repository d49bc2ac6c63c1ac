pub mod error;
pub mod page;
pub mod plan;

pub use error::DriverError;
pub use page::{ElementHandle, ElementInfo, Rect};
pub use plan::{NavigationPlan, PlanError, Step};
