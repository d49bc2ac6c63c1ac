pub mod loader;
pub mod schema;

pub use loader::{apply_overrides, validate, ConfigError, ConfigLoader, CONFIG_ENV};
pub use schema::*;
