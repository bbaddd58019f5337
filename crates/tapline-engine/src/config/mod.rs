pub mod loader;
pub mod schema;

pub use loader::{ConfigError, ConfigLoader};
pub use schema::{
    ExecutionConfig, OutputConfig, PlannerConfig, ServerConfig, TaplineConfig, ToolNames,
};
