pub mod loader;
pub mod schema;

pub use loader::{ConfigError, ConfigLoader, apply_env};
pub use schema::{CourtsideConfig, DateRetry, TimingConfig};
