//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → MonitorConfig (validated, immutable)
//!     → handed to HealthMonitor at construction
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; the monitored set never changes at runtime
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::AdminConfig;
pub use schema::BreakerConfig;
pub use schema::BreakerOverride;
pub use schema::MonitorConfig;
pub use schema::ObservabilityConfig;
pub use schema::Scheme;
pub use schema::ServiceDescriptor;
pub use validation::{validate_config, ValidationError};
