//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML) + CLI overrides
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ProxyConfig (validated, immutable)
//!     → Balancer / HttpServer constructed from it
//!
//! On file change (reload enabled):
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → server applies the new backend list to the running balancer
//! ```
//!
//! # Design Decisions
//! - Strategy, k and diagnostics are fixed for a balancer's lifetime;
//!   only the backend list is reloadable
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, ConfigError};
pub use schema::{
    BalancerConfig, ListenerConfig, LogFormat, ObservabilityConfig, ProxyConfig, ReloadConfig,
    StrategyKind, TimeoutConfig,
};
