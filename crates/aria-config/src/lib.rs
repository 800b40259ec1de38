//! # aria-config
//!
//! Configuration for the Aria agent. Reads `aria.toml`, then applies
//! environment variable overrides.

pub mod loader;
pub mod schema;

pub use loader::ConfigLoader;
pub use schema::{
    AgentConfig, ApiConfig, AriaConfig, AutomationConfig, BridgeConfig, ConfigWarning, DeviceConfig,
    LoggingConfig, ServicesConfig, WarningSeverity,
};
