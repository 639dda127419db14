//! Configuration Module
//!
//! Environment-driven configuration for the series stream service.

mod settings;

pub use settings::{
    BroadcastSettings, ConfigError, GenerationSettings, ServerSettings, ServiceConfig,
    StoreBackend, StoreSettings,
};
