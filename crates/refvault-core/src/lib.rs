//! Refvault Core - Shared paths and configuration for refvault tools

pub mod config;
pub mod paths;

pub use config::{AuditConfig, LoadPolicy, RegistryConfig, SaltMode};
pub use paths::Paths;
