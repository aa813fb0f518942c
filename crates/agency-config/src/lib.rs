//! # Agency Config
//!
//! TOML configuration for the orchestration core: registry location,
//! dispatch settings, and the tool-provider table. Secrets come in through
//! `${ENV_VAR}` expansion so they never live in the file itself.

pub mod error;
pub mod loader;
pub mod schema;
pub mod validator;

pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use schema::{Config, DispatchSection, ProviderEntry, RegistrySection};
pub use validator::validate;
