//! Agent registry errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Agent not found: {0}")]
    NotFound(String),

    #[error("Duplicate agent id: {0}")]
    DuplicateId(String),

    #[error("Invalid agent id: {0}")]
    InvalidId(String),

    #[error("Invalid agent spec: {0}")]
    InvalidSpec(String),

    #[error("Store error: {0}")]
    Store(String),
}
