//! Runtime and model errors.

use thiserror::Error;

use super::GatewayError;

/// Errors from the opaque model capability.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("Unknown model: {0}")]
    Unknown(String),

    #[error("Model backend error: {0}")]
    Backend(String),
}

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("Runtime already active for agent: {0}")]
    AlreadyActive(String),

    #[error("Max turns exceeded: {0}")]
    MaxTurnsExceeded(u32),

    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_runtime_error_already_active() {
        let err = RuntimeError::AlreadyActive("a1".to_string());
        assert!(err.to_string().contains("already active"));
    }

    #[test]
    fn test_runtime_error_max_turns() {
        let err = RuntimeError::MaxTurnsExceeded(8);
        assert!(err.to_string().contains("8"));
    }

    #[test]
    fn test_runtime_error_from_model() {
        let err: RuntimeError = ModelError::Unknown("gpt-x".to_string()).into();
        assert!(err.to_string().contains("Unknown model"));
    }

    #[test]
    fn test_runtime_error_from_gateway() {
        let err: RuntimeError = GatewayError::UnknownProvider("fetch".to_string()).into();
        assert!(err.to_string().contains("Unknown tool provider"));
    }
}
