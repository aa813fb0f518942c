//! Tool gateway errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Unknown tool provider: {0}")]
    UnknownProvider(String),

    #[error("Invalid tool call: {0}")]
    InvalidToolCall(String),

    #[error("Tool provider unavailable: {0}")]
    Unavailable(String),

    #[error("Transport error ({provider}): {message}")]
    Transport { provider: String, message: String },

    #[error("Provider error ({provider}, code {code}): {message}")]
    Provider {
        provider: String,
        code: i64,
        message: String,
    },

    #[error("Protocol error: {0}")]
    Protocol(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gateway_error_unknown_provider() {
        let err = GatewayError::UnknownProvider("fetch".to_string());
        assert!(err.to_string().contains("Unknown tool provider"));
        assert!(err.to_string().contains("fetch"));
    }

    #[test]
    fn test_gateway_error_invalid_tool_call() {
        let err = GatewayError::InvalidToolCall("missing field 'url'".to_string());
        assert!(err.to_string().contains("Invalid tool call"));
    }

    #[test]
    fn test_gateway_error_unavailable() {
        let err = GatewayError::Unavailable("fetch".to_string());
        assert!(err.to_string().contains("unavailable"));
    }

    #[test]
    fn test_gateway_error_transport() {
        let err = GatewayError::Transport {
            provider: "fetch".to_string(),
            message: "connection refused".to_string(),
        };
        assert!(err.to_string().contains("connection refused"));
        assert!(err.to_string().contains("fetch"));
    }

    #[test]
    fn test_gateway_error_provider() {
        let err = GatewayError::Provider {
            provider: "fetch".to_string(),
            code: -32601,
            message: "Method not found".to_string(),
        };
        assert!(err.to_string().contains("-32601"));
    }
}
