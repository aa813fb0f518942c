//! Dispatcher errors.
//!
//! `DispatchError` is the flat taxonomy the transport layer sees. Component
//! errors are mapped variant-by-variant so the wire kind survives the hop.

use thiserror::Error;

use super::{GatewayError, ModelError, RegistryError, RuntimeError};
use crate::envelope::ErrorKind;
use crate::spec::AgentStatus;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Agent not found: {0}")]
    NotFound(String),

    #[error("Duplicate agent id: {0}")]
    DuplicateId(String),

    #[error("Invalid lifecycle transition: {from} -> {to}")]
    InvalidTransition { from: AgentStatus, to: AgentStatus },

    #[error("Runtime already active for agent: {0}")]
    AlreadyActive(String),

    #[error("Agent not active: {0}")]
    AgentNotActive(String),

    #[error("Unknown tool provider: {0}")]
    UnknownToolProvider(String),

    #[error("Invalid tool call: {0}")]
    InvalidToolCall(String),

    #[error("Tool provider unavailable: {0}")]
    ToolProviderUnavailable(String),

    #[error("Re-entrant call to agent: {0}")]
    ReentrantCall(String),

    #[error("Message cancelled")]
    Cancelled,

    #[error("Unknown model: {0}")]
    UnknownModel(String),

    #[error("Max turns exceeded: {0}")]
    MaxTurnsExceeded(u32),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl DispatchError {
    /// Wire-level error kind for the response envelope.
    pub fn kind(&self) -> ErrorKind {
        match self {
            DispatchError::NotFound(_) => ErrorKind::NotFound,
            DispatchError::DuplicateId(_) => ErrorKind::DuplicateId,
            DispatchError::InvalidTransition { .. } => ErrorKind::InvalidTransition,
            DispatchError::AlreadyActive(_) => ErrorKind::AlreadyActive,
            DispatchError::AgentNotActive(_) => ErrorKind::AgentNotActive,
            DispatchError::UnknownToolProvider(_) => ErrorKind::UnknownToolProvider,
            DispatchError::InvalidToolCall(_) => ErrorKind::InvalidToolCall,
            DispatchError::ToolProviderUnavailable(_) => ErrorKind::ToolProviderUnavailable,
            DispatchError::ReentrantCall(_) => ErrorKind::ReentrantCall,
            DispatchError::Cancelled => ErrorKind::Cancelled,
            DispatchError::UnknownModel(_) => ErrorKind::UnknownModel,
            DispatchError::MaxTurnsExceeded(_) => ErrorKind::MaxTurnsExceeded,
            DispatchError::InvalidRequest(_) => ErrorKind::InvalidRequest,
            DispatchError::Store(_) => ErrorKind::Store,
            DispatchError::Internal(_) => ErrorKind::Internal,
        }
    }
}

impl From<RegistryError> for DispatchError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::NotFound(id) => DispatchError::NotFound(id),
            RegistryError::DuplicateId(id) => DispatchError::DuplicateId(id),
            RegistryError::InvalidId(msg) => DispatchError::InvalidRequest(msg),
            RegistryError::InvalidSpec(msg) => DispatchError::InvalidRequest(msg),
            RegistryError::Store(msg) => DispatchError::Store(msg),
        }
    }
}

impl From<GatewayError> for DispatchError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::UnknownProvider(name) => DispatchError::UnknownToolProvider(name),
            GatewayError::InvalidToolCall(msg) => DispatchError::InvalidToolCall(msg),
            GatewayError::Unavailable(name) => DispatchError::ToolProviderUnavailable(name),
            other => DispatchError::Internal(other.to_string()),
        }
    }
}

impl From<RuntimeError> for DispatchError {
    fn from(err: RuntimeError) -> Self {
        match err {
            RuntimeError::AlreadyActive(id) => DispatchError::AlreadyActive(id),
            RuntimeError::MaxTurnsExceeded(turns) => DispatchError::MaxTurnsExceeded(turns),
            RuntimeError::Model(ModelError::Unknown(model)) => DispatchError::UnknownModel(model),
            RuntimeError::Model(ModelError::Backend(msg)) => DispatchError::Internal(msg),
            RuntimeError::Gateway(gw) => gw.into(),
        }
    }
}
