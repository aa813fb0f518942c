//! Peer protocol envelopes.
//!
//! A [`MessageEnvelope`] is the request unit exchanged between dispatcher and
//! runtime or between two agents; a [`ResponseEnvelope`] carries the result
//! or a structured error back, keyed by the same correlation id.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DispatchError;

/// Request or response body: plain text or a structured document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Payload {
    Text { text: String },
    Data { data: serde_json::Value },
}

impl Payload {
    pub fn text(text: impl Into<String>) -> Self {
        Payload::Text { text: text.into() }
    }

    pub fn data(data: serde_json::Value) -> Self {
        Payload::Data { data }
    }

    /// Render the payload as conversation text.
    pub fn as_text(&self) -> String {
        match self {
            Payload::Text { text } => text.clone(),
            Payload::Data { data } => data.to_string(),
        }
    }
}

/// A request unit addressed to one agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageEnvelope {
    /// Correlation id; the response carries the same id.
    pub correlation_id: Uuid,

    /// Target agent id.
    pub target: String,

    pub payload: Payload,
}

impl MessageEnvelope {
    pub fn new(target: impl Into<String>, payload: Payload) -> Self {
        Self {
            correlation_id: Uuid::new_v4(),
            target: target.into(),
            payload,
        }
    }

    pub fn with_correlation_id(mut self, id: Uuid) -> Self {
        self.correlation_id = id;
        self
    }
}

/// Wire-level error kinds carried in response envelopes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    DuplicateId,
    InvalidTransition,
    AlreadyActive,
    AgentNotActive,
    UnknownToolProvider,
    InvalidToolCall,
    ToolProviderUnavailable,
    ReentrantCall,
    Cancelled,
    UnknownModel,
    MaxTurnsExceeded,
    InvalidRequest,
    Store,
    Internal,
}

/// Structured error in a response envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvelopeError {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<&DispatchError> for EnvelopeError {
    fn from(err: &DispatchError) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

/// The response unit matching a [`MessageEnvelope`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    pub correlation_id: Uuid,

    pub target: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Payload>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<EnvelopeError>,
}

impl ResponseEnvelope {
    pub fn success(request: &MessageEnvelope, result: Payload) -> Self {
        Self {
            correlation_id: request.correlation_id,
            target: request.target.clone(),
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(request: &MessageEnvelope, err: &DispatchError) -> Self {
        Self {
            correlation_id: request.correlation_id,
            target: request.target.clone(),
            result: None,
            error: Some(EnvelopeError::from(err)),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}
