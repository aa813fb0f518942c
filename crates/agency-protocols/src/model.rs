//! The opaque model capability.
//!
//! The core never formats prompts or counts tokens; a model is a black box
//! that takes a conversation plus the tools it may request and returns one
//! turn: assistant text and zero or more tool invocations.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ModelError;
use crate::message::Message;
use crate::tool::ToolDefinition;

/// A tool advertised to the model, qualified by its provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdvertisedTool {
    pub provider: String,
    pub definition: ToolDefinition,
}

/// One model call: conversation context plus callable tools.
#[derive(Debug, Clone)]
pub struct ModelRequest {
    /// Model identifier from the agent spec.
    pub model: String,

    /// Instruction text from the agent spec.
    pub instructions: Option<String>,

    /// Conversation history, oldest first.
    pub messages: Vec<Message>,

    /// Tools the model may invoke this turn.
    pub tools: Vec<AdvertisedTool>,
}

/// A tool invocation requested by the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInvocation {
    /// Invocation id, echoed back in the tool result message.
    pub id: String,

    /// Provider name; the reserved name `peer` addresses other agents.
    pub provider: String,

    /// Tool name within the provider.
    pub tool: String,

    pub arguments: serde_json::Value,
}

impl ToolInvocation {
    pub fn new(
        id: impl Into<String>,
        provider: impl Into<String>,
        tool: impl Into<String>,
        arguments: serde_json::Value,
    ) -> Self {
        Self {
            id: id.into(),
            provider: provider.into(),
            tool: tool.into(),
            arguments,
        }
    }
}

/// The model's answer for one turn.
///
/// An empty `invocations` list ends the turn; otherwise the runtime executes
/// the invocations and calls the model again with their results.
#[derive(Debug, Clone)]
pub struct ModelTurn {
    pub message: String,
    pub invocations: Vec<ToolInvocation>,
}

impl ModelTurn {
    pub fn text(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            invocations: Vec::new(),
        }
    }

    pub fn with_invocations(message: impl Into<String>, invocations: Vec<ToolInvocation>) -> Self {
        Self {
            message: message.into(),
            invocations,
        }
    }

    pub fn is_final(&self) -> bool {
        self.invocations.is_empty()
    }
}

/// Trait implemented by model backends.
#[async_trait]
pub trait ModelBackend: Send + Sync {
    /// Backend identifier (e.g. the model family it serves).
    fn id(&self) -> &str;

    /// Produce one turn for the given request.
    async fn complete(&self, request: ModelRequest) -> Result<ModelTurn, ModelError>;
}

impl std::fmt::Debug for dyn ModelBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelBackend").field("id", &self.id()).finish()
    }
}
