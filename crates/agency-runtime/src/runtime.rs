//! The live agent runtime and its turn loop.
//!
//! One message is handled as a bounded loop of model turns: the model sees
//! the conversation plus the tools of the agent's declared providers, and
//! either answers or requests invocations. Tool and peer failures are fed
//! back to the model as error results; one failing provider never aborts
//! the message.

use std::sync::Arc;

use tracing::{debug, warn};

use agency_gateway::ToolGateway;
use agency_protocols::envelope::Payload;
use agency_protocols::message::Message;
use agency_protocols::model::{AdvertisedTool, ModelBackend, ModelRequest, ToolInvocation};
use agency_protocols::peer::{CallChain, PeerSender, PEER_PROVIDER, PEER_SEND_TOOL};
use agency_protocols::spec::AgentSpec;
use agency_protocols::RuntimeError;

use crate::conversation::Conversation;

/// Per-message execution context handed in by the dispatcher.
#[derive(Clone)]
pub struct TurnContext {
    /// Seam for nested agent-to-agent calls.
    pub peer: Arc<dyn PeerSender>,

    /// Causal chain including this runtime, used for re-entrancy detection.
    pub chain: CallChain,
}

/// The live, in-memory instantiation of an agent spec.
pub struct AgentRuntime {
    spec: AgentSpec,
    model: Arc<dyn ModelBackend>,
    gateway: Arc<ToolGateway>,
    conversation: Conversation,
    max_turns: u32,
}

impl std::fmt::Debug for AgentRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentRuntime")
            .field("spec", &self.spec)
            .field("model", &self.model)
            .field("conversation", &self.conversation)
            .field("max_turns", &self.max_turns)
            .finish_non_exhaustive()
    }
}

impl AgentRuntime {
    pub fn new(
        spec: AgentSpec,
        model: Arc<dyn ModelBackend>,
        gateway: Arc<ToolGateway>,
        max_turns: u32,
    ) -> Self {
        Self {
            spec,
            model,
            gateway,
            conversation: Conversation::new(),
            max_turns: max_turns.max(1),
        }
    }

    pub fn agent_id(&self) -> &str {
        &self.spec.id
    }

    pub fn spec(&self) -> &AgentSpec {
        &self.spec
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    /// Handle one inbound message to completion.
    pub async fn handle_message(
        &mut self,
        payload: Payload,
        ctx: &TurnContext,
    ) -> Result<Payload, RuntimeError> {
        debug!("Agent {} handling message", self.spec.id);
        self.conversation.push(Message::user(payload.as_text()));

        for _ in 0..self.max_turns {
            let request = ModelRequest {
                model: self.spec.model.clone(),
                instructions: self.spec.instructions.clone(),
                messages: self.conversation.messages().to_vec(),
                tools: self.advertised_tools().await,
            };
            let turn = self.model.complete(request).await?;

            if turn.is_final() {
                self.conversation.push(Message::assistant(&turn.message));
                return Ok(Payload::text(turn.message));
            }

            self.conversation.push(Message::assistant_with_calls(
                &turn.message,
                turn.invocations.clone(),
            ));
            for invocation in turn.invocations {
                let content = match self.execute_invocation(&invocation, ctx).await {
                    Ok(value) => value.to_string(),
                    Err(message) => {
                        warn!(
                            "Agent {} invocation {}/{} failed: {message}",
                            self.spec.id, invocation.provider, invocation.tool
                        );
                        format!("error: {message}")
                    }
                };
                self.conversation
                    .push(Message::tool(invocation.id.clone(), content));
            }
        }

        Err(RuntimeError::MaxTurnsExceeded(self.max_turns))
    }

    /// Route one invocation: the reserved `peer` provider goes through the
    /// dispatcher seam, everything else through the gateway.
    async fn execute_invocation(
        &self,
        invocation: &ToolInvocation,
        ctx: &TurnContext,
    ) -> Result<serde_json::Value, String> {
        if invocation.provider == PEER_PROVIDER {
            if invocation.tool != PEER_SEND_TOOL {
                return Err(format!("unknown peer tool: {}", invocation.tool));
            }
            let target = invocation
                .arguments
                .get("agent_id")
                .and_then(|v| v.as_str())
                .ok_or_else(|| "peer call requires an 'agent_id' argument".to_string())?;
            let message = invocation
                .arguments
                .get("message")
                .and_then(|v| v.as_str())
                .ok_or_else(|| "peer call requires a 'message' argument".to_string())?;

            let response = ctx
                .peer
                .send_from(&ctx.chain, target, Payload::text(message))
                .await
                .map_err(|e| e.to_string())?;
            return Ok(serde_json::json!({ "response": response.as_text() }));
        }

        self.gateway
            .invoke(
                &invocation.provider,
                &self.spec.id,
                &invocation.tool,
                &invocation.arguments,
            )
            .await
            .map_err(|e| e.to_string())
    }

    /// Tools of every declared provider, qualified by provider name.
    ///
    /// A provider that cannot serve its list is skipped so the rest of the
    /// turn can proceed.
    async fn advertised_tools(&self) -> Vec<AdvertisedTool> {
        let mut tools = Vec::new();
        for provider in &self.spec.tool_providers {
            match self.gateway.list_tools(provider).await {
                Ok(definitions) => {
                    tools.extend(definitions.into_iter().map(|definition| AdvertisedTool {
                        provider: provider.clone(),
                        definition,
                    }));
                }
                Err(e) => warn!(
                    "Agent {} skipping tools of provider {provider}: {e}",
                    self.spec.id
                ),
            }
        }
        tools
    }
}

#[cfg(test)]
#[path = "runtime_tests.rs"]
mod tests;
