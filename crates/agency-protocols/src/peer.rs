//! Peer invocation seam.
//!
//! Runtimes reach other agents through [`PeerSender`] rather than holding
//! the dispatcher directly. Every in-flight message carries its [`CallChain`]
//! so a nested call that would re-enter a runtime already on the chain fails
//! instead of blocking forever.

use async_trait::async_trait;

use crate::envelope::Payload;
use crate::error::DispatchError;

/// Reserved provider name routing tool invocations to other agents.
pub const PEER_PROVIDER: &str = "peer";

/// The single tool exposed under [`PEER_PROVIDER`].
pub const PEER_SEND_TOOL: &str = "send_message";

/// The causal chain of runtime ids for an in-flight message, outermost first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallChain(Vec<String>);

impl CallChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, agent_id: &str) -> bool {
        self.0.iter().any(|id| id == agent_id)
    }

    pub fn push(&mut self, agent_id: impl Into<String>) {
        self.0.push(agent_id.into());
    }

    /// A copy of the chain extended with one more hop.
    pub fn extended(&self, agent_id: impl Into<String>) -> Self {
        let mut chain = self.clone();
        chain.push(agent_id);
        chain
    }

    pub fn depth(&self) -> usize {
        self.0.len()
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }
}

/// Sends a message to another agent on behalf of an in-flight message.
#[async_trait]
pub trait PeerSender: Send + Sync {
    /// Deliver `payload` to `target`, observing the caller's chain.
    ///
    /// Fails with `ReentrantCall` when `target` is already on `chain`.
    async fn send_from(
        &self,
        chain: &CallChain,
        target: &str,
        payload: Payload,
    ) -> Result<Payload, DispatchError>;
}
