//! The parent dispatcher.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::{debug, info, warn};
use uuid::Uuid;

use agency_core::lifecycle::can_transition;
use agency_core::AgentRegistry;
use agency_gateway::ToolGateway;
use agency_protocols::card::AgentCard;
use agency_protocols::envelope::{MessageEnvelope, Payload, ResponseEnvelope};
use agency_protocols::peer::{CallChain, PeerSender};
use agency_protocols::spec::{AgentDraft, AgentQuery, AgentSpec, AgentSpecPatch, AgentStatus};
use agency_protocols::DispatchError;
use agency_runtime::RuntimeFactory;

use crate::mailbox::{MailboxHandle, QueuedMessage, ReplySlot};

/// Dispatcher settings.
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// Model for agent drafts that name none.
    pub default_model: String,

    /// Base URL advertised in agent cards.
    pub endpoint: String,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            default_model: "gemini-2.0-flash".to_string(),
            endpoint: "http://127.0.0.1:8080".to_string(),
        }
    }
}

/// A submitted message whose reply has not arrived yet.
///
/// Holding this allows cancelling the message while it is still queued.
pub struct PendingReply {
    pub correlation_id: Uuid,
    rx: tokio::sync::oneshot::Receiver<Result<Payload, DispatchError>>,
}

impl PendingReply {
    /// Wait for the reply.
    pub async fn wait(self) -> Result<Payload, DispatchError> {
        self.rx
            .await
            .map_err(|_| DispatchError::Internal("reply channel closed".to_string()))?
    }
}

/// The single entry point for lifecycle operations and agent messaging.
pub struct Dispatcher {
    registry: Arc<AgentRegistry>,
    gateway: Arc<ToolGateway>,
    factory: Arc<RuntimeFactory>,
    config: DispatchConfig,
    runtimes: DashMap<String, MailboxHandle>,
    pending: Arc<DashMap<Uuid, ReplySlot>>,
    lifecycle_locks: DashMap<String, Arc<tokio::sync::Mutex<()>>>,
}

impl Dispatcher {
    pub fn new(
        registry: Arc<AgentRegistry>,
        gateway: Arc<ToolGateway>,
        factory: Arc<RuntimeFactory>,
        config: DispatchConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            registry,
            gateway,
            factory,
            config,
            runtimes: DashMap::new(),
            pending: Arc::new(DashMap::new()),
            lifecycle_locks: DashMap::new(),
        })
    }

    pub fn gateway(&self) -> &Arc<ToolGateway> {
        &self.gateway
    }

    fn lifecycle_lock(&self, id: &str) -> Arc<tokio::sync::Mutex<()>> {
        self.lifecycle_locks
            .entry(id.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    // ---- lifecycle operations -------------------------------------------

    /// Create an agent; status starts at `created`.
    pub async fn create_agent(&self, mut draft: AgentDraft) -> Result<AgentSpec, DispatchError> {
        if draft.model.is_none() {
            draft.model = Some(self.config.default_model.clone());
        }
        let spec = self.registry.create(draft).await?;
        Ok(spec)
    }

    pub fn get_agent(&self, id: &str) -> Result<AgentSpec, DispatchError> {
        Ok(self.registry.get(id)?)
    }

    pub fn list_agents(&self, query: &AgentQuery) -> Vec<AgentSpec> {
        self.registry.query(query)
    }

    /// Activate an agent: instantiate its runtime and open its mailbox.
    pub async fn activate_agent(self: &Arc<Self>, id: &str) -> Result<AgentSpec, DispatchError> {
        let lock = self.lifecycle_lock(id);
        let _guard = lock.lock().await;
        self.activate_locked(id).await
    }

    async fn activate_locked(self: &Arc<Self>, id: &str) -> Result<AgentSpec, DispatchError> {
        let spec = self.registry.get(id)?;

        if self.factory.is_live(id) {
            return Err(DispatchError::AlreadyActive(id.to_string()));
        }
        if !can_transition(spec.status, AgentStatus::Active) {
            return Err(DispatchError::InvalidTransition {
                from: spec.status,
                to: AgentStatus::Active,
            });
        }

        let runtime = self.factory.instantiate(&spec).await?;
        let handle = MailboxHandle::spawn(runtime, Arc::downgrade(self), self.pending.clone());
        self.runtimes.insert(id.to_string(), handle);

        match self.registry.set_status(id, AgentStatus::Active).await {
            Ok(spec) => {
                info!("Activated agent {id}");
                Ok(spec)
            }
            Err(e) => {
                // Persisting the transition failed: undo the runtime so the
                // spec and the live state stay consistent.
                self.stop_runtime(id).await;
                Err(e.into())
            }
        }
    }

    /// Deactivate an agent: fail whatever is still queued, let the in-flight
    /// message finish, tear the runtime down.
    pub async fn deactivate_agent(&self, id: &str) -> Result<AgentSpec, DispatchError> {
        let lock = self.lifecycle_lock(id);
        let _guard = lock.lock().await;
        self.deactivate_locked(id).await
    }

    async fn deactivate_locked(&self, id: &str) -> Result<AgentSpec, DispatchError> {
        let spec = self.registry.get(id)?;
        if !can_transition(spec.status, AgentStatus::Inactive) {
            return Err(DispatchError::InvalidTransition {
                from: spec.status,
                to: AgentStatus::Inactive,
            });
        }

        self.stop_runtime(id).await;
        let spec = self.registry.set_status(id, AgentStatus::Inactive).await?;
        info!("Deactivated agent {id}");
        Ok(spec)
    }

    /// Delete an agent from any non-deleted status; active runtimes are torn
    /// down first. The id is tombstoned and never reassigned.
    pub async fn delete_agent(&self, id: &str) -> Result<(), DispatchError> {
        let lock = self.lifecycle_lock(id);
        let _guard = lock.lock().await;

        let spec = self.registry.get(id)?;
        if !can_transition(spec.status, AgentStatus::Deleted) {
            return Err(DispatchError::InvalidTransition {
                from: spec.status,
                to: AgentStatus::Deleted,
            });
        }

        if spec.status == AgentStatus::Active {
            self.stop_runtime(id).await;
        }
        self.registry.delete(id).await?;
        info!("Deleted agent {id}");
        Ok(())
    }

    /// Update an agent spec.
    ///
    /// When the agent is active and the update touches its model or tool
    /// providers, the runtime is cycled so it matches the new spec. A failed
    /// reactivation leaves the agent inactive and surfaces the error.
    pub async fn update_agent(
        self: &Arc<Self>,
        id: &str,
        patch: AgentSpecPatch,
    ) -> Result<AgentSpec, DispatchError> {
        let lock = self.lifecycle_lock(id);
        let _guard = lock.lock().await;

        let before = self.registry.get(id)?;
        let updated = self.registry.update(id, patch).await?;

        let needs_cycle = before.status == AgentStatus::Active
            && (updated.model != before.model || updated.tool_providers != before.tool_providers);
        if needs_cycle {
            debug!("Update changed bindings of active agent {id}; cycling runtime");
            self.deactivate_locked(id).await?;
            self.activate_locked(id).await?;
        }

        Ok(self.registry.get(id)?)
    }

    async fn stop_runtime(&self, id: &str) {
        if let Some((_, handle)) = self.runtimes.remove(id) {
            handle.close().await;
        }
        self.factory.teardown(id);
    }

    // ---- peer protocol layer --------------------------------------------

    /// The agent's discovery document, derived live from its current spec.
    /// Visible regardless of status.
    pub fn agent_card(&self, id: &str) -> Result<AgentCard, DispatchError> {
        let spec = self.registry.get(id)?;
        Ok(AgentCard::derive(&spec, &self.config.endpoint))
    }

    /// Send a message and wait for the reply.
    pub async fn send_message(
        &self,
        target: &str,
        payload: Payload,
    ) -> Result<Payload, DispatchError> {
        self.submit(target, payload)?.wait().await
    }

    /// Submit a message without waiting; the returned handle carries the
    /// correlation id for cancellation.
    pub fn submit(&self, target: &str, payload: Payload) -> Result<PendingReply, DispatchError> {
        let envelope = MessageEnvelope::new(target, payload);
        self.submit_envelope(envelope, &CallChain::new())
    }

    /// Handle a pre-built envelope from the transport layer, converting any
    /// error into a response envelope.
    pub async fn handle(&self, envelope: MessageEnvelope) -> ResponseEnvelope {
        let request = envelope.clone();
        let result = match self.submit_envelope(envelope, &CallChain::new()) {
            Ok(pending) => pending.wait().await,
            Err(e) => Err(e),
        };
        match result {
            Ok(payload) => ResponseEnvelope::success(&request, payload),
            Err(e) => {
                warn!(
                    "Message {} to {} failed: {e}",
                    request.correlation_id, request.target
                );
                ResponseEnvelope::failure(&request, &e)
            }
        }
    }

    /// Cancel a message that is still queued. Returns `false` when the
    /// message already started (or finished); side effects of a started
    /// message are never undone.
    pub fn cancel(&self, correlation_id: Uuid) -> bool {
        if let Some((_, slot)) = self.pending.remove(&correlation_id) {
            if let Some(reply) = slot.lock().take() {
                let _ = reply.send(Err(DispatchError::Cancelled));
                debug!("Cancelled queued message {correlation_id}");
                return true;
            }
        }
        false
    }

    fn submit_envelope(
        &self,
        envelope: MessageEnvelope,
        chain: &CallChain,
    ) -> Result<PendingReply, DispatchError> {
        let target = envelope.target.clone();

        if chain.contains(&target) {
            return Err(DispatchError::ReentrantCall(target));
        }

        let spec = self.registry.get(&target)?;
        if spec.status != AgentStatus::Active {
            return Err(DispatchError::AgentNotActive(target));
        }
        let handle = self
            .runtimes
            .get(&target)
            .ok_or_else(|| DispatchError::AgentNotActive(target.clone()))?;

        let correlation_id = envelope.correlation_id;
        let (tx, rx) = tokio::sync::oneshot::channel();
        let slot: ReplySlot = Arc::new(parking_lot::Mutex::new(Some(tx)));
        self.pending.insert(correlation_id, slot.clone());

        let queued = QueuedMessage {
            envelope,
            chain: chain.clone(),
            reply: slot,
        };
        if handle.enqueue(queued).is_err() {
            // The mailbox closed between lookup and enqueue.
            self.pending.remove(&correlation_id);
            return Err(DispatchError::AgentNotActive(target));
        }

        Ok(PendingReply { correlation_id, rx })
    }
}

#[async_trait]
impl PeerSender for Dispatcher {
    async fn send_from(
        &self,
        chain: &CallChain,
        target: &str,
        payload: Payload,
    ) -> Result<Payload, DispatchError> {
        let envelope = MessageEnvelope::new(target, payload);
        self.submit_envelope(envelope, chain)?.wait().await
    }
}

#[cfg(test)]
#[path = "dispatcher_tests.rs"]
mod tests;
