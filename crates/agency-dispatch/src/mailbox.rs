//! Per-runtime mailbox.
//!
//! Each active runtime is owned by exactly one worker task consuming an
//! unbounded channel: strict FIFO, one message in flight, completion in
//! start order. A queued message whose reply slot was already taken (by
//! cancellation) is skipped. After shutdown is signalled the worker drains
//! whatever is still queued with `AgentNotActive` and exits.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};
use uuid::Uuid;

use agency_protocols::envelope::{MessageEnvelope, Payload};
use agency_protocols::peer::{CallChain, PeerSender};
use agency_protocols::DispatchError;
use agency_runtime::{AgentRuntime, TurnContext};

use crate::dispatcher::Dispatcher;

pub(crate) type ReplySender = oneshot::Sender<Result<Payload, DispatchError>>;

/// Shared slot holding the reply channel until the message starts or is
/// cancelled, whichever comes first.
pub(crate) type ReplySlot = Arc<Mutex<Option<ReplySender>>>;

pub(crate) struct QueuedMessage {
    pub envelope: MessageEnvelope,
    pub chain: CallChain,
    pub reply: ReplySlot,
}

/// Handle to one runtime's mailbox worker.
pub(crate) struct MailboxHandle {
    tx: mpsc::UnboundedSender<QueuedMessage>,
    shutdown: Arc<AtomicBool>,
    worker: tokio::task::JoinHandle<()>,
}

impl MailboxHandle {
    /// Spawn the worker task owning `runtime`.
    pub fn spawn(
        runtime: AgentRuntime,
        dispatcher: Weak<Dispatcher>,
        pending: Arc<DashMap<Uuid, ReplySlot>>,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let shutdown = Arc::new(AtomicBool::new(false));
        let worker = tokio::spawn(run_worker(runtime, rx, dispatcher, pending, shutdown.clone()));
        Self {
            tx,
            shutdown,
            worker,
        }
    }

    /// Enqueue a message; returns it back if the mailbox is already closed.
    pub fn enqueue(&self, message: QueuedMessage) -> Result<(), QueuedMessage> {
        self.tx.send(message).map_err(|e| e.0)
    }

    /// Close the mailbox: queued messages fail with `AgentNotActive`, the
    /// in-flight message (if any) runs to completion, then the worker exits.
    pub async fn close(self) {
        let Self {
            tx,
            shutdown,
            worker,
        } = self;
        shutdown.store(true, Ordering::SeqCst);
        drop(tx);
        if let Err(e) = worker.await {
            warn!("Mailbox worker ended abnormally: {e}");
        }
    }
}

async fn run_worker(
    mut runtime: AgentRuntime,
    mut rx: mpsc::UnboundedReceiver<QueuedMessage>,
    dispatcher: Weak<Dispatcher>,
    pending: Arc<DashMap<Uuid, ReplySlot>>,
    shutdown: Arc<AtomicBool>,
) {
    let agent_id = runtime.agent_id().to_string();
    debug!("Mailbox worker started for agent {agent_id}");

    while let Some(message) = rx.recv().await {
        pending.remove(&message.envelope.correlation_id);

        // A taken slot means the message was cancelled while queued.
        let Some(reply) = message.reply.lock().take() else {
            debug!(
                "Skipping cancelled message {} for agent {agent_id}",
                message.envelope.correlation_id
            );
            continue;
        };

        if shutdown.load(Ordering::SeqCst) {
            let _ = reply.send(Err(DispatchError::AgentNotActive(agent_id.clone())));
            continue;
        }

        let Some(dispatcher) = dispatcher.upgrade() else {
            let _ = reply.send(Err(DispatchError::Internal(
                "dispatcher no longer exists".to_string(),
            )));
            break;
        };

        let peer: Arc<dyn PeerSender> = dispatcher;
        let ctx = TurnContext {
            peer,
            chain: message.chain.extended(agent_id.clone()),
        };

        let result = runtime
            .handle_message(message.envelope.payload.clone(), &ctx)
            .await
            .map_err(DispatchError::from);

        // The caller may have stopped waiting; that is their business.
        let _ = reply.send(result);
    }

    debug!("Mailbox worker stopped for agent {agent_id}");
}
