use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use agency_core::{AgentRegistry, MemoryStore};
use agency_gateway::gateway::TransportConnector;
use agency_gateway::protocol::{RpcRequest, RpcResponse};
use agency_gateway::transport::{ProviderTransport, TransportError};
use agency_gateway::{ProviderConfig, ToolGateway, TransportKind};
use agency_protocols::envelope::{ErrorKind, MessageEnvelope, Payload};
use agency_protocols::model::{ModelBackend, ModelRequest, ModelTurn, ToolInvocation};
use agency_protocols::peer::{CallChain, PeerSender};
use agency_protocols::spec::{AgentDraft, AgentStatus};
use agency_protocols::{DispatchError, ModelError};
use agency_runtime::{ModelRegistry, RuntimeFactory};

use crate::dispatcher::{DispatchConfig, Dispatcher};

/// Model that echoes the last user message, optionally slowly, and records
/// processing order and overlap.
struct EchoModel {
    delay: Duration,
    in_flight: AtomicU32,
    max_in_flight: AtomicU32,
    processed: Mutex<Vec<String>>,
}

impl EchoModel {
    fn new(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay,
            in_flight: AtomicU32::new(0),
            max_in_flight: AtomicU32::new(0),
            processed: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl ModelBackend for EchoModel {
    fn id(&self) -> &str {
        "echo"
    }

    async fn complete(&self, request: ModelRequest) -> Result<ModelTurn, ModelError> {
        let content = request
            .messages
            .last()
            .map(|m| m.content.clone())
            .unwrap_or_default();
        self.processed.lock().push(content.clone());

        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        Ok(ModelTurn::text(format!("echo: {content}")))
    }
}

/// Model that plays back a fixed sequence of turns.
struct ScriptedModel {
    turns: Mutex<VecDeque<ModelTurn>>,
}

impl ScriptedModel {
    fn new(turns: Vec<ModelTurn>) -> Arc<Self> {
        Arc::new(Self {
            turns: Mutex::new(turns.into()),
        })
    }
}

#[async_trait]
impl ModelBackend for ScriptedModel {
    fn id(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, _request: ModelRequest) -> Result<ModelTurn, ModelError> {
        Ok(self
            .turns
            .lock()
            .pop_front()
            .unwrap_or_else(|| ModelTurn::text("script exhausted")))
    }
}

/// Transport for the `fetch` provider, counting list and call traffic.
struct CountingTransport {
    list_calls: AtomicU32,
    tool_calls: AtomicU32,
}

#[async_trait]
impl ProviderTransport for CountingTransport {
    async fn request(&self, request: RpcRequest) -> Result<RpcResponse, TransportError> {
        let result = match request.method.as_str() {
            "tools/list" => {
                self.list_calls.fetch_add(1, Ordering::SeqCst);
                serde_json::json!({
                    "tools": [{
                        "name": "fetch_url",
                        "description": "Fetch a URL",
                        "inputSchema": {
                            "type": "object",
                            "properties": { "url": { "type": "string" } },
                            "required": ["url"]
                        }
                    }]
                })
            }
            "tools/call" => {
                self.tool_calls.fetch_add(1, Ordering::SeqCst);
                serde_json::json!({"content": [{"type": "text", "text": "fetched"}]})
            }
            _ => serde_json::json!({}),
        };
        Ok(RpcResponse::success(request.id, result))
    }

    async fn close(&self) -> Result<(), TransportError> {
        Ok(())
    }
}

struct FixedConnector(Arc<CountingTransport>);

#[async_trait]
impl TransportConnector for FixedConnector {
    async fn connect(
        &self,
        _provider: &str,
        _transport: &TransportKind,
    ) -> Result<Arc<dyn ProviderTransport>, TransportError> {
        Ok(self.0.clone())
    }
}

struct Harness {
    dispatcher: Arc<Dispatcher>,
    factory: Arc<RuntimeFactory>,
    models: Arc<ModelRegistry>,
    transport: Arc<CountingTransport>,
}

async fn harness() -> Harness {
    let registry = Arc::new(
        AgentRegistry::open(Arc::new(MemoryStore::new()))
            .await
            .unwrap(),
    );

    let transport = Arc::new(CountingTransport {
        list_calls: AtomicU32::new(0),
        tool_calls: AtomicU32::new(0),
    });
    let mut configs = HashMap::new();
    configs.insert("fetch".to_string(), ProviderConfig::http("http://mock"));
    let gateway = Arc::new(ToolGateway::with_connector(
        configs,
        Arc::new(FixedConnector(transport.clone())),
    ));

    let models = Arc::new(ModelRegistry::new());
    models.register("echo-model", EchoModel::new(Duration::ZERO));
    models.register("slow-model", EchoModel::new(Duration::from_millis(200)));

    let factory = Arc::new(RuntimeFactory::new(models.clone(), gateway.clone(), 8));
    let dispatcher = Dispatcher::new(registry, gateway, factory.clone(), DispatchConfig::default());

    Harness {
        dispatcher,
        factory,
        models,
        transport,
    }
}

fn echo_draft(id: &str) -> AgentDraft {
    AgentDraft::new(format!("Agent {id}"), "Echoes messages")
        .with_id(id)
        .with_model("echo-model")
        .with_skills(vec!["echo".to_string()])
}

#[tokio::test]
async fn test_create_fills_default_model_and_status() {
    let h = harness().await;
    let spec = h
        .dispatcher
        .create_agent(AgentDraft::new("Plain", "No model named").with_id("a1"))
        .await
        .unwrap();

    assert_eq!(spec.model, "gemini-2.0-flash");
    assert_eq!(spec.status, AgentStatus::Created);
}

#[tokio::test]
async fn test_activate_then_double_activate() {
    let h = harness().await;
    h.dispatcher.create_agent(echo_draft("a1")).await.unwrap();

    let spec = h.dispatcher.activate_agent("a1").await.unwrap();
    assert_eq!(spec.status, AgentStatus::Active);

    let err = h.dispatcher.activate_agent("a1").await.unwrap_err();
    assert!(matches!(err, DispatchError::AlreadyActive(_)));
    // Still active and still serving.
    assert_eq!(
        h.dispatcher.get_agent("a1").unwrap().status,
        AgentStatus::Active
    );
}

#[tokio::test]
async fn test_activation_failure_leaves_status_unchanged() {
    let h = harness().await;
    h.dispatcher
        .create_agent(
            AgentDraft::new("Broken", "Names a model nobody registered")
                .with_id("a1")
                .with_model("no-such-model"),
        )
        .await
        .unwrap();

    let err = h.dispatcher.activate_agent("a1").await.unwrap_err();
    assert!(matches!(err, DispatchError::UnknownModel(_)));
    assert_eq!(
        h.dispatcher.get_agent("a1").unwrap().status,
        AgentStatus::Created
    );
    assert!(!h.factory.is_live("a1"));
}

#[tokio::test]
async fn test_invalid_lifecycle_transitions() {
    let h = harness().await;
    h.dispatcher.create_agent(echo_draft("a1")).await.unwrap();

    // created -> inactive is not a legal move.
    let err = h.dispatcher.deactivate_agent("a1").await.unwrap_err();
    assert!(matches!(err, DispatchError::InvalidTransition { .. }));

    h.dispatcher.activate_agent("a1").await.unwrap();
    h.dispatcher.deactivate_agent("a1").await.unwrap();

    // inactive -> inactive neither.
    let err = h.dispatcher.deactivate_agent("a1").await.unwrap_err();
    assert!(matches!(err, DispatchError::InvalidTransition { .. }));

    // inactive -> active again is fine.
    h.dispatcher.activate_agent("a1").await.unwrap();
}

#[tokio::test]
async fn test_send_message_round_trip() {
    let h = harness().await;
    h.dispatcher.create_agent(echo_draft("a1")).await.unwrap();
    h.dispatcher.activate_agent("a1").await.unwrap();

    let reply = h
        .dispatcher
        .send_message("a1", Payload::text("hello"))
        .await
        .unwrap();
    assert_eq!(reply, Payload::text("echo: hello"));
}

#[tokio::test]
async fn test_send_to_non_active_agent_has_no_side_effects() {
    let h = harness().await;
    h.dispatcher.create_agent(echo_draft("a1")).await.unwrap();

    let err = h
        .dispatcher
        .send_message("a1", Payload::text("hello"))
        .await
        .unwrap_err();
    assert!(matches!(err, DispatchError::AgentNotActive(_)));
    // No runtime sprang into existence as a side effect.
    assert!(!h.factory.is_live("a1"));

    let err = h
        .dispatcher
        .send_message("missing", Payload::text("hello"))
        .await
        .unwrap_err();
    assert!(matches!(err, DispatchError::NotFound(_)));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_messages_complete_sequentially_in_arrival_order() {
    let h = harness().await;
    let model = EchoModel::new(Duration::from_millis(20));
    h.models.register("fifo-model", model.clone());
    h.dispatcher
        .create_agent(
            AgentDraft::new("Fifo", "Ordered")
                .with_id("a1")
                .with_model("fifo-model"),
        )
        .await
        .unwrap();
    h.dispatcher.activate_agent("a1").await.unwrap();

    let mut pending = Vec::new();
    for i in 0..5 {
        pending.push(
            h.dispatcher
                .submit("a1", Payload::text(format!("m{i}")))
                .unwrap(),
        );
    }
    for (i, reply) in pending.into_iter().enumerate() {
        assert_eq!(reply.wait().await.unwrap(), Payload::text(format!("echo: m{i}")));
    }

    // Exactly N sequential completions, never overlapping, in arrival order.
    assert_eq!(model.max_in_flight.load(Ordering::SeqCst), 1);
    assert_eq!(
        *model.processed.lock(),
        vec!["m0", "m1", "m2", "m3", "m4"]
    );
}

#[tokio::test]
async fn test_cold_tool_cache_is_fetched_once() {
    let h = harness().await;
    h.models.register(
        "fetching-model",
        ScriptedModel::new(vec![
            ModelTurn::with_invocations(
                "",
                vec![ToolInvocation::new(
                    "call-1",
                    "fetch",
                    "fetch_url",
                    serde_json::json!({"url": "https://example.com"}),
                )],
            ),
            ModelTurn::text("done"),
        ]),
    );
    h.dispatcher
        .create_agent(
            AgentDraft::new("Fetcher", "Uses the fetch provider")
                .with_id("a1")
                .with_model("fetching-model")
                .with_tool_providers(vec!["fetch".to_string()]),
        )
        .await
        .unwrap();

    h.dispatcher.activate_agent("a1").await.unwrap();
    assert_eq!(h.transport.list_calls.load(Ordering::SeqCst), 0);

    let reply = h
        .dispatcher
        .send_message("a1", Payload::text("hello"))
        .await
        .unwrap();
    assert_eq!(reply, Payload::text("done"));

    // The cold cache was filled exactly once, then reused for validation.
    assert_eq!(h.transport.list_calls.load(Ordering::SeqCst), 1);
    assert_eq!(h.transport.tool_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_reentrant_self_target_fails_fast() {
    let h = harness().await;
    h.dispatcher.create_agent(echo_draft("a1")).await.unwrap();
    h.dispatcher.activate_agent("a1").await.unwrap();

    let chain = CallChain::new().extended("a1");
    let err = h
        .dispatcher
        .send_from(&chain, "a1", Payload::text("hello me"))
        .await
        .unwrap_err();
    assert!(matches!(err, DispatchError::ReentrantCall(_)));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_agent_call_cycle_resolves_without_deadlock() {
    let h = harness().await;

    // a1 calls b1; b1 calls back into a1, which is refused as re-entrant;
    // both still answer.
    h.models.register(
        "model-a",
        ScriptedModel::new(vec![
            ModelTurn::with_invocations(
                "",
                vec![ToolInvocation::new(
                    "call-1",
                    "peer",
                    "send_message",
                    serde_json::json!({"agent_id": "b1", "message": "ping"}),
                )],
            ),
            ModelTurn::text("a done"),
        ]),
    );
    h.models.register(
        "model-b",
        ScriptedModel::new(vec![
            ModelTurn::with_invocations(
                "",
                vec![ToolInvocation::new(
                    "call-1",
                    "peer",
                    "send_message",
                    serde_json::json!({"agent_id": "a1", "message": "pong"}),
                )],
            ),
            ModelTurn::text("b done"),
        ]),
    );

    for (id, model) in [("a1", "model-a"), ("b1", "model-b")] {
        h.dispatcher
            .create_agent(AgentDraft::new(id, "Cycle member").with_id(id).with_model(model))
            .await
            .unwrap();
        h.dispatcher.activate_agent(id).await.unwrap();
    }

    let reply = tokio::time::timeout(
        Duration::from_secs(5),
        h.dispatcher.send_message("a1", Payload::text("start")),
    )
    .await
    .expect("cycle must not deadlock")
    .unwrap();

    assert_eq!(reply, Payload::text("a done"));
}

#[tokio::test]
async fn test_agent_card_is_deterministic_and_status_independent() {
    let h = harness().await;
    h.dispatcher.create_agent(echo_draft("a1")).await.unwrap();

    let first = serde_json::to_vec(&h.dispatcher.agent_card("a1").unwrap()).unwrap();
    let second = serde_json::to_vec(&h.dispatcher.agent_card("a1").unwrap()).unwrap();
    assert_eq!(first, second);

    // Cards stay visible while inactive, to allow re-activation planning.
    h.dispatcher.activate_agent("a1").await.unwrap();
    h.dispatcher.deactivate_agent("a1").await.unwrap();
    let card = h.dispatcher.agent_card("a1").unwrap();
    assert_eq!(card.info.id, "a1");
    assert!(card.info.url.ends_with("/agents/a1"));

    let err = h.dispatcher.agent_card("missing").unwrap_err();
    assert!(matches!(err, DispatchError::NotFound(_)));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_cancel_queued_message() {
    let h = harness().await;
    h.dispatcher
        .create_agent(
            AgentDraft::new("Slow", "Takes its time")
                .with_id("a1")
                .with_model("slow-model"),
        )
        .await
        .unwrap();
    h.dispatcher.activate_agent("a1").await.unwrap();

    let first = h.dispatcher.submit("a1", Payload::text("first")).unwrap();
    // Give the worker a moment to start the first message.
    tokio::time::sleep(Duration::from_millis(50)).await;
    let second = h.dispatcher.submit("a1", Payload::text("second")).unwrap();

    assert!(h.dispatcher.cancel(second.correlation_id));
    let err = second.wait().await.unwrap_err();
    assert!(matches!(err, DispatchError::Cancelled));

    // The in-flight message is untouched.
    assert_eq!(first.wait().await.unwrap(), Payload::text("echo: first"));

    // Cancelling something already finished (or unknown) reports false.
    assert!(!h.dispatcher.cancel(uuid::Uuid::new_v4()));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_deactivation_fails_queued_messages() {
    let h = harness().await;
    h.dispatcher
        .create_agent(
            AgentDraft::new("Slow", "Takes its time")
                .with_id("a1")
                .with_model("slow-model"),
        )
        .await
        .unwrap();
    h.dispatcher.activate_agent("a1").await.unwrap();

    let in_flight = h.dispatcher.submit("a1", Payload::text("first")).unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    let queued = h.dispatcher.submit("a1", Payload::text("second")).unwrap();

    let spec = h.dispatcher.deactivate_agent("a1").await.unwrap();
    assert_eq!(spec.status, AgentStatus::Inactive);

    // The in-flight message ran to completion; the queued one was failed at
    // the moment of deactivation rather than delivered afterward.
    assert_eq!(in_flight.wait().await.unwrap(), Payload::text("echo: first"));
    let err = queued.wait().await.unwrap_err();
    assert!(matches!(err, DispatchError::AgentNotActive(_)));

    // And nothing is accepted anymore.
    let err = h
        .dispatcher
        .send_message("a1", Payload::text("third"))
        .await
        .unwrap_err();
    assert!(matches!(err, DispatchError::AgentNotActive(_)));
}

#[tokio::test]
async fn test_update_without_binding_changes_keeps_runtime() {
    let h = harness().await;
    h.dispatcher.create_agent(echo_draft("a1")).await.unwrap();
    h.dispatcher.activate_agent("a1").await.unwrap();

    let updated = h
        .dispatcher
        .update_agent(
            "a1",
            agency_protocols::spec::AgentSpecPatch::default().description("Renamed purpose"),
        )
        .await
        .unwrap();

    assert_eq!(updated.status, AgentStatus::Active);
    assert_eq!(updated.description, "Renamed purpose");
    h.dispatcher
        .send_message("a1", Payload::text("still here"))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_update_of_model_cycles_the_runtime() {
    let h = harness().await;
    h.dispatcher.create_agent(echo_draft("a1")).await.unwrap();
    h.dispatcher.activate_agent("a1").await.unwrap();

    // Changing the model on an active agent forces deactivate + reactivate;
    // a model that cannot be resolved leaves the agent inactive with the
    // error surfaced.
    let err = h
        .dispatcher
        .update_agent(
            "a1",
            agency_protocols::spec::AgentSpecPatch::default().model("no-such-model"),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, DispatchError::UnknownModel(_)));
    assert_eq!(
        h.dispatcher.get_agent("a1").unwrap().status,
        AgentStatus::Inactive
    );
    assert!(!h.factory.is_live("a1"));

    // Repairing the spec allows activation again.
    h.dispatcher
        .update_agent(
            "a1",
            agency_protocols::spec::AgentSpecPatch::default().model("echo-model"),
        )
        .await
        .unwrap();
    h.dispatcher.activate_agent("a1").await.unwrap();
    h.dispatcher
        .send_message("a1", Payload::text("back"))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_delete_active_agent_and_tombstone() {
    let h = harness().await;
    h.dispatcher.create_agent(echo_draft("a1")).await.unwrap();
    h.dispatcher.activate_agent("a1").await.unwrap();

    h.dispatcher.delete_agent("a1").await.unwrap();
    assert!(!h.factory.is_live("a1"));
    assert!(matches!(
        h.dispatcher.get_agent("a1"),
        Err(DispatchError::NotFound(_))
    ));
    assert!(matches!(
        h.dispatcher.agent_card("a1"),
        Err(DispatchError::NotFound(_))
    ));

    // The id is never reassigned.
    let err = h.dispatcher.create_agent(echo_draft("a1")).await.unwrap_err();
    assert!(matches!(err, DispatchError::DuplicateId(_)));

    // Deleting again reports the absence.
    let err = h.dispatcher.delete_agent("a1").await.unwrap_err();
    assert!(matches!(err, DispatchError::NotFound(_)));
}

#[tokio::test]
async fn test_handle_envelope_wraps_results_and_errors() {
    let h = harness().await;
    h.dispatcher.create_agent(echo_draft("a1")).await.unwrap();
    h.dispatcher.activate_agent("a1").await.unwrap();

    let request = MessageEnvelope::new("a1", Payload::text("hello"));
    let response = h.dispatcher.handle(request.clone()).await;
    assert_eq!(response.correlation_id, request.correlation_id);
    assert_eq!(response.result, Some(Payload::text("echo: hello")));

    let bad = MessageEnvelope::new("missing", Payload::text("hello"));
    let response = h.dispatcher.handle(bad.clone()).await;
    assert_eq!(response.correlation_id, bad.correlation_id);
    let error = response.error.unwrap();
    assert_eq!(error.kind, ErrorKind::NotFound);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_n_concurrent_sends_all_complete() {
    let h = harness().await;
    let model = EchoModel::new(Duration::from_millis(5));
    h.models.register("burst-model", model.clone());
    h.dispatcher
        .create_agent(
            AgentDraft::new("Burst", "Handles a burst")
                .with_id("a1")
                .with_model("burst-model"),
        )
        .await
        .unwrap();
    h.dispatcher.activate_agent("a1").await.unwrap();

    let mut handles = Vec::new();
    for i in 0..8 {
        let dispatcher = h.dispatcher.clone();
        handles.push(tokio::spawn(async move {
            dispatcher
                .send_message("a1", Payload::text(format!("m{i}")))
                .await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(model.processed.lock().len(), 8);
    assert_eq!(model.max_in_flight.load(Ordering::SeqCst), 1);
}
