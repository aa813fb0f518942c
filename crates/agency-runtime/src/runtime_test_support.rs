//! Shared fixtures for runtime and factory tests.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;

use agency_gateway::gateway::TransportConnector;
use agency_gateway::protocol::{RpcRequest, RpcResponse};
use agency_gateway::transport::{ProviderTransport, TransportError};
use agency_gateway::{ProviderConfig, ToolGateway, TransportKind};
use agency_protocols::model::{ModelBackend, ModelRequest, ModelTurn};
use agency_protocols::spec::{AgentSpec, AgentStatus, Metadata};
use agency_protocols::ModelError;

/// Model that plays back a fixed sequence of turns, then ends the turn.
pub struct ScriptedModel {
    turns: Mutex<VecDeque<ModelTurn>>,
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

pub fn scripted_model(turns: Vec<ModelTurn>) -> Arc<dyn ModelBackend> {
    Arc::new(ScriptedModel {
        turns: Mutex::new(turns.into()),
    })
}

/// Model that returns the same turn forever.
pub struct RepeatingModel {
    pub turn: ModelTurn,
}

#[async_trait]
impl ModelBackend for RepeatingModel {
    fn id(&self) -> &str {
        "repeating"
    }

    async fn complete(&self, _request: ModelRequest) -> Result<ModelTurn, ModelError> {
        Ok(self.turn.clone())
    }
}

/// Transport advertising one `fetch_url` tool and answering every call.
pub struct FixtureTransport;

#[async_trait]
impl ProviderTransport for FixtureTransport {
    async fn request(&self, request: RpcRequest) -> Result<RpcResponse, TransportError> {
        let result = match request.method.as_str() {
            "tools/list" => serde_json::json!({
                "tools": [{
                    "name": "fetch_url",
                    "description": "Fetch a URL",
                    "inputSchema": {
                        "type": "object",
                        "properties": { "url": { "type": "string" } },
                        "required": ["url"]
                    }
                }]
            }),
            "tools/call" => serde_json::json!({
                "content": [{"type": "text", "text": "fetched"}]
            }),
            _ => serde_json::json!({}),
        };
        Ok(RpcResponse::success(request.id, result))
    }

    async fn close(&self) -> Result<(), TransportError> {
        Ok(())
    }
}

struct FixtureConnector;

#[async_trait]
impl TransportConnector for FixtureConnector {
    async fn connect(
        &self,
        _provider: &str,
        _transport: &TransportKind,
    ) -> Result<Arc<dyn ProviderTransport>, TransportError> {
        Ok(Arc::new(FixtureTransport))
    }
}

/// Gateway with one configured provider named `fetch`.
pub fn test_gateway() -> ToolGateway {
    let mut configs = HashMap::new();
    configs.insert("fetch".to_string(), ProviderConfig::http("http://mock"));
    ToolGateway::with_connector(configs, Arc::new(FixtureConnector))
}

pub fn test_spec(id: &str, tool_providers: Vec<String>) -> AgentSpec {
    let now = Utc::now();
    AgentSpec {
        id: id.to_string(),
        name: format!("Agent {id}"),
        description: "Test agent".to_string(),
        skills: vec!["testing".to_string()],
        model: "gemini-2.0-flash".to_string(),
        instructions: None,
        tool_providers,
        metadata: Metadata::new(),
        status: AgentStatus::Created,
        created_at: now,
        updated_at: now,
    }
}
