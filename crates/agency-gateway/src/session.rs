//! One logical session per tool provider.
//!
//! Sessions are shared by every agent that declares the provider. The cached
//! tool list is read-mostly; the invoke path is serialised per agent and
//! bounded per provider. Transport failures feed a consecutive-failure
//! counter; past the threshold the session fails fast until reset.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::sync::{RwLock, Semaphore};
use tokio::time::sleep;
use tracing::{debug, info, warn};

use agency_protocols::tool::ToolDefinition;
use agency_protocols::GatewayError;

use crate::config::ProviderConfig;
use crate::protocol::{Method, RpcRequest, RpcResponse};
use crate::transport::ProviderTransport;

#[derive(Debug, Default)]
struct SessionHealth {
    consecutive_failures: u32,
    /// Set when the session is unusable; invokes fail fast until this
    /// deadline passes or a manual reset clears it.
    reset_at: Option<Instant>,
}

/// A live session with one tool provider.
pub struct ProviderSession {
    name: String,
    config: ProviderConfig,
    transport: Arc<dyn ProviderTransport>,
    next_id: AtomicI64,
    tools: RwLock<Option<Vec<ToolDefinition>>>,
    health: Mutex<SessionHealth>,
    agent_locks: DashMap<String, Arc<tokio::sync::Mutex<()>>>,
    permits: Semaphore,
}

impl std::fmt::Debug for ProviderSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderSession")
            .field("name", &self.name)
            .field("config", &self.config)
            .field("next_id", &self.next_id)
            .field("health", &self.health)
            .field("permits", &self.permits.available_permits())
            .finish_non_exhaustive()
    }
}

impl ProviderSession {
    pub fn new(
        name: impl Into<String>,
        config: ProviderConfig,
        transport: Arc<dyn ProviderTransport>,
    ) -> Self {
        let permits = Semaphore::new(config.max_concurrency.max(1));
        Self {
            name: name.into(),
            config,
            transport,
            next_id: AtomicI64::new(1),
            tools: RwLock::new(None),
            health: Mutex::new(SessionHealth::default()),
            agent_locks: DashMap::new(),
            permits,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn next_id(&self) -> i64 {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }

    /// Perform the protocol handshake.
    pub async fn initialize(&self) -> Result<serde_json::Value, GatewayError> {
        let params = serde_json::json!({
            "protocolVersion": "2024-11-05",
            "capabilities": { "tools": {} },
            "clientInfo": {
                "name": "agency",
                "version": env!("CARGO_PKG_VERSION")
            }
        });
        let response = self
            .request_with_retry(Method::Initialize, Some(params))
            .await?;
        let result = response.result.unwrap_or(serde_json::Value::Null);
        info!("Provider session initialized: {}", self.name);
        Ok(result)
    }

    /// The provider's advertised tools.
    ///
    /// With caching enabled this fetches once per session; concurrent cold
    /// readers still produce a single provider round-trip.
    pub async fn tools(&self) -> Result<Vec<ToolDefinition>, GatewayError> {
        self.ensure_usable()?;

        if self.config.cache_tools {
            if let Some(cached) = self.tools.read().await.as_ref() {
                return Ok(cached.clone());
            }
            let mut slot = self.tools.write().await;
            if let Some(cached) = slot.as_ref() {
                return Ok(cached.clone());
            }
            let fetched = self.fetch_tools().await?;
            *slot = Some(fetched.clone());
            Ok(fetched)
        } else {
            self.fetch_tools().await
        }
    }

    /// Drop the cached tool list; the next read refetches.
    pub async fn invalidate(&self) {
        *self.tools.write().await = None;
        debug!("Invalidated tool cache for provider {}", self.name);
    }

    /// Invoke a tool after validating the call against the cached schema.
    ///
    /// Calls from the same agent are serialised; calls from different agents
    /// run concurrently up to the provider's concurrency bound.
    pub async fn invoke(
        &self,
        agent_id: &str,
        tool: &str,
        args: &serde_json::Value,
    ) -> Result<serde_json::Value, GatewayError> {
        self.ensure_usable()?;

        let definitions = self.tools().await?;
        let definition = definitions
            .iter()
            .find(|d| d.name == tool)
            .ok_or_else(|| {
                GatewayError::InvalidToolCall(format!(
                    "provider {} has no tool named {tool}",
                    self.name
                ))
            })?;
        validate_arguments(definition, args)?;

        let lock = self
            .agent_locks
            .entry(agent_id.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone();
        let _agent_guard = lock.lock().await;
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| GatewayError::Unavailable(self.name.clone()))?;

        let params = serde_json::json!({
            "name": tool,
            "arguments": args
        });
        let response = self.request_with_retry(Method::CallTool, Some(params)).await?;

        if let Some(err) = response.error {
            return Err(GatewayError::Provider {
                provider: self.name.clone(),
                code: err.code,
                message: err.message,
            });
        }
        Ok(response.result.unwrap_or(serde_json::Value::Null))
    }

    /// Manually clear the failure state.
    pub fn reset(&self) {
        let mut health = self.health.lock();
        health.consecutive_failures = 0;
        health.reset_at = None;
        info!("Provider session reset: {}", self.name);
    }

    /// Close the underlying transport.
    pub async fn close(&self) {
        if let Err(e) = self.transport.close().await {
            warn!("Failed to close transport for {}: {e}", self.name);
        }
    }

    fn ensure_usable(&self) -> Result<(), GatewayError> {
        let mut health = self.health.lock();
        if let Some(reset_at) = health.reset_at {
            if Instant::now() >= reset_at {
                health.reset_at = None;
                health.consecutive_failures = 0;
                info!("Provider session {} recovered after cooldown", self.name);
            } else {
                return Err(GatewayError::Unavailable(self.name.clone()));
            }
        }
        Ok(())
    }

    fn mark_unusable(&self, health: &mut SessionHealth) {
        if health.reset_at.is_none() {
            health.reset_at = Some(Instant::now() + self.config.cooldown);
            warn!(
                "Provider session {} marked unusable after {} consecutive failures",
                self.name, health.consecutive_failures
            );
        }
    }

    async fn fetch_tools(&self) -> Result<Vec<ToolDefinition>, GatewayError> {
        let response = self.request_with_retry(Method::ListTools, None).await?;
        if let Some(err) = response.error {
            return Err(GatewayError::Provider {
                provider: self.name.clone(),
                code: err.code,
                message: err.message,
            });
        }
        let result = response.result.unwrap_or(serde_json::Value::Null);
        let tools: Vec<ToolDefinition> = result
            .get("tools")
            .and_then(|t| serde_json::from_value(t.clone()).ok())
            .unwrap_or_default();
        debug!("Fetched {} tools from provider {}", tools.len(), self.name);
        Ok(tools)
    }

    /// One logical provider call with bounded retry.
    ///
    /// Only transport-level failures count against the session; a JSON-RPC
    /// error object from the provider is an application answer.
    async fn request_with_retry(
        &self,
        method: Method,
        params: Option<serde_json::Value>,
    ) -> Result<RpcResponse, GatewayError> {
        let attempts = self.config.retry.attempts.max(1);
        let mut last_message = String::new();

        for attempt in 0..attempts {
            if attempt > 0 {
                sleep(self.config.retry.delay_for_attempt(attempt - 1)).await;
            }

            let mut request = RpcRequest::new(self.next_id(), method);
            if let Some(p) = params.clone() {
                request = request.with_params(p);
            }

            match self.transport.request(request).await {
                Ok(response) => {
                    self.health.lock().consecutive_failures = 0;
                    return Ok(response);
                }
                Err(e) => {
                    last_message = e.to_string();
                    let mut health = self.health.lock();
                    health.consecutive_failures += 1;
                    warn!(
                        "Provider {} call failed (attempt {}/{}): {e}",
                        self.name,
                        attempt + 1,
                        attempts
                    );
                    if health.consecutive_failures >= self.config.max_failures {
                        self.mark_unusable(&mut health);
                    }
                }
            }
        }

        // The attempt budget is spent; stop accepting calls until reset.
        self.mark_unusable(&mut self.health.lock());
        Err(GatewayError::Transport {
            provider: self.name.clone(),
            message: last_message,
        })
    }
}

fn validate_arguments(
    definition: &ToolDefinition,
    args: &serde_json::Value,
) -> Result<(), GatewayError> {
    let validator = jsonschema::validator_for(&definition.input_schema).map_err(|e| {
        GatewayError::Protocol(format!(
            "provider advertised an invalid schema for {}: {e}",
            definition.name
        ))
    })?;
    validator
        .validate(args)
        .map_err(|e| GatewayError::InvalidToolCall(format!("{}: {e}", definition.name)))
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
