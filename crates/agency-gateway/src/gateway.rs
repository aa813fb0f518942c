//! The tool gateway: one shared session per configured provider.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::{debug, info};

use agency_protocols::tool::ToolDefinition;
use agency_protocols::GatewayError;

use crate::config::{ProviderConfig, TransportKind};
use crate::session::ProviderSession;
use crate::transport::{HttpTransport, ProviderTransport, StdioTransport, TransportError};

/// Builds a transport for a configured provider.
///
/// The gateway selects the variant from configuration; how a provider is
/// actually spawned or reached stays behind this seam (tests inject their
/// own connector).
#[async_trait]
pub trait TransportConnector: Send + Sync {
    async fn connect(
        &self,
        provider: &str,
        transport: &TransportKind,
    ) -> Result<Arc<dyn ProviderTransport>, TransportError>;
}

/// Default connector: stdio subprocess or HTTP endpoint.
struct DefaultConnector;

#[async_trait]
impl TransportConnector for DefaultConnector {
    async fn connect(
        &self,
        provider: &str,
        transport: &TransportKind,
    ) -> Result<Arc<dyn ProviderTransport>, TransportError> {
        match transport {
            TransportKind::Stdio { command, args, env } => {
                debug!("Connecting to provider {provider} via stdio: {command}");
                Ok(Arc::new(StdioTransport::spawn(command, args, env).await?))
            }
            TransportKind::Http { url, headers } => {
                debug!("Connecting to provider {provider} via http: {url}");
                Ok(Arc::new(HttpTransport::new(url.clone(), headers.clone())))
            }
        }
    }
}

/// Gateway over all configured tool providers.
pub struct ToolGateway {
    configs: HashMap<String, ProviderConfig>,
    connector: Arc<dyn TransportConnector>,
    sessions: DashMap<String, Arc<ProviderSession>>,
    connect_locks: DashMap<String, Arc<tokio::sync::Mutex<()>>>,
}

impl ToolGateway {
    pub fn new(configs: HashMap<String, ProviderConfig>) -> Self {
        Self::with_connector(configs, Arc::new(DefaultConnector))
    }

    pub fn with_connector(
        configs: HashMap<String, ProviderConfig>,
        connector: Arc<dyn TransportConnector>,
    ) -> Self {
        Self {
            configs,
            connector,
            sessions: DashMap::new(),
            connect_locks: DashMap::new(),
        }
    }

    /// Configured provider names, sorted.
    pub fn providers(&self) -> Vec<String> {
        let mut names: Vec<String> = self.configs.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn has_provider(&self, name: &str) -> bool {
        self.configs.contains_key(name)
    }

    /// The shared session for a provider, created lazily on first use.
    pub async fn session(&self, name: &str) -> Result<Arc<ProviderSession>, GatewayError> {
        if let Some(session) = self.sessions.get(name) {
            return Ok(session.clone());
        }

        let config = self
            .configs
            .get(name)
            .ok_or_else(|| GatewayError::UnknownProvider(name.to_string()))?
            .clone();

        // One connect per provider even under concurrent first use.
        let lock = self
            .connect_locks
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone();
        let _guard = lock.lock().await;

        if let Some(session) = self.sessions.get(name) {
            return Ok(session.clone());
        }

        let transport = self
            .connector
            .connect(name, &config.transport)
            .await
            .map_err(|e| GatewayError::Transport {
                provider: name.to_string(),
                message: e.to_string(),
            })?;

        let session = Arc::new(ProviderSession::new(name, config, transport));
        session.initialize().await?;
        self.sessions.insert(name.to_string(), session.clone());

        info!("Opened provider session: {name}");
        Ok(session)
    }

    /// The provider's advertised tools (cached per its configuration).
    pub async fn list_tools(&self, name: &str) -> Result<Vec<ToolDefinition>, GatewayError> {
        self.session(name).await?.tools().await
    }

    /// Invoke a tool on behalf of an agent.
    pub async fn invoke(
        &self,
        provider: &str,
        agent_id: &str,
        tool: &str,
        args: &serde_json::Value,
    ) -> Result<serde_json::Value, GatewayError> {
        self.session(provider).await?.invoke(agent_id, tool, args).await
    }

    /// Drop a provider's cached tool list.
    pub async fn invalidate(&self, name: &str) -> Result<(), GatewayError> {
        if let Some(session) = self.sessions.get(name) {
            session.invalidate().await;
            Ok(())
        } else if self.has_provider(name) {
            Ok(())
        } else {
            Err(GatewayError::UnknownProvider(name.to_string()))
        }
    }

    /// Manually clear a provider's failure state.
    pub fn reset(&self, name: &str) -> Result<(), GatewayError> {
        if let Some(session) = self.sessions.get(name) {
            session.reset();
            Ok(())
        } else if self.has_provider(name) {
            Ok(())
        } else {
            Err(GatewayError::UnknownProvider(name.to_string()))
        }
    }

    /// Close every open session.
    pub async fn shutdown(&self) {
        let names: Vec<String> = self.sessions.iter().map(|s| s.name().to_string()).collect();
        for name in names {
            if let Some((_, session)) = self.sessions.remove(&name) {
                session.close().await;
                info!("Closed provider session: {name}");
            }
        }
    }
}
