//! Runtime factory: spec -> live runtime.

use std::sync::Arc;

use dashmap::DashMap;
use tracing::{debug, info};

use agency_gateway::ToolGateway;
use agency_protocols::spec::AgentSpec;
use agency_protocols::RuntimeError;

use crate::model::ModelRegistry;
use crate::runtime::AgentRuntime;

/// Instantiates runtimes and enforces the at-most-one-per-id invariant.
pub struct RuntimeFactory {
    models: Arc<ModelRegistry>,
    gateway: Arc<ToolGateway>,
    max_turns: u32,
    live: DashMap<String, ()>,
}

impl RuntimeFactory {
    pub fn new(models: Arc<ModelRegistry>, gateway: Arc<ToolGateway>, max_turns: u32) -> Self {
        Self {
            models,
            gateway,
            max_turns,
            live: DashMap::new(),
        }
    }

    /// Build a runtime for a spec.
    ///
    /// Resolves the model identifier and opens a session for every declared
    /// tool provider (lazily via the gateway). Fails with `AlreadyActive`
    /// when a runtime for this id exists; any resolution failure releases
    /// the liveness mark so a later attempt can succeed.
    pub async fn instantiate(&self, spec: &AgentSpec) -> Result<AgentRuntime, RuntimeError> {
        match self.live.entry(spec.id.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                return Err(RuntimeError::AlreadyActive(spec.id.clone()));
            }
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(());
            }
        }

        match self.resolve(spec).await {
            Ok(runtime) => {
                info!("Instantiated runtime for agent {}", spec.id);
                Ok(runtime)
            }
            Err(e) => {
                self.live.remove(&spec.id);
                Err(e)
            }
        }
    }

    async fn resolve(&self, spec: &AgentSpec) -> Result<AgentRuntime, RuntimeError> {
        let model = self.models.resolve(&spec.model)?;
        for provider in &spec.tool_providers {
            self.gateway.session(provider).await?;
        }
        Ok(AgentRuntime::new(
            spec.clone(),
            model,
            self.gateway.clone(),
            self.max_turns,
        ))
    }

    /// Release the liveness mark for an id. Idempotent; shared provider
    /// sessions stay open for other runtimes.
    pub fn teardown(&self, agent_id: &str) {
        if self.live.remove(agent_id).is_some() {
            debug!("Tore down runtime for agent {agent_id}");
        }
    }

    /// Whether a runtime for this id currently exists.
    pub fn is_live(&self, agent_id: &str) -> bool {
        self.live.contains_key(agent_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime_test_support::{scripted_model, test_gateway, test_spec};
    use agency_protocols::model::ModelTurn;
    use agency_protocols::ModelError;

    fn factory_with_model() -> RuntimeFactory {
        let models = Arc::new(ModelRegistry::new());
        models.register(
            "gemini-2.0-flash",
            scripted_model(vec![ModelTurn::text("done")]),
        );
        RuntimeFactory::new(models, Arc::new(test_gateway()), 8)
    }

    #[tokio::test]
    async fn test_instantiate_enforces_at_most_one() {
        let factory = factory_with_model();
        let spec = test_spec("a1", vec!["fetch".to_string()]);

        factory.instantiate(&spec).await.unwrap();
        assert!(factory.is_live("a1"));

        let err = factory.instantiate(&spec).await.unwrap_err();
        assert!(matches!(err, RuntimeError::AlreadyActive(_)));
    }

    #[tokio::test]
    async fn test_teardown_is_idempotent_and_reenables() {
        let factory = factory_with_model();
        let spec = test_spec("a1", vec![]);

        factory.instantiate(&spec).await.unwrap();
        factory.teardown("a1");
        factory.teardown("a1");
        assert!(!factory.is_live("a1"));

        factory.instantiate(&spec).await.unwrap();
    }

    #[tokio::test]
    async fn test_unknown_model_fails_and_releases_mark() {
        let factory = factory_with_model();
        let spec = {
            let mut s = test_spec("a1", vec![]);
            s.model = "unregistered-model".to_string();
            s
        };

        let err = factory.instantiate(&spec).await.unwrap_err();
        assert!(matches!(err, RuntimeError::Model(ModelError::Unknown(_))));
        assert!(!factory.is_live("a1"));

        // The failure left no stale mark behind.
        let ok_spec = test_spec("a1", vec![]);
        factory.instantiate(&ok_spec).await.unwrap();
    }

    #[tokio::test]
    async fn test_unknown_provider_fails() {
        let factory = factory_with_model();
        let spec = test_spec("a1", vec!["unconfigured".to_string()]);

        let err = factory.instantiate(&spec).await.unwrap_err();
        assert!(matches!(err, RuntimeError::Gateway(_)));
        assert!(!factory.is_live("a1"));
    }
}
