//! Model backend registry.

use std::sync::Arc;

use dashmap::DashMap;

use agency_protocols::model::ModelBackend;
use agency_protocols::ModelError;

/// Maps model identifiers to backends.
///
/// The core treats model invocation as an opaque capability; which backends
/// exist is decided by the embedding application at wiring time.
#[derive(Default)]
pub struct ModelRegistry {
    backends: DashMap<String, Arc<dyn ModelBackend>>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a backend under a model identifier.
    ///
    /// Later registrations for the same identifier win; swapping a backend
    /// is a wiring concern, not an error.
    pub fn register(&self, model_id: impl Into<String>, backend: Arc<dyn ModelBackend>) {
        self.backends.insert(model_id.into(), backend);
    }

    /// Resolve a model identifier.
    pub fn resolve(&self, model_id: &str) -> Result<Arc<dyn ModelBackend>, ModelError> {
        self.backends
            .get(model_id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| ModelError::Unknown(model_id.to_string()))
    }

    pub fn contains(&self, model_id: &str) -> bool {
        self.backends.contains_key(model_id)
    }

    /// Registered model identifiers, sorted.
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.backends.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agency_protocols::model::{ModelRequest, ModelTurn};
    use async_trait::async_trait;

    struct StaticModel(&'static str);

    #[async_trait]
    impl ModelBackend for StaticModel {
        fn id(&self) -> &str {
            "static"
        }

        async fn complete(&self, _request: ModelRequest) -> Result<ModelTurn, ModelError> {
            Ok(ModelTurn::text(self.0))
        }
    }

    #[test]
    fn test_register_and_resolve() {
        let registry = ModelRegistry::new();
        registry.register("gemini-2.0-flash", Arc::new(StaticModel("hi")));

        assert!(registry.contains("gemini-2.0-flash"));
        assert!(registry.resolve("gemini-2.0-flash").is_ok());
    }

    #[test]
    fn test_resolve_unknown_model() {
        let registry = ModelRegistry::new();
        let err = registry.resolve("gpt-x").unwrap_err();
        assert!(matches!(err, ModelError::Unknown(_)));
    }

    #[test]
    fn test_ids_sorted() {
        let registry = ModelRegistry::new();
        registry.register("b-model", Arc::new(StaticModel("b")));
        registry.register("a-model", Arc::new(StaticModel("a")));
        assert_eq!(registry.ids(), vec!["a-model", "b-model"]);
    }

    #[test]
    fn test_later_registration_wins() {
        let registry = ModelRegistry::new();
        registry.register("m", Arc::new(StaticModel("first")));
        registry.register("m", Arc::new(StaticModel("second")));
        assert_eq!(registry.ids().len(), 1);
    }
}
