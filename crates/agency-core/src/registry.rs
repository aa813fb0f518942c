//! Durable agent registry.
//!
//! The single source of truth for agent specs. All mutations are guarded by
//! a per-id async lock so concurrent create/update/delete on the same id
//! serialise cleanly while distinct ids proceed in parallel. The backing
//! store is write-through: a mutation only commits to memory after the
//! document has been persisted, so a failed write never leaves a partial
//! record.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, warn};
use uuid::Uuid;

use agency_protocols::spec::{
    validate_agent_id, AgentDraft, AgentQuery, AgentSpec, AgentSpecPatch, AgentStatus,
};
use agency_protocols::RegistryError;

use crate::store::DocumentStore;

/// Reserved store key holding the set of deleted ids.
const TOMBSTONES_KEY: &str = "__tombstones__";

/// Registry of agent specifications.
pub struct AgentRegistry {
    store: Arc<dyn DocumentStore>,
    records: RwLock<HashMap<String, AgentSpec>>,
    order: Mutex<Vec<String>>,
    tombstones: RwLock<HashSet<String>>,
    locks: DashMap<String, Arc<tokio::sync::Mutex<()>>>,
}

impl AgentRegistry {
    /// Open the registry over a store, loading all persisted records.
    pub async fn open(store: Arc<dyn DocumentStore>) -> Result<Self, RegistryError> {
        store.open().await.map_err(store_err)?;

        let mut records = HashMap::new();
        for key in store.keys().await.map_err(store_err)? {
            if key.starts_with("__") {
                continue;
            }
            match store.get(&key).await.map_err(store_err)? {
                Some(value) => match serde_json::from_value::<AgentSpec>(value) {
                    Ok(spec) => {
                        records.insert(key, spec);
                    }
                    Err(e) => warn!("Skipping unreadable agent record {key}: {e}"),
                },
                None => warn!("Agent record {key} vanished during load"),
            }
        }

        let tombstones: HashSet<String> = match store.get(TOMBSTONES_KEY).await.map_err(store_err)? {
            Some(value) => serde_json::from_value(value)
                .map_err(|e| RegistryError::Store(e.to_string()))?,
            None => HashSet::new(),
        };

        // Insertion order is recovered from creation timestamps.
        let mut order: Vec<String> = records.keys().cloned().collect();
        order.sort_by_key(|id| records[id].created_at);

        info!(
            "Registry opened with {} agents, {} tombstones",
            records.len(),
            tombstones.len()
        );

        Ok(Self {
            store,
            records: RwLock::new(records),
            order: Mutex::new(order),
            tombstones: RwLock::new(tombstones),
            locks: DashMap::new(),
        })
    }

    /// Close the underlying store.
    pub async fn close(&self) -> Result<(), RegistryError> {
        self.store.close().await.map_err(store_err)
    }

    fn id_lock(&self, id: &str) -> Arc<tokio::sync::Mutex<()>> {
        self.locks
            .entry(id.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    /// Create a new agent record with status `created`.
    ///
    /// Fails with `DuplicateId` if the id exists or was ever deleted.
    pub async fn create(&self, draft: AgentDraft) -> Result<AgentSpec, RegistryError> {
        if draft.name.trim().is_empty() {
            return Err(RegistryError::InvalidSpec("name must not be empty".to_string()));
        }
        let model = draft
            .model
            .clone()
            .ok_or_else(|| RegistryError::InvalidSpec("model must be set".to_string()))?;

        let id = match &draft.id {
            Some(id) => {
                validate_agent_id(id)?;
                id.clone()
            }
            None => Uuid::new_v4().to_string(),
        };

        let lock = self.id_lock(&id);
        let _guard = lock.lock().await;

        if self.records.read().contains_key(&id) || self.tombstones.read().contains(&id) {
            return Err(RegistryError::DuplicateId(id));
        }

        let now = Utc::now();
        let spec = AgentSpec {
            id: id.clone(),
            name: draft.name,
            description: draft.description,
            skills: dedup(draft.skills),
            model,
            instructions: draft.instructions,
            tool_providers: dedup(draft.tool_providers),
            metadata: draft.metadata,
            status: AgentStatus::Created,
            created_at: now,
            updated_at: now,
        };

        self.persist(&spec).await?;
        self.records.write().insert(id.clone(), spec.clone());
        self.order.lock().push(id.clone());

        info!("Created agent {} ({})", spec.name, id);
        Ok(spec)
    }

    /// Fetch a spec snapshot.
    pub fn get(&self, id: &str) -> Result<AgentSpec, RegistryError> {
        self.records
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))
    }

    /// Merge a partial update into an existing record.
    ///
    /// Status is not part of a patch; it only moves through
    /// [`AgentRegistry::set_status`].
    pub async fn update(
        &self,
        id: &str,
        patch: AgentSpecPatch,
    ) -> Result<AgentSpec, RegistryError> {
        let lock = self.id_lock(id);
        let _guard = lock.lock().await;

        let mut spec = self.get(id)?;

        if let Some(name) = patch.name {
            if name.trim().is_empty() {
                return Err(RegistryError::InvalidSpec("name must not be empty".to_string()));
            }
            spec.name = name;
        }
        if let Some(description) = patch.description {
            spec.description = description;
        }
        if let Some(skills) = patch.skills {
            spec.skills = dedup(skills);
        }
        if let Some(model) = patch.model {
            spec.model = model;
        }
        if let Some(instructions) = patch.instructions {
            spec.instructions = Some(instructions);
        }
        if let Some(providers) = patch.tool_providers {
            spec.tool_providers = dedup(providers);
        }
        if let Some(metadata) = patch.metadata {
            for (key, value) in metadata {
                spec.metadata.insert(key, value);
            }
        }
        spec.updated_at = Utc::now();

        self.persist(&spec).await?;
        self.records.write().insert(id.to_string(), spec.clone());

        debug!("Updated agent {id}");
        Ok(spec)
    }

    /// Remove a record and tombstone its id.
    ///
    /// A second delete of the same id fails with `NotFound`.
    pub async fn delete(&self, id: &str) -> Result<(), RegistryError> {
        let lock = self.id_lock(id);
        let _guard = lock.lock().await;

        if !self.records.read().contains_key(id) {
            return Err(RegistryError::NotFound(id.to_string()));
        }

        self.store.remove(id).await.map_err(store_err)?;
        self.records.write().remove(id);
        self.order.lock().retain(|entry| entry != id);
        self.tombstones.write().insert(id.to_string());
        self.persist_tombstones().await?;

        info!("Deleted agent {id}");
        Ok(())
    }

    /// Set the lifecycle status. Used only by the dispatcher.
    pub async fn set_status(
        &self,
        id: &str,
        status: AgentStatus,
    ) -> Result<AgentSpec, RegistryError> {
        let lock = self.id_lock(id);
        let _guard = lock.lock().await;

        let mut spec = self.get(id)?;
        spec.status = status;
        spec.updated_at = Utc::now();

        self.persist(&spec).await?;
        self.records.write().insert(id.to_string(), spec.clone());

        debug!("Agent {id} status -> {status}");
        Ok(spec)
    }

    /// Snapshot of all records in insertion order.
    pub fn list(&self) -> Vec<AgentSpec> {
        let records = self.records.read();
        self.order
            .lock()
            .iter()
            .filter_map(|id| records.get(id).cloned())
            .collect()
    }

    /// Snapshot of records matching a query, in insertion order.
    pub fn query(&self, query: &AgentQuery) -> Vec<AgentSpec> {
        self.list()
            .into_iter()
            .filter(|spec| query.matches(spec))
            .collect()
    }

    /// Whether an id was ever deleted.
    pub fn is_tombstoned(&self, id: &str) -> bool {
        self.tombstones.read().contains(id)
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    async fn persist(&self, spec: &AgentSpec) -> Result<(), RegistryError> {
        let value = serde_json::to_value(spec).map_err(|e| RegistryError::Store(e.to_string()))?;
        self.store.put(&spec.id, &value).await.map_err(store_err)
    }

    async fn persist_tombstones(&self) -> Result<(), RegistryError> {
        let snapshot: Vec<String> = self.tombstones.read().iter().cloned().collect();
        let value = serde_json::to_value(snapshot).map_err(|e| RegistryError::Store(e.to_string()))?;
        self.store
            .put(TOMBSTONES_KEY, &value)
            .await
            .map_err(store_err)
    }
}

fn store_err(err: crate::store::StoreError) -> RegistryError {
    RegistryError::Store(err.to_string())
}

fn dedup(items: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(item.clone()))
        .collect()
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
