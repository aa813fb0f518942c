//! Agent specification types.
//!
//! An [`AgentSpec`] is the durable record of an agent: identity, declared
//! capabilities, and lifecycle status. Specs are owned by the registry;
//! everything else works on snapshots.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::RegistryError;

/// Open string-keyed metadata mapping.
pub type Metadata = HashMap<String, serde_json::Value>;

/// Reserved prefix for internal store keys; agent ids may never use it.
pub const RESERVED_ID_PREFIX: &str = "__";

/// Lifecycle status of an agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    Created,
    Active,
    Inactive,
    Deleted,
}

impl std::fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            AgentStatus::Created => "created",
            AgentStatus::Active => "active",
            AgentStatus::Inactive => "inactive",
            AgentStatus::Deleted => "deleted",
        };
        f.write_str(s)
    }
}

/// Durable record of an agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSpec {
    /// Unique identifier, immutable after creation.
    pub id: String,

    /// Human-readable name.
    pub name: String,

    /// Description of the agent's purpose.
    pub description: String,

    /// Ordered, deduplicated skill tags.
    #[serde(default)]
    pub skills: Vec<String>,

    /// Model identifier resolved by the runtime factory.
    pub model: String,

    /// Instruction text handed to the model on every turn.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,

    /// Tool-provider names this agent may call.
    #[serde(default)]
    pub tool_providers: Vec<String>,

    /// Additional metadata.
    #[serde(default)]
    pub metadata: Metadata,

    /// Lifecycle status; changed only via dispatcher lifecycle operations.
    pub status: AgentStatus,

    /// Creation timestamp.
    pub created_at: DateTime<Utc>,

    /// Last-updated timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Input to `create`: everything the caller may choose, id optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentDraft {
    /// Caller-supplied id; a UUID is assigned when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    pub name: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub skills: Vec<String>,

    /// Model identifier; the dispatcher fills in the configured default.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,

    #[serde(default)]
    pub tool_providers: Vec<String>,

    #[serde(default)]
    pub metadata: Metadata,
}

impl AgentDraft {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            ..Default::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_skills(mut self, skills: Vec<String>) -> Self {
        self.skills = skills;
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = Some(instructions.into());
        self
    }

    pub fn with_tool_providers(mut self, providers: Vec<String>) -> Self {
        self.tool_providers = providers;
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}

/// Partial update of an agent spec.
///
/// `id`, `created_at` and `status` are deliberately not representable:
/// identity is immutable and status only moves via lifecycle operations.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentSpecPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub skills: Option<Vec<String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_providers: Option<Vec<String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
}

impl AgentSpecPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.description.is_none()
            && self.skills.is_none()
            && self.model.is_none()
            && self.instructions.is_none()
            && self.tool_providers.is_none()
            && self.metadata.is_none()
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn skills(mut self, skills: Vec<String>) -> Self {
        self.skills = Some(skills);
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn tool_providers(mut self, providers: Vec<String>) -> Self {
        self.tool_providers = Some(providers);
        self
    }
}

/// Query predicate over registry snapshots.
///
/// All set fields must match. `search` is a case-insensitive substring match
/// over name, description and skills.
#[derive(Debug, Clone, Default)]
pub struct AgentQuery {
    pub skill: Option<String>,
    pub status: Option<AgentStatus>,
    pub model: Option<String>,
    pub search: Option<String>,
    pub metadata: Metadata,
}

impl AgentQuery {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn with_skill(mut self, skill: impl Into<String>) -> Self {
        self.skill = Some(skill.into());
        self
    }

    pub fn with_status(mut self, status: AgentStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_search(mut self, query: impl Into<String>) -> Self {
        self.search = Some(query.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Whether a spec satisfies every set predicate.
    pub fn matches(&self, spec: &AgentSpec) -> bool {
        if let Some(skill) = &self.skill {
            if !spec.skills.iter().any(|s| s == skill) {
                return false;
            }
        }
        if let Some(status) = self.status {
            if spec.status != status {
                return false;
            }
        }
        if let Some(model) = &self.model {
            if &spec.model != model {
                return false;
            }
        }
        if let Some(query) = &self.search {
            let query = query.to_lowercase();
            let hit = spec.name.to_lowercase().contains(&query)
                || spec.description.to_lowercase().contains(&query)
                || spec.skills.iter().any(|s| s.to_lowercase().contains(&query));
            if !hit {
                return false;
            }
        }
        for (key, value) in &self.metadata {
            if spec.metadata.get(key) != Some(value) {
                return false;
            }
        }
        true
    }
}

/// Validate an agent id: non-empty, `[A-Za-z0-9._-]`, no reserved prefix.
pub fn validate_agent_id(id: &str) -> Result<(), RegistryError> {
    if id.is_empty() {
        return Err(RegistryError::InvalidId("id must not be empty".to_string()));
    }
    if id.starts_with(RESERVED_ID_PREFIX) {
        return Err(RegistryError::InvalidId(format!(
            "id must not start with reserved prefix '{}'",
            RESERVED_ID_PREFIX
        )));
    }
    if let Some(c) = id
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-')))
    {
        return Err(RegistryError::InvalidId(format!(
            "id contains invalid character '{c}'"
        )));
    }
    Ok(())
}
