//! Agent discovery documents.
//!
//! An [`AgentCard`] is derived deterministically from the current spec on
//! every read; it is never persisted. Field names follow the published wire
//! format rather than Rust conventions.

use serde::{Deserialize, Serialize};

use crate::spec::AgentSpec;

/// Version tag of the card wire format.
pub const CARD_FORMAT: &str = "1.0.0";

/// Protocol tag advertised in the card's server entries.
pub const CARD_PROTOCOL: &str = "a2a";

/// Published discovery document for one agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentCard {
    #[serde(rename = "agentFormat")]
    pub agent_format: String,

    pub info: CardInfo,

    pub servers: Vec<CardServer>,

    pub skills: Vec<CardSkill>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardInfo {
    pub id: String,
    pub name: String,
    pub description: String,
    pub version: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardServer {
    pub url: String,
    pub protocol: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardSkill {
    pub name: String,
    pub description: String,

    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub examples: Vec<String>,
}

impl AgentCard {
    /// Derive the card for a spec against an endpoint base URL.
    ///
    /// Deterministic: the same spec and base always produce an identical
    /// document. Example invocations come from the `examples` metadata key
    /// (an array of strings per skill, in skill order).
    pub fn derive(spec: &AgentSpec, endpoint_base: &str) -> Self {
        let url = format!("{}/agents/{}", endpoint_base.trim_end_matches('/'), spec.id);

        let examples: Vec<Vec<String>> = spec
            .metadata
            .get("examples")
            .and_then(|v| serde_json::from_value(v.clone()).ok())
            .unwrap_or_default();

        let skills = spec
            .skills
            .iter()
            .enumerate()
            .map(|(idx, skill)| CardSkill {
                name: skill.clone(),
                description: format!("Skill in {skill}"),
                examples: examples.get(idx).cloned().unwrap_or_default(),
            })
            .collect();

        Self {
            agent_format: CARD_FORMAT.to_string(),
            info: CardInfo {
                id: spec.id.clone(),
                name: spec.name.clone(),
                description: spec.description.clone(),
                version: CARD_FORMAT.to_string(),
                url: url.clone(),
            },
            servers: vec![CardServer {
                url,
                protocol: CARD_PROTOCOL.to_string(),
            }],
            skills,
        }
    }
}
