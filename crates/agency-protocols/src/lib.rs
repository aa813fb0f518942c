//! # Agency Protocols
//!
//! Shared type and trait definitions for the Agency orchestration core.
//! Contains only interfaces and data shapes - no implementations.
//!
//! ## Core pieces
//!
//! - [`AgentSpec`] / [`AgentStatus`] - the durable identity of an agent
//! - [`AgentCard`] - the discovery document derived from a spec
//! - [`MessageEnvelope`] / [`ResponseEnvelope`] - peer request/response units
//! - [`ModelBackend`] - the opaque model capability
//! - [`PeerSender`] - the seam through which runtimes reach other agents
//! - [`error`] - the error taxonomy shared across components

pub mod card;
pub mod envelope;
pub mod error;
pub mod message;
pub mod model;
pub mod peer;
pub mod spec;
pub mod tool;

pub use card::{AgentCard, CardInfo, CardServer, CardSkill};
pub use envelope::{EnvelopeError, ErrorKind, MessageEnvelope, Payload, ResponseEnvelope};
pub use error::{DispatchError, GatewayError, ModelError, RegistryError, RuntimeError};
pub use message::{Message, MessageRole};
pub use model::{AdvertisedTool, ModelBackend, ModelRequest, ModelTurn, ToolInvocation};
pub use peer::{CallChain, PeerSender, PEER_PROVIDER, PEER_SEND_TOOL};
pub use spec::{AgentDraft, AgentQuery, AgentSpec, AgentSpecPatch, AgentStatus, Metadata};
pub use tool::ToolDefinition;
