//! # Agency Core
//!
//! The durable heart of the orchestration core: the [`AgentRegistry`] backed
//! by a [`DocumentStore`], plus the lifecycle transition rules the dispatcher
//! enforces.

pub mod lifecycle;
pub mod registry;
pub mod store;

pub use lifecycle::can_transition;
pub use registry::AgentRegistry;
pub use store::{DocumentStore, FileStore, MemoryStore, StoreError};
