//! # Agency Runtime
//!
//! The live side of an agent: the [`RuntimeFactory`] turns a persisted spec
//! into an [`AgentRuntime`] bound to its model backend and tool-provider
//! sessions, and the runtime drives the turn loop for each handled message.

pub mod conversation;
pub mod factory;
pub mod model;
pub mod runtime;

#[cfg(test)]
pub(crate) mod runtime_test_support;

pub use conversation::Conversation;
pub use factory::RuntimeFactory;
pub use model::ModelRegistry;
pub use runtime::{AgentRuntime, TurnContext};
