//! # Agency Dispatch
//!
//! The parent dispatcher: the single entry point for lifecycle operations
//! and agent messaging. It owns every live runtime behind a per-agent
//! mailbox (strict FIFO, one message in flight), enforces the lifecycle
//! state machine, derives discovery documents, and implements the peer
//! seam with call-chain re-entrancy detection.

pub mod dispatcher;
mod mailbox;

pub use dispatcher::{DispatchConfig, Dispatcher, PendingReply};
