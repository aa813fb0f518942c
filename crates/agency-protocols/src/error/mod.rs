//! Error taxonomy for the Agency core.

mod dispatch;
mod gateway;
mod registry;
mod runtime;

pub use dispatch::*;
pub use gateway::*;
pub use registry::*;
pub use runtime::*;
