//! # Agency Gateway
//!
//! Hides the heterogeneity of external tool providers behind one contract:
//! `list_tools(provider)` and `invoke(provider, agent, tool, args)`. One
//! logical session per provider, shared by every agent that declares it,
//! with cached tool lists, local schema validation, bounded retry with
//! exponential backoff, and a failure threshold that fails fast until reset.

pub mod backoff;
pub mod config;
pub mod gateway;
pub mod protocol;
pub mod session;
pub mod transport;

pub use backoff::RetryConfig;
pub use config::{ProviderConfig, TransportKind};
pub use gateway::{ToolGateway, TransportConnector};
pub use session::ProviderSession;
pub use transport::{HttpTransport, ProviderTransport, StdioTransport, TransportError};
