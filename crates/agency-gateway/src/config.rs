//! Provider configuration as the gateway consumes it.
//!
//! The orchestrator reads this as an opaque table: it selects a transport
//! variant and tunes caching and failure handling, but never owns how a
//! provider process is supervised.

use std::collections::HashMap;
use std::time::Duration;

use crate::backoff::RetryConfig;

/// How to reach one provider.
#[derive(Debug, Clone)]
pub enum TransportKind {
    /// Subprocess speaking line-delimited JSON-RPC on stdio.
    Stdio {
        command: String,
        args: Vec<String>,
        env: HashMap<String, String>,
    },
    /// HTTP endpoint accepting JSON-RPC POSTs.
    Http {
        url: String,
        headers: HashMap<String, String>,
    },
}

/// Full per-provider configuration.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub transport: TransportKind,

    /// Fetch the tool list once per session and reuse it.
    pub cache_tools: bool,

    pub retry: RetryConfig,

    /// Consecutive transport failures before the session is marked unusable.
    pub max_failures: u32,

    /// How long an unusable session stays fail-fast before a time-based reset.
    pub cooldown: Duration,

    /// Concurrent invokes allowed against this provider.
    pub max_concurrency: usize,
}

impl ProviderConfig {
    pub fn stdio(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            transport: TransportKind::Stdio {
                command: command.into(),
                args,
                env: HashMap::new(),
            },
            ..Self::defaults()
        }
    }

    pub fn http(url: impl Into<String>) -> Self {
        Self {
            transport: TransportKind::Http {
                url: url.into(),
                headers: HashMap::new(),
            },
            ..Self::defaults()
        }
    }

    fn defaults() -> Self {
        Self {
            transport: TransportKind::Http {
                url: String::new(),
                headers: HashMap::new(),
            },
            cache_tools: true,
            retry: RetryConfig::default(),
            max_failures: 3,
            cooldown: Duration::from_secs(60),
            max_concurrency: 4,
        }
    }

    pub fn with_cache_tools(mut self, cache: bool) -> Self {
        self.cache_tools = cache;
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_max_failures(mut self, max_failures: u32) -> Self {
        self.max_failures = max_failures;
        self
    }

    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }
}
