//! Configuration schema.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use agency_gateway::{ProviderConfig, RetryConfig, TransportKind};

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub registry: RegistrySection,

    #[serde(default)]
    pub dispatch: DispatchSection,

    /// Tool providers by name.
    #[serde(default)]
    pub providers: HashMap<String, ProviderEntry>,
}

/// Registry persistence settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrySection {
    /// Directory holding one JSON document per agent.
    #[serde(default = "default_registry_path")]
    pub path: String,
}

impl Default for RegistrySection {
    fn default() -> Self {
        Self {
            path: default_registry_path(),
        }
    }
}

fn default_registry_path() -> String {
    "~/.agency/registry".to_string()
}

/// Dispatcher settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchSection {
    /// Model used when an agent draft names none.
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Base URL advertised in agent cards.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Turn budget per handled message.
    #[serde(default = "default_max_turns")]
    pub max_turns: u32,
}

impl Default for DispatchSection {
    fn default() -> Self {
        Self {
            default_model: default_model(),
            endpoint: default_endpoint(),
            max_turns: default_max_turns(),
        }
    }
}

fn default_model() -> String {
    "gemini-2.0-flash".to_string()
}

fn default_endpoint() -> String {
    "http://127.0.0.1:8080".to_string()
}

fn default_max_turns() -> u32 {
    8
}

/// One tool provider as written in the config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderEntry {
    /// Transport kind: "stdio" or "http".
    pub transport: String,

    /// Stdio: command to launch.
    #[serde(default)]
    pub command: Option<String>,

    /// Stdio: command arguments.
    #[serde(default)]
    pub args: Vec<String>,

    /// Stdio: environment handed to the process (values may be `${VAR}`).
    #[serde(default)]
    pub env: HashMap<String, String>,

    /// Http: endpoint URL.
    #[serde(default)]
    pub url: Option<String>,

    /// Http: request headers (values may be `${VAR}`).
    #[serde(default)]
    pub headers: HashMap<String, String>,

    /// Cache the provider's tool list for the session.
    #[serde(default = "default_cache_tools")]
    pub cache_tools: bool,

    /// Attempts per call, including the first.
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,

    /// Base backoff delay in milliseconds.
    #[serde(default = "default_retry_base_ms")]
    pub retry_base_ms: u64,

    /// Consecutive transport failures before failing fast.
    #[serde(default = "default_max_failures")]
    pub max_failures: u32,

    /// Fail-fast window in seconds before a time-based reset.
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: u64,

    /// Concurrent invokes allowed against the provider.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
}

fn default_cache_tools() -> bool {
    true
}

fn default_retry_attempts() -> u32 {
    3
}

fn default_retry_base_ms() -> u64 {
    500
}

fn default_max_failures() -> u32 {
    3
}

fn default_cooldown_secs() -> u64 {
    60
}

fn default_max_concurrency() -> usize {
    4
}

impl ProviderEntry {
    /// Convert to the gateway's provider configuration.
    pub fn to_provider_config(&self) -> ProviderConfig {
        let transport = match self.transport.as_str() {
            "stdio" => TransportKind::Stdio {
                command: self.command.clone().unwrap_or_default(),
                args: self.args.clone(),
                env: self.env.clone(),
            },
            _ => TransportKind::Http {
                url: self.url.clone().unwrap_or_default(),
                headers: self.headers.clone(),
            },
        };

        ProviderConfig {
            transport,
            cache_tools: self.cache_tools,
            retry: RetryConfig {
                attempts: self.retry_attempts,
                base_delay: Duration::from_millis(self.retry_base_ms),
                ..RetryConfig::default()
            },
            max_failures: self.max_failures,
            cooldown: Duration::from_secs(self.cooldown_secs),
            max_concurrency: self.max_concurrency,
        }
    }
}

impl Config {
    /// The full provider table in gateway form.
    pub fn provider_configs(&self) -> HashMap<String, ProviderConfig> {
        self.providers
            .iter()
            .map(|(name, entry)| (name.clone(), entry.to_provider_config()))
            .collect()
    }
}
