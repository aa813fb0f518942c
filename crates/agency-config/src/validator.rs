//! Configuration validation.

use agency_protocols::peer::PEER_PROVIDER;

use crate::error::ConfigError;
use crate::schema::Config;

/// Check a loaded configuration for problems the type system cannot catch.
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    if config.dispatch.max_turns == 0 {
        return Err(invalid("dispatch.max_turns", "must be at least 1"));
    }
    if config.dispatch.default_model.trim().is_empty() {
        return Err(invalid("dispatch.default_model", "must not be empty"));
    }
    if config.registry.path.trim().is_empty() {
        return Err(invalid("registry.path", "must not be empty"));
    }

    for (name, entry) in &config.providers {
        let field = |suffix: &str| format!("providers.{name}.{suffix}");
        if name == PEER_PROVIDER {
            return Err(invalid(
                &field("name"),
                "'peer' is reserved for agent-to-agent calls",
            ));
        }
        match entry.transport.as_str() {
            "stdio" => {
                if entry.command.as_deref().unwrap_or("").trim().is_empty() {
                    return Err(invalid(&field("command"), "required for stdio transport"));
                }
            }
            "http" => {
                if entry.url.as_deref().unwrap_or("").trim().is_empty() {
                    return Err(invalid(&field("url"), "required for http transport"));
                }
            }
            other => {
                return Err(invalid(
                    &field("transport"),
                    &format!("unknown transport kind '{other}'"),
                ));
            }
        }
        if entry.retry_attempts == 0 {
            return Err(invalid(&field("retry_attempts"), "must be at least 1"));
        }
        if entry.max_concurrency == 0 {
            return Err(invalid(&field("max_concurrency"), "must be at least 1"));
        }
    }

    Ok(())
}

fn invalid(field: &str, message: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        message: message.to_string(),
    }
}
