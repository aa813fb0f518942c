//! Configuration loader with environment variable substitution.

use std::fs;
use std::path::Path;

use crate::error::ConfigError;
use crate::schema::Config;

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Config, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.display().to_string()));
        }
        let content = fs::read_to_string(path)?;
        Self::load_str(&content)
    }

    /// Load configuration from a string.
    pub fn load_str(content: &str) -> Result<Config, ConfigError> {
        let expanded = Self::expand_env_vars(content)?;
        let config: Config = toml::from_str(&expanded)?;
        Ok(config)
    }

    /// Expand environment variables in the format `${VAR}`.
    fn expand_env_vars(content: &str) -> Result<String, ConfigError> {
        let mut result = content.to_string();
        let re = regex::Regex::new(r"\$\{([^}]+)\}").unwrap();

        for cap in re.captures_iter(content) {
            let var_name = &cap[1];
            let var_value = std::env::var(var_name)
                .map_err(|_| ConfigError::EnvVarNotSet(var_name.to_string()))?;
            result = result.replace(&cap[0], &var_value);
        }

        Ok(result)
    }

    /// Expand shell-style paths (e.g. `~/.agency`).
    pub fn expand_path(path: &str) -> String {
        shellexpand::tilde(path).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_empty_config() {
        let config = ConfigLoader::load_str("").unwrap();
        assert_eq!(config.dispatch.max_turns, 8);
        assert!(config.providers.is_empty());
    }

    #[test]
    fn test_load_basic_config() {
        let content = r#"
            [registry]
            path = "/var/lib/agency/registry"

            [dispatch]
            default_model = "gemini-2.0-pro"
            endpoint = "https://agency.internal"
            max_turns = 12
        "#;
        let config = ConfigLoader::load_str(content).unwrap();
        assert_eq!(config.registry.path, "/var/lib/agency/registry");
        assert_eq!(config.dispatch.default_model, "gemini-2.0-pro");
        assert_eq!(config.dispatch.max_turns, 12);
    }

    #[test]
    fn test_load_provider_table() {
        let content = r#"
            [providers.fetch]
            transport = "stdio"
            command = "uvx"
            args = ["mcp-server-fetch"]
            cache_tools = true

            [providers.search]
            transport = "http"
            url = "https://tools.internal/search"
            cache_tools = false
        "#;
        let config = ConfigLoader::load_str(content).unwrap();
        assert_eq!(config.providers.len(), 2);
        assert_eq!(
            config.providers["fetch"].command.as_deref(),
            Some("uvx")
        );
        assert!(!config.providers["search"].cache_tools);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[dispatch]").unwrap();
        writeln!(file, "max_turns = 3").unwrap();

        let config = ConfigLoader::load(file.path()).unwrap();
        assert_eq!(config.dispatch.max_turns, 3);
    }

    #[test]
    fn test_load_nonexistent_file() {
        let result = ConfigLoader::load(Path::new("/nonexistent/agency.toml"));
        assert!(matches!(result, Err(ConfigError::NotFound(_))));
    }

    #[test]
    fn test_load_invalid_toml() {
        let result = ConfigLoader::load_str("providers = [unclosed");
        assert!(result.is_err());
    }

    #[test]
    fn test_expand_env_vars() {
        // SAFETY: test-only env var with a unique name
        unsafe {
            std::env::set_var("AGENCY_TEST_SECRET", "s3cret");
        }
        let content = r#"
            [providers.search]
            transport = "http"
            url = "https://tools.internal/search"
            headers = { x-api-key = "${AGENCY_TEST_SECRET}" }
        "#;
        let config = ConfigLoader::load_str(content).unwrap();
        assert_eq!(config.providers["search"].headers["x-api-key"], "s3cret");
        unsafe {
            std::env::remove_var("AGENCY_TEST_SECRET");
        }
    }

    #[test]
    fn test_expand_env_vars_not_set() {
        let content = r#"value = "${AGENCY_NONEXISTENT_VAR_12345}""#;
        let result = ConfigLoader::load_str(content);
        assert!(matches!(result, Err(ConfigError::EnvVarNotSet(_))));
    }

    #[test]
    fn test_expand_path() {
        let expanded = ConfigLoader::expand_path("~/.agency");
        assert!(!expanded.starts_with('~'));
    }
}
