//! Configuration Loader
//!
//! Loads a single TOML file named by `GUESTFLOW_CONFIG_PATH`:
//! 0. Loads a `.env` file if present (via dotenvy)
//! 1. Substitutes `${VAR}` and `${VAR:-default}` from the environment
//! 2. Deserializes to [`PipelineConfig`]
//! 3. Validates, reporting every violation at once

use super::error::{ConfigResult, ConfigurationError};
use super::PipelineConfig;
use std::path::Path;

pub const CONFIG_PATH_ENV: &str = "GUESTFLOW_CONFIG_PATH";
pub const ENVIRONMENT_ENV: &str = "GUESTFLOW_ENV";

const DEFAULTS_FROM_ENV: &str = r#"
[portal.credentials]
username = "${GUESTFLOW_PORTAL_USERNAME:-}"
password = "${GUESTFLOW_PORTAL_PASSWORD:-}"
"#;

#[derive(Debug)]
pub struct ConfigLoader;

impl ConfigLoader {
    /// Detect environment from GUESTFLOW_ENV or default to "development"
    pub fn detect_environment() -> String {
        std::env::var(ENVIRONMENT_ENV).unwrap_or_else(|_| "development".to_string())
    }

    /// Load configuration from the file named by `GUESTFLOW_CONFIG_PATH`.
    ///
    /// Without a config path, defaults are used with portal credentials taken from
    /// `GUESTFLOW_PORTAL_USERNAME` / `GUESTFLOW_PORTAL_PASSWORD`.
    ///
    /// # Errors
    /// - File not found or cannot be read
    /// - TOML parse errors
    /// - Validation errors
    pub fn load_from_env() -> ConfigResult<PipelineConfig> {
        dotenvy::dotenv().ok();

        let environment = Self::detect_environment();
        match std::env::var(CONFIG_PATH_ENV) {
            Ok(config_path) => {
                tracing::info!(
                    config_path = %config_path,
                    environment = %environment,
                    "Loading pipeline configuration"
                );
                Self::load_from_path(Path::new(&config_path))
            }
            Err(_) => {
                tracing::info!(
                    environment = %environment,
                    "{} not set, using defaults with credentials from environment",
                    CONFIG_PATH_ENV
                );
                Self::parse(DEFAULTS_FROM_ENV)
            }
        }
    }

    pub fn load_from_path(path: &Path) -> ConfigResult<PipelineConfig> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigurationError::file_read_error(path, e))?;

        let config = Self::parse(&contents).map_err(|e| match e {
            ConfigurationError::InvalidToml { error, .. } => {
                ConfigurationError::invalid_toml(path, error)
            }
            other => other,
        })?;

        tracing::info!(config_path = %path.display(), "✅ Configuration loaded successfully");
        Ok(config)
    }

    /// Parse and validate configuration text after environment substitution.
    pub fn parse(contents: &str) -> ConfigResult<PipelineConfig> {
        let contents_with_env = Self::substitute_env_vars(contents)?;

        let config: PipelineConfig = toml::from_str(&contents_with_env)
            .map_err(|e| ConfigurationError::invalid_toml("<inline>", e))?;

        config
            .validate()
            .map_err(|errors| ConfigurationError::ValidationFailed { errors })?;

        tracing::debug!(config = %config.sanitized(), "Validated pipeline configuration");
        Ok(config)
    }

    /// Escape TOML string specials so substituted values cannot break out of a literal
    fn escape_toml_string(value: &str) -> String {
        value
            .replace('\\', "\\\\")
            .replace('"', "\\\"")
            .replace('\n', "\\n")
            .replace('\r', "\\r")
            .replace('\t', "\\t")
    }

    /// Replace `${VAR}` / `${VAR:-default}` patterns with environment values.
    ///
    /// A variable that is unset and has no default is a configuration error, since
    /// the placeholder would otherwise silently become a credential.
    pub(crate) fn substitute_env_vars(content: &str) -> ConfigResult<String> {
        let mut result = String::with_capacity(content.len());
        let mut rest = content;

        while let Some(start) = rest.find("${") {
            result.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            let Some(end) = after.find('}') else {
                // Unterminated placeholder, keep the text as written
                result.push_str(&rest[start..]);
                return Ok(result);
            };

            let expr = &after[..end];
            let (var_name, default_value) = match expr.find(":-") {
                Some(sep) => (&expr[..sep], Some(&expr[sep + 2..])),
                None => (expr, None),
            };

            match std::env::var(var_name) {
                Ok(value) => {
                    tracing::debug!(var = %var_name, "Substituting configuration value from environment");
                    result.push_str(&Self::escape_toml_string(&value));
                }
                Err(_) => match default_value {
                    Some(default) => result.push_str(default),
                    None => {
                        return Err(ConfigurationError::invalid_value(
                            var_name,
                            "",
                            "referenced by configuration but not set in the environment",
                        ));
                    }
                },
            }

            rest = &after[end + 1..];
        }

        result.push_str(rest);
        Ok(result)
    }
}
