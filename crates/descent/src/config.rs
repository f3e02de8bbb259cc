//! Configuration loading.
//!
//! Config lives in a YAML file (default `descent.yaml`) with shell-style
//! environment variable expansion, so secrets like the bot token stay out
//! of the file:
//!
//! ```yaml
//! service:
//!   base_url: ${SERVICE_BASE_URL:-http://localhost:3001}
//! gateways:
//!   discord:
//!     bot_token: ${DISCORD_TOKEN}
//!     guild_id: ${GUILD_ID:-}
//! ```

use std::io::ErrorKind;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;
use tokio::fs;

// ============================================================================
// Config (root)
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub gateways: GatewaysConfig,
}

/// Game service connection settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub base_url: String,
    pub timeout_seconds: u64,
    /// Transparent retries on network failure or 5xx before surfacing an
    /// error.
    pub max_retries: u32,
    pub retry_delay_ms: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3001".to_string(),
            timeout_seconds: 5,
            max_retries: 2,
            retry_delay_ms: 1000,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct GatewaysConfig {
    #[serde(default)]
    pub discord: Option<DiscordGatewayConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DiscordGatewayConfig {
    pub bot_token: String,
    /// Guild to register slash commands in; global registration when unset.
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub guild_id: Option<String>,
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Yaml(#[from] serde_saphyr::Error),

    #[error("environment variable '{0}' is not set")]
    MissingEnvVar(String),

    #[error("unclosed variable reference '${{' (missing '}}')")]
    UnclosedVarReference,
}

impl Config {
    /// Load configuration from a YAML file.
    ///
    /// A missing file yields the defaults; environment references are
    /// expanded before parsing.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = match fs::read_to_string(path).await {
            Ok(c) => c,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(ConfigError::Io(e)),
        };
        let expanded = expand_env_vars(&contents)?;
        Ok(serde_saphyr::from_str(&expanded)?)
    }
}

/// Treat `guild_id: ""` (an unset `${GUILD_ID:-}`) as absent.
fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.is_empty()))
}

// ============================================================================
// Environment Variable Expansion
// ============================================================================

/// Expand environment variables in a string.
///
/// Supported syntax (shell-compatible):
/// - `${VAR}` — required variable, errors if not set
/// - `${VAR:-default}` — optional variable with default value
/// - `$$` — escaped `$` (only needed before `{`)
fn expand_env_vars(input: &str) -> Result<String, ConfigError> {
    expand_with(input, |name| std::env::var(name).ok())
}

fn expand_with(
    input: &str,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<String, ConfigError> {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(pos) = rest.find('$') {
        out.push_str(&rest[..pos]);
        rest = &rest[pos..];

        if let Some(stripped) = rest.strip_prefix("$$") {
            out.push('$');
            rest = stripped;
            continue;
        }

        let Some(stripped) = rest.strip_prefix("${") else {
            out.push('$');
            rest = &rest[1..];
            continue;
        };

        let Some(end) = stripped.find('}') else {
            return Err(ConfigError::UnclosedVarReference);
        };
        let reference = &stripped[..end];
        rest = &stripped[end + 1..];

        match reference.split_once(":-") {
            Some((name, default)) => {
                out.push_str(&lookup(name).unwrap_or_else(|| default.to_string()));
            }
            None => match lookup(reference) {
                Some(value) => out.push_str(&value),
                None => return Err(ConfigError::MissingEnvVar(reference.to_string())),
            },
        }
    }

    out.push_str(rest);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn expand(input: &str, vars: &HashMap<String, String>) -> Result<String, ConfigError> {
        expand_with(input, |name| vars.get(name).cloned())
    }

    #[test]
    fn expands_required_var() {
        let vars = env(&[("TOKEN", "abc123")]);
        assert_eq!(expand("token: ${TOKEN}", &vars).unwrap(), "token: abc123");
    }

    #[test]
    fn missing_required_var_is_an_error() {
        let vars = env(&[]);
        let err = expand("token: ${TOKEN}", &vars).unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar(name) if name == "TOKEN"));
    }

    #[test]
    fn default_applies_when_unset() {
        let vars = env(&[]);
        assert_eq!(
            expand("url: ${BASE:-http://localhost:3001}", &vars).unwrap(),
            "url: http://localhost:3001"
        );
    }

    #[test]
    fn set_var_beats_default() {
        let vars = env(&[("BASE", "https://game.example")]);
        assert_eq!(
            expand("url: ${BASE:-http://localhost:3001}", &vars).unwrap(),
            "url: https://game.example"
        );
    }

    #[test]
    fn empty_default_yields_empty_string() {
        let vars = env(&[]);
        assert_eq!(expand("guild: ${GUILD_ID:-}", &vars).unwrap(), "guild: ");
    }

    #[test]
    fn escaped_dollar_passes_through() {
        let vars = env(&[]);
        assert_eq!(expand("cost: $$100", &vars).unwrap(), "cost: $100");
    }

    #[test]
    fn bare_dollar_is_literal() {
        let vars = env(&[]);
        assert_eq!(expand("price in $ only", &vars).unwrap(), "price in $ only");
    }

    #[test]
    fn unclosed_reference_is_an_error() {
        let vars = env(&[]);
        let err = expand("broken: ${VAR", &vars).unwrap_err();
        assert!(matches!(err, ConfigError::UnclosedVarReference));
    }

    #[tokio::test]
    async fn load_missing_file_yields_defaults() {
        let config = Config::load("/nonexistent/descent.yaml").await.unwrap();

        assert_eq!(config.service.base_url, "http://localhost:3001");
        assert_eq!(config.service.max_retries, 2);
        assert!(config.gateways.discord.is_none());
    }
}
