//! Agent configuration (layered: defaults < file < env < code).

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use bon::Builder;
use serde::{Deserialize, Serialize};

use crate::error::{AgentError, Result};

pub const DEFAULT_MODEL: &str = "claude-3-5-sonnet-20241022";

/// Settings for one agent session.
///
/// ```
/// use toolloop::config::AgentConfig;
///
/// let config = AgentConfig::builder()
///     .max_tool_round_trips(4)
///     .system_prompt("Answer tersely.")
///     .build();
/// assert_eq!(config.max_tokens, 4000);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Clone, PartialEq, Builder, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    #[builder(default = DEFAULT_MODEL.to_string(), into)]
    pub model: String,
    #[builder(default = 4000)]
    pub max_tokens: u32,
    #[builder(default = 0.7)]
    pub temperature: f64,
    /// Total attempts per model call, including the first.
    #[builder(default = 3)]
    pub max_retries: u32,
    /// Base delay between model retries; doubles per attempt.
    #[builder(default = 500)]
    pub retry_backoff_ms: u64,
    /// Deadline applied to each model call and each tool call.
    #[builder(default = 60_000)]
    pub call_timeout_ms: u64,
    #[builder(default = 10)]
    pub max_tool_round_trips: u32,
    #[builder(into)]
    pub system_prompt: Option<String>,
    /// Anthropic API base URL override.
    #[builder(into)]
    pub base_url: Option<String>,
    #[serde(skip_serializing)]
    #[builder(into)]
    pub api_key: Option<String>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl fmt::Debug for AgentConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentConfig")
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .field("temperature", &self.temperature)
            .field("max_retries", &self.max_retries)
            .field("retry_backoff_ms", &self.retry_backoff_ms)
            .field("call_timeout_ms", &self.call_timeout_ms)
            .field("max_tool_round_trips", &self.max_tool_round_trips)
            .field("system_prompt", &self.system_prompt)
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl AgentConfig {
    /// Parse a TOML document; absent keys keep their defaults.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        toml::from_str(raw).map_err(|e| AgentError::InvalidConfig(format!("invalid TOML: {e}")))
    }

    /// Load a TOML config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&raw)
    }

    /// Default config file location (`<config dir>/toolloop/config.toml`).
    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "toolloop")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Defaults overlaid with the process environment (and `.env`, if present).
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv(); // load .env if present, ignore error
        Self::default().with_env_overrides()
    }

    /// Overlay values from the process environment.
    pub fn with_env_overrides(self) -> Result<Self> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Overlay values from an arbitrary key lookup using the environment variable names.
    pub fn apply_overrides<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup("ANTHROPIC_API_KEY") {
            self.api_key = Some(key);
        }
        if let Some(url) = lookup("ANTHROPIC_BASE_URL") {
            self.base_url = Some(url);
        }
        if let Some(model) = lookup("TOOLLOOP_MODEL") {
            self.model = model;
        }
        if let Some(prompt) = lookup("TOOLLOOP_SYSTEM_PROMPT") {
            self.system_prompt = Some(prompt);
        }
        if let Some(raw) = lookup("TOOLLOOP_MAX_TOKENS") {
            self.max_tokens = parse_env("TOOLLOOP_MAX_TOKENS", &raw)?;
        }
        if let Some(raw) = lookup("TOOLLOOP_TEMPERATURE") {
            self.temperature = parse_env("TOOLLOOP_TEMPERATURE", &raw)?;
        }
        if let Some(raw) = lookup("TOOLLOOP_MAX_RETRIES") {
            self.max_retries = parse_env("TOOLLOOP_MAX_RETRIES", &raw)?;
        }
        if let Some(raw) = lookup("TOOLLOOP_CALL_TIMEOUT_MS") {
            self.call_timeout_ms = parse_env("TOOLLOOP_CALL_TIMEOUT_MS", &raw)?;
        }
        if let Some(raw) = lookup("TOOLLOOP_MAX_TOOL_ROUND_TRIPS") {
            self.max_tool_round_trips = parse_env("TOOLLOOP_MAX_TOOL_ROUND_TRIPS", &raw)?;
        }
        Ok(self)
    }

    /// Reject values that would make a session misbehave.
    pub fn validate(&self) -> Result<()> {
        if self.model.trim().is_empty() {
            return Err(AgentError::InvalidConfig("model must not be empty".into()));
        }
        if self.max_tokens == 0 {
            return Err(AgentError::InvalidConfig("max_tokens must be at least 1".into()));
        }
        if !self.temperature.is_finite() || !(0.0..=1.0).contains(&self.temperature) {
            return Err(AgentError::InvalidConfig(format!(
                "temperature must be within 0.0..=1.0, got {}",
                self.temperature
            )));
        }
        if self.max_retries == 0 {
            return Err(AgentError::InvalidConfig("max_retries must be at least 1".into()));
        }
        if self.call_timeout_ms == 0 {
            return Err(AgentError::InvalidConfig("call_timeout_ms must be at least 1".into()));
        }
        if self.max_tool_round_trips == 0 {
            return Err(AgentError::InvalidConfig(
                "max_tool_round_trips must be at least 1".into(),
            ));
        }
        Ok(())
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T> {
    raw.trim()
        .parse()
        .map_err(|_| AgentError::InvalidConfig(format!("{key} has an invalid value: '{raw}'")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    #[test]
    fn defaults_match_documented_values() {
        let config = AgentConfig::default();

        assert_eq!(config.model, DEFAULT_MODEL);
        assert_eq!(config.max_tokens, 4000);
        assert_eq!(config.temperature, 0.7);
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.call_timeout_ms, 60_000);
        assert_eq!(config.max_tool_round_trips, 10);
        assert_eq!(config.system_prompt, None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_rejects_bad_values() {
        let cases = [
            AgentConfig::builder().model("  ").build(),
            AgentConfig::builder().max_tokens(0).build(),
            AgentConfig::builder().temperature(f64::NAN).build(),
            AgentConfig::builder().temperature(1.5).build(),
            AgentConfig::builder().max_retries(0).build(),
            AgentConfig::builder().call_timeout_ms(0).build(),
            AgentConfig::builder().max_tool_round_trips(0).build(),
        ];

        for config in cases {
            assert!(
                matches!(config.validate(), Err(AgentError::InvalidConfig(_))),
                "{config:?}"
            );
        }
    }

    #[test]
    fn overrides_apply_from_lookup() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("ANTHROPIC_API_KEY", "sk-test"),
            ("TOOLLOOP_MODEL", "claude-test"),
            ("TOOLLOOP_MAX_TOOL_ROUND_TRIPS", "3"),
            ("TOOLLOOP_TEMPERATURE", "0.2"),
        ]);

        let config = AgentConfig::default()
            .apply_overrides(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.model, "claude-test");
        assert_eq!(config.max_tool_round_trips, 3);
        assert_eq!(config.temperature, 0.2);
    }

    #[test]
    fn unparsable_override_is_invalid_config() {
        let err = AgentConfig::default()
            .apply_overrides(|key| (key == "TOOLLOOP_MAX_TOKENS").then(|| "lots".to_string()))
            .unwrap_err();

        assert!(matches!(err, AgentError::InvalidConfig(ref m) if m.contains("TOOLLOOP_MAX_TOKENS")));
    }

    #[test]
    fn debug_redacts_api_key() {
        let config = AgentConfig::builder().api_key("sk-secret").build();

        let rendered = format!("{config:?}");

        assert!(!rendered.contains("sk-secret"));
        assert!(rendered.contains("<redacted>"));
    }
}
