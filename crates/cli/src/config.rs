//! `langnode.toml` configuration.
//!
//! Every section and key is optional; a missing file yields the defaults.
//! Values are validated once command-line overrides have been applied, so
//! the node never starts with an invalid configuration.
//!
//! ```toml
//! [llm]
//! provider = "anthropic"        # or "scripted"
//! model = "claude-sonnet-4-5"
//! max_tokens = 1024
//! timeout_secs = 60
//!
//! [node]
//! id = "llm"
//! message_source = "state_messages"   # or "prompt_messages"
//!
//! [observability]
//! log_format = "pretty"         # or "json"
//! log_level = "info"
//! otlp_endpoint = "http://localhost:4317"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::ValueEnum;
use llm::AnthropicConfig;
use pipeline::{MessageSource, ModelName, NodeId};
use serde::Deserialize;
use thiserror::Error;

/// Configuration problems detected while loading `langnode.toml`.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file exists but could not be read.
    #[error("Failed to read configuration file {path}")]
    Read {
        /// Path that was read.
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid TOML or contains unknown keys.
    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value is out of range or inconsistent.
    #[error("Configuration error: {message}")]
    Invalid {
        /// Description of the configuration problem.
        message: String,
    },
}

fn invalid(message: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        message: message.into(),
    }
}

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

/// Which model client adapter backs the node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// Anthropic Messages API.
    #[default]
    Anthropic,
    /// Offline fixed reply or echo.
    Scripted,
}

/// Log line encoding.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// Human-readable compact lines.
    #[default]
    Pretty,
    /// One JSON object per line.
    Json,
}

/// `[llm]`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LlmSection {
    /// Adapter backing the node.
    pub provider: ProviderKind,
    /// Anthropic model name.
    pub model: String,
    /// Upper bound on generated tokens.
    pub max_tokens: u32,
    /// Anthropic API root, without the `/v1/messages` path.
    pub base_url: String,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
    /// Environment variable holding the Anthropic API key.
    pub api_key_env: String,
    /// Reply returned by the `scripted` provider; echo when absent.
    pub scripted_response: Option<String>,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: ProviderKind::default(),
            model: AnthropicConfig::DEFAULT_MODEL.to_string(),
            max_tokens: 1024,
            base_url: AnthropicConfig::DEFAULT_BASE_URL.to_string(),
            timeout_secs: 60,
            api_key_env: AnthropicConfig::DEFAULT_API_KEY_ENV.to_string(),
            scripted_response: None,
        }
    }
}

/// `[node]`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NodeSection {
    /// Node name used in spans and errors.
    pub id: String,
    /// Which message list is sent to the model.
    pub message_source: MessageSource,
}

impl Default for NodeSection {
    fn default() -> Self {
        Self {
            id: NodeId::DEFAULT_LLM.to_string(),
            message_source: MessageSource::default(),
        }
    }
}

/// `[observability]`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ObservabilitySection {
    /// Encoding of log lines on stderr.
    pub log_format: LogFormat,
    /// Filter directive used when `RUST_LOG` is unset.
    pub log_level: String,
    /// OTLP/gRPC collector; spans are exported only when set.
    pub otlp_endpoint: Option<String>,
}

impl Default for ObservabilitySection {
    fn default() -> Self {
        Self {
            log_format: LogFormat::default(),
            log_level: "info".to_string(),
            otlp_endpoint: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Root
// ---------------------------------------------------------------------------

/// The whole configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CliConfig {
    /// `[llm]` section.
    pub llm: LlmSection,
    /// `[node]` section.
    pub node: NodeSection,
    /// `[observability]` section.
    pub observability: ObservabilitySection,
}

impl CliConfig {
    /// Loads `path`; a missing file yields the defaults.
    ///
    /// Values are not validated here so command-line overrides can be applied
    /// first; call [`CliConfig::validate`] afterwards.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(text) => Ok(toml::from_str(&text)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(source) => Err(ConfigError::Read {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    /// Checks ranges and cross-field consistency.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.node_id()?;
        if self.llm.provider == ProviderKind::Anthropic {
            self.anthropic_config()?;
        }
        if self.observability.log_level.trim().is_empty() {
            return Err(invalid("observability.log_level must not be empty"));
        }
        if let Some(endpoint) = &self.observability.otlp_endpoint {
            if !is_http_url(endpoint) {
                return Err(invalid(format!(
                    "observability.otlp_endpoint must be an http(s) URL, got '{endpoint}'"
                )));
            }
        }
        Ok(())
    }

    /// The configured node name.
    pub fn node_id(&self) -> Result<NodeId, ConfigError> {
        NodeId::new(self.node.id.clone()).ok_or_else(|| invalid("node.id must not be empty"))
    }

    /// Settings for the Anthropic adapter.
    pub fn anthropic_config(&self) -> Result<AnthropicConfig, ConfigError> {
        let llm = &self.llm;
        let model =
            ModelName::new(llm.model.clone()).ok_or_else(|| invalid("llm.model must not be empty"))?;
        if llm.max_tokens == 0 {
            return Err(invalid("llm.max_tokens must be greater than zero"));
        }
        if llm.timeout_secs == 0 {
            return Err(invalid("llm.timeout_secs must be greater than zero"));
        }
        if !is_http_url(&llm.base_url) {
            return Err(invalid(format!(
                "llm.base_url must be an http(s) URL, got '{}'",
                llm.base_url
            )));
        }
        if llm.api_key_env.is_empty() {
            return Err(invalid("llm.api_key_env must not be empty"));
        }

        Ok(AnthropicConfig {
            model,
            max_tokens: llm.max_tokens,
            base_url: llm.base_url.clone(),
            timeout: Duration::from_secs(llm.timeout_secs),
            api_key_env: llm.api_key_env.clone(),
        })
    }
}

fn is_http_url(value: &str) -> bool {
    value.starts_with("http://") || value.starts_with("https://")
}
