//! Configuration schema for JARO.

use serde::{Deserialize, Serialize};

/// Root config for the JARO server and SDK.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct JaroConfig {
    #[serde(default, rename = "$schema")]
    pub schema: Option<String>,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub features: FeaturesConfig,
}

impl JaroConfig {
    /// Start building a config programmatically with defaults applied.
    pub fn builder() -> JaroConfigBuilder {
        JaroConfigBuilder::new()
    }

    /// Whether an OpenAI API key is configured.
    pub fn has_openai_key(&self) -> bool {
        self.llm
            .openai_api_key
            .as_deref()
            .is_some_and(|key| !key.is_empty())
    }

    /// Whether an Anthropic API key is configured.
    pub fn has_anthropic_key(&self) -> bool {
        self.llm
            .anthropic_api_key
            .as_deref()
            .is_some_and(|key| !key.is_empty())
    }
}

/// Builder for assembling a `JaroConfig` in code.
#[derive(Debug, Default, Clone)]
pub struct JaroConfigBuilder {
    config: JaroConfig,
}

impl JaroConfigBuilder {
    /// Create a new builder seeded with default config values.
    pub fn new() -> Self {
        Self {
            config: JaroConfig::default(),
        }
    }

    /// Replace the HTTP server configuration.
    pub fn server(mut self, server: ServerConfig) -> Self {
        self.config.server = server;
        self
    }

    /// Replace the orchestration engine configuration.
    pub fn engine(mut self, engine: EngineConfig) -> Self {
        self.config.engine = engine;
        self
    }

    /// Replace the logging configuration.
    pub fn logging(mut self, logging: LoggingConfig) -> Self {
        self.config.logging = logging;
        self
    }

    /// Replace the LLM provider configuration.
    pub fn llm(mut self, llm: LlmConfig) -> Self {
        self.config.llm = llm;
        self
    }

    /// Replace the feature flags.
    pub fn features(mut self, features: FeaturesConfig) -> Self {
        self.config.features = features;
        self
    }

    /// Finalize and return the built `JaroConfig`.
    pub fn build(self) -> JaroConfig {
        self.config
    }
}

/// HTTP listener, timeouts, and request limits.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Validated only; the server does not apply an idle timeout.
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,
    /// Bytes.
    #[serde(default = "default_max_body_size")]
    pub max_body_size: u64,
    /// Bytes. Validated only; there is no upload route.
    #[serde(default = "default_max_file_upload_size")]
    pub max_file_upload_size: u64,
    /// Validated only; there is no upload route.
    #[serde(default = "default_allowed_mime_types")]
    pub allowed_mime_types: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_secs: default_request_timeout_secs(),
            idle_timeout_secs: default_idle_timeout_secs(),
            max_body_size: default_max_body_size(),
            max_file_upload_size: default_max_file_upload_size(),
            allowed_mime_types: default_allowed_mime_types(),
        }
    }
}

impl ServerConfig {
    /// `host:port` string suitable for binding a listener.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_idle_timeout_secs() -> u64 {
    60
}

fn default_max_body_size() -> u64 {
    10 * 1024 * 1024
}

fn default_max_file_upload_size() -> u64 {
    50 * 1024 * 1024
}

fn default_allowed_mime_types() -> Vec<String> {
    [
        "application/json",
        "application/pdf",
        "text/plain",
        "image/png",
        "image/jpeg",
    ]
    .iter()
    .map(|mime| mime.to_string())
    .collect()
}

/// Orchestration engine policy.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EngineConfig {
    /// Extra attempts allowed after a step reports a logical failure.
    #[serde(default = "default_max_step_retries")]
    pub max_step_retries: u32,
    /// Run the VERIFYING consistency check before marking a task DONE.
    #[serde(default = "default_true")]
    pub verify_on_completion: bool,
    /// Start planning and execution in the background after task creation.
    #[serde(default)]
    pub auto_run: bool,
    /// Schema tag stamped on every audit event.
    #[serde(default = "default_behavior_version")]
    pub behavior_version: String,
    #[serde(default = "default_channel")]
    pub default_channel: String,
    #[serde(default = "default_target_agent")]
    pub default_target_agent: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_step_retries: default_max_step_retries(),
            verify_on_completion: true,
            auto_run: false,
            behavior_version: default_behavior_version(),
            default_channel: default_channel(),
            default_target_agent: default_target_agent(),
        }
    }
}

fn default_max_step_retries() -> u32 {
    2
}

fn default_true() -> bool {
    true
}

fn default_behavior_version() -> String {
    "v1".to_string()
}

fn default_channel() -> String {
    "api".to_string()
}

fn default_target_agent() -> String {
    "CORE".to_string()
}

/// Log verbosity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoggingConfig {
    /// One of `debug`, `info`, `warn`, `error`.
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// LLM provider settings for model-backed planners. Loaded and validated
/// only: the bundled `NaivePlanner` does not read them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LlmConfig {
    #[serde(default = "default_llm_model")]
    pub default_model: String,
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_llm_max_retries")]
    pub max_retries: u32,
    #[serde(default, skip_serializing)]
    pub openai_api_key: Option<String>,
    #[serde(default, skip_serializing)]
    pub anthropic_api_key: Option<String>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            default_model: default_llm_model(),
            timeout_secs: default_llm_timeout_secs(),
            max_retries: default_llm_max_retries(),
            openai_api_key: None,
            anthropic_api_key: None,
        }
    }
}

fn default_llm_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_llm_timeout_secs() -> u64 {
    60
}

fn default_llm_max_retries() -> u32 {
    3
}

/// Optional features.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct FeaturesConfig {
    /// Reserved; nothing exports metrics yet.
    #[serde(default)]
    pub enable_metrics: bool,
}
