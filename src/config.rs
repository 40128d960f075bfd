//! Configuration management for agentd
//!
//! This module handles loading, parsing, validating, and managing
//! configuration from files, environment variables, and CLI overrides.

use crate::cli::{Cli, Commands};
use crate::error::{AgentdError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Backend names accepted by validation
const KNOWN_BACKENDS: [&str; 3] = ["ollama", "openai", "anthropic"];

/// Main configuration structure for agentd
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Agent identity and home directory
    #[serde(default)]
    pub agent: AgentConfig,
    /// HTTP gateway settings
    #[serde(default)]
    pub api: ApiConfig,
    /// Chat backend selection and settings
    #[serde(default)]
    pub provider: ProviderConfig,
    /// Memory provider settings
    #[serde(default)]
    pub memory: MemoryConfig,
    /// Session defaults
    #[serde(default)]
    pub sessions: SessionsConfig,
    /// Prompt template locations
    #[serde(default)]
    pub prompts: PromptsConfig,
    /// Default tool list location
    #[serde(default)]
    pub tools: ToolsConfig,
    /// Request debug logging
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

/// Agent identity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Display name
    #[serde(default = "default_agent_name")]
    pub name: String,
    /// Root directory for runtime state
    #[serde(default = "default_agent_home")]
    pub home: PathBuf,
    /// Accent color used by the terminal client
    #[serde(default = "default_agent_color")]
    pub color: String,
}

fn default_agent_name() -> String {
    "Canvas AgentD".to_string()
}

fn default_agent_home() -> PathBuf {
    PathBuf::from(".agent-home")
}

fn default_agent_color() -> String {
    "violet".to_string()
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            name: default_agent_name(),
            home: default_agent_home(),
            color: default_agent_color(),
        }
    }
}

/// HTTP gateway configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Whether the REPL also starts the gateway
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Bind address
    #[serde(default = "default_api_host")]
    pub host: String,
    /// Bind port
    #[serde(default = "default_api_port")]
    pub port: u16,
}

fn default_true() -> bool {
    true
}

fn default_api_host() -> String {
    "0.0.0.0".to_string()
}

fn default_api_port() -> u16 {
    3141
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: default_api_host(),
            port: default_api_port(),
        }
    }
}

/// Provider configuration
///
/// Specifies which chat backend to use and its settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Type of backend to use
    #[serde(rename = "type", default = "default_provider_type")]
    pub provider_type: String,

    /// Ollama configuration
    #[serde(default)]
    pub ollama: OllamaConfig,

    /// OpenAI configuration
    #[serde(default = "OpenAiConfig::openai")]
    pub openai: OpenAiConfig,

    /// Anthropic configuration
    #[serde(default = "OpenAiConfig::anthropic")]
    pub anthropic: OpenAiConfig,
}

fn default_provider_type() -> String {
    "ollama".to_string()
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            provider_type: default_provider_type(),
            ollama: OllamaConfig::default(),
            openai: OpenAiConfig::openai(),
            anthropic: OpenAiConfig::anthropic(),
        }
    }
}

/// Ollama provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaConfig {
    /// Ollama server base URL
    #[serde(default = "default_ollama_host")]
    pub host: String,

    /// Model to use
    #[serde(default = "default_ollama_model")]
    pub model: String,

    /// Sampling temperature
    #[serde(default = "default_ollama_temperature")]
    pub temperature: f32,
}

fn default_ollama_host() -> String {
    "http://127.0.0.1:11434".to_string()
}

fn default_ollama_model() -> String {
    "qwen3:latest".to_string()
}

fn default_ollama_temperature() -> f32 {
    0.4
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            host: default_ollama_host(),
            model: default_ollama_model(),
            temperature: default_ollama_temperature(),
        }
    }
}

/// Settings for hosted API backends (OpenAI and Anthropic share a shape)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiConfig {
    /// API key
    #[serde(default)]
    pub api_key: String,
    /// API base URL
    pub base_url: String,
    /// Model to use
    pub model: String,
}

impl OpenAiConfig {
    fn openai() -> Self {
        Self {
            api_key: String::new(),
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
        }
    }

    fn anthropic() -> Self {
        Self {
            api_key: String::new(),
            base_url: "https://api.anthropic.com".to_string(),
            model: "claude-3-5-sonnet".to_string(),
        }
    }
}

/// Memory provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Memory provider type
    #[serde(rename = "type", default = "default_memory_type")]
    pub memory_type: String,
    /// Episode log directory, `<home>/episodes` when unset
    #[serde(default)]
    pub base_dir: Option<PathBuf>,
}

fn default_memory_type() -> String {
    "mock".to_string()
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            memory_type: default_memory_type(),
            base_dir: None,
        }
    }
}

/// Session defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionsConfig {
    /// Session used when a request names none
    #[serde(default = "default_session_id")]
    pub default_id: String,
}

fn default_session_id() -> String {
    "global".to_string()
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            default_id: default_session_id(),
        }
    }
}

/// Prompt template locations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptsConfig {
    /// Directory holding the built-in fragments
    #[serde(default = "default_builtin_prompts")]
    pub builtin_dir: PathBuf,
    /// Directory of user templates, `<home>/prompts` when unset
    #[serde(default)]
    pub user_dir: Option<PathBuf>,
}

fn default_builtin_prompts() -> PathBuf {
    PathBuf::from("prompts")
}

impl Default for PromptsConfig {
    fn default() -> Self {
        Self {
            builtin_dir: default_builtin_prompts(),
            user_dir: None,
        }
    }
}

/// Default tool list location
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// JSON tools file, `<home>/tools.json` when unset
    #[serde(default)]
    pub tools_file: Option<PathBuf>,
}

/// Request debug logging
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Log assembled requests and replies
    #[serde(default = "default_true")]
    pub debug_requests: bool,
    /// Log message content untruncated
    #[serde(default = "default_true")]
    pub debug_full_messages: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            debug_requests: true,
            debug_full_messages: true,
        }
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

impl Config {
    /// Load configuration from file with environment and CLI overrides
    ///
    /// # Arguments
    ///
    /// * `path` - Path to configuration file
    /// * `cli` - CLI arguments for overrides
    ///
    /// # Errors
    ///
    /// Returns error if the file exists but cannot be read or parsed
    pub fn load(path: &str, cli: &Cli) -> Result<Self> {
        let mut config = if Path::new(path).exists() {
            Self::from_file(path)?
        } else {
            tracing::warn!("Config file not found at {}, using defaults", path);
            Self::default()
        };

        config.apply_env_vars();
        config.apply_cli_overrides(cli);

        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| AgentdError::Config(format!("Failed to read config file: {}", e)))?;
        serde_yaml::from_str(&contents)
            .map_err(|e| AgentdError::Config(format!("Failed to parse config: {}", e)).into())
    }

    fn apply_env_vars(&mut self) {
        // Agent identity
        if let Ok(name) = std::env::var("AGENT_NAME") {
            self.agent.name = name;
        }

        if let Ok(home) = std::env::var("AGENT_HOME") {
            self.agent.home = PathBuf::from(home);
        }

        if let Ok(color) = std::env::var("AGENT_COLOR") {
            self.agent.color = color;
        }

        // Gateway
        if let Ok(enabled) = std::env::var("AGENT_API_ENABLED") {
            match parse_flag(&enabled) {
                Some(value) => self.api.enabled = value,
                None => tracing::warn!("Invalid AGENT_API_ENABLED: {}", enabled),
            }
        }

        if let Ok(host) = std::env::var("AGENT_API_HOST") {
            self.api.host = host;
        }

        if let Ok(port) = std::env::var("AGENT_API_PORT") {
            if let Ok(value) = port.parse() {
                self.api.port = value;
            } else {
                tracing::warn!("Invalid AGENT_API_PORT: {}", port);
            }
        }

        // Backend
        if let Ok(backend) = std::env::var("AGENT_BACKEND") {
            self.provider.provider_type = backend;
        }

        if let Ok(host) = std::env::var("OLLAMA_BASE_URL") {
            self.provider.ollama.host = host;
        }

        if let Ok(model) = std::env::var("OLLAMA_MODEL") {
            self.provider.ollama.model = model;
        }

        if let Ok(temperature) = std::env::var("OLLAMA_TEMPERATURE") {
            if let Ok(value) = temperature.parse() {
                self.provider.ollama.temperature = value;
            } else {
                tracing::warn!("Invalid OLLAMA_TEMPERATURE: {}", temperature);
            }
        }

        for (prefix, hosted) in [
            ("OPENAI", &mut self.provider.openai),
            ("ANTHROPIC", &mut self.provider.anthropic),
        ] {
            if let Ok(key) = std::env::var(format!("{}_API_KEY", prefix)) {
                hosted.api_key = key;
            }
            if let Ok(base_url) = std::env::var(format!("{}_BASE_URL", prefix)) {
                hosted.base_url = base_url;
            }
            if let Ok(model) = std::env::var(format!("{}_MODEL", prefix)) {
                hosted.model = model;
            }
        }

        // Sessions and tools
        if let Ok(default_id) = std::env::var("AGENT_DEFAULT_SESSION_ID") {
            self.sessions.default_id = default_id;
        }

        if let Ok(tools_file) = std::env::var("AGENT_TOOLS_FILE") {
            self.tools.tools_file = Some(PathBuf::from(tools_file));
        }

        // Telemetry
        if let Ok(debug_flag) = std::env::var("AGENT_DEBUG_REQUESTS") {
            match parse_flag(&debug_flag) {
                Some(value) => self.telemetry.debug_requests = value,
                None => tracing::warn!("Invalid AGENT_DEBUG_REQUESTS: {}", debug_flag),
            }
        }

        if let Ok(full) = std::env::var("AGENT_DEBUG_FULL") {
            match parse_flag(&full) {
                Some(value) => self.telemetry.debug_full_messages = value,
                None => tracing::warn!("Invalid AGENT_DEBUG_FULL: {}", full),
            }
        }
    }

    fn apply_cli_overrides(&mut self, cli: &Cli) {
        if let Commands::Serve { host, port } = &cli.command {
            if let Some(host) = host {
                self.api.host = host.clone();
            }
            if let Some(port) = port {
                self.api.port = *port;
            }
        }
    }

    /// Directory holding user prompt templates
    pub fn prompt_user_dir(&self) -> PathBuf {
        self.prompts
            .user_dir
            .clone()
            .unwrap_or_else(|| self.agent.home.join("prompts"))
    }

    /// Path of the default tools file
    pub fn tools_file(&self) -> PathBuf {
        self.tools
            .tools_file
            .clone()
            .unwrap_or_else(|| self.agent.home.join("tools.json"))
    }

    /// Directory for memory episode logs
    pub fn episodes_dir(&self) -> PathBuf {
        self.memory
            .base_dir
            .clone()
            .unwrap_or_else(|| self.agent.home.join("episodes"))
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns error if any validation check fails
    pub fn validate(&self) -> Result<()> {
        if self.provider.provider_type.is_empty() {
            return Err(AgentdError::Config("Provider type cannot be empty".to_string()).into());
        }

        if !KNOWN_BACKENDS.contains(&self.provider.provider_type.as_str()) {
            return Err(AgentdError::Config(format!(
                "Invalid provider type: {}. Must be one of: {}",
                self.provider.provider_type,
                KNOWN_BACKENDS.join(", ")
            ))
            .into());
        }

        if self.api.port == 0 {
            return Err(AgentdError::Config("api.port must be greater than 0".to_string()).into());
        }

        if self.sessions.default_id.is_empty() {
            return Err(AgentdError::Config(
                "sessions.default_id cannot be empty".to_string(),
            )
            .into());
        }

        let temperature = self.provider.ollama.temperature;
        if !(0.0..=2.0).contains(&temperature) {
            return Err(AgentdError::Config(format!(
                "provider.ollama.temperature must be between 0.0 and 2.0, got {}",
                temperature
            ))
            .into());
        }

        Ok(())
    }
}
