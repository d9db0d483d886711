use config::{Config as ConfigLoader, ConfigError, Environment, File};
use ragchat_notify::SocketConfig;
use ragchat_types::ChatQuery;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub chat: ChatDefaults,
    #[serde(default)]
    pub notify: NotifyConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// REST base, e.g. "http://localhost:8000/api"; the socket uses the same host
    pub base_url: String,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000/api".to_string(),
            connect_timeout_ms: default_connect_timeout_ms(),
        }
    }
}

impl ServerConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

fn default_connect_timeout_ms() -> u64 {
    10_000
}

/// Per-request chat parameters
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ChatDefaults {
    pub temperature: f32,
    pub max_tokens: u32,
    pub max_history_turns: u32,
    /// Use the streaming endpoint; the non-streaming one otherwise
    pub stream: bool,
}

impl Default for ChatDefaults {
    fn default() -> Self {
        Self {
            temperature: ragchat_types::request::DEFAULT_TEMPERATURE,
            max_tokens: ragchat_types::request::DEFAULT_MAX_TOKENS,
            max_history_turns: ragchat_types::request::DEFAULT_MAX_HISTORY_TURNS,
            stream: true,
        }
    }
}

impl ChatDefaults {
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Conversation memory off sends `max_history_turns = 0`
    pub fn with_memory(mut self, enabled: bool) -> Self {
        if !enabled {
            self.max_history_turns = 0;
        }
        self
    }

    pub fn with_stream(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }

    pub fn query(&self, text: impl Into<String>) -> ChatQuery {
        ChatQuery::new(text)
            .temperature(self.temperature)
            .max_tokens(self.max_tokens)
            .max_history_turns(self.max_history_turns)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NotifyConfig {
    pub heartbeat_interval_ms: u64,
    pub connect_timeout_ms: u64,
    pub reconnect_delay_ms: u64,
    pub max_reconnect_attempts: u32,
    pub keepalive_token: String,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        let socket = SocketConfig::default();
        Self {
            heartbeat_interval_ms: socket.heartbeat_interval.as_millis() as u64,
            connect_timeout_ms: socket.connect_timeout.as_millis() as u64,
            reconnect_delay_ms: socket.reconnect_delay.as_millis() as u64,
            max_reconnect_attempts: socket.max_reconnect_attempts,
            keepalive_token: socket.keepalive_token,
        }
    }
}

impl From<NotifyConfig> for SocketConfig {
    fn from(config: NotifyConfig) -> Self {
        SocketConfig::default()
            .with_heartbeat_interval(Duration::from_millis(config.heartbeat_interval_ms))
            .with_connect_timeout(Duration::from_millis(config.connect_timeout_ms))
            .with_reconnect_delay(Duration::from_millis(config.reconnect_delay_ms))
            .with_max_reconnect_attempts(config.max_reconnect_attempts)
            .with_keepalive_token(config.keepalive_token)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from TOML files and environment variables
    ///
    /// Hierarchy (weakest to strongest):
    /// 1. config/default.toml
    /// 2. config/{ENV}.toml (if ENV is set)
    /// 3. `RAGCHAT_<SECTION>__<KEY>` environment variables
    /// 4. `RAGCHAT_BASE_URL` for the backend origin
    pub fn load() -> Result<Self, ConfigError> {
        let env = std::env::var("ENV").unwrap_or_else(|_| "dev".to_string());

        let builder = ConfigLoader::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            .add_source(
                Environment::with_prefix("RAGCHAT")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            );

        let mut cfg: Config = builder.build()?.try_deserialize()?;

        if let Ok(base_url) = std::env::var("RAGCHAT_BASE_URL") {
            cfg.server.base_url = base_url;
        }

        cfg.validate()?;
        Ok(cfg)
    }

    /// Load config from a specific path (useful for testing)
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let builder = ConfigLoader::builder().add_source(File::from(path.as_ref()));

        let cfg: Config = builder.build()?.try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.server.base_url.trim().is_empty() {
            return Err(ConfigError::Message("server.base_url must not be empty".to_string()));
        }
        if !(0.0..=2.0).contains(&self.chat.temperature) {
            return Err(ConfigError::Message(format!(
                "chat.temperature must be within 0.0..=2.0, got {}",
                self.chat.temperature
            )));
        }
        Ok(())
    }
}
