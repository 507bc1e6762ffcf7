use crate::application::game_service::SessionSettings;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

pub const CONFIG_PATH: &str = "Config.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub sessions: SessionsConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseBackend {
    Sqlite,
    Memory,
}

impl FromStr for DatabaseBackend {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sqlite" => Ok(DatabaseBackend::Sqlite),
            "memory" => Ok(DatabaseBackend::Memory),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DatabaseConfig {
    pub backend: DatabaseBackend,
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SessionsConfig {
    pub idle_timeout_secs: u64,
    pub sweep_interval_secs: u64,
    pub persistence_timeout_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    /// `tracing_subscriber::EnvFilter` directive.
    pub filter: String,
}

impl AppConfig {
    /// Reads `Config.toml` from the working directory, then applies
    /// `CHESSROOM_*` overrides.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(CONFIG_PATH)
    }

    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })?;
            toml::from_str(&contents).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?
        } else {
            Self::default()
        };

        config.merge_env();
        Ok(config)
    }

    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            persistence_timeout: Duration::from_millis(self.sessions.persistence_timeout_ms),
            idle_timeout: Duration::from_secs(self.sessions.idle_timeout_secs),
        }
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sessions.sweep_interval_secs.max(1))
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// Logs the effective configuration. Call after the subscriber is up.
    pub fn log_summary(&self) {
        info!(
            address = %self.bind_address(),
            backend = ?self.database.backend,
            database_url = %self.database.url,
            max_connections = self.database.max_connections,
            idle_timeout_secs = self.sessions.idle_timeout_secs,
            sweep_interval_secs = self.sessions.sweep_interval_secs,
            persistence_timeout_ms = self.sessions.persistence_timeout_ms,
            "configuration loaded"
        );
    }

    fn merge_env(&mut self) {
        if let Ok(val) = std::env::var("CHESSROOM_HOST") {
            self.server.host = val;
        }
        if let Ok(val) = std::env::var("CHESSROOM_PORT") {
            if let Ok(parsed) = val.parse() {
                self.server.port = parsed;
            }
        }
        if let Ok(val) = std::env::var("CHESSROOM_DATABASE_BACKEND") {
            if let Ok(parsed) = val.parse() {
                self.database.backend = parsed;
            }
        }
        if let Ok(val) = std::env::var("CHESSROOM_DATABASE_URL") {
            self.database.url = val;
        }
        if let Ok(val) = std::env::var("CHESSROOM_DB_MAX_CONNECTIONS") {
            if let Ok(parsed) = val.parse() {
                self.database.max_connections = parsed;
            }
        }
        if let Ok(val) = std::env::var("CHESSROOM_IDLE_TIMEOUT_SECS") {
            if let Ok(parsed) = val.parse() {
                self.sessions.idle_timeout_secs = parsed;
            }
        }
        if let Ok(val) = std::env::var("CHESSROOM_SWEEP_INTERVAL_SECS") {
            if let Ok(parsed) = val.parse() {
                self.sessions.sweep_interval_secs = parsed;
            }
        }
        if let Ok(val) = std::env::var("CHESSROOM_PERSISTENCE_TIMEOUT_MS") {
            if let Ok(parsed) = val.parse() {
                self.sessions.persistence_timeout_ms = parsed;
            }
        }
        if let Ok(val) = std::env::var("CHESSROOM_LOG") {
            self.logging.filter = val;
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            backend: DatabaseBackend::Sqlite,
            url: "sqlite://chessroom.db".to_string(),
            max_connections: 5,
        }
    }
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            idle_timeout_secs: 30 * 60,
            sweep_interval_secs: 60,
            persistence_timeout_ms: 2000,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info,chessroom=debug,tower_http=info".to_string(),
        }
    }
}
