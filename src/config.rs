use std::net::SocketAddr;

use clap::Parser;
use serde::Deserialize;
use stmtdb_core::MarkingRule;
use thiserror::Error;

/// Comma-separated names that override `marking.names` when set.
pub const MARKING_NAMES_ENV: &str = "CHILDREN_NAMES";

#[derive(Parser, Debug, Default)]
#[command(name = "stmtdb", about = "stmtdb - bank statement import and review service")]
pub struct CliArgs {
    /// Path to config file
    #[arg(short, long, default_value = "stmtdb.toml")]
    pub config: String,

    /// Port to listen on (overrides config file)
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Log level (overrides config file)
    #[arg(short, long)]
    pub log_level: Option<String>,

    /// SQLite database file (overrides config file)
    #[arg(short, long)]
    pub database: Option<String>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid listen address {0}")]
    ListenAddr(String),
}

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default = "default_server")]
    pub server: ServerConfig,

    #[serde(default = "default_logging")]
    pub logging: LoggingConfig,

    #[serde(default = "default_database")]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub marking: MarkingConfig,

    #[serde(default)]
    pub auth: AuthConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub json: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_path")]
    pub path: String,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct MarkingConfig {
    /// Transaction descriptions that mark a debit on import.
    #[serde(default)]
    pub names: Vec<String>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct AuthConfig {
    /// When true, every /api route requires an API key.
    #[serde(default)]
    pub enabled: bool,

    /// Static API keys. Each key has a name (for audit) and a role.
    #[serde(default)]
    pub api_keys: Vec<ApiKeyEntry>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ApiKeyEntry {
    pub name: String,
    pub key: String,
    #[serde(default = "default_role")]
    pub role: String,
}

fn default_role() -> String {
    "reader".to_string()
}

fn default_server() -> ServerConfig {
    ServerConfig {
        host: default_host(),
        port: default_port(),
    }
}

fn default_logging() -> LoggingConfig {
    LoggingConfig {
        level: default_log_level(),
        json: false,
    }
}

fn default_database() -> DatabaseConfig {
    DatabaseConfig {
        path: default_database_path(),
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_database_path() -> String {
    "local.db".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: default_server(),
            logging: default_logging(),
            database: default_database(),
            marking: MarkingConfig::default(),
            auth: AuthConfig::default(),
        }
    }
}

impl Config {
    /// Reads the config file named on the command line (a missing file means
    /// defaults), then applies the environment and CLI overrides.
    pub fn load(cli: &CliArgs) -> Result<Self, ConfigError> {
        let contents = match std::fs::read_to_string(&cli.config) {
            Ok(contents) => Some(contents),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(source) => {
                return Err(ConfigError::Read {
                    path: cli.config.clone(),
                    source,
                })
            }
        };
        Self::from_sources(cli, contents.as_deref(), std::env::var(MARKING_NAMES_ENV).ok())
    }

    pub fn from_sources(
        cli: &CliArgs,
        file: Option<&str>,
        marking_names: Option<String>,
    ) -> Result<Self, ConfigError> {
        let mut config = match file {
            Some(contents) => toml::from_str(contents).map_err(|source| ConfigError::Parse {
                path: cli.config.clone(),
                source,
            })?,
            None => Config::default(),
        };

        if let Some(names) = marking_names {
            config.marking.names = names.split(',').map(str::to_string).collect();
        }

        // CLI overrides
        if let Some(port) = cli.port {
            config.server.port = port;
        }
        if let Some(ref level) = cli.log_level {
            config.logging.level = level.clone();
        }
        if let Some(ref path) = cli.database {
            config.database.path = path.clone();
        }

        Ok(config)
    }

    pub fn listen_addr(&self) -> Result<SocketAddr, ConfigError> {
        let addr = format!("{}:{}", self.server.host, self.server.port);
        addr.parse().map_err(|_| ConfigError::ListenAddr(addr))
    }

    pub fn marking_rule(&self) -> MarkingRule {
        MarkingRule::new(&self.marking.names)
    }
}
