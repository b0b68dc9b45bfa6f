//! Configuration module for the message catalog server.
//!
//! Supports both command-line arguments and TOML configuration file.
//! CLI arguments take precedence over config file values.

use clap::Parser;
use serde::Deserialize;
use std::path::PathBuf;
use thiserror::Error;

/// Command-line arguments for the server
#[derive(Parser, Debug)]
#[command(name = "message-catalog")]
#[command(author = "message-catalog authors")]
#[command(version = "0.1.0")]
#[command(about = "Serves fixed-width messages from an in-memory catalog", long_about = None)]
pub struct CliArgs {
    /// Path to TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Address to bind to (e.g., 0.0.0.0:5000)
    #[arg(short = 'l', long)]
    pub listen: Option<String>,

    /// Catalog file: a count line followed by one message per line
    #[arg(short = 'f', long)]
    pub catalog: Option<PathBuf>,

    /// Maximum number of concurrent connections (unbounded when unset)
    #[arg(long)]
    pub max_connections: Option<usize>,

    /// Log level (trace, debug, info, warn, error) [default: info]
    #[arg(long)]
    pub log_level: Option<String>,
}

/// TOML configuration file structure
#[derive(Debug, Deserialize, Default)]
pub struct TomlConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server-related configuration
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    /// Address to bind to
    #[serde(default = "default_listen")]
    pub listen: String,
    /// Connection limit
    pub max_connections: Option<usize>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            max_connections: None,
        }
    }
}

/// Catalog source configuration
#[derive(Debug, Deserialize)]
pub struct CatalogConfig {
    #[serde(default = "default_catalog_path")]
    pub path: PathBuf,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            path: default_catalog_path(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Log level
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

fn default_listen() -> String {
    "0.0.0.0:5000".to_string()
}

fn default_catalog_path() -> PathBuf {
    PathBuf::from("messages.txt")
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Final resolved configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub listen: String,
    pub catalog_path: PathBuf,
    pub max_connections: Option<usize>,
    pub log_level: String,
}

impl Config {
    /// Load configuration from CLI args and optional TOML file.
    /// CLI arguments take precedence over TOML file values.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_args(CliArgs::parse())
    }

    fn from_args(cli: CliArgs) -> Result<Self, ConfigError> {
        let toml_config = if let Some(ref config_path) = cli.config {
            let contents = std::fs::read_to_string(config_path)
                .map_err(|e| ConfigError::FileRead(config_path.clone(), e))?;
            toml::from_str(&contents)
                .map_err(|e| ConfigError::TomlParse(config_path.clone(), e))?
        } else {
            TomlConfig::default()
        };

        Ok(Self::merge(cli, toml_config))
    }

    fn merge(cli: CliArgs, toml_config: TomlConfig) -> Self {
        Config {
            listen: cli.listen.unwrap_or(toml_config.server.listen),
            catalog_path: cli.catalog.unwrap_or(toml_config.catalog.path),
            max_connections: cli.max_connections.or(toml_config.server.max_connections),
            log_level: cli.log_level.unwrap_or(toml_config.logging.level),
        }
    }
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{}': {}", .0.display(), .1)]
    FileRead(PathBuf, std::io::Error),
    #[error("Failed to parse config file '{}': {}", .0.display(), .1)]
    TomlParse(PathBuf, toml::de::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = TomlConfig::default();
        assert_eq!(config.server.listen, "0.0.0.0:5000");
        assert_eq!(config.server.max_connections, None);
        assert_eq!(config.catalog.path, PathBuf::from("messages.txt"));
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_toml_parsing() {
        let toml_str = r#"
            [server]
            listen = "127.0.0.1:6000"
            max_connections = 64

            [catalog]
            path = "/srv/quotes.txt"

            [logging]
            level = "debug"
        "#;

        let config: TomlConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.server.listen, "127.0.0.1:6000");
        assert_eq!(config.server.max_connections, Some(64));
        assert_eq!(config.catalog.path, PathBuf::from("/srv/quotes.txt"));
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_partial_toml() {
        let config: TomlConfig = toml::from_str("[catalog]\npath = \"other.txt\"\n").unwrap();
        assert_eq!(config.server.listen, "0.0.0.0:5000");
        assert_eq!(config.catalog.path, PathBuf::from("other.txt"));
    }

    #[test]
    fn test_cli_overrides_toml() {
        let cli = CliArgs::parse_from([
            "message-catalog",
            "--listen",
            "127.0.0.1:7000",
            "--max-connections",
            "8",
            "--log-level",
            "warn",
        ]);
        let toml_config: TomlConfig = toml::from_str(
            "[server]\nlisten = \"0.0.0.0:5000\"\nmax_connections = 2\n[catalog]\npath = \"file.txt\"\n",
        )
        .unwrap();

        let config = Config::merge(cli, toml_config);
        assert_eq!(config.listen, "127.0.0.1:7000");
        assert_eq!(config.max_connections, Some(8));
        assert_eq!(config.catalog_path, PathBuf::from("file.txt"));
        assert_eq!(config.log_level, "warn");
    }

    #[test]
    fn test_cli_default_log_level_overrides_toml() {
        let cli = CliArgs::parse_from(["message-catalog", "--log-level", "info"]);
        let toml_config: TomlConfig = toml::from_str("[logging]\nlevel = \"debug\"\n").unwrap();

        let config = Config::merge(cli, toml_config);
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_toml_log_level_without_cli() {
        let cli = CliArgs::parse_from(["message-catalog"]);
        let toml_config: TomlConfig = toml::from_str("[logging]\nlevel = \"debug\"\n").unwrap();

        let config = Config::merge(cli, toml_config);
        assert_eq!(config.log_level, "debug");
    }

    #[test]
    fn test_defaults_without_file() {
        let config = Config::from_args(CliArgs::parse_from(["message-catalog"])).unwrap();
        assert_eq!(config.listen, "0.0.0.0:5000");
        assert_eq!(config.catalog_path, PathBuf::from("messages.txt"));
        assert_eq!(config.max_connections, None);
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_missing_config_file() {
        let cli = CliArgs::parse_from(["message-catalog", "--config", "/nonexistent/server.toml"]);
        assert!(matches!(
            Config::from_args(cli),
            Err(ConfigError::FileRead(..))
        ));
    }
}
