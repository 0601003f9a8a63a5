// Configuration management for the route table server
// Supports CLI arguments, config file (TOML), and environment variables

use clap::Parser;
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use tracing::Level;

use crate::error::{AppError, AppResult};

/// Route table server - concurrent longest-prefix-match route store
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "routetable-server")]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Listening port (overrides the config file)
    #[arg(short, long, env = "RTS_PORT")]
    pub port: Option<u16>,

    /// Bind address (overrides the config file)
    #[arg(short, long, env = "RTS_BIND_ADDRESS")]
    pub bind_address: Option<IpAddr>,

    /// Logging level (error, warn, info, debug, trace)
    #[arg(short, long, env = "RTS_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Path to configuration file
    #[arg(short, long, env = "RTS_CONFIG")]
    pub config: Option<PathBuf>,

    /// Route file to load at startup (JSON table or `ip route` output)
    #[arg(long, env = "RTS_BOOTSTRAP")]
    pub bootstrap: Option<PathBuf>,
}

/// Configuration file structure (TOML format)
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ConfigFile {
    /// Server settings
    #[serde(default)]
    pub server: ServerConfig,

    /// Startup route loading
    #[serde(default)]
    pub bootstrap: BootstrapConfig,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listening port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Bind address (default: 0.0.0.0)
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct BootstrapConfig {
    /// Route file loaded before the server starts accepting calls
    #[serde(default)]
    pub file: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub level: String,
}

// Default value functions
fn default_port() -> u16 {
    50051
}
fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            port: default_port(),
            bind_address: default_bind_address(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: default_log_level(),
        }
    }
}

/// Merged configuration from all sources
#[derive(Debug, Clone)]
pub struct Config {
    pub listen_addr: SocketAddr,
    pub log_level: Level,
    pub bootstrap_file: Option<PathBuf>,
}

impl Config {
    /// Load configuration from all sources (CLI args, config file, defaults)
    /// Priority: CLI args (or their env vars) > Config file > Defaults
    pub fn load() -> AppResult<Self> {
        let cli_args = CliArgs::parse();

        let config_file = match &cli_args.config {
            Some(config_path) => read_config_file(config_path)?,
            None => {
                // Try loading from default locations
                let default_paths = [PathBuf::from("config.toml"), PathBuf::from("routetable.toml")];
                match default_paths.iter().find(|path| path.exists()) {
                    Some(path) => read_config_file(path)?,
                    None => ConfigFile::default(),
                }
            }
        };

        Self::merge(cli_args, config_file)
    }

    /// Merge parsed arguments over a config file
    pub fn merge(cli_args: CliArgs, config_file: ConfigFile) -> AppResult<Self> {
        let port = cli_args.port.unwrap_or(config_file.server.port);

        let bind_address = match cli_args.bind_address {
            Some(addr) => addr,
            None => config_file.server.bind_address.parse().map_err(|_| {
                AppError::Config(format!(
                    "Invalid bind address: {}",
                    config_file.server.bind_address
                ))
            })?,
        };

        let log_level = parse_log_level(cli_args.log_level.as_deref().unwrap_or(&config_file.logging.level))?;

        Ok(Config {
            listen_addr: SocketAddr::new(bind_address, port),
            log_level,
            bootstrap_file: cli_args.bootstrap.or(config_file.bootstrap.file),
        })
    }
}

fn read_config_file(path: &Path) -> AppResult<ConfigFile> {
    tracing::info!("Loading configuration from: {}", path.display());
    let config_content = std::fs::read_to_string(path)?;
    Ok(toml::from_str::<ConfigFile>(&config_content)?)
}

fn parse_log_level(level_str: &str) -> AppResult<Level> {
    match level_str.to_lowercase().as_str() {
        "error" => Ok(Level::ERROR),
        "warn" => Ok(Level::WARN),
        "info" => Ok(Level::INFO),
        "debug" => Ok(Level::DEBUG),
        "trace" => Ok(Level::TRACE),
        _ => Err(AppError::Config(format!("Invalid log level: {}", level_str))),
    }
}
