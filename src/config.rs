//! Configuration for both ends of the connection.
//!
//! Values come from the command line, an optional TOML file, then built-in
//! defaults, in that order of precedence.

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use serde::Deserialize;

use crate::cli::{ConnectArgs, ServeArgs};

/// TOML configuration file structure
#[derive(Debug, Deserialize, Default)]
pub struct FileConfig {
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub client: ClientSection,
    #[serde(default)]
    pub logging: LoggingSection,
}

#[derive(Debug, Deserialize)]
pub struct ServerSection {
    #[serde(default = "default_listen")]
    pub listen: String,
    #[serde(default = "default_directory")]
    pub directory: PathBuf,
    #[serde(default = "default_data_timeout")]
    pub data_timeout: u64,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            directory: default_directory(),
            data_timeout: default_data_timeout(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ClientSection {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_directory")]
    pub directory: PathBuf,
    #[serde(default = "default_data_timeout")]
    pub data_timeout: u64,
    #[serde(default = "default_progress")]
    pub progress: bool,
}

impl Default for ClientSection {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            directory: default_directory(),
            data_timeout: default_data_timeout(),
            progress: default_progress(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct LoggingSection {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_listen() -> String {
    format!("0.0.0.0:{}", default_port())
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    1234
}

fn default_directory() -> PathBuf {
    PathBuf::from(".")
}

fn default_data_timeout() -> u64 {
    30
}

fn default_progress() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

impl FileConfig {
    /// Reads the file if one was given, otherwise every value is a default.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::FileRead(path.to_path_buf(), e))?;
        toml::from_str(&contents).map_err(|e| ConfigError::TomlParse(path.to_path_buf(), e))
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub listen: String,
    pub directory: PathBuf,
    pub data_timeout: Duration,
}

impl ServerConfig {
    pub fn resolve(args: &ServeArgs, file: &FileConfig) -> Result<Self, ConfigError> {
        let directory = args
            .directory
            .clone()
            .unwrap_or_else(|| file.server.directory.clone());
        check_directory(&directory)?;

        Ok(Self {
            listen: args
                .listen
                .clone()
                .unwrap_or_else(|| file.server.listen.clone()),
            directory,
            data_timeout: Duration::from_secs(
                args.data_timeout.unwrap_or(file.server.data_timeout),
            ),
        })
    }
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub host: String,
    pub port: u16,
    pub directory: PathBuf,
    pub data_timeout: Duration,
    pub progress: bool,
}

impl ClientConfig {
    pub fn resolve(args: &ConnectArgs, file: &FileConfig) -> Result<Self, ConfigError> {
        let directory = args
            .directory
            .clone()
            .unwrap_or_else(|| file.client.directory.clone());
        check_directory(&directory)?;

        Ok(Self {
            host: args.host.clone().unwrap_or_else(|| file.client.host.clone()),
            port: args.port.unwrap_or(file.client.port),
            directory,
            data_timeout: Duration::from_secs(
                args.data_timeout.unwrap_or(file.client.data_timeout),
            ),
            progress: file.client.progress && !args.no_progress,
        })
    }
}

/// Command-line level wins over the file's `[logging]` level.
pub fn log_level(cli_level: Option<&str>, file: &FileConfig) -> String {
    cli_level
        .map(str::to_string)
        .unwrap_or_else(|| file.logging.level.clone())
}

fn check_directory(path: &Path) -> Result<(), ConfigError> {
    if path.is_dir() {
        Ok(())
    } else {
        Err(ConfigError::NotADirectory(path.to_path_buf()))
    }
}

/// Configuration loading errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{}': {}", .0.display(), .1)]
    FileRead(PathBuf, #[source] std::io::Error),
    #[error("Failed to parse config file '{}': {}", .0.display(), .1)]
    TomlParse(PathBuf, #[source] toml::de::Error),
    #[error("'{}' is not a directory", .0.display())]
    NotADirectory(PathBuf),
}
