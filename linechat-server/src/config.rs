//! Server settings.
//!
//! Each setting is taken from the first source that has it: a command-line
//! flag, its `LINECHAT_*` environment variable, the `[server]` table of
//! `~/.config/linechat/server.toml` (or `--config`), and finally the built-in
//! value.

use std::path::PathBuf;

use linechat_proto::protocol::DEFAULT_PORT;

use crate::session::DEFAULT_MAX_LINE_LENGTH;

/// Why the server settings could not be loaded.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The settings file exists but could not be read.
    #[error("failed to read config file {path}: {source}")]
    ReadFile {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The settings file is not valid TOML for these keys.
    #[error("failed to parse config file: {0}")]
    ParseToml(#[from] toml::de::Error),
}

/// `server.toml`. Every key is optional.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ServerConfigFile {
    server: ServerFileSection,
}

/// `[server]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ServerFileSection {
    bind_addr: Option<String>,
    max_line_length: Option<usize>,
}

/// CLI arguments for the server console.
#[derive(clap::Parser, Debug, Default)]
#[command(version, about = "linechat broadcast chat server")]
pub struct ServerCliArgs {
    /// Address to listen on.
    #[arg(short, long, env = "LINECHAT_ADDR")]
    pub bind: Option<String>,

    /// Path to config file (default: `~/.config/linechat/server.toml`).
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Longest accepted inbound line, in bytes.
    #[arg(long)]
    pub max_line_length: Option<usize>,

    /// Wait for a `start` command instead of listening immediately.
    #[arg(long)]
    pub no_autostart: bool,

    /// Log level filter (trace, debug, info, warn, error).
    #[arg(long, default_value = "info", env = "LINECHAT_LOG")]
    pub log_level: String,
}

/// Settings the server runs with.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind the listener to (e.g., `0.0.0.0:12345`).
    pub bind_addr: String,
    /// Longest accepted inbound line, in bytes.
    pub max_line_length: usize,
    /// Log level filter string.
    pub log_level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: format!("0.0.0.0:{DEFAULT_PORT}"),
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
            log_level: "info".to_string(),
        }
    }
}

impl ServerConfig {
    /// Configuration listening on `bind_addr` with default limits.
    #[must_use]
    pub fn with_bind_addr(bind_addr: impl Into<String>) -> Self {
        Self {
            bind_addr: bind_addr.into(),
            ..Self::default()
        }
    }

    /// Merges `cli` over the settings file.
    ///
    /// A missing `server.toml` in the default location counts as empty; a
    /// missing `--config` file does not.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the settings file cannot be read or parsed.
    pub fn load(cli: &ServerCliArgs) -> Result<Self, ConfigError> {
        let file = load_config_file(cli.config.as_deref())?;
        Ok(Self::resolve(cli, &file))
    }

    /// Flag (or env), then file, then built-in.
    #[must_use]
    fn resolve(cli: &ServerCliArgs, file: &ServerConfigFile) -> Self {
        let defaults = Self::default();

        Self {
            bind_addr: cli
                .bind
                .clone()
                .or_else(|| file.server.bind_addr.clone())
                .unwrap_or(defaults.bind_addr),
            max_line_length: cli
                .max_line_length
                .or(file.server.max_line_length)
                .unwrap_or(defaults.max_line_length),
            log_level: cli.log_level.clone(),
        }
    }
}

fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("linechat").join("server.toml"))
}

fn load_config_file(
    explicit_path: Option<&std::path::Path>,
) -> Result<ServerConfigFile, ConfigError> {
    let (path, required) = match explicit_path {
        Some(path) => (path.to_path_buf(), true),
        None => match default_config_path() {
            Some(path) => (path, false),
            None => return Ok(ServerConfigFile::default()),
        },
    };

    let text = match std::fs::read_to_string(&path) {
        Ok(text) => text,
        Err(e) if !required && e.kind() == std::io::ErrorKind::NotFound => {
            return Ok(ServerConfigFile::default());
        }
        Err(source) => return Err(ConfigError::ReadFile { path, source }),
    };
    Ok(toml::from_str(&text)?)
}
