//! Where to connect and what to answer the name prompt with.
//!
//! Flags and their `LINECHAT_*` variables win over the `[client]` table of
//! `~/.config/linechat/client.toml`, which wins over the built-in values.
//! Only a file named with `--config` has to exist.

use std::path::PathBuf;

use linechat_proto::protocol::DEFAULT_PORT;

/// Why the client settings could not be loaded.
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

/// `client.toml`. Every key is optional.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ConfigFile {
    client: ClientFileSection,
}

/// `[client]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ClientFileSection {
    host: Option<String>,
    port: Option<u16>,
    name: Option<String>,
}

/// Connection settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Server host name or address.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Name sent in reply to the server's prompt. `None` leaves naming to
    /// the user.
    pub name: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            name: None,
        }
    }
}

impl ClientConfig {
    /// Merges `cli` over the settings file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the settings file cannot be read or parsed.
    pub fn load(cli: &CliArgs) -> Result<Self, ConfigError> {
        let file = load_config_file(cli.config.as_deref())?;
        Ok(Self::resolve(cli, &file))
    }

    #[must_use]
    fn resolve(cli: &CliArgs, file: &ConfigFile) -> Self {
        let defaults = Self::default();

        Self {
            host: cli
                .host
                .clone()
                .or_else(|| file.client.host.clone())
                .unwrap_or(defaults.host),
            port: cli.port.or(file.client.port).unwrap_or(defaults.port),
            name: cli.name.clone().or_else(|| file.client.name.clone()),
        }
    }

    /// `host:port` string to connect to.
    #[must_use]
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Command line of the `linechat` binary.
#[derive(clap::Parser, Debug, Default)]
#[command(version, about = "Terminal client for linechat")]
pub struct CliArgs {
    /// Server host.
    #[arg(long, env = "LINECHAT_HOST")]
    pub host: Option<String>,

    /// Server port.
    #[arg(short, long, env = "LINECHAT_PORT")]
    pub port: Option<u16>,

    /// Name to answer the server's prompt with.
    #[arg(short, long, env = "LINECHAT_NAME")]
    pub name: Option<String>,

    /// Path to config file (default: `~/.config/linechat/client.toml`).
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Log file path (default: `<tmp>/linechat.log`).
    #[arg(long, env = "LINECHAT_LOG_FILE")]
    pub log_file: Option<PathBuf>,

    /// Log level filter (trace, debug, info, warn, error).
    #[arg(long, default_value = "info", env = "LINECHAT_LOG")]
    pub log_level: String,
}

fn load_config_file(explicit_path: Option<&std::path::Path>) -> Result<ConfigFile, ConfigError> {
    let text = if let Some(path) = explicit_path {
        std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFile {
            path: path.to_path_buf(),
            source,
        })?
    } else {
        let Some(path) = dirs::config_dir().map(|d| d.join("linechat").join("client.toml"))
        else {
            return Ok(ConfigFile::default());
        };
        match std::fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(ConfigFile::default()),
            Err(source) => return Err(ConfigError::ReadFile { path, source }),
        }
    };
    Ok(toml::from_str(&text)?)
}
