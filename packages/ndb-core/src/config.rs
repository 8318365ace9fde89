use crate::db::DEFAULT_DB_PATH;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Environment variable name for database path override
const ENV_DB_PATH: &str = "NDB_DB_PATH";

/// Configuration file structure
#[derive(Debug, Deserialize, Default)]
struct ConfigFile {
    database: Option<DatabaseConfig>,
}

#[derive(Debug, Deserialize, Default)]
struct DatabaseConfig {
    /// SQLite file holding the content store and device table
    path: Option<String>,
}

/// Runtime configuration
#[derive(Debug, Clone)]
pub struct NdbConfig {
    pub db_path: PathBuf,
    /// Source of the configuration (for logging)
    pub source: ConfigSource,
}

/// Where the configuration came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSource {
    /// Using default hardcoded values
    Default,
    /// Passed explicitly on the command line
    CommandLine,
    /// Loaded from environment variable
    Environment,
    /// Loaded from config file
    ConfigFile,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigSource::Default => write!(f, "default"),
            ConfigSource::CommandLine => write!(f, "command line"),
            ConfigSource::Environment => write!(f, "environment variable"),
            ConfigSource::ConfigFile => write!(f, "config file"),
        }
    }
}

/// Get the path to the configuration file: `~/.config/ndb/config.toml` on
/// every platform
fn get_config_file_path() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".config").join("ndb").join("config.toml"))
}

fn load_config_file() -> Option<ConfigFile> {
    let path = get_config_file_path()?;

    if !path.exists() {
        return None;
    }

    match fs::read_to_string(&path) {
        Ok(content) => parse_config(&content, &path),
        Err(e) => {
            tracing::warn!("Failed to read config file {:?}: {}", path, e);
            None
        }
    }
}

fn parse_config(content: &str, path: &Path) -> Option<ConfigFile> {
    match toml::from_str(content) {
        Ok(config) => {
            tracing::debug!("Loaded config from {:?}", path);
            Some(config)
        }
        Err(e) => {
            tracing::warn!("Failed to parse config file {:?}: {}", path, e);
            None
        }
    }
}

/// Load configuration with priority:
/// 1. Command line (`--db`)
/// 2. Environment variable (NDB_DB_PATH)
/// 3. Config file (~/.config/ndb/config.toml)
/// 4. Default values
pub fn load_config(cli_path: Option<&Path>) -> NdbConfig {
    resolve(
        cli_path,
        std::env::var(ENV_DB_PATH).ok(),
        // Only read the file when nothing earlier wins
        load_config_file,
    )
}

fn resolve(
    cli_path: Option<&Path>,
    env_path: Option<String>,
    config_file: impl FnOnce() -> Option<ConfigFile>,
) -> NdbConfig {
    if let Some(path) = cli_path {
        return NdbConfig {
            db_path: path.to_path_buf(),
            source: ConfigSource::CommandLine,
        };
    }

    if let Some(path) = env_path {
        let path = path.trim();
        if !path.is_empty() {
            tracing::info!("Using database path from environment variable: {}", path);
            return NdbConfig {
                db_path: PathBuf::from(path),
                source: ConfigSource::Environment,
            };
        }
    }

    let file_path = config_file()
        .and_then(|c| c.database)
        .and_then(|d| d.path)
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty());
    if let Some(path) = file_path {
        tracing::info!("Using database path from config file: {}", path);
        return NdbConfig {
            db_path: PathBuf::from(path),
            source: ConfigSource::ConfigFile,
        };
    }

    tracing::debug!("Using default database path: {}", DEFAULT_DB_PATH);
    NdbConfig {
        db_path: PathBuf::from(DEFAULT_DB_PATH),
        source: ConfigSource::Default,
    }
}

/// Get the path to the config file for documentation purposes
pub fn get_config_file_path_string() -> String {
    get_config_file_path()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "~/.config/ndb/config.toml".to_string())
}

/// Generate example config file content
pub fn generate_example_config() -> String {
    r#"# ndb configuration
# Place this file at: ~/.config/ndb/config.toml

[database]
# SQLite file holding raw records and the device table
# Default: local.db (relative to the working directory)
# path = "/home/me/.local/share/ndb/local.db"
"#
    .to_string()
}
