//! Configuration file parsing and discovery

use crate::config::types::Config;
use crate::error::{ConfigError, ConfigResult};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Default configuration file names to search for
const CONFIG_FILE_NAMES: &[&str] = &["assetflow.yml", "assetflow.yaml"];

/// Environment file loaded from the configuration directory
const ENV_FILE_NAME: &str = ".env";

/// Find the configuration file by searching current and parent directories
pub fn find_config_file() -> ConfigResult<PathBuf> {
    find_config_file_from(env::current_dir().map_err(|e| {
        ConfigError::Invalid(format!("Failed to get current directory: {}", e))
    })?)
}

/// Find the configuration file starting from a specific directory
pub fn find_config_file_from(start_dir: PathBuf) -> ConfigResult<PathBuf> {
    let mut current_dir = start_dir;
    let mut searched_paths = Vec::new();

    loop {
        for file_name in CONFIG_FILE_NAMES {
            let config_path = current_dir.join(file_name);
            searched_paths.push(config_path.display().to_string());

            if config_path.is_file() {
                return Ok(config_path);
            }
        }

        // Try parent directory
        match current_dir.parent() {
            Some(parent) => current_dir = parent.to_path_buf(),
            None => {
                // Reached root without finding config
                return Err(ConfigError::NotFound(searched_paths.join(", ")));
            }
        }
    }
}

/// Parse a configuration file from a path
pub fn parse_config_file(path: &Path) -> ConfigResult<Config> {
    let contents = fs::read_to_string(path).map_err(|e| ConfigError::Load {
        path: path.to_path_buf(),
        error: e.to_string(),
    })?;

    parse_config(&contents).map_err(|e| match e {
        ConfigError::Load { error, .. } => ConfigError::Load {
            path: path.to_path_buf(),
            error,
        },
        other => other,
    })
}

/// Parse configuration from a string
pub fn parse_config(yaml: &str) -> ConfigResult<Config> {
    serde_yaml::from_str(yaml).map_err(|e| ConfigError::Load {
        path: PathBuf::from("<string>"),
        error: e.to_string(),
    })
}

/// Load `.env` from the configuration directory if present
///
/// Variables already set in the process environment are kept.
pub fn load_env_file(config_dir: &Path) -> ConfigResult<()> {
    let env_path = config_dir.join(ENV_FILE_NAME);
    if !env_path.is_file() {
        return Ok(());
    }

    dotenvy::from_path(&env_path).map_err(|e| ConfigError::Load {
        path: env_path.clone(),
        error: e.to_string(),
    })?;
    debug!(path = %env_path.display(), "loaded environment file");

    Ok(())
}
