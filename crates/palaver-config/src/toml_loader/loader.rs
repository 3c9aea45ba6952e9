//! Locating, creating and reading the TOML config file.

use std::ffi::OsString;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use palaver_common::ConfigError;
use tracing::{info, warn};

use super::template::default_config_toml;
use crate::schema::PalaverConfig;
use crate::validation;

/// Environment variable naming a config file to use instead of the default.
pub const CONFIG_ENV_VAR: &str = "PALAVER_CONFIG";

/// Path of the config file: `$PALAVER_CONFIG` when set and non-empty,
/// otherwise `<config_dir>/palaver/config.toml`.
pub fn default_config_path() -> Result<PathBuf, ConfigError> {
    resolve_config_path(std::env::var_os(CONFIG_ENV_VAR), dirs::config_dir())
}

fn resolve_config_path(
    env_override: Option<OsString>,
    config_dir: Option<PathBuf>,
) -> Result<PathBuf, ConfigError> {
    if let Some(path) = env_override.filter(|p| !p.is_empty()) {
        return Ok(PathBuf::from(path));
    }
    let config_dir = config_dir
        .ok_or_else(|| ConfigError::ParseError("could not determine config directory".into()))?;
    Ok(config_dir.join("palaver").join("config.toml"))
}

/// Write the commented default template to `path`.
///
/// A file that already exists is left as it is, so two processes starting
/// at once cannot clobber each other's config.
pub fn create_default_config(path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| {
            ConfigError::ParseError(format!(
                "failed to create config directory {}: {e}",
                parent.display()
            ))
        })?;
    }

    let written = std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .and_then(|mut file| file.write_all(default_config_toml().as_bytes()));
    match written {
        Ok(()) => {
            info!(path = %path.display(), "created default config");
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
            info!(path = %path.display(), "config appeared meanwhile, keeping it");
            Ok(())
        }
        Err(e) => Err(ConfigError::ParseError(format!(
            "failed to write default config to {}: {e}",
            path.display()
        ))),
    }
}

/// Load config from a specific TOML file path.
///
/// Missing fields take their serde defaults. A file that parses but fails
/// validation is reported with a warning and replaced by the defaults.
pub fn load_from_path(path: &Path) -> Result<PalaverConfig, ConfigError> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }
        Err(e) => {
            return Err(ConfigError::ParseError(format!(
                "failed to read {}: {e}",
                path.display()
            )));
        }
    };

    let config: PalaverConfig = toml::from_str(&content)
        .map_err(|e| ConfigError::ParseError(format!("failed to parse TOML: {e}")))?;

    if let Err(e) = validation::validate(&config) {
        warn!(path = %path.display(), error = %e, "invalid config, using defaults");
        return Ok(PalaverConfig::default());
    }

    info!(path = %path.display(), models = config.models.catalog.len(), "loaded config");
    Ok(config)
}

/// Load config from [`default_config_path`], creating the file from the
/// template when it does not exist yet.
pub fn load_default() -> Result<PalaverConfig, ConfigError> {
    let path = default_config_path()?;

    match load_from_path(&path) {
        Err(ConfigError::FileNotFound(_)) => {
            create_default_config(&path)?;
            Ok(PalaverConfig::default())
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_override_wins() {
        let path = resolve_config_path(
            Some(OsString::from("/srv/palaver.toml")),
            Some(PathBuf::from("/home/u/.config")),
        )
        .unwrap();
        assert_eq!(path, PathBuf::from("/srv/palaver.toml"));
    }

    #[test]
    fn empty_override_falls_back_to_config_dir() {
        let path =
            resolve_config_path(Some(OsString::new()), Some(PathBuf::from("/home/u/.config")))
                .unwrap();
        assert_eq!(path, PathBuf::from("/home/u/.config/palaver/config.toml"));
    }

    #[test]
    fn no_config_dir_is_an_error() {
        assert!(matches!(
            resolve_config_path(None, None),
            Err(ConfigError::ParseError(_))
        ));
    }
}
