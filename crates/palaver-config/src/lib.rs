//! palaver configuration system.
//!
//! Provides TOML-based configuration with full validation. All sections use
//! sensible defaults so partial configs work out of the box. The model table
//! is turned into a typed [`palaver_common::ModelCatalog`] at load time.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use palaver_config::load_config;
//!
//! let config = load_config().expect("failed to load config");
//! let catalog = config.models.catalog().expect("invalid catalog");
//! println!("default model: {}", catalog.default_model());
//! ```

pub mod schema;
pub mod toml_loader;
pub mod validation;

pub use schema::{PalaverConfig, CONFIG_SCHEMA_VERSION};

use palaver_common::ConfigError;
use std::path::Path;

/// Load config from the platform default path and validate it.
pub fn load_config() -> Result<PalaverConfig, ConfigError> {
    let config = toml_loader::load_default()?;
    validation::validate(&config)?;
    Ok(config)
}

/// Load config from an explicit path and validate it.
pub fn load_config_from(path: &Path) -> Result<PalaverConfig, ConfigError> {
    let config = toml_loader::load_from_path(path)?;
    validation::validate(&config)?;
    Ok(config)
}

/// Serialize a config to a pretty-printed JSON string.
pub fn config_to_json(config: &PalaverConfig) -> String {
    serde_json::to_string_pretty(config)
        .unwrap_or_else(|e| format!("{{\"error\": \"failed to serialize config: {e}\"}}"))
}
