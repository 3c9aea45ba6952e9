//! Full configuration validation.
//!
//! Each section has its own check; this orchestrator calls them all
//! and collects errors into a single `ConfigError`.

mod models;
mod sections;


use crate::schema::PalaverConfig;
use palaver_common::ConfigError;

/// Run all validations on a config, collecting all errors.
pub fn validate(config: &PalaverConfig) -> Result<(), ConfigError> {
    let mut errors: Vec<String> = Vec::new();

    models::validate_models(&mut errors, config);
    sections::validate_session(&mut errors, config);
    sections::validate_archive(&mut errors, config);

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::ValidationError(errors.join("; ")))
    }
}
