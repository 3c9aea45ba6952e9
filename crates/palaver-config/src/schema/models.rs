//! Model catalog configuration.

use palaver_common::{ConfigError, ModelCatalog, TokenBudget};
use serde::{Deserialize, Serialize};

/// One selectable model and its limits.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ModelEntry {
    pub id: String,
    pub max_context_tokens: u64,
    pub max_output_tokens: u64,
}

impl ModelEntry {
    fn new(id: &str, max_context_tokens: u64, max_output_tokens: u64) -> Self {
        Self {
            id: id.to_string(),
            max_context_tokens,
            max_output_tokens,
        }
    }
}

/// Model selection configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelsConfig {
    pub default_model: String,
    pub catalog: Vec<ModelEntry>,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            default_model: "gemini-3-pro-preview".to_string(),
            catalog: vec![
                ModelEntry::new("gemini-3-pro-preview", 1_000_000, 65_536),
                ModelEntry::new("gemini-3-flash-preview", 1_000_000, 65_536),
                ModelEntry::new("gemini-2.0-flash-exp", 1_000_000, 8_192),
            ],
        }
    }
}

impl ModelsConfig {
    /// Build the typed catalog used by the engine.
    pub fn catalog(&self) -> Result<ModelCatalog, ConfigError> {
        let entries = self.catalog.iter().map(|m| {
            (
                m.id.clone(),
                TokenBudget::new(m.max_context_tokens, m.max_output_tokens),
            )
        });
        ModelCatalog::new(self.default_model.clone(), entries).ok_or_else(|| {
            ConfigError::ValidationError(format!(
                "models.default_model '{}' is not in models.catalog",
                self.default_model
            ))
        })
    }
}
