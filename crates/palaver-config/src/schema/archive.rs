//! Saved-session archive configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Where and when session documents are written.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchiveConfig {
    /// Override for the archive directory; defaults to `<data_dir>/palaver/sessions`.
    pub directory: Option<PathBuf>,
    pub auto_save: bool,
    /// Completed exchanges required before auto-save writes anything (1-100).
    pub min_exchanges: u32,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            directory: None,
            auto_save: true,
            min_exchanges: 2,
        }
    }
}

impl ArchiveConfig {
    /// Resolve the archive directory, falling back to the platform data dir.
    pub fn resolved_directory(&self) -> Option<PathBuf> {
        self.directory
            .clone()
            .or_else(|| dirs::data_dir().map(|d| d.join("palaver").join("sessions")))
    }
}
