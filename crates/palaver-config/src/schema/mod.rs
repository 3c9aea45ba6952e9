//! Configuration schema types for palaver.
//!
//! All structs use `serde(default)` so partial configs work correctly.

mod archive;
mod models;
mod session;
mod system;

pub use archive::*;
pub use models::*;
pub use session::*;
pub use system::*;

use serde::{Deserialize, Serialize};

/// Current config schema version.
pub const CONFIG_SCHEMA_VERSION: u32 = 1;

/// Root configuration.
///
/// Only override what you want to change.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct PalaverConfig {
    pub models: ModelsConfig,
    pub session: SessionConfig,
    pub archive: ArchiveConfig,
    pub logging: LoggingConfig,
}
