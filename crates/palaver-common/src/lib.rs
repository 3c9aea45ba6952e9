pub mod errors;
pub mod id;
pub mod types;

pub use errors::{ConfigError, PalaverError};
pub use id::{new_correlation_id, StreamId};
pub use types::{ModelCatalog, TokenBudget, MAX_CANVASES};

pub type Result<T> = std::result::Result<T, PalaverError>;
