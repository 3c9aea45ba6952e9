//! Conversation session state.
//!
//! A `Session` owns the role definition, model selection, history, canvas
//! store, attachments and token accounting of one conversation. It is a plain
//! value: durability comes only from exporting it as a session document.

mod manager;
mod types;


pub use manager::Session;
pub use types::{GenerationSettings, ReasoningEffort, Turn};
