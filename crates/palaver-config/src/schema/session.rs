//! Session engine tuning.

use serde::{Deserialize, Serialize};

pub const DEFAULT_SYSTEM_ROLE: &str = "You are a helpful and versatile AI assistant.
Your capabilities include general knowledge, writing and explaining code,
analysing attached documents and images, and running code to analyse data.
When dealing with code, provide clean, efficient and well-commented solutions.";

/// Session engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Role text offered when a chat is started.
    pub system_role: String,
    /// Unread fragments buffered before the stream applies backpressure (1-4096).
    pub stream_buffer: u32,
    /// Characters per token for pre-flight estimates (1.0-16.0).
    pub chars_per_token: f64,
    /// Share of the remaining budget above which a send is warned about (0.1-1.0).
    pub budget_warning_ratio: f64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            system_role: DEFAULT_SYSTEM_ROLE.to_string(),
            stream_buffer: 64,
            chars_per_token: 4.0,
            budget_warning_ratio: 0.9,
        }
    }
}
