//! History entries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{ContentPart, Role, TokenUsage};

/// Reasoning depth requested from the model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReasoningEffort {
    #[default]
    High,
    Low,
}

/// Per-session generation switches, saved with the session and handed to
/// the transport with every payload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationSettings {
    pub reasoning_effort: ReasoningEffort,
    /// Let the model ground answers with web search.
    pub web_search: bool,
    /// Ask for data analysis with plots where it helps.
    pub auto_plot: bool,
    /// Offer every canvas to the model rather than only the first.
    pub multi_canvas: bool,
}

/// One role-tagged entry of conversation history. Immutable once appended.
///
/// A completed exchange is stored as a single assistant turn; `prompt`
/// holds the user input that turn answers. User-role turns only appear in
/// documents written while a reply was still outstanding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: Vec<ContentPart>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub prompt: Vec<ContentPart>,
    pub token_count: u64,
    /// Provider-reported breakdown of `token_count`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<TokenUsage>,
    pub timestamp: DateTime<Utc>,
}

impl Turn {
    pub fn user(content: Vec<ContentPart>) -> Self {
        Self {
            role: Role::User,
            content,
            prompt: Vec::new(),
            token_count: 0,
            usage: None,
            timestamp: Utc::now(),
        }
    }

    pub(crate) fn assistant(prompt: Vec<ContentPart>, text: String, usage: TokenUsage) -> Self {
        Self {
            role: Role::Assistant,
            content: vec![ContentPart::Text { text }],
            prompt,
            token_count: usage.total_tokens(),
            usage: Some(usage),
            timestamp: Utc::now(),
        }
    }

    /// Concatenated text parts of the turn's content.
    pub fn text(&self) -> String {
        text_of(&self.content)
    }

    /// Text of the user side of this exchange.
    pub fn prompt_text(&self) -> String {
        match self.role {
            Role::User => text_of(&self.content),
            Role::Assistant => text_of(&self.prompt),
        }
    }
}

pub(crate) fn text_of(parts: &[ContentPart]) -> String {
    parts
        .iter()
        .filter_map(|part| match part {
            ContentPart::Text { text } => Some(text.as_str()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("\n")
}
