//! Streaming session controller.
//!
//! Drives one request/response turn through
//! `Idle -> Dispatched -> Streaming -> {Completed, Cancelled, Failed}`.
//! Fragments are pulled by the caller at its own pace through a bounded
//! buffer; when the buffer is full the transport is no longer polled.

mod controller;
mod pump;


pub use controller::SessionController;

use palaver_config::schema::SessionConfig;

use crate::token_accountant::DEFAULT_CHARS_PER_TOKEN;
use crate::TokenUsage;

/// Phase of the current turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnPhase {
    Idle,
    Dispatched,
    Streaming,
    Completed,
    Cancelled,
    Failed,
}

impl TurnPhase {
    /// A request is open and owns the session's single turn slot.
    pub fn is_active(self) -> bool {
        matches!(self, TurnPhase::Dispatched | TurnPhase::Streaming)
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TurnPhase::Completed | TurnPhase::Cancelled | TurnPhase::Failed
        )
    }
}

/// Item returned by [`SessionController::next_step`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamStep {
    Fragment(String),
    /// The turn was appended to history at `turn_index`.
    Completed { turn_index: usize, token_count: u64 },
}

/// Result of driving a turn to completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnOutcome {
    pub text: String,
    pub turn_index: usize,
    pub usage: TokenUsage,
}

#[derive(Debug, Clone, Copy)]
pub struct ControllerOptions {
    /// Unread fragments held before the transport stops being polled.
    pub buffer: usize,
    pub chars_per_token: f64,
    /// Share of the remaining budget above which a send is warned about.
    pub warning_ratio: f64,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self {
            buffer: 64,
            chars_per_token: DEFAULT_CHARS_PER_TOKEN,
            warning_ratio: 0.9,
        }
    }
}

impl From<&SessionConfig> for ControllerOptions {
    fn from(config: &SessionConfig) -> Self {
        Self {
            buffer: config.stream_buffer.max(1) as usize,
            chars_per_token: config.chars_per_token,
            warning_ratio: config.budget_warning_ratio,
        }
    }
}
