//! Session engine for palaver.
//!
//! Drives a multi-turn conversation with a hosted model:
//! - Canvas store of up to twenty editable code buffers
//! - Token accounting against a per-model context budget
//! - Deterministic context assembly
//! - Cancellable, consumer-paced streaming turns
//! - Lossless session documents and an on-disk archive

pub mod archive;
pub mod assembler;
pub mod attachments;
pub mod canvas;
pub mod document;
pub mod execution;
pub mod session;
pub mod streaming;
pub mod token_accountant;
pub mod transport;

use serde::{Deserialize, Serialize};

pub use archive::SessionArchive;
pub use assembler::{ContextAssembler, Payload, Segment, SegmentKind};
pub use attachments::{Attachment, AttachmentKind, BlobSource, FsBlobSource, TextExtractor};
pub use canvas::{Canvas, CanvasStore};
pub use document::{export, export_bundled, import, import_bundled, DOCUMENT_VERSION};
pub use execution::{
    execute_canvas, extract_code_blocks, validate_canvas, validation_request, CodeBlock,
    CodeExecutor, CodeValidator, ExecutionResult, ValidationReport,
};
pub use session::{GenerationSettings, ReasoningEffort, Session, Turn};
pub use streaming::{ControllerOptions, SessionController, StreamStep, TurnOutcome, TurnPhase};
pub use token_accountant::{TokenAccountant, UsageReport};
pub use transport::{ModelTransport, OpenedStream, TransportError, TransportEvent};

/// Who produced a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One piece of turn content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    Attachment { reference: String },
    Canvas { slot: usize },
}

impl ContentPart {
    pub fn text(text: impl Into<String>) -> Self {
        ContentPart::Text { text: text.into() }
    }

    pub fn attachment(reference: impl Into<String>) -> Self {
        ContentPart::Attachment {
            reference: reference.into(),
        }
    }

    pub fn canvas(slot: usize) -> Self {
        ContentPart::Canvas { slot }
    }
}

/// Provider-confirmed token usage of one exchange.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl TokenUsage {
    pub fn total_tokens(&self) -> u64 {
        self.input_tokens.saturating_add(self.output_tokens)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("canvas capacity exceeded: all {capacity} slots are occupied")]
    CapacityExceeded { capacity: usize },

    #[error("canvas slot {slot} not found")]
    SlotNotFound { slot: usize },

    #[error("turn {index} not found (history has {len} turns)")]
    TurnNotFound { index: usize, len: usize },

    #[error("attachment '{reference}' not found")]
    AttachmentNotFound { reference: String },

    #[error("unsupported attachment type: {0}")]
    UnsupportedAttachment(String),

    #[error(
        "token budget exceeded: payload needs ~{estimated} tokens, \
         {remaining} of {max_context} remain"
    )]
    BudgetExceeded {
        estimated: u64,
        remaining: u64,
        max_context: u64,
    },

    #[error("session is busy ({phase:?}); only one turn may be active")]
    SessionBusy { phase: TurnPhase },

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("stream failed after {} chars: {}", .partial.len(), .message)]
    StreamFailed { message: String, partial: String },

    #[error("usage report rejected: {0}")]
    UsageViolation(String),

    #[error("unknown model '{0}'")]
    UnknownModel(String),

    #[error("session document version {found} is newer than supported version {supported}")]
    UnsupportedVersion { found: u64, supported: u64 },

    #[error("malformed session document: {0}")]
    MalformedDocument(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<EngineError> for palaver_common::PalaverError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Io(e) => palaver_common::PalaverError::Io(e),
            e @ (EngineError::UnsupportedVersion { .. } | EngineError::MalformedDocument(_)) => {
                palaver_common::PalaverError::Document(e.to_string())
            }
            e => palaver_common::PalaverError::Engine(e.to_string()),
        }
    }
}
