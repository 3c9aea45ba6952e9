//! Attachments: referenced source material with memoized text extraction.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::EngineError;

/// Broad class of an attached file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttachmentKind {
    Pdf,
    Image,
    Document,
}

impl AttachmentKind {
    /// Classify by file extension (case-insensitive).
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "png" | "jpg" | "jpeg" | "bmp" | "gif" => Some(AttachmentKind::Image),
            "pdf" => Some(AttachmentKind::Pdf),
            "docx" | "pptx" | "ppt" | "txt" | "md" | "py" | "js" | "json" | "csv" => {
                Some(AttachmentKind::Document)
            }
            _ => None,
        }
    }

    pub fn from_path(path: &Path) -> Result<Self, EngineError> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
            .ok_or_else(|| EngineError::UnsupportedAttachment(path.display().to_string()))
    }
}

/// A piece of source material owned by the session.
///
/// `reference` is an opaque locator, treated as immutable for the session's
/// lifetime; changed content must be attached under a new reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub kind: AttachmentKind,
    pub reference: String,
    pub extracted_text: Option<String>,
}

impl Attachment {
    pub fn new(reference: impl Into<String>, kind: AttachmentKind) -> Self {
        Self {
            kind,
            reference: reference.into(),
            extracted_text: None,
        }
    }
}

/// External text extraction service. Assumed deterministic per reference.
pub trait TextExtractor: Send + Sync {
    fn extract_text(&self, reference: &str, kind: AttachmentKind) -> Result<String, String>;
}

/// Source of raw attachment bytes, used when bundling a session document.
pub trait BlobSource {
    fn read(&self, reference: &str) -> std::io::Result<Vec<u8>>;
}

/// Reads references as filesystem paths.
pub struct FsBlobSource;

impl BlobSource for FsBlobSource {
    fn read(&self, reference: &str) -> std::io::Result<Vec<u8>> {
        std::fs::read(reference)
    }
}
