//! On-disk shape of a session document.

use serde::{Deserialize, Serialize};

use crate::attachments::AttachmentKind;
use crate::canvas::Canvas;
use crate::session::{GenerationSettings, Turn};
use crate::token_accountant::DEFAULT_CHARS_PER_TOKEN;

#[derive(Debug, Serialize, Deserialize)]
pub(super) struct SessionDocument {
    pub version: u64,
    pub model_id: String,
    pub max_context_tokens: u64,
    pub max_output_tokens: u64,
    pub system_role: Option<String>,
    pub history: Vec<Turn>,
    /// Occupied slots only.
    pub canvases: Vec<Canvas>,
    #[serde(default)]
    pub attachments: Vec<AttachmentRecord>,
    pub cumulative_tokens: u64,
    /// Estimator ratio of the token accountant.
    #[serde(default = "default_chars_per_token")]
    pub chars_per_token: f64,
    #[serde(default)]
    pub settings: GenerationSettings,
}

fn default_chars_per_token() -> f64 {
    DEFAULT_CHARS_PER_TOKEN
}

#[derive(Debug, Serialize, Deserialize)]
pub(super) struct AttachmentRecord {
    pub kind: AttachmentKind,
    pub reference: String,
    pub extracted_text: Option<String>,
    /// Source bytes, standard base64. Present only in bundled documents.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bundled: Option<String>,
}
