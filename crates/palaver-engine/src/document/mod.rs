//! Session documents.
//!
//! A session is written as pretty-printed JSON carrying a `version` marker.
//! `import(export(s)) == s` holds for every session; nothing in `Session` is
//! runtime-only. Documents from a newer build are refused outright.
//!
//! Attachments are stored by reference with their cached text. A bundled
//! document also embeds each attachment's bytes as standard base64.

mod schema;

#[cfg(test)]
mod tests;

use std::collections::HashMap;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use palaver_common::TokenBudget;
use tracing::{debug, warn};

use crate::attachments::{Attachment, BlobSource};
use crate::canvas::CanvasStore;
use crate::session::Session;
use crate::token_accountant::TokenAccountant;
use crate::EngineError;

use schema::{AttachmentRecord, SessionDocument};

/// Version written by this build; the newest it can read.
pub const DOCUMENT_VERSION: u64 = 1;

/// Serialize a session, attachments by reference only.
pub fn export(session: &Session) -> Result<String, EngineError> {
    to_json(&to_document(session, None)?)
}

/// Serialize a session with attachment bytes read from `blobs` embedded.
pub fn export_bundled(session: &Session, blobs: &dyn BlobSource) -> Result<String, EngineError> {
    to_json(&to_document(session, Some(blobs))?)
}

/// Rebuild a session. Bundled bytes, if any, are ignored.
pub fn import(document: &str) -> Result<Session, EngineError> {
    from_document(parse(document)?)
}

/// Rebuild a session and decode bundled attachment bytes by reference.
pub fn import_bundled(document: &str) -> Result<(Session, HashMap<String, Vec<u8>>), EngineError> {
    let doc = parse(document)?;
    let mut blobs = HashMap::new();
    for record in &doc.attachments {
        if let Some(encoded) = &record.bundled {
            let bytes = STANDARD.decode(encoded).map_err(|e| {
                EngineError::MalformedDocument(format!(
                    "bundled bytes of '{}' are not valid base64: {e}",
                    record.reference
                ))
            })?;
            blobs.insert(record.reference.clone(), bytes);
        }
    }
    Ok((from_document(doc)?, blobs))
}

fn to_document(
    session: &Session,
    blobs: Option<&dyn BlobSource>,
) -> Result<SessionDocument, EngineError> {
    let attachments = session
        .attachments()
        .iter()
        .map(|a| -> Result<AttachmentRecord, EngineError> {
            let bundled = match blobs {
                Some(source) => Some(STANDARD.encode(source.read(&a.reference)?)),
                None => None,
            };
            Ok(AttachmentRecord {
                kind: a.kind,
                reference: a.reference.clone(),
                extracted_text: a.extracted_text.clone(),
                bundled,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let budget = session.budget();
    Ok(SessionDocument {
        version: DOCUMENT_VERSION,
        model_id: session.model_id().to_string(),
        max_context_tokens: budget.max_context_tokens,
        max_output_tokens: budget.max_output_tokens,
        system_role: session.system_role().map(str::to_string),
        history: session.history().to_vec(),
        canvases: session.canvases().snapshot(),
        attachments,
        cumulative_tokens: session.cumulative_tokens(),
        chars_per_token: session.tokens().chars_per_token(),
        settings: session.settings(),
    })
}

fn to_json(doc: &SessionDocument) -> Result<String, EngineError> {
    serde_json::to_string_pretty(doc)
        .map_err(|e| EngineError::MalformedDocument(format!("failed to serialize session: {e}")))
}

fn parse(document: &str) -> Result<SessionDocument, EngineError> {
    let value: serde_json::Value = serde_json::from_str(document)
        .map_err(|e| EngineError::MalformedDocument(format!("not valid JSON: {e}")))?;
    let version = value
        .get("version")
        .ok_or_else(|| EngineError::MalformedDocument("missing version marker".into()))?
        .as_u64()
        .filter(|v| *v > 0)
        .ok_or_else(|| EngineError::MalformedDocument("version must be a positive integer".into()))?;
    if version > DOCUMENT_VERSION {
        warn!(found = version, supported = DOCUMENT_VERSION, "session document is too new");
        return Err(EngineError::UnsupportedVersion {
            found: version,
            supported: DOCUMENT_VERSION,
        });
    }
    serde_json::from_value(value).map_err(|e| EngineError::MalformedDocument(e.to_string()))
}

fn from_document(doc: SessionDocument) -> Result<Session, EngineError> {
    if doc.model_id.trim().is_empty() {
        return Err(EngineError::MalformedDocument("model_id is empty".into()));
    }

    let mut attachments: Vec<Attachment> = Vec::with_capacity(doc.attachments.len());
    for record in doc.attachments {
        if attachments.iter().any(|a| a.reference == record.reference) {
            return Err(EngineError::MalformedDocument(format!(
                "attachment '{}' appears twice",
                record.reference
            )));
        }
        attachments.push(Attachment {
            kind: record.kind,
            reference: record.reference,
            extracted_text: record.extracted_text,
        });
    }

    let canvases = CanvasStore::restore(doc.canvases)?;
    let budget = TokenBudget::new(doc.max_context_tokens, doc.max_output_tokens);
    let mut tokens = TokenAccountant::with_cumulative(budget, doc.cumulative_tokens);
    tokens.set_chars_per_token(doc.chars_per_token);
    debug!(
        model = %doc.model_id,
        turns = doc.history.len(),
        canvases = canvases.occupied(),
        "session document imported"
    );
    Ok(Session::from_parts(
        doc.system_role.filter(|r| !r.trim().is_empty()),
        doc.model_id,
        doc.history,
        canvases,
        attachments,
        tokens,
        doc.settings,
    ))
}
