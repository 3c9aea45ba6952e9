//! Session struct and conversation management.

use std::path::Path;

use palaver_common::{ModelCatalog, TokenBudget};
use tracing::{debug, info, warn};

use crate::attachments::{Attachment, AttachmentKind, TextExtractor};
use crate::canvas::CanvasStore;
use crate::token_accountant::TokenAccountant;
use crate::{ContentPart, EngineError, Role, TokenUsage};

use super::types::{GenerationSettings, Turn};

/// A conversation with its context material and token accounting.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    system_role: Option<String>,
    model_id: String,
    history: Vec<Turn>,
    canvases: CanvasStore,
    /// In addition order.
    attachments: Vec<Attachment>,
    tokens: TokenAccountant,
    settings: GenerationSettings,
}

impl Session {
    pub fn new(model_id: impl Into<String>, budget: TokenBudget) -> Self {
        Self {
            system_role: None,
            model_id: model_id.into(),
            history: Vec::new(),
            canvases: CanvasStore::new(),
            attachments: Vec::new(),
            tokens: TokenAccountant::new(budget),
            settings: GenerationSettings::default(),
        }
    }

    /// Start a chat with the given role on `model_id`, or the catalog default.
    pub fn start(
        system_role: Option<String>,
        catalog: &ModelCatalog,
        model_id: Option<&str>,
    ) -> Result<Self, EngineError> {
        let model_id = model_id.unwrap_or_else(|| catalog.default_model());
        let budget = catalog
            .budget(model_id)
            .ok_or_else(|| EngineError::UnknownModel(model_id.to_string()))?;
        let mut session = Self::new(model_id, budget);
        session.set_system_role(system_role);
        info!(model = %session.model_id, "chat started");
        Ok(session)
    }

    pub fn with_system_role(mut self, role: impl Into<String>) -> Self {
        self.set_system_role(Some(role.into()));
        self
    }

    pub(crate) fn from_parts(
        system_role: Option<String>,
        model_id: String,
        history: Vec<Turn>,
        canvases: CanvasStore,
        attachments: Vec<Attachment>,
        tokens: TokenAccountant,
        settings: GenerationSettings,
    ) -> Self {
        Self {
            system_role,
            model_id,
            history,
            canvases,
            attachments,
            tokens,
            settings,
        }
    }

    // -- role and model --

    pub fn system_role(&self) -> Option<&str> {
        self.system_role.as_deref()
    }

    /// Blank role text is stored as no role.
    pub fn set_system_role(&mut self, role: Option<String>) {
        self.system_role = role.filter(|r| !r.trim().is_empty());
    }

    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    pub fn budget(&self) -> TokenBudget {
        self.tokens.budget()
    }

    /// Swap to another catalog model. Cumulative usage carries over.
    pub fn switch_model(&mut self, model_id: &str, catalog: &ModelCatalog) -> Result<(), EngineError> {
        let budget = catalog
            .budget(model_id)
            .ok_or_else(|| EngineError::UnknownModel(model_id.to_string()))?;
        debug!(from = %self.model_id, to = %model_id, "switching model");
        self.model_id = model_id.to_string();
        self.tokens.set_budget(budget);
        Ok(())
    }

    pub fn settings(&self) -> GenerationSettings {
        self.settings
    }

    pub fn set_settings(&mut self, settings: GenerationSettings) {
        debug!(?settings, "generation settings changed");
        self.settings = settings;
    }

    // -- history --

    pub fn history(&self) -> &[Turn] {
        &self.history
    }

    pub fn turn(&self, index: usize) -> Result<&Turn, EngineError> {
        self.history.get(index).ok_or(EngineError::TurnNotFound {
            index,
            len: self.history.len(),
        })
    }

    /// Only the streaming controller appends to history.
    pub(crate) fn append_turn(&mut self, turn: Turn) -> usize {
        self.history.push(turn);
        self.history.len() - 1
    }

    /// Keep the first `len` turns, dropping the rest.
    pub fn truncate_history(&mut self, len: usize) -> Result<(), EngineError> {
        if len > self.history.len() {
            return Err(EngineError::TurnNotFound {
                index: len,
                len: self.history.len(),
            });
        }
        debug!(from = self.history.len(), to = len, "truncating history");
        self.history.truncate(len);
        Ok(())
    }

    /// Pop a trailing unanswered user turn and return its content as a draft.
    pub fn recover_interrupted(&mut self) -> Option<Vec<ContentPart>> {
        if self.history.last()?.role != Role::User {
            return None;
        }
        let turn = self.history.pop()?;
        info!(remaining = self.history.len(), "recovered interrupted prompt");
        Some(turn.content)
    }

    /// Completed request/response exchanges.
    pub fn exchange_count(&self) -> usize {
        self.history
            .iter()
            .filter(|t| t.role == Role::Assistant)
            .count()
    }

    /// Usage of the most recent completed exchange.
    pub fn last_usage(&self) -> Option<TokenUsage> {
        self.history.iter().rev().find_map(|t| t.usage)
    }

    /// Short title taken from the first user prompt in history.
    pub fn title(&self) -> Option<String> {
        self.history
            .iter()
            .map(Turn::prompt_text)
            .find(|text| !text.trim().is_empty())
            .map(|text| text.trim().to_string())
    }

    // -- canvases --

    pub fn canvases(&self) -> &CanvasStore {
        &self.canvases
    }

    pub fn canvases_mut(&mut self) -> &mut CanvasStore {
        &mut self.canvases
    }

    // -- attachments --

    pub fn attachments(&self) -> &[Attachment] {
        &self.attachments
    }

    pub fn attachment(&self, reference: &str) -> Option<&Attachment> {
        self.attachments.iter().find(|a| a.reference == reference)
    }

    /// Attach material by reference. Re-attaching a known reference is a no-op,
    /// keeping any text already extracted for it.
    pub fn attach(&mut self, reference: impl Into<String>, kind: AttachmentKind) {
        let reference = reference.into();
        if self.attachment(&reference).is_some() {
            debug!(reference = %reference, "already attached");
            return;
        }
        debug!(reference = %reference, ?kind, "attachment added");
        self.attachments.push(Attachment::new(reference, kind));
    }

    /// Attach a file, classifying it by extension.
    pub fn attach_path(&mut self, path: &Path) -> Result<AttachmentKind, EngineError> {
        let kind = AttachmentKind::from_path(path)?;
        self.attach(path.to_string_lossy().into_owned(), kind);
        Ok(kind)
    }

    pub fn detach(&mut self, reference: &str) -> Result<Attachment, EngineError> {
        let index = self
            .attachments
            .iter()
            .position(|a| a.reference == reference)
            .ok_or_else(|| EngineError::AttachmentNotFound {
                reference: reference.to_string(),
            })?;
        Ok(self.attachments.remove(index))
    }

    /// Extract text for attachments that have none yet. Returns how many
    /// were extracted. Cached text is never recomputed.
    pub fn extract_pending(&mut self, extractor: &dyn TextExtractor) -> usize {
        let mut extracted = 0;
        for attachment in self
            .attachments
            .iter_mut()
            .filter(|a| a.extracted_text.is_none())
        {
            match extractor.extract_text(&attachment.reference, attachment.kind) {
                Ok(text) => {
                    attachment.extracted_text = Some(text);
                    extracted += 1;
                }
                Err(e) => {
                    warn!(reference = %attachment.reference, error = %e, "text extraction failed");
                }
            }
        }
        extracted
    }

    // -- tokens --

    pub fn tokens(&self) -> &TokenAccountant {
        &self.tokens
    }

    pub(crate) fn tokens_mut(&mut self) -> &mut TokenAccountant {
        &mut self.tokens
    }

    pub fn cumulative_tokens(&self) -> u64 {
        self.tokens.cumulative_tokens()
    }

    pub fn remaining(&self) -> u64 {
        self.tokens.remaining()
    }

    /// Characters per token used by this session's pre-flight estimates.
    pub fn set_chars_per_token(&mut self, chars_per_token: f64) {
        self.tokens.set_chars_per_token(chars_per_token);
    }
}
