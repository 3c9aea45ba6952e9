//! Canvas store: up to [`MAX_CANVASES`] independently editable code buffers.
//!
//! Slots are pre-allocated. A slot index identifies a canvas for as long as
//! it exists, even across relabels; after `delete` the index may be reused.

use palaver_common::MAX_CANVASES;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::EngineError;

/// A named code buffer supplied to the model as context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Canvas {
    pub slot_index: usize,
    pub label: String,
    pub content: String,
    pub language_hint: Option<String>,
    /// Set by edits; cleared with [`CanvasStore::mark_clean`].
    pub edited: bool,
}

impl Canvas {
    fn new(slot_index: usize, label: String) -> Self {
        Self {
            slot_index,
            label,
            content: String::new(),
            language_hint: None,
            edited: false,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.content.trim().is_empty()
    }

    /// Text of a request asking the model to review this canvas.
    pub fn review_request(&self) -> String {
        format!(
            "### Reference Code ({})\nPlease review this code and suggest improvements.",
            self.label
        )
    }
}

/// Ordered, fixed-capacity collection of canvases.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanvasStore {
    slots: Vec<Option<Canvas>>,
}

impl CanvasStore {
    pub fn new() -> Self {
        Self {
            slots: vec![None; MAX_CANVASES],
        }
    }

    /// Create an empty canvas in the lowest free slot.
    pub fn create(&mut self, label: impl Into<String>) -> Result<usize, EngineError> {
        let slot = self
            .slots
            .iter()
            .position(Option::is_none)
            .ok_or(EngineError::CapacityExceeded {
                capacity: MAX_CANVASES,
            })?;
        self.slots[slot] = Some(Canvas::new(slot, label.into()));
        debug!(slot, "canvas created");
        Ok(slot)
    }

    /// Replace a canvas's content.
    pub fn edit(&mut self, slot: usize, content: impl Into<String>) -> Result<(), EngineError> {
        let canvas = self.get_mut(slot)?;
        canvas.content = content.into();
        canvas.edited = true;
        Ok(())
    }

    /// Free a slot, returning the canvas that occupied it.
    pub fn delete(&mut self, slot: usize) -> Result<Canvas, EngineError> {
        let canvas = self
            .slots
            .get_mut(slot)
            .and_then(Option::take)
            .ok_or(EngineError::SlotNotFound { slot })?;
        debug!(slot, "canvas deleted");
        Ok(canvas)
    }

    /// Reset a canvas to empty content, keeping its label and hint.
    pub fn clear(&mut self, slot: usize) -> Result<(), EngineError> {
        self.edit(slot, String::new())
    }

    pub fn relabel(&mut self, slot: usize, label: impl Into<String>) -> Result<(), EngineError> {
        self.get_mut(slot)?.label = label.into();
        Ok(())
    }

    pub fn set_language(&mut self, slot: usize, hint: Option<String>) -> Result<(), EngineError> {
        self.get_mut(slot)?.language_hint = hint;
        Ok(())
    }

    pub fn mark_clean(&mut self, slot: usize) -> Result<(), EngineError> {
        self.get_mut(slot)?.edited = false;
        Ok(())
    }

    pub fn get(&self, slot: usize) -> Option<&Canvas> {
        self.slots.get(slot).and_then(Option::as_ref)
    }

    /// Occupied canvases ordered by slot index.
    pub fn snapshot(&self) -> Vec<Canvas> {
        self.iter().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Canvas> {
        self.slots.iter().flatten()
    }

    pub fn occupied(&self) -> usize {
        self.iter().count()
    }

    /// Rebuild a store from canvases read back from a document.
    pub(crate) fn restore(canvases: Vec<Canvas>) -> Result<Self, EngineError> {
        let mut store = Self::new();
        for canvas in canvases {
            let slot = canvas.slot_index;
            let entry = store.slots.get_mut(slot).ok_or_else(|| {
                EngineError::MalformedDocument(format!(
                    "canvas slot {slot} is outside 0..{MAX_CANVASES}"
                ))
            })?;
            if entry.is_some() {
                return Err(EngineError::MalformedDocument(format!(
                    "canvas slot {slot} appears twice"
                )));
            }
            *entry = Some(canvas);
        }
        Ok(store)
    }

    fn get_mut(&mut self, slot: usize) -> Result<&mut Canvas, EngineError> {
        self.slots
            .get_mut(slot)
            .and_then(Option::as_mut)
            .ok_or(EngineError::SlotNotFound { slot })
    }
}

impl Default for CanvasStore {
    fn default() -> Self {
        Self::new()
    }
}
