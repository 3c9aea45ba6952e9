//! Code execution and validation interfaces, and fenced code-block
//! extraction.
//!
//! The execution engine and the linter are external. Their output is
//! rendered as ordinary turn content; a failing program is never an engine
//! error.

use std::sync::LazyLock;

use regex::Regex;

use crate::canvas::{Canvas, CanvasStore};
use crate::{ContentPart, EngineError};

/// Output of one program run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionResult {
    pub stdout: String,
    pub stderr: String,
    pub exit_status: i32,
}

impl ExecutionResult {
    pub fn succeeded(&self) -> bool {
        self.exit_status == 0
    }

    /// Render as text content for the next user turn.
    pub fn to_content(&self, source: &str) -> ContentPart {
        let mut text = format!("### Execution result ({source}, exit {})\n", self.exit_status);
        if !self.stdout.is_empty() {
            text.push_str("stdout:\n```\n");
            text.push_str(self.stdout.trim_end());
            text.push_str("\n```\n");
        }
        if !self.stderr.is_empty() {
            text.push_str("stderr:\n```\n");
            text.push_str(self.stderr.trim_end());
            text.push_str("\n```\n");
        }
        ContentPart::text(text.trim_end())
    }
}

/// External code runner. Synchronous from the caller's point of view.
pub trait CodeExecutor: Send + Sync {
    fn execute(&self, code: &str, language_hint: Option<&str>) -> ExecutionResult;
}

/// Run a canvas through an executor.
pub fn run_canvas(executor: &dyn CodeExecutor, canvas: &Canvas) -> ExecutionResult {
    tracing::debug!(slot = canvas.slot_index, "executing canvas");
    executor.execute(&canvas.content, canvas.language_hint.as_deref())
}

/// Run the canvas in `slot` and render the result as turn content.
pub fn execute_canvas(
    canvases: &CanvasStore,
    slot: usize,
    executor: &dyn CodeExecutor,
) -> Result<ContentPart, EngineError> {
    let canvas = canvases.get(slot).ok_or(EngineError::SlotNotFound { slot })?;
    Ok(run_canvas(executor, canvas).to_content(&canvas.label))
}

/// What a linter found in a piece of code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationReport {
    Clean,
    /// One issue per line, locations relative to the submitted code.
    Issues(String),
    /// The code does not parse, so no issue list was produced.
    SyntaxError(String),
}

/// External linter run over canvas code.
pub trait CodeValidator: Send + Sync {
    fn validate(&self, code: &str, language_hint: Option<&str>) -> ValidationReport;
}

/// Validate the canvas in `slot`. Blank canvases are `Clean` without
/// calling the validator.
pub fn validate_canvas(
    canvases: &CanvasStore,
    slot: usize,
    validator: &dyn CodeValidator,
) -> Result<ValidationReport, EngineError> {
    let canvas = canvases.get(slot).ok_or(EngineError::SlotNotFound { slot })?;
    if canvas.is_empty() {
        return Ok(ValidationReport::Clean);
    }
    tracing::debug!(slot, "validating canvas");
    let report = validator.validate(&canvas.content, canvas.language_hint.as_deref());
    if let ValidationReport::SyntaxError(detail) = &report {
        tracing::warn!(slot, %detail, "canvas has a syntax error");
    }
    Ok(report)
}

/// Request asking the model to analyse a linter report for `canvas`.
///
/// Only a non-empty issue list produces a request.
pub fn validation_request(canvas: &Canvas, report: &ValidationReport) -> Option<ContentPart> {
    let ValidationReport::Issues(issues) = report else {
        return None;
    };
    if canvas.is_empty() || issues.trim().is_empty() {
        return None;
    }
    let language = canvas.language_hint.as_deref().unwrap_or("");
    Some(ContentPart::text(format!(
        "### Validation ({})
Analyse this linter report and suggest fixes:
{}

Code:
```{language}
{}
```",
        canvas.label,
        issues.trim_end(),
        canvas.content.trim_end()
    )))
}

/// A fenced code block found in model output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeBlock {
    pub language: Option<String>,
    pub code: String,
}

impl CodeBlock {
    pub fn run(&self, executor: &dyn CodeExecutor) -> ExecutionResult {
        executor.execute(&self.code, self.language.as_deref())
    }
}

/// Fenced block: optional language tag on the opening line.
static FENCE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```([A-Za-z0-9_+#.-]*)[ \t]*\r?\n(.*?)\r?\n?```")
        .expect("static fence pattern must compile")
});

/// Extract fenced code blocks in order of appearance.
pub fn extract_code_blocks(text: &str) -> Vec<CodeBlock> {
    FENCE_RE
        .captures_iter(text)
        .map(|cap| {
            let language = cap
                .get(1)
                .map(|m| m.as_str())
                .filter(|s| !s.is_empty())
                .map(str::to_string);
            CodeBlock {
                language,
                code: cap.get(2).map(|m| m.as_str()).unwrap_or("").to_string(),
            }
        })
        .collect()
}
