use palaver_common::TokenBudget;

use super::*;
use crate::attachments::{AttachmentKind, FsBlobSource, TextExtractor};
use crate::session::{GenerationSettings, ReasoningEffort, Turn};
use crate::token_accountant::UsageReport;
use crate::{ContentPart, TokenUsage};

struct FixedExtractor;

impl TextExtractor for FixedExtractor {
    fn extract_text(&self, reference: &str, kind: AttachmentKind) -> Result<String, String> {
        match kind {
            AttachmentKind::Image => Err("no text".into()),
            _ => Ok(format!("extracted from {reference}")),
        }
    }
}

fn rich_session() -> Session {
    let mut session = Session::new("gemini-3-flash-preview", TokenBudget::new(1_000_000, 65_536))
        .with_system_role("You are a terse assistant");

    let store = session.canvases_mut();
    for label in ["main", "scratch", "helpers"] {
        store.create(label).unwrap();
    }
    store.edit(0, "print(1)").unwrap();
    store.set_language(0, Some("python".into())).unwrap();
    store.delete(1).unwrap();
    store.edit(2, "def f():\n    return \"quoted\"\n").unwrap();
    store.mark_clean(2).unwrap();

    session.attach("docs/spec.pdf", AttachmentKind::Pdf);
    session.attach("img/chart.png", AttachmentKind::Image);
    session.extract_pending(&FixedExtractor);

    session.append_turn(Turn::assistant(
        vec![ContentPart::text("what does this do?"), ContentPart::canvas(0)],
        "It prints 1.".into(),
        TokenUsage {
            input_tokens: 9,
            output_tokens: 3,
        },
    ));
    session.append_turn(Turn::user(vec![
        ContentPart::text("and this chart?"),
        ContentPart::attachment("img/chart.png"),
    ]));
    session.tokens_mut().record(UsageReport::new(9, 3)).unwrap();
    session.set_chars_per_token(3.5);
    session.set_settings(GenerationSettings {
        reasoning_effort: ReasoningEffort::Low,
        web_search: true,
        auto_plot: false,
        multi_canvas: true,
    });
    session
}

#[test]
fn round_trip_reproduces_session() {
    let session = rich_session();
    let document = export(&session).unwrap();
    let restored = import(&document).unwrap();
    assert_eq!(restored, session);
    assert_eq!(restored.cumulative_tokens(), 12);
    assert!(restored.canvases().get(1).is_none());
    assert!(restored.canvases().get(0).unwrap().edited);
    assert!(!restored.canvases().get(2).unwrap().edited);
    assert_eq!(restored.tokens().chars_per_token(), 3.5);
    assert_eq!(restored.settings().reasoning_effort, ReasoningEffort::Low);
    assert!(restored.settings().web_search && restored.settings().multi_canvas);
}

#[test]
fn document_without_settings_uses_defaults() {
    let mut value: serde_json::Value =
        serde_json::from_str(&export(&rich_session()).unwrap()).unwrap();
    assert_eq!(value["settings"]["reasoning_effort"], "low");
    let object = value.as_object_mut().unwrap();
    object.remove("settings");
    object.remove("chars_per_token");

    let restored = import(&value.to_string()).unwrap();
    assert_eq!(restored.settings(), GenerationSettings::default());
    assert_eq!(restored.settings().reasoning_effort, ReasoningEffort::High);
    assert_eq!(
        restored.tokens().chars_per_token(),
        crate::token_accountant::DEFAULT_CHARS_PER_TOKEN
    );
    assert_eq!(restored.history().len(), 2);
}

#[test]
fn round_trip_of_empty_session() {
    let session = Session::new("gemini-2.0-flash-exp", TokenBudget::new(1_000_000, 8_192));
    assert_eq!(import(&export(&session).unwrap()).unwrap(), session);
}

#[test]
fn export_is_stable_and_inspectable() {
    let session = rich_session();
    let first = export(&session).unwrap();
    assert_eq!(first, export(&session).unwrap());
    assert!(first.lines().count() > 10);

    let value: serde_json::Value = serde_json::from_str(&first).unwrap();
    for field in [
        "version",
        "model_id",
        "system_role",
        "history",
        "canvases",
        "cumulative_tokens",
    ] {
        assert!(value.get(field).is_some(), "missing {field}");
    }
    assert_eq!(value["version"], 1);
    assert_eq!(value["canvases"].as_array().unwrap().len(), 2);
    assert_eq!(value["history"][0]["prompt"][1]["type"], "canvas");
    assert!(value["attachments"][0].get("bundled").is_none());
}

#[test]
fn newer_version_is_refused() {
    let mut value: serde_json::Value =
        serde_json::from_str(&export(&rich_session()).unwrap()).unwrap();
    value["version"] = serde_json::json!(2);
    let err = import(&value.to_string()).unwrap_err();
    assert!(matches!(
        err,
        EngineError::UnsupportedVersion {
            found: 2,
            supported: 1
        }
    ));
}

#[test]
fn missing_or_bad_version_is_malformed() {
    let mut value: serde_json::Value =
        serde_json::from_str(&export(&rich_session()).unwrap()).unwrap();
    value.as_object_mut().unwrap().remove("version");
    assert!(matches!(
        import(&value.to_string()),
        Err(EngineError::MalformedDocument(_))
    ));

    value["version"] = serde_json::json!("1");
    assert!(matches!(
        import(&value.to_string()),
        Err(EngineError::MalformedDocument(_))
    ));

    assert!(matches!(
        import("not json at all"),
        Err(EngineError::MalformedDocument(_))
    ));
}

#[test]
fn missing_required_field_is_malformed() {
    let mut value: serde_json::Value =
        serde_json::from_str(&export(&rich_session()).unwrap()).unwrap();
    value.as_object_mut().unwrap().remove("history");
    let err = import(&value.to_string()).unwrap_err();
    assert!(matches!(err, EngineError::MalformedDocument(ref m) if m.contains("history")));
}

#[test]
fn duplicate_canvas_slot_is_malformed() {
    let mut value: serde_json::Value =
        serde_json::from_str(&export(&rich_session()).unwrap()).unwrap();
    let first = value["canvases"][0].clone();
    value["canvases"].as_array_mut().unwrap().push(first);
    assert!(matches!(
        import(&value.to_string()),
        Err(EngineError::MalformedDocument(_))
    ));
}

#[test]
fn bundled_document_carries_bytes() {
    let dir = tempfile::tempdir().unwrap();
    let pdf = dir.path().join("report.pdf");
    std::fs::write(&pdf, b"%PDF-1.7 binary \x00\xff").unwrap();

    let mut session = Session::new("m", TokenBudget::new(1_000, 100));
    session.attach_path(&pdf).unwrap();
    let reference = session.attachments()[0].reference.clone();

    let document = export_bundled(&session, &FsBlobSource).unwrap();
    assert!(document.contains("\"bundled\""));

    let (restored, blobs) = import_bundled(&document).unwrap();
    assert_eq!(restored, session);
    assert_eq!(blobs[&reference], b"%PDF-1.7 binary \x00\xff".to_vec());

    // Plain import reads the same document and ignores the bytes.
    assert_eq!(import(&document).unwrap(), session);
}

#[test]
fn bundling_unreadable_attachment_fails() {
    let mut session = Session::new("m", TokenBudget::new(1_000, 100));
    session.attach("/nonexistent/palaver/missing.pdf", AttachmentKind::Pdf);
    let err = export_bundled(&session, &FsBlobSource).unwrap_err();
    assert!(matches!(err, EngineError::Io(_)));
}

#[test]
fn corrupt_bundle_is_malformed() {
    let mut session = Session::new("m", TokenBudget::new(1_000, 100));
    session.attach("a.txt", AttachmentKind::Document);
    let mut value: serde_json::Value = serde_json::from_str(&export(&session).unwrap()).unwrap();
    value["attachments"][0]["bundled"] = serde_json::json!("***not base64***");
    let err = import_bundled(&value.to_string()).unwrap_err();
    assert!(matches!(err, EngineError::MalformedDocument(_)));
}
