//! Context assembly: turns session state plus pending input into the ordered
//! payload sent to the model.
//!
//! Order is fixed: system role, history (oldest first), non-empty canvases
//! by slot, attachment text in addition order, then the pending input.
//! Assembly never truncates; an over-budget payload is an error and trimming
//! history is left to the caller.

use tracing::debug;

use crate::session::{GenerationSettings, Session};
use crate::{ContentPart, EngineError, Role};

/// What a payload segment was built from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SegmentKind {
    SystemRole,
    Turn { role: Role },
    Canvas { slot: usize, label: String },
    Attachment { reference: String },
    UserInput,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub kind: SegmentKind,
    pub text: String,
}

/// Fully assembled, ordered input for one model request.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Payload {
    segments: Vec<Segment>,
    settings: GenerationSettings,
}

impl Payload {
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Generation switches of the session the payload was built from.
    pub fn settings(&self) -> GenerationSettings {
        self.settings
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Flatten to a single text document with a header per segment.
    pub fn render(&self) -> String {
        self.segments
            .iter()
            .map(render_segment)
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// Character count of the rendered payload.
    pub fn char_count(&self) -> usize {
        self.render().chars().count()
    }

    fn push(&mut self, kind: SegmentKind, text: String) {
        self.segments.push(Segment { kind, text });
    }
}

fn render_segment(segment: &Segment) -> String {
    match &segment.kind {
        SegmentKind::SystemRole => format!("[system]\n{}", segment.text),
        SegmentKind::Turn { role: Role::User } | SegmentKind::UserInput => {
            format!("[user]\n{}", segment.text)
        }
        SegmentKind::Turn {
            role: Role::Assistant,
        } => format!("[assistant]\n{}", segment.text),
        SegmentKind::Canvas { slot, label } => {
            format!("[canvas {slot}: {label}]\n```\n{}\n```", segment.text)
        }
        SegmentKind::Attachment { reference } => {
            format!("[attachment: {reference}]\n{}", segment.text)
        }
    }
}

/// Builds payloads. Stateless: output depends on nothing but the session
/// and the input.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContextAssembler;

impl ContextAssembler {
    pub fn new() -> Self {
        Self
    }

    /// Assemble the payload for `input`.
    ///
    /// References in `input` must resolve: an unknown canvas slot is
    /// `SlotNotFound`, an unknown attachment is `AttachmentNotFound`.
    /// The budget check uses the session's token accountant estimate.
    pub fn assemble(&self, session: &Session, input: &[ContentPart]) -> Result<Payload, EngineError> {
        let pending = render_input(session, input)?;
        let mut payload = Payload {
            settings: session.settings(),
            ..Payload::default()
        };

        if let Some(role) = session.system_role() {
            payload.push(SegmentKind::SystemRole, role.to_string());
        }

        for turn in session.history() {
            if turn.role == Role::Assistant && !turn.prompt.is_empty() {
                payload.push(
                    SegmentKind::Turn { role: Role::User },
                    render_parts(session, &turn.prompt),
                );
            }
            payload.push(
                SegmentKind::Turn { role: turn.role },
                render_parts(session, &turn.content),
            );
        }

        for canvas in session.canvases().iter().filter(|c| !c.is_empty()) {
            payload.push(
                SegmentKind::Canvas {
                    slot: canvas.slot_index,
                    label: canvas.label.clone(),
                },
                canvas.content.clone(),
            );
        }

        for attachment in session.attachments() {
            if let Some(text) = &attachment.extracted_text {
                payload.push(
                    SegmentKind::Attachment {
                        reference: attachment.reference.clone(),
                    },
                    text.clone(),
                );
            }
        }

        if !pending.is_empty() {
            payload.push(SegmentKind::UserInput, pending);
        }

        let estimated = session.tokens().estimate(&payload);
        let remaining = session.remaining();
        if estimated > remaining {
            return Err(EngineError::BudgetExceeded {
                estimated,
                remaining,
                max_context: session.budget().max_context_tokens,
            });
        }
        debug!(
            segments = payload.segments.len(),
            estimated,
            remaining,
            "payload assembled"
        );
        Ok(payload)
    }
}

fn render_input(session: &Session, input: &[ContentPart]) -> Result<String, EngineError> {
    for part in input {
        match part {
            ContentPart::Canvas { slot } if session.canvases().get(*slot).is_none() => {
                return Err(EngineError::SlotNotFound { slot: *slot });
            }
            ContentPart::Attachment { reference } if session.attachment(reference).is_none() => {
                return Err(EngineError::AttachmentNotFound {
                    reference: reference.clone(),
                });
            }
            _ => {}
        }
    }
    Ok(render_parts(session, input))
}

/// Render content parts. References that no longer resolve (a canvas
/// deleted since the turn was recorded) fall back to their raw locator.
fn render_parts(session: &Session, parts: &[ContentPart]) -> String {
    parts
        .iter()
        .map(|part| match part {
            ContentPart::Text { text } => text.clone(),
            ContentPart::Attachment { reference } => format!("[Attachment: {reference}]"),
            ContentPart::Canvas { slot } => match session.canvases().get(*slot) {
                Some(canvas) => format!("[Canvas: {}]", canvas.label),
                None => format!("[Canvas slot {slot}]"),
            },
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use palaver_common::TokenBudget;

    use super::*;
    use crate::attachments::{AttachmentKind, TextExtractor};
    use crate::session::Turn;
    use crate::TokenUsage;

    struct SkipImages;

    impl TextExtractor for SkipImages {
        fn extract_text(&self, reference: &str, kind: AttachmentKind) -> Result<String, String> {
            match kind {
                AttachmentKind::Image => Err("no text layer".into()),
                _ => Ok(format!("text {reference}")),
            }
        }
    }

    fn scenario_session() -> Session {
        let mut session = Session::new("gemini-3-pro-preview", TokenBudget::new(1_000_000, 65_536))
            .with_system_role("You are a terse assistant");
        let slot = session.canvases_mut().create("Canvas-1").unwrap();
        session.canvases_mut().edit(slot, "print(1)").unwrap();
        session
    }

    fn kinds(payload: &Payload) -> Vec<SegmentKind> {
        payload.segments().iter().map(|s| s.kind.clone()).collect()
    }

    #[test]
    fn role_then_canvas_then_input() {
        let session = scenario_session();
        let payload = ContextAssembler::default()
            .assemble(&session, &[ContentPart::text("what does this do?")])
            .unwrap();

        assert_eq!(
            kinds(&payload),
            vec![
                SegmentKind::SystemRole,
                SegmentKind::Canvas {
                    slot: 0,
                    label: "Canvas-1".into()
                },
                SegmentKind::UserInput,
            ]
        );
        let texts: Vec<&str> = payload.segments().iter().map(|s| s.text.as_str()).collect();
        assert_eq!(
            texts,
            vec!["You are a terse assistant", "print(1)", "what does this do?"]
        );
    }

    #[test]
    fn repeated_assembly_is_byte_identical() {
        let mut session = scenario_session();
        session.attach("notes.txt", AttachmentKind::Document);
        let input = [ContentPart::text("again?"), ContentPart::canvas(0)];
        let assembler = ContextAssembler::default();
        let first = assembler.assemble(&session, &input).unwrap();
        let second = assembler.assemble(&session, &input).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.render(), second.render());
    }

    #[test]
    fn full_ordering_with_history_and_attachments() {
        let mut session = scenario_session();
        let second = session.canvases_mut().create("empty").unwrap();
        let third = session.canvases_mut().create("helpers").unwrap();
        session.canvases_mut().edit(third, "def f(): pass").unwrap();
        assert_eq!(second, 1);

        session.attach("b.pdf", AttachmentKind::Pdf);
        session.attach("a.txt", AttachmentKind::Document);
        session.attach("c.png", AttachmentKind::Image);
        session.extract_pending(&SkipImages);
        session.append_turn(Turn::assistant(
            vec![ContentPart::text("hi")],
            "hello".into(),
            TokenUsage::default(),
        ));

        let payload = ContextAssembler::default()
            .assemble(&session, &[ContentPart::text("next")])
            .unwrap();
        assert_eq!(
            kinds(&payload),
            vec![
                SegmentKind::SystemRole,
                SegmentKind::Turn { role: Role::User },
                SegmentKind::Turn {
                    role: Role::Assistant
                },
                SegmentKind::Canvas {
                    slot: 0,
                    label: "Canvas-1".into()
                },
                SegmentKind::Canvas {
                    slot: 2,
                    label: "helpers".into()
                },
                SegmentKind::Attachment {
                    reference: "b.pdf".into()
                },
                SegmentKind::Attachment {
                    reference: "a.txt".into()
                },
                SegmentKind::UserInput,
            ]
        );
    }

    #[test]
    fn no_role_and_no_input_gives_empty_payload() {
        let session = Session::new("m", TokenBudget::new(100, 10));
        let payload = ContextAssembler::default().assemble(&session, &[]).unwrap();
        assert!(payload.is_empty());
        assert_eq!(payload.render(), "");
    }

    #[test]
    fn over_budget_payload_is_rejected() {
        let session = Session::new("tiny", TokenBudget::new(5, 5));
        let input = [ContentPart::text("x".repeat(100))];
        let err = ContextAssembler::default()
            .assemble(&session, &input)
            .unwrap_err();
        match err {
            EngineError::BudgetExceeded {
                estimated,
                remaining,
                max_context,
            } => {
                assert!(estimated > remaining);
                assert_eq!(remaining, 5);
                assert_eq!(max_context, 5);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn budget_check_uses_session_ratio() {
        // 26 rendered chars: 7 tokens at 4.0, 13 at 2.0.
        let mut session = Session::new("m", TokenBudget::new(10, 10)).with_system_role("abcd");
        let input = [ContentPart::text("efgh")];
        assert!(ContextAssembler::new().assemble(&session, &input).is_ok());

        session.set_chars_per_token(2.0);
        let err = ContextAssembler::new()
            .assemble(&session, &input)
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::BudgetExceeded {
                estimated: 13,
                remaining: 10,
                ..
            }
        ));
    }

    #[test]
    fn payload_carries_session_settings() {
        let mut session = scenario_session();
        let settings = crate::GenerationSettings {
            web_search: true,
            ..Default::default()
        };
        session.set_settings(settings);
        let payload = ContextAssembler::new()
            .assemble(&session, &[ContentPart::text("search for it")])
            .unwrap();
        assert_eq!(payload.settings(), settings);
        assert!(!payload.render().contains("web_search"));
    }

    #[test]
    fn unknown_references_in_input_are_rejected() {
        let session = scenario_session();
        let assembler = ContextAssembler::default();
        let err = assembler
            .assemble(&session, &[ContentPart::canvas(7)])
            .unwrap_err();
        assert!(matches!(err, EngineError::SlotNotFound { slot: 7 }));
        let err = assembler
            .assemble(&session, &[ContentPart::attachment("missing.pdf")])
            .unwrap_err();
        assert!(matches!(err, EngineError::AttachmentNotFound { .. }));
    }

    #[test]
    fn render_labels_canvas_references() {
        let session = scenario_session();
        let payload = ContextAssembler::default()
            .assemble(
                &session,
                &[ContentPart::text("review"), ContentPart::canvas(0)],
            )
            .unwrap();
        let rendered = payload.render();
        assert!(rendered.starts_with("[system]\nYou are a terse assistant"));
        assert!(rendered.contains("[canvas 0: Canvas-1]\n```\nprint(1)\n```"));
        assert!(rendered.ends_with("[user]\nreview\n[Canvas: Canvas-1]"));
    }
}
