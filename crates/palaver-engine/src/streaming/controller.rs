//! Turn state machine over a session and a model transport.

use std::sync::Arc;

use palaver_common::StreamId;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{pump, ControllerOptions, StreamStep, TurnOutcome, TurnPhase};
use crate::assembler::ContextAssembler;
use crate::attachments::TextExtractor;
use crate::session::{Session, Turn};
use crate::token_accountant::{Preflight, UsageReport};
use crate::transport::{ModelTransport, TransportEvent};
use crate::{ContentPart, EngineError};

/// State of the one open request. Dropping it stops the pump and, unless
/// the stream already ended, asks the transport to abort.
struct ActiveTurn {
    stream_id: StreamId,
    prompt: Vec<ContentPart>,
    events: mpsc::Receiver<TransportEvent>,
    cancel: CancellationToken,
    pump: JoinHandle<()>,
    transport: Arc<dyn ModelTransport>,
    usage: Option<UsageReport>,
    finished: bool,
}

impl Drop for ActiveTurn {
    fn drop(&mut self) {
        self.cancel.cancel();
        self.pump.abort();
        if !self.finished {
            debug!(stream = %self.stream_id, "aborting transport stream");
            self.transport.abort(&self.stream_id);
        }
    }
}

/// Drives request/response turns for one session, one at a time.
///
/// Concurrent submits are rejected with `SessionBusy`, never queued.
/// After a terminal phase the next `submit` starts again from `Idle`.
pub struct SessionController {
    session: Session,
    transport: Arc<dyn ModelTransport>,
    extractor: Option<Arc<dyn TextExtractor>>,
    assembler: ContextAssembler,
    options: ControllerOptions,
    phase: TurnPhase,
    /// Phases visited by the current turn, starting at `Idle`.
    transitions: Vec<TurnPhase>,
    active: Option<ActiveTurn>,
    /// Fragments handed to the caller for the current turn.
    delivered: Vec<String>,
}

impl SessionController {
    pub fn new(session: Session, transport: Arc<dyn ModelTransport>) -> Self {
        Self::with_options(session, transport, ControllerOptions::default())
    }

    /// The session's estimator is tuned to `options.chars_per_token`.
    pub fn with_options(
        mut session: Session,
        transport: Arc<dyn ModelTransport>,
        options: ControllerOptions,
    ) -> Self {
        session.set_chars_per_token(options.chars_per_token);
        Self {
            session,
            transport,
            extractor: None,
            assembler: ContextAssembler::new(),
            options,
            phase: TurnPhase::Idle,
            transitions: vec![TurnPhase::Idle],
            active: None,
            delivered: Vec::new(),
        }
    }

    /// Extract attachment text on submit with this service.
    pub fn with_extractor(mut self, extractor: Arc<dyn TextExtractor>) -> Self {
        self.extractor = Some(extractor);
        self
    }

    /// Current phase. A turn whose cancel handle has fired reads as
    /// `Cancelled` straight away.
    pub fn phase(&self) -> TurnPhase {
        if self.cancel_signalled() {
            TurnPhase::Cancelled
        } else {
            self.phase
        }
    }

    pub fn transitions(&self) -> &[TurnPhase] {
        &self.transitions
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Mutable access for edits between turns.
    pub fn session_mut(&mut self) -> Result<&mut Session, EngineError> {
        self.ensure_quiescent()?;
        Ok(&mut self.session)
    }

    /// Swap in another session (for example one loaded from a document),
    /// returning the previous one.
    pub fn replace_session(&mut self, mut session: Session) -> Result<Session, EngineError> {
        self.ensure_quiescent()?;
        session.set_chars_per_token(self.options.chars_per_token);
        self.phase = TurnPhase::Idle;
        self.transitions = vec![TurnPhase::Idle];
        self.delivered.clear();
        Ok(std::mem::replace(&mut self.session, session))
    }

    pub fn into_session(self) -> Session {
        self.session
    }

    /// Fragments of the current (or last) turn from the start, in order.
    pub fn delivered(&self) -> &[String] {
        &self.delivered
    }

    pub fn partial_text(&self) -> String {
        self.delivered.concat()
    }

    /// Token that cancels the active turn from elsewhere. Once it fires the
    /// turn counts as cancelled: `phase()` reports `Cancelled` and the next
    /// `submit` or `session_mut` goes ahead without draining the stream.
    pub fn cancel_handle(&self) -> Option<CancellationToken> {
        self.active.as_ref().map(|a| a.cancel.clone())
    }

    /// Assemble a payload for `input` and open a model stream for it.
    ///
    /// Validation (busy, references, budget) happens before any network call.
    /// A transport that cannot open the stream leaves the phase at `Idle`.
    pub async fn submit(&mut self, input: Vec<ContentPart>) -> Result<StreamId, EngineError> {
        self.ensure_quiescent()?;
        if self.phase != TurnPhase::Idle {
            debug!(from = ?self.phase, "turn slot released");
        }
        self.phase = TurnPhase::Idle;
        self.transitions = vec![TurnPhase::Idle];
        self.delivered.clear();

        if let Some(extractor) = &self.extractor {
            let extracted = self.session.extract_pending(extractor.as_ref());
            if extracted > 0 {
                debug!(extracted, "attachment text extracted");
            }
        }

        let payload = self.assembler.assemble(&self.session, &input)?;
        let estimated = self.session.tokens().estimate(&payload);
        if self
            .session
            .tokens()
            .preflight(estimated, self.options.warning_ratio)
            == Preflight::NearLimit
        {
            warn!(
                estimated,
                remaining = self.session.remaining(),
                "payload uses most of the remaining token budget"
            );
        }

        let transport = Arc::clone(&self.transport);
        let opened = match transport.open_stream(&payload, self.session.model_id()).await {
            Ok(opened) => opened,
            Err(e) => {
                warn!(model = %self.session.model_id(), error = %e, "failed to open model stream");
                return Err(e.into());
            }
        };

        let (tx, rx) = mpsc::channel(self.options.buffer.max(1));
        let cancel = CancellationToken::new();
        let pump = pump::spawn(opened.events, tx, cancel.clone());
        self.active = Some(ActiveTurn {
            stream_id: opened.id.clone(),
            prompt: input,
            events: rx,
            cancel,
            pump,
            transport,
            usage: None,
            finished: false,
        });
        self.transition(TurnPhase::Dispatched);
        info!(stream = %opened.id, model = %self.session.model_id(), estimated, "turn dispatched");
        Ok(opened.id)
    }

    /// Wait for the next fragment or the end of the turn.
    ///
    /// Returns `Ok(None)` when no turn is active, including right after a
    /// cancellation. A transport error ends the turn as `StreamFailed` with
    /// the partial text attached; history is left untouched.
    pub async fn next_step(&mut self) -> Result<Option<StreamStep>, EngineError> {
        loop {
            let Some(active) = self.active.as_mut() else {
                return Ok(None);
            };
            let received = tokio::select! {
                biased;
                _ = active.cancel.cancelled() => None,
                event = active.events.recv() => Some(event),
            };
            let Some(event) = received else {
                self.finish_cancelled();
                return Ok(None);
            };

            if self.phase == TurnPhase::Dispatched {
                self.transition(TurnPhase::Streaming);
            }

            match event {
                Some(TransportEvent::Fragment(text)) => {
                    self.delivered.push(text.clone());
                    return Ok(Some(StreamStep::Fragment(text)));
                }
                Some(TransportEvent::Usage(report)) => {
                    // The last report of a stream is authoritative.
                    if let Some(active) = self.active.as_mut() {
                        active.usage = Some(report);
                    }
                }
                Some(TransportEvent::Error(e)) => return Err(self.fail(e.to_string())),
                None => return self.complete().map(Some),
            }
        }
    }

    /// Cancel the active turn. Returns the partial text delivered so far, or
    /// `None` when no turn was active. Nothing is appended to history and
    /// fragments still in flight are discarded.
    pub fn cancel(&mut self) -> Option<String> {
        if self.active.is_none() {
            return None;
        }
        self.finish_cancelled();
        Some(self.partial_text())
    }

    /// Drive the active turn to its end, handing each fragment to
    /// `on_fragment`. `Ok(None)` means the turn was cancelled.
    pub async fn run_to_end(
        &mut self,
        mut on_fragment: impl FnMut(&str),
    ) -> Result<Option<TurnOutcome>, EngineError> {
        while let Some(step) = self.next_step().await? {
            match step {
                StreamStep::Fragment(text) => on_fragment(&text),
                StreamStep::Completed { turn_index, .. } => {
                    let turn = self.session.turn(turn_index)?;
                    return Ok(Some(TurnOutcome {
                        text: turn.text(),
                        turn_index,
                        usage: turn.usage.unwrap_or_default(),
                    }));
                }
            }
        }
        Ok(None)
    }

    /// Settle a turn cancelled through its handle, then refuse if one is
    /// still open.
    fn ensure_quiescent(&mut self) -> Result<(), EngineError> {
        if self.cancel_signalled() {
            self.finish_cancelled();
        }
        if self.phase.is_active() {
            return Err(EngineError::SessionBusy { phase: self.phase });
        }
        Ok(())
    }

    fn cancel_signalled(&self) -> bool {
        self.active
            .as_ref()
            .is_some_and(|active| active.cancel.is_cancelled())
    }

    fn transition(&mut self, next: TurnPhase) {
        debug!(from = ?self.phase, to = ?next, "turn phase");
        self.phase = next;
        self.transitions.push(next);
    }

    fn finish_cancelled(&mut self) {
        // Dropping the turn aborts the transport and discards buffered events.
        self.active = None;
        self.transition(TurnPhase::Cancelled);
        info!(chars = self.partial_text().len(), "turn cancelled");
    }

    fn fail(&mut self, message: String) -> EngineError {
        if let Some(mut active) = self.active.take() {
            active.finished = true;
        }
        self.transition(TurnPhase::Failed);
        let partial = self.partial_text();
        warn!(error = %message, partial_chars = partial.len(), "turn failed");
        EngineError::StreamFailed { message, partial }
    }

    fn complete(&mut self) -> Result<StreamStep, EngineError> {
        let (prompt, report) = match self.active.take() {
            Some(mut active) => {
                active.finished = true;
                (std::mem::take(&mut active.prompt), active.usage.take())
            }
            None => (Vec::new(), None),
        };

        let report = report.unwrap_or_else(|| {
            warn!("stream ended without a usage report, recording zero");
            UsageReport::default()
        });
        let usage = match self.session.tokens_mut().record(report) {
            Ok(usage) => usage,
            Err(e) => return Err(self.fail(e.to_string())),
        };

        let turn_index = self
            .session
            .append_turn(Turn::assistant(prompt, self.partial_text(), usage));
        self.transition(TurnPhase::Completed);
        info!(
            turn_index,
            tokens = usage.total_tokens(),
            cumulative = self.session.cumulative_tokens(),
            "turn completed"
        );
        Ok(StreamStep::Completed {
            turn_index,
            token_count: usage.total_tokens(),
        })
    }
}
