//! Background task moving transport events into the bounded turn buffer.

use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::transport::TransportEvent;

/// Forward events until the stream ends, an error is forwarded, the receiver
/// goes away, or `cancel` fires.
///
/// The next event is only pulled once the previous one fits in the buffer,
/// so at most `buffer + 1` events are taken from an unread stream.
pub(super) fn spawn(
    mut events: BoxStream<'static, TransportEvent>,
    tx: mpsc::Sender<TransportEvent>,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut forwarded = 0usize;
        loop {
            let event = tokio::select! {
                _ = cancel.cancelled() => break,
                event = events.next() => event,
            };
            let Some(event) = event else { break };
            let is_error = matches!(event, TransportEvent::Error(_));

            let sent = tokio::select! {
                _ = cancel.cancelled() => break,
                sent = tx.send(event) => sent,
            };
            if sent.is_err() || is_error {
                break;
            }
            forwarded += 1;
        }
        debug!(forwarded, cancelled = cancel.is_cancelled(), "pump stopped");
    })
}
