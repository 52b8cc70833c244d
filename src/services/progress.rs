//! Progress reporting service
//!
//! This module separates progress reporting concerns from the orchestrator,
//! allowing different frontends to implement their own progress handling.
//! Events are delivered in the order emitted and exactly one terminal event
//! (`complete` or `error`) closes a stream.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Discrete lifecycle events reported during long-running edit jobs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ProgressEvent {
    /// A non-terminal step: job setup or per-segment processing
    Progress {
        /// Human-readable step description
        message: String,
        /// Current item index (1-based), for per-segment steps
        #[serde(skip_serializing_if = "Option::is_none")]
        current: Option<usize>,
        /// Total item count, for per-segment steps
        #[serde(skip_serializing_if = "Option::is_none")]
        total: Option<usize>,
    },
    /// Terminal success event carrying the run summary counts
    Complete {
        /// Segments updated
        updated_count: usize,
        /// Segments attempted
        total_count: usize,
    },
    /// Terminal failure event; no `complete` event will follow
    Error {
        /// User-facing failure description
        message: String,
    },
}

impl ProgressEvent {
    /// Job accepted, work starting
    #[must_use]
    pub fn init() -> Self {
        Self::Progress {
            message: "init".to_string(),
            current: None,
            total: None,
        }
    }

    /// A non-image preparatory step
    #[must_use]
    pub fn setup<S: Into<String>>(message: S) -> Self {
        Self::Progress {
            message: message.into(),
            current: None,
            total: None,
        }
    }

    /// Per-segment processing step
    #[must_use]
    pub fn processing(current: usize, total: usize) -> Self {
        Self::Progress {
            message: "processing".to_string(),
            current: Some(current),
            total: Some(total),
        }
    }

    /// Terminal completion event
    #[must_use]
    pub fn complete(updated_count: usize, total_count: usize) -> Self {
        Self::Complete {
            updated_count,
            total_count,
        }
    }

    /// Terminal error event
    #[must_use]
    pub fn error<S: Into<String>>(message: S) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    /// Whether this event closes the stream
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete { .. } | Self::Error { .. })
    }

    /// Render as one text-event-stream frame: `data: <JSON>\n\n`
    #[must_use]
    pub fn to_sse(&self) -> String {
        // ProgressEvent serialization cannot fail: no maps, no non-string keys
        let json = serde_json::to_string(self).unwrap_or_default();
        format!("data: {json}\n\n")
    }
}

/// Write-only sink for progress events
pub trait ProgressSink: Send + Sync {
    /// Deliver one event. Implementations must preserve emit order.
    fn emit(&self, event: ProgressEvent);
}

/// No-op sink that discards all progress events
pub struct NoOpProgressSink;

impl ProgressSink for NoOpProgressSink {
    fn emit(&self, _event: ProgressEvent) {
        // Intentionally empty - discards progress events
    }
}

/// Sink that logs events, for CLI and debugging use
pub struct LogProgressSink;

impl ProgressSink for LogProgressSink {
    fn emit(&self, event: ProgressEvent) {
        match &event {
            ProgressEvent::Progress {
                message,
                current: Some(current),
                total: Some(total),
            } => log::info!("[{current}/{total}] {message}"),
            ProgressEvent::Progress { message, .. } => log::info!("{message}"),
            ProgressEvent::Complete {
                updated_count,
                total_count,
            } => log::info!("Completed: {updated_count}/{total_count} segments updated"),
            ProgressEvent::Error { message } => log::error!("Job failed: {message}"),
        }
    }
}

/// Channel-backed, single-writer ordered event stream.
///
/// Events are forwarded to an unbounded channel in emit order. Once a
/// terminal event has been sent the stream is closed: later events are
/// dropped, so consumers never observe a second terminal event. A dropped
/// receiver is tolerated; sends into a closed channel are ignored.
pub struct ProgressStream {
    tx: mpsc::UnboundedSender<ProgressEvent>,
    closed: AtomicBool,
}

impl ProgressStream {
    /// Create a stream and its consumer half
    #[must_use]
    pub fn channel() -> (Arc<Self>, mpsc::UnboundedReceiver<ProgressEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Arc::new(Self {
                tx,
                closed: AtomicBool::new(false),
            }),
            rx,
        )
    }

    /// Whether a terminal event has already been emitted
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

impl ProgressSink for ProgressStream {
    fn emit(&self, event: ProgressEvent) {
        if self.is_closed() {
            log::debug!("progress event after terminal dropped: {event:?}");
            return;
        }
        if event.is_terminal() {
            self.closed.store(true, Ordering::Release);
        }
        // Receiver may be gone; a progress stream must never fail the job
        let _ = self.tx.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_json_shapes() {
        let event = ProgressEvent::processing(2, 5);
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"progress\""));
        assert!(json.contains("\"current\":2"));
        assert!(json.contains("\"total\":5"));

        let event = ProgressEvent::complete(4, 5);
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"complete\""));
        assert!(json.contains("\"updated_count\":4"));

        let event = ProgressEvent::error("boom");
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"error\""));
    }

    #[test]
    fn test_setup_event_omits_counters() {
        let json = serde_json::to_string(&ProgressEvent::setup("tokens")).unwrap();
        assert!(!json.contains("current"));
        assert!(!json.contains("total"));
    }

    #[test]
    fn test_sse_framing() {
        let frame = ProgressEvent::init().to_sse();
        assert!(frame.starts_with("data: {"));
        assert!(frame.ends_with("\n\n"));
    }

    #[tokio::test]
    async fn test_stream_preserves_order() {
        let (stream, mut rx) = ProgressStream::channel();
        stream.emit(ProgressEvent::init());
        stream.emit(ProgressEvent::processing(1, 3));
        stream.emit(ProgressEvent::processing(2, 3));
        stream.emit(ProgressEvent::complete(3, 3));
        drop(stream);

        assert_eq!(rx.recv().await.unwrap(), ProgressEvent::init());
        assert_eq!(rx.recv().await.unwrap(), ProgressEvent::processing(1, 3));
        assert_eq!(rx.recv().await.unwrap(), ProgressEvent::processing(2, 3));
        assert_eq!(rx.recv().await.unwrap(), ProgressEvent::complete(3, 3));
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_exactly_one_terminal_event() {
        let (stream, mut rx) = ProgressStream::channel();
        stream.emit(ProgressEvent::error("first failure"));
        stream.emit(ProgressEvent::complete(1, 1));
        stream.emit(ProgressEvent::processing(1, 1));
        drop(stream);

        assert_eq!(rx.recv().await.unwrap(), ProgressEvent::error("first failure"));
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_dropped_receiver_is_tolerated() {
        let (stream, rx) = ProgressStream::channel();
        drop(rx);
        // Must not panic or error
        stream.emit(ProgressEvent::init());
        stream.emit(ProgressEvent::complete(0, 0));
    }
}
