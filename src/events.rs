//! Event emission for front ends.
//!
//! The controller never talks to a UI directly. Anything a front end should
//! react to (re-rendering history, showing a notice, noticing that a local
//! write failed) is sent as a `ClientEvent` through an `EventSink`.

use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::target::FailureCategory;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("Event receiver closed")]
    ReceiverClosed,
}

/// Severity of a user-facing notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// Which local write or read failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PersistenceOp {
    Read,
    Write,
    Remove,
}

/// Events emitted to the front end.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientEvent {
    /// Transient message for the user (toast)
    Notice { level: NoticeLevel, message: String },

    /// Chat history changed and should be redrawn
    HistoryChanged { len: usize },

    /// Target list was (re)loaded
    TargetsLoaded { count: usize },

    /// Schema loading started for a target
    SchemaLoading { target_id: String },

    /// Schema loaded and the form model was rebuilt
    SchemaReady { target_id: String, field_count: usize },

    /// Schema loading failed
    SchemaFailed {
        target_id: String,
        category: FailureCategory,
        inline_error: String,
    },

    /// Form options or values changed
    FormChanged,

    /// A chat request is in flight
    ChatPending,

    /// A chat request finished (successfully or not)
    ChatSettled,

    /// A local persistence operation failed and was swallowed
    PersistenceFailed {
        key: String,
        op: PersistenceOp,
        error: String,
    },
}

impl ClientEvent {
    pub fn notice(level: NoticeLevel, message: impl Into<String>) -> Self {
        ClientEvent::Notice {
            level,
            message: message.into(),
        }
    }
}

/// Destination for client events.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: ClientEvent) -> Result<(), SinkError>;
}

/// Emit and ignore delivery failures; events are advisory.
pub fn emit(sink: &dyn EventSink, event: ClientEvent) {
    if let Err(e) = sink.emit(event) {
        tracing::trace!("Dropped client event: {}", e);
    }
}

/// Log a swallowed persistence failure and report it through the sink.
pub fn report_persistence_failure(
    sink: &dyn EventSink,
    key: &str,
    op: PersistenceOp,
    error: &crate::storage::StorageError,
) {
    tracing::warn!("Persistence {:?} failed for '{}': {}", op, key, error);
    emit(
        sink,
        ClientEvent::PersistenceFailed {
            key: key.to_string(),
            op,
            error: error.to_string(),
        },
    );
}

/// Sink that forwards events over an unbounded channel.
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<ClientEvent>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ClientEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl EventSink for ChannelSink {
    fn emit(&self, event: ClientEvent) -> Result<(), SinkError> {
        self.tx.send(event).map_err(|_| SinkError::ReceiverClosed)
    }
}

/// Sink that keeps every event, for tests and scripted use.
#[derive(Default, Clone)]
pub struct RecordingSink {
    events: Arc<Mutex<Vec<ClientEvent>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ClientEvent> {
        self.events.lock().clone()
    }

    pub fn take(&self) -> Vec<ClientEvent> {
        std::mem::take(&mut *self.events.lock())
    }

    /// Messages of all notices emitted so far.
    pub fn notices(&self) -> Vec<(NoticeLevel, String)> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                ClientEvent::Notice { level, message } => Some((*level, message.clone())),
                _ => None,
            })
            .collect()
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, event: ClientEvent) -> Result<(), SinkError> {
        self.events.lock().push(event);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_sink_delivers() {
        let (sink, mut rx) = ChannelSink::new();
        sink.emit(ClientEvent::HistoryChanged { len: 2 }).unwrap();

        match rx.try_recv().unwrap() {
            ClientEvent::HistoryChanged { len } => assert_eq!(len, 2),
            other => panic!("Unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_channel_sink_reports_closed_receiver() {
        let (sink, rx) = ChannelSink::new();
        drop(rx);
        assert!(matches!(
            sink.emit(ClientEvent::FormChanged),
            Err(SinkError::ReceiverClosed)
        ));
        // The helper swallows it
        emit(&sink, ClientEvent::FormChanged);
    }

    #[test]
    fn test_recording_sink_notices() {
        let sink = RecordingSink::new();
        emit(&sink, ClientEvent::notice(NoticeLevel::Warning, "careful"));
        emit(&sink, ClientEvent::FormChanged);

        assert_eq!(
            sink.notices(),
            vec![(NoticeLevel::Warning, "careful".to_string())]
        );
        assert_eq!(sink.take().len(), 2);
        assert!(sink.events().is_empty());
    }

    #[test]
    fn test_event_serialization_is_tagged() {
        let event = ClientEvent::PersistenceFailed {
            key: "memo.draft".to_string(),
            op: PersistenceOp::Write,
            error: "disk full".to_string(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "persistence_failed");
        assert_eq!(json["op"], "write");
    }
}
