use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Mutex;
use tokio::sync::mpsc::UnboundedSender;

/// Severity of a user-facing log line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum EventKind {
    Progress { processed: usize, target: usize },
    Log { level: LogLevel, message: String },
}

/// Timestamped event emitted while a run is in flight
#[derive(Debug, Clone, Serialize)]
pub struct RunEvent {
    pub at: DateTime<Utc>,
    #[serde(flatten)]
    pub kind: EventKind,
}

impl RunEvent {
    pub fn now(kind: EventKind) -> Self {
        Self { at: Utc::now(), kind }
    }
}

/// Receiver of run events. Emitting never fails the run.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: RunEvent);
}

impl EventSink for UnboundedSender<RunEvent> {
    fn emit(&self, event: RunEvent) {
        // a closed receiver only means nobody is watching any more
        let _ = self.send(event);
    }
}

/// Sink that keeps every event in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<RunEvent>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<RunEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    /// Log messages at the given level, in emission order
    pub fn messages(&self, level: LogLevel) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|event| match event.kind {
                EventKind::Log { level: l, message } if l == level => Some(message),
                _ => None,
            })
            .collect()
    }

    /// Progress updates as `(processed, target)` pairs
    pub fn progress(&self) -> Vec<(usize, usize)> {
        self.events()
            .into_iter()
            .filter_map(|event| match event.kind {
                EventKind::Progress { processed, target } => Some((processed, target)),
                _ => None,
            })
            .collect()
    }
}

impl EventSink for MemorySink {
    fn emit(&self, event: RunEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}
