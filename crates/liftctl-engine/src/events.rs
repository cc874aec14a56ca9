use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;
use tokio::sync::{broadcast, watch};
use tracing::{error, info, warn};

use crate::status::{DeviceStatus, StatusUpdate};

/// Severity of an operator log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Success,
    Warning,
    Error,
}

/// One timestamped line of the operator log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogLine {
    /// Milliseconds since the Unix epoch.
    pub timestamp_ms: u64,
    pub severity: Severity,
    pub message: String,
}

impl LogLine {
    pub fn now(severity: Severity, message: impl Into<String>) -> Self {
        let timestamp_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or_default();
        Self {
            timestamp_ms,
            severity,
            message: message.into(),
        }
    }
}

/// Everything the engine reports to its front end.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum EngineEvent {
    Log(LogLine),
    Status(StatusUpdate),
    /// `true` when operator controls were locked, `false` when released.
    PanelLock(bool),
}

/// Fan-out for engine events: broadcast subscribers, watch snapshots and
/// `tracing`.
#[derive(Debug, Clone)]
pub(crate) struct EventSink {
    events: broadcast::Sender<EngineEvent>,
    status: watch::Sender<DeviceStatus>,
    panel: watch::Sender<bool>,
}

impl EventSink {
    pub(crate) fn new(capacity: usize) -> Self {
        let (events, _) = broadcast::channel(capacity);
        let (status, _) = watch::channel(DeviceStatus::default());
        let (panel, _) = watch::channel(false);
        Self {
            events,
            status,
            panel,
        }
    }

    pub(crate) fn log(&self, severity: Severity, message: impl Into<String>) {
        let line = LogLine::now(severity, message);
        match severity {
            Severity::Info | Severity::Success => info!(target: "liftctl::console", "{}", line.message),
            Severity::Warning => warn!(target: "liftctl::console", "{}", line.message),
            Severity::Error => error!(target: "liftctl::console", "{}", line.message),
        }
        // No subscribers is fine.
        let _ = self.events.send(EngineEvent::Log(line));
    }

    pub(crate) fn status(&self, snapshot: &DeviceStatus, updates: Vec<StatusUpdate>) {
        if updates.is_empty() {
            return;
        }
        self.status.send_replace(snapshot.clone());
        for update in updates {
            let _ = self.events.send(EngineEvent::Status(update));
        }
    }

    pub(crate) fn panel_locked(&self, locked: bool) {
        self.panel.send_replace(locked);
        let _ = self.events.send(EngineEvent::PanelLock(locked));
    }

    pub(crate) fn snapshot(&self) -> DeviceStatus {
        self.status.borrow().clone()
    }

    pub(crate) fn is_panel_locked(&self) -> bool {
        *self.panel.borrow()
    }

    pub(crate) fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.events.subscribe()
    }

    pub(crate) fn watch_status(&self) -> watch::Receiver<DeviceStatus> {
        self.status.subscribe()
    }

    pub(crate) fn watch_panel(&self) -> watch::Receiver<bool> {
        self.panel.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_reaches_subscribers() {
        let sink = EventSink::new(8);
        let mut rx = sink.subscribe();
        sink.log(Severity::Success, "Response successfully.");

        match rx.try_recv().unwrap() {
            EngineEvent::Log(line) => {
                assert_eq!(line.severity, Severity::Success);
                assert_eq!(line.message, "Response successfully.");
                assert!(line.timestamp_ms > 0);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn panel_state_is_watchable() {
        let sink = EventSink::new(8);
        let panel = sink.watch_panel();
        sink.panel_locked(true);
        assert!(*panel.borrow());
    }

    #[test]
    fn event_serializes_tagged() {
        let json = serde_json::to_string(&EngineEvent::PanelLock(true)).unwrap();
        assert_eq!(json, r#"{"event":"panel_lock","data":true}"#);
    }
}
