use liftctl_frame::{
    query_status_frame, AccessChannel, AfMode, DeviceAction, DpCommand, Frame, SwitchState,
};
use liftctl_transport::LinkStream;
use tokio::sync::{broadcast, oneshot, watch};
use tokio_util::sync::CancellationToken;

use crate::engine::Request;
use crate::error::{EngineError, Result};
use crate::events::{EngineEvent, EventSink, Severity};
use crate::queue::CommandAck;
use crate::status::DeviceStatus;

/// Cloneable handle to a running engine.
///
/// All methods are safe to call from any task. Submissions are transmitted
/// in the order the engine receives them.
#[derive(Debug, Clone)]
pub struct EngineHandle {
    requests: tokio::sync::mpsc::Sender<Request>,
    sink: EventSink,
    cancel: CancellationToken,
}

impl EngineHandle {
    pub(crate) fn new(
        requests: tokio::sync::mpsc::Sender<Request>,
        sink: EventSink,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            requests,
            sink,
            cancel,
        }
    }

    /// Queue a frame without waiting for its outcome.
    pub async fn enqueue(&self, frame: Frame, label: impl Into<String>) -> Result<()> {
        self.send(Request::Submit {
            frame,
            label: label.into(),
            reply: None,
        })
        .await
    }

    /// Queue a frame and wait until it is acknowledged or abandoned.
    pub async fn submit(&self, frame: Frame, label: impl Into<String>) -> Result<CommandAck> {
        let (reply, rx) = oneshot::channel();
        self.send(Request::Submit {
            frame,
            label: label.into(),
            reply: Some(reply),
        })
        .await?;
        rx.await.map_err(|_| EngineError::Stopped)?
    }

    /// Ask the device for ALL_STATUS and return the refreshed snapshot.
    pub async fn query_status(&self) -> Result<DeviceStatus> {
        self.submit(query_status_frame(), "query status").await?;
        Ok(self.status())
    }

    pub async fn set_switch(&self, state: SwitchState) -> Result<CommandAck> {
        self.control(DpCommand::switch(state), format!("switch {state}"))
            .await
    }

    pub async fn select_access(&self, channel: AccessChannel) -> Result<CommandAck> {
        self.control(
            DpCommand::access_channel(channel),
            format!("access channel {channel}"),
        )
        .await
    }

    pub async fn set_max_channel(&self, max: u16) -> Result<CommandAck> {
        self.control(DpCommand::max_channel(max), format!("max channel {max}"))
            .await
    }

    /// Select a channel; refused when above the last reported max channel.
    pub async fn set_channel(&self, channel: u16) -> Result<CommandAck> {
        if let Some(max) = self.status().max_channel {
            if channel > max {
                return Err(EngineError::Rejected(format!(
                    "channel {channel} exceeds max channel {max}"
                )));
            }
        }
        self.control(DpCommand::channel(channel), format!("channel {channel}"))
            .await
    }

    pub async fn position(&self, action: DeviceAction) -> Result<CommandAck> {
        self.control(DpCommand::position(action), format!("position {action}"))
            .await
    }

    pub async fn select_af_mode(&self, mode: AfMode) -> Result<CommandAck> {
        self.control(DpCommand::af_select(mode), format!("A/F mode {mode}"))
            .await
    }

    /// Operator device-control commands are refused while the panel is locked.
    async fn control(&self, command: DpCommand, label: String) -> Result<CommandAck> {
        if self.panel_locked() {
            return Err(EngineError::PanelLocked);
        }
        let frame = command.into_frame()?;
        self.submit(frame, label).await
    }

    /// Attach a fresh link and resume the queue.
    pub async fn reopen(&self, link: LinkStream) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.send(Request::Reopen { link, reply }).await?;
        rx.await.map_err(|_| EngineError::Stopped)
    }

    /// Last known device status.
    pub fn status(&self) -> DeviceStatus {
        self.sink.snapshot()
    }

    pub fn watch_status(&self) -> watch::Receiver<DeviceStatus> {
        self.sink.watch_status()
    }

    pub fn panel_locked(&self) -> bool {
        self.sink.is_panel_locked()
    }

    pub fn watch_panel(&self) -> watch::Receiver<bool> {
        self.sink.watch_panel()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.sink.subscribe()
    }

    /// Write a line to the operator log.
    pub fn log(&self, severity: Severity, message: impl Into<String>) {
        self.sink.log(severity, message);
    }

    /// Stop the engine. Queued commands fail with [`EngineError::Stopped`].
    pub async fn shutdown(&self) {
        let (reply, rx) = oneshot::channel();
        if self.requests.send(Request::Shutdown { reply }).await.is_ok() {
            let _ = rx.await;
        }
        self.cancel.cancel();
    }

    pub fn is_running(&self) -> bool {
        !self.requests.is_closed()
    }

    async fn send(&self, request: Request) -> Result<()> {
        self.requests
            .send(request)
            .await
            .map_err(|_| EngineError::Stopped)
    }
}
