//! A simulated lift controller.
//!
//! Answers like the real firmware: heartbeat replies carry version `0x03` and
//! one state byte (`0x00` on the first reply after start, `0x01` after that),
//! `QUERY_STATUS` is answered with an ALL_STATUS `MCU_RESPONSE`, and
//! `DEVICE_CONTROL` is applied and echoed. It can be told to go silent or to
//! corrupt reply checksums.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use liftctl_frame::{AllStatus, Command, DpCommand, DpReport, Frame, FrameCodec, FrameError};
use liftctl_transport::LinkStream;
use tokio::io::AsyncWriteExt;
use tokio::task::JoinHandle;
use tokio_util::codec::Framed;
use tracing::{debug, warn};

/// Version byte the firmware puts on its replies.
pub const DEVICE_VERSION: u8 = 0x03;

#[derive(Debug)]
struct SimState {
    status: AllStatus,
    silent: bool,
    corrupt_checksums: bool,
    heartbeats_answered: u32,
    received: Vec<Frame>,
}

/// Shared handle to a simulated device; clones observe the same device.
#[derive(Debug, Clone)]
pub struct SimDevice {
    state: Arc<Mutex<SimState>>,
}

impl Default for SimDevice {
    fn default() -> Self {
        Self::new(AllStatus {
            switch: 0x01,
            access_channel: 0x00,
            max_channel: 100,
            channel: 1,
            action: 0x01,
            af_mode: 0x00,
        })
    }
}

impl SimDevice {
    pub fn new(initial: AllStatus) -> Self {
        Self {
            state: Arc::new(Mutex::new(SimState {
                status: initial,
                silent: false,
                corrupt_checksums: false,
                heartbeats_answered: 0,
                received: Vec::new(),
            })),
        }
    }

    /// Serve the device end of a link until it closes.
    pub fn spawn(&self, link: LinkStream) -> JoinHandle<()> {
        let device = self.clone();
        tokio::spawn(async move { device.serve(link).await })
    }

    async fn serve(self, link: LinkStream) {
        let name = link.name().to_string();
        let mut framed = Framed::new(link, FrameCodec::default());

        while let Some(item) = framed.next().await {
            let frame = match item {
                Ok(frame) => frame,
                Err(err) => {
                    warn!(link = %name, error = %err, "simulated device dropped input");
                    break;
                }
            };

            let (reply, corrupt) = {
                let mut state = self.lock();
                state.received.push(frame.clone());
                if state.silent {
                    (None, false)
                } else {
                    (state.respond(&frame), state.corrupt_checksums)
                }
            };
            let Some(reply) = reply else {
                continue;
            };

            let sent: Result<(), FrameError> = if corrupt {
                let mut wire = reply.encode(true).to_vec();
                if let Some(last) = wire.last_mut() {
                    *last ^= 0xFF;
                }
                let io = framed.get_mut();
                match io.write_all(&wire).await {
                    Ok(()) => io.flush().await.map_err(Into::into),
                    Err(err) => Err(err.into()),
                }
            } else {
                framed.send(reply).await
            };
            if let Err(err) = sent {
                debug!(link = %name, error = %err, "simulated device link closed");
                break;
            }
        }
    }

    pub fn set_silent(&self, silent: bool) {
        self.lock().silent = silent;
    }

    pub fn set_corrupt_checksums(&self, corrupt: bool) {
        self.lock().corrupt_checksums = corrupt;
    }

    /// Every frame received so far, in arrival order.
    pub fn received(&self) -> Vec<Frame> {
        self.lock().received.clone()
    }

    pub fn status(&self) -> AllStatus {
        self.lock().status
    }

    fn lock(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl SimState {
    fn respond(&mut self, frame: &Frame) -> Option<Frame> {
        match frame.command() {
            Command::Heartbeat => {
                let state = if self.heartbeats_answered == 0 { 0x00 } else { 0x01 };
                self.heartbeats_answered += 1;
                reply(Command::Heartbeat, Bytes::copy_from_slice(&[state]))
            }
            Command::QueryStatus => reply(
                Command::McuResponse,
                DpCommand::all_status(&self.status).encode_payload(),
            ),
            Command::DeviceControl => {
                let report = DpReport::decode(frame.payload()).ok()?;
                self.apply(report);
                reply(Command::McuResponse, frame.payload().clone())
            }
            Command::McuResponse => None,
        }
    }

    fn apply(&mut self, report: DpReport) {
        let status = &mut self.status;
        match report {
            DpReport::Switch(v) => status.switch = v,
            DpReport::AccessChannel(v) => status.access_channel = v,
            DpReport::MaxChannel(v) => status.max_channel = v,
            DpReport::Channel(v) => status.channel = v,
            DpReport::Position(v) => status.action = v,
            DpReport::AfMode(v) => status.af_mode = v,
            DpReport::AllStatus(all) => *status = all,
        }
    }
}

fn reply(command: Command, payload: Bytes) -> Option<Frame> {
    Frame::with_version(DEVICE_VERSION, command, payload).ok()
}

#[cfg(test)]
mod tests {
    use liftctl_frame::{heartbeat_frame, query_status_frame, DataPoint};

    use super::*;

    #[test]
    fn heartbeat_reply_matches_firmware_after_first() {
        let device = SimDevice::default();
        let mut state = device.lock();
        let first = state.respond(&heartbeat_frame()).unwrap();
        assert_eq!(first.payload().as_ref(), &[0x00]);

        let second = state.respond(&heartbeat_frame()).unwrap();
        assert_eq!(
            second.encode(true).as_ref(),
            &[0x55, 0xAA, 0x03, 0x00, 0x00, 0x01, 0x01, 0x04]
        );
    }

    #[test]
    fn query_reply_matches_firmware() {
        let device = SimDevice::new(AllStatus {
            switch: 0x01,
            access_channel: 0x01,
            max_channel: 0x1122,
            channel: 0x1033,
            action: 0x02,
            af_mode: 0x01,
        });
        let reply = device.lock().respond(&query_status_frame()).unwrap();
        assert_eq!(
            reply.encode(true).as_ref(),
            &[
                0x55, 0xAA, 0x03, 0x07, 0x00, 0x0C, 0x69, 0x02, 0x00, 0x08, 0x01, 0x01, 0x11,
                0x22, 0x10, 0x33, 0x02, 0x01, 0x03
            ]
        );
    }

    #[test]
    fn device_control_is_applied_and_echoed() {
        let device = SimDevice::default();
        let frame = DpCommand::channel(42).into_frame().unwrap();
        let reply = device.lock().respond(&frame).unwrap();

        assert_eq!(reply.command(), Command::McuResponse);
        assert_eq!(
            DpReport::decode(reply.payload()).unwrap().data_point(),
            DataPoint::Channel
        );
        assert_eq!(device.status().channel, 42);
    }
}
