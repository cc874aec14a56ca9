//! The protocol actor.
//!
//! One tokio task owns the link, the command queue, the heartbeat state and
//! the status snapshot. Everything else talks to it through an
//! [`EngineHandle`]. The loop multiplexes, in priority order:
//!
//! 1. cancellation
//! 2. submissions and control requests
//! 3. inbound bytes
//! 4. the response deadline of the in-flight command
//! 5. the heartbeat tick

use std::io;
use std::ops::ControlFlow;

use liftctl_frame::{
    heartbeat_frame, hex_dump, Command, DpReport, Frame, FrameError, FrameWriter,
    ReassemblerConfig, StreamReassembler,
};
use liftctl_transport::{LinkStream, TransportError};
use tokio::io::{AsyncReadExt, ReadHalf, WriteHalf};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::events::{EventSink, Severity};
use crate::handle::EngineHandle;
use crate::heartbeat::HeartbeatState;
use crate::queue::{CommandAck, CommandQueue, Expiry, PendingCommand, Reply};
use crate::status::DeviceStatus;

const READ_CHUNK_SIZE: usize = 256;

pub(crate) enum Request {
    Submit {
        frame: Frame,
        label: String,
        reply: Option<Reply>,
    },
    Reopen {
        link: LinkStream,
        reply: oneshot::Sender<()>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

/// A running protocol engine.
pub struct Engine {
    handle: EngineHandle,
    task: JoinHandle<()>,
}

impl Engine {
    /// Validate `config` and start the engine task on `link`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(link: LinkStream, config: EngineConfig) -> Result<Self> {
        config.validate().map_err(EngineError::Config)?;

        let (tx, rx) = mpsc::channel(config.request_queue_depth);
        let sink = EventSink::new(config.event_capacity);
        let cancel = CancellationToken::new();
        let handle = EngineHandle::new(tx, sink.clone(), cancel.clone());

        let actor = Actor::new(link, config, sink, rx, cancel);
        let task = tokio::spawn(actor.run());
        Ok(Self { handle, task })
    }

    pub fn handle(&self) -> EngineHandle {
        self.handle.clone()
    }

    /// Stop the engine, failing any queued commands, and wait for the task.
    pub async fn shutdown(self) -> Result<()> {
        self.handle.shutdown().await;
        self.task.await.map_err(|_| EngineError::Stopped)
    }
}

struct Actor {
    config: EngineConfig,
    link_name: String,
    reader: Option<ReadHalf<LinkStream>>,
    writer: Option<FrameWriter<WriteHalf<LinkStream>>>,
    reassembler: StreamReassembler,
    queue: CommandQueue,
    deadline: Option<Instant>,
    heartbeat: HeartbeatState,
    status: DeviceStatus,
    sink: EventSink,
    requests: mpsc::Receiver<Request>,
    cancel: CancellationToken,
}

impl Actor {
    fn new(
        link: LinkStream,
        config: EngineConfig,
        sink: EventSink,
        requests: mpsc::Receiver<Request>,
        cancel: CancellationToken,
    ) -> Self {
        let reassembler = StreamReassembler::with_config(ReassemblerConfig {
            max_buffered_bytes: config.max_buffered_bytes,
        });
        let mut actor = Self {
            queue: CommandQueue::new(config.max_attempts),
            config,
            link_name: String::new(),
            reader: None,
            writer: None,
            reassembler,
            deadline: None,
            heartbeat: HeartbeatState::default(),
            status: DeviceStatus::default(),
            sink,
            requests,
            cancel,
        };
        actor.attach(link);
        actor
    }

    fn attach(&mut self, link: LinkStream) {
        self.link_name = link.name().to_string();
        let (reader, writer) = tokio::io::split(link);
        self.reader = Some(reader);
        self.writer = Some(FrameWriter::new(writer));
        self.reassembler.clear();
        self.heartbeat.reset_probe();
        self.sink
            .log(Severity::Info, format!("link {} open", self.link_name));
    }

    async fn run(mut self) {
        let period = self.config.heartbeat_interval;
        let mut ticker = time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut chunk = [0u8; READ_CHUNK_SIZE];

        loop {
            let heartbeat_due = self.config.heartbeat_enabled && self.writer.is_some();
            let deadline = self.deadline;

            tokio::select! {
                biased;

                _ = self.cancel.cancelled() => {
                    debug!("engine cancelled");
                    break;
                }

                request = self.requests.recv() => {
                    let Some(request) = request else {
                        debug!("all engine handles dropped");
                        break;
                    };
                    if self.on_request(request).await.is_break() {
                        return;
                    }
                }

                read = read_chunk(&mut self.reader, &mut chunk) => {
                    self.on_read(read, &chunk).await;
                }

                _ = sleep_until(deadline) => {
                    self.on_timeout().await;
                }

                _ = ticker.tick(), if heartbeat_due => {
                    self.on_heartbeat_tick().await;
                }
            }
        }

        self.stop();
    }

    async fn on_request(&mut self, request: Request) -> ControlFlow<()> {
        match request {
            Request::Submit {
                frame,
                label,
                reply,
            } => {
                if self.writer.is_none() {
                    self.sink.log(
                        Severity::Error,
                        format!("{label}: link {} is not open", self.link_name),
                    );
                    if let Some(reply) = reply {
                        let _ = reply.send(Err(TransportError::Closed.into()));
                    }
                    return ControlFlow::Continue(());
                }
                self.queue.push(PendingCommand::new(frame, label, reply));
                self.pump().await;
            }
            Request::Reopen { link, reply } => {
                self.attach(link);
                let _ = reply.send(());
                self.pump().await;
            }
            Request::Shutdown { reply } => {
                self.stop();
                let _ = reply.send(());
                return ControlFlow::Break(());
            }
        }
        ControlFlow::Continue(())
    }

    /// Transmit the queue head unless a command is already in flight or the
    /// link is down.
    async fn pump(&mut self) {
        let Some(writer) = self.writer.as_mut() else {
            return;
        };
        let Some(command) = self.queue.begin_transmit() else {
            return;
        };
        let frame = command.frame.clone();
        let label = command.label.clone();
        let attempt = command.attempt;

        let written = writer.write_frame(&frame).await.map(hex_dump);
        match written {
            Ok(hex) => {
                self.deadline = Some(Instant::now() + self.config.response_timeout);
                if attempt == 1 {
                    self.sink.log(Severity::Info, format!("{label}: sent {hex}"));
                } else {
                    self.sink.log(
                        Severity::Warning,
                        format!(
                            "{label}: no response, retry {attempt}/{}: {hex}",
                            self.config.max_attempts
                        ),
                    );
                }
            }
            Err(err) => {
                self.sink.log(
                    Severity::Error,
                    format!("{label}: write to {} failed: {err}", self.link_name),
                );
                if let Some(command) = self.queue.take_in_flight() {
                    if command.is_heartbeat() {
                        self.heartbeat.reset_probe();
                    }
                    command.complete(Err(EngineError::Transport(write_error(err))));
                }
                self.link_down();
            }
        }
    }

    async fn on_timeout(&mut self) {
        self.deadline = None;
        match self.queue.expire() {
            Some(Expiry::Retry) => self.pump().await,
            Some(Expiry::Abandon(command)) => {
                self.sink.log(
                    Severity::Error,
                    format!(
                        "{}: no response after {} attempt(s), abandoned",
                        command.label, command.attempt
                    ),
                );
                let heartbeat = command.is_heartbeat();
                let err = EngineError::Timeout {
                    label: command.label.clone(),
                    attempts: command.attempt,
                };
                command.complete(Err(err));

                if heartbeat && self.heartbeat.abandoned() {
                    self.sink.log(
                        Severity::Error,
                        "ALARM: device not answering heartbeats, operator panel locked",
                    );
                    self.sink.panel_locked(true);
                }
                self.pump().await;
            }
            None => {}
        }
    }

    async fn on_heartbeat_tick(&mut self) {
        if !self.heartbeat.should_probe() {
            debug!("previous heartbeat unresolved, skipping tick");
            return;
        }
        self.heartbeat.probe_sent(Instant::now());
        self.queue.push(PendingCommand::new(
            heartbeat_frame(),
            "heartbeat".to_string(),
            None,
        ));
        self.pump().await;
    }

    async fn on_read(&mut self, read: io::Result<usize>, chunk: &[u8]) {
        match read {
            Ok(0) => {
                self.sink.log(
                    Severity::Error,
                    format!("link {} closed by peer", self.link_name),
                );
                self.link_down();
            }
            Ok(n) => {
                trace!(bytes = n, "link read");
                self.reassembler.extend(&chunk[..n]);
                self.drain_frames().await;
            }
            Err(err) => {
                self.sink.log(
                    Severity::Error,
                    format!("read from {} failed: {err}", self.link_name),
                );
                self.link_down();
            }
        }
    }

    async fn drain_frames(&mut self) {
        loop {
            match self.reassembler.next_frame() {
                Ok(Some(frame)) => self.on_frame(frame).await,
                Ok(None) => break,
                Err(FrameError::UnknownCommand(code)) => self.sink.log(
                    Severity::Warning,
                    format!("unknown command 0x{code:02X} from device, dropped"),
                ),
                Err(err) => self
                    .sink
                    .log(Severity::Warning, format!("receive error: {err}")),
            }
        }
    }

    async fn on_frame(&mut self, frame: Frame) {
        self.sink.log(
            Severity::Info,
            format!("received {}", hex_dump(&frame.encode(true))),
        );

        let accepted = match frame.command() {
            Command::Heartbeat => self.on_heartbeat_reply(&frame),
            Command::McuResponse => {
                self.on_status_report(&frame);
                true
            }
            Command::DeviceControl | Command::QueryStatus => {
                self.sink.log(
                    Severity::Warning,
                    format!("unexpected {} from device, dropped", frame.command().name()),
                );
                false
            }
        };

        let resolves = accepted
            && self
                .queue
                .in_flight()
                .is_some_and(|c| c.resolved_by(frame.command()));
        if !resolves {
            return;
        }

        self.deadline = None;
        if let Some(command) = self.queue.take_in_flight() {
            self.sink.log(
                Severity::Success,
                format!("{}: acknowledged (attempt {})", command.label, command.attempt),
            );
            let ack = CommandAck {
                label: command.label.clone(),
                attempts: command.attempt,
                response: frame,
            };
            command.complete(Ok(ack));
        }
        self.pump().await;
    }

    fn on_heartbeat_reply(&mut self, frame: &Frame) -> bool {
        let Some(&state) = frame.payload().first() else {
            self.sink.log(
                Severity::Warning,
                "heartbeat reply carries no state byte, ignored",
            );
            return false;
        };
        let message = match state {
            0x00 => "heartbeat: first reply since device start",
            _ => "heartbeat ok",
        };
        self.sink.log(Severity::Success, message);

        // Only the probe on the wire is answered. A stray reply must not
        // settle a probe still waiting in the queue.
        let probe_on_wire = self.queue.in_flight().is_some_and(PendingCommand::is_heartbeat);
        let released = if probe_on_wire {
            self.heartbeat.acknowledged()
        } else {
            self.heartbeat.unsolicited_reply()
        };
        if released {
            self.sink.log(
                Severity::Success,
                "heartbeat restored, operator panel unlocked",
            );
            self.sink.panel_locked(false);
        }
        true
    }

    fn on_status_report(&mut self, frame: &Frame) {
        let report = match DpReport::decode(frame.payload()) {
            Ok(report) => report,
            Err(err) => {
                self.sink
                    .log(Severity::Warning, format!("status report rejected: {err}"));
                return;
            }
        };

        let applied = self.status.apply(&report);
        for (dp, value) in &applied.unrecognized {
            self.sink.log(
                Severity::Warning,
                format!("{}: unrecognized value 0x{value:02X}", dp.name()),
            );
        }
        self.sink.status(&self.status, applied.updates);
    }

    fn link_down(&mut self) {
        self.reader = None;
        self.writer = None;
        self.deadline = None;
        self.reassembler.clear();

        if let Some(command) = self.queue.take_in_flight() {
            if command.is_heartbeat() {
                self.heartbeat.reset_probe();
            }
            command.complete(Err(TransportError::Closed.into()));
        }
        let held = self.queue.len();
        if held > 0 {
            self.sink.log(
                Severity::Warning,
                format!("{held} command(s) held until the link is reopened"),
            );
        }
    }

    fn stop(&mut self) {
        for command in self.queue.drain() {
            command.complete(Err(EngineError::Stopped));
        }
        self.sink.log(Severity::Info, "engine stopped");
    }
}

async fn read_chunk(
    reader: &mut Option<ReadHalf<LinkStream>>,
    buf: &mut [u8],
) -> io::Result<usize> {
    match reader {
        Some(reader) => reader.read(buf).await,
        None => std::future::pending().await,
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

fn write_error(err: FrameError) -> TransportError {
    match err {
        FrameError::Io(io) => TransportError::Io(io),
        other => TransportError::Io(io::Error::other(other.to_string())),
    }
}
