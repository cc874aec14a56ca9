use std::collections::VecDeque;

use liftctl_frame::{Command, Frame};
use tokio::sync::oneshot;

use crate::error::Result;

/// Successful resolution of a submitted command.
#[derive(Debug, Clone)]
pub struct CommandAck {
    pub label: String,
    /// Transmissions it took, starting at 1.
    pub attempts: u32,
    /// The frame that resolved the command.
    pub response: Frame,
}

pub(crate) type Reply = oneshot::Sender<Result<CommandAck>>;

/// A queued or in-flight command.
#[derive(Debug)]
pub(crate) struct PendingCommand {
    pub frame: Frame,
    pub label: String,
    /// Transmissions so far.
    pub attempt: u32,
    pub awaiting_response: bool,
    pub reply: Option<Reply>,
}

impl PendingCommand {
    pub fn new(frame: Frame, label: String, reply: Option<Reply>) -> Self {
        Self {
            frame,
            label,
            attempt: 0,
            awaiting_response: false,
            reply,
        }
    }

    pub fn is_heartbeat(&self) -> bool {
        self.frame.command() == Command::Heartbeat
    }

    /// Whether an inbound frame of `command` resolves this command.
    pub fn resolved_by(&self, command: Command) -> bool {
        match command {
            Command::Heartbeat => self.is_heartbeat(),
            Command::McuResponse => !self.is_heartbeat(),
            Command::DeviceControl | Command::QueryStatus => false,
        }
    }

    pub fn complete(mut self, result: Result<CommandAck>) {
        if let Some(reply) = self.reply.take() {
            // The submitter may have stopped waiting.
            let _ = reply.send(result);
        }
    }
}

/// What a response timeout means for the in-flight command.
#[derive(Debug)]
pub(crate) enum Expiry {
    /// Attempts remain; the head is ready to be retransmitted.
    Retry,
    /// Out of attempts; the command has been removed from the queue.
    Abandon(PendingCommand),
}

/// FIFO of pending commands. Only the head is ever in flight.
#[derive(Debug)]
pub(crate) struct CommandQueue {
    queue: VecDeque<PendingCommand>,
    max_attempts: u32,
}

impl CommandQueue {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            queue: VecDeque::new(),
            max_attempts,
        }
    }

    pub fn push(&mut self, command: PendingCommand) {
        self.queue.push_back(command);
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn in_flight(&self) -> Option<&PendingCommand> {
        self.queue.front().filter(|c| c.awaiting_response)
    }

    /// Mark the head as transmitted and return it, unless it is already in
    /// flight.
    pub fn begin_transmit(&mut self) -> Option<&PendingCommand> {
        let head = self.queue.front_mut()?;
        if head.awaiting_response {
            return None;
        }
        head.attempt += 1;
        head.awaiting_response = true;
        Some(head)
    }

    /// Remove the in-flight head.
    pub fn take_in_flight(&mut self) -> Option<PendingCommand> {
        self.in_flight()?;
        self.queue.pop_front()
    }

    pub fn expire(&mut self) -> Option<Expiry> {
        let head = self.queue.front_mut()?;
        if !head.awaiting_response {
            return None;
        }
        if head.attempt < self.max_attempts {
            head.awaiting_response = false;
            return Some(Expiry::Retry);
        }
        self.queue.pop_front().map(Expiry::Abandon)
    }

    /// Remove every queued command.
    pub fn drain(&mut self) -> impl Iterator<Item = PendingCommand> + '_ {
        self.queue.drain(..)
    }
}
