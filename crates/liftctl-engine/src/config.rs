use std::time::Duration;

use liftctl_frame::DEFAULT_MAX_BUFFERED;

/// Protocol engine tuning.
///
/// Defaults match the lift controller firmware: 200 ms response budget, three
/// transmissions per command and a heartbeat every 10 s.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Time to wait for a response before retransmitting.
    pub response_timeout: Duration,
    /// Transmissions per command before it is abandoned.
    pub max_attempts: u32,
    pub heartbeat_interval: Duration,
    pub heartbeat_enabled: bool,
    /// Capacity of the submission channel into the engine task.
    pub request_queue_depth: usize,
    /// Capacity of the event broadcast channel.
    pub event_capacity: usize,
    pub max_buffered_bytes: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            response_timeout: Duration::from_millis(200),
            max_attempts: 3,
            heartbeat_interval: Duration::from_millis(10_000),
            heartbeat_enabled: true,
            request_queue_depth: 64,
            event_capacity: 256,
            max_buffered_bytes: DEFAULT_MAX_BUFFERED,
        }
    }
}

impl EngineConfig {
    /// Full retry budget of one command.
    pub fn retry_window(&self) -> Duration {
        self.response_timeout.saturating_mul(self.max_attempts)
    }

    /// Check cross-field constraints.
    ///
    /// The heartbeat interval must exceed the retry window so one probe's
    /// retry cycle completes before the next probe is due.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_attempts == 0 {
            return Err("max_attempts must be at least 1".into());
        }
        if self.response_timeout.is_zero() {
            return Err("response_timeout must be non-zero".into());
        }
        if self.heartbeat_enabled && self.heartbeat_interval <= self.retry_window() {
            return Err(format!(
                "heartbeat_interval ({:?}) must exceed max_attempts x response_timeout ({:?})",
                self.heartbeat_interval,
                self.retry_window()
            ));
        }
        if self.request_queue_depth == 0 || self.event_capacity == 0 {
            return Err("channel capacities must be non-zero".into());
        }
        if self.max_buffered_bytes < liftctl_frame::MIN_FRAME_SIZE {
            return Err("max_buffered_bytes is smaller than one frame".into());
        }
        Ok(())
    }
}
