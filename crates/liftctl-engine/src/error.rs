use liftctl_frame::FrameError;
use liftctl_macro::ValidationErrors;
use liftctl_transport::TransportError;

/// Errors surfaced by the protocol engine to its callers.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The link is not open or a write failed.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// A frame could not be built.
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),

    /// No response after every attempt; the command was abandoned.
    #[error("{label}: no response after {attempts} attempt(s)")]
    Timeout { label: String, attempts: u32 },

    /// Batch rows failed validation; nothing was transmitted.
    #[error(transparent)]
    Validation(#[from] ValidationErrors),

    /// Invalid engine configuration.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Operator controls are locked until the next successful heartbeat.
    #[error("operator panel is locked (device not answering heartbeats)")]
    PanelLocked,

    /// The request conflicts with known device state.
    #[error("rejected: {0}")]
    Rejected(String),

    /// The engine task is no longer running.
    #[error("engine stopped")]
    Stopped,
}

pub type Result<T> = std::result::Result<T, EngineError>;
