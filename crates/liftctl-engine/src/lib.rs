//! Protocol engine for the lift controller console.
//!
//! A single tokio task owns the serial link and serializes every exchange
//! with the device: at most one command is in flight, each command gets a
//! bounded number of timed attempts, a periodic heartbeat locks the operator
//! panel when the device stops answering, and macros are replayed row by row
//! with cooperative cancellation.
//!
//! ```no_run
//! # async fn demo() -> liftctl_engine::Result<()> {
//! use liftctl_engine::{Engine, EngineConfig};
//! use liftctl_frame::DeviceAction;
//!
//! let link = liftctl_transport::SerialLink::open("/dev/ttyUSB0")?;
//! let engine = Engine::spawn(link, EngineConfig::default())?;
//! let handle = engine.handle();
//! handle.position(DeviceAction::Up).await?;
//! engine.shutdown().await?;
//! # Ok(())
//! # }
//! ```

pub mod batch;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod handle;
pub mod heartbeat;
mod queue;
pub mod sim;
pub mod status;

pub use batch::{BatchRunner, BatchSummary, RESET_LABEL};
pub use config::EngineConfig;
pub use engine::Engine;
pub use error::{EngineError, Result};
pub use events::{EngineEvent, LogLine, Severity};
pub use handle::EngineHandle;
pub use heartbeat::{HeartbeatPhase, HeartbeatState};
pub use queue::CommandAck;
pub use sim::SimDevice;
pub use status::{AccessState, DeviceStatus, StatusUpdate};
