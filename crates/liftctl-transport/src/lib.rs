//! Link abstraction for the lift controller.
//!
//! Provides a unified async byte stream over the two links the engine talks to:
//! - A serial port (RS-232 / USB CDC) opened through `tokio-serial`
//! - An in-memory duplex pipe, used by the simulated device and tests
//!
//! This is the lowest layer of liftctl. Everything else builds on top of
//! the [`LinkStream`] type provided here.

pub mod error;
pub mod serial;
pub mod traits;

pub use error::{Result, TransportError};
pub use serial::{list_ports, LinkConfig, Parity, PortInfo, SerialLink, StopBits};
pub use traits::{memory_pair, LinkStream};
