//! Headless operator console for serial lift controllers.
//!
//! liftctl drives a lift controller over a half-duplex serial link: framed
//! device-control commands with retry, a heartbeat that locks the operator
//! panel when the device goes quiet, and replay of operator macros.
//!
//! # Crate Structure
//!
//! - [`transport`]: serial and in-memory links
//! - [`frame`]: wire codec, data points, stream reassembly
//! - [`macros`]: macro file format and batch validation
//! - [`engine`]: the protocol actor (behind the `engine` feature)

/// Re-export transport types.
pub mod transport {
    pub use liftctl_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use liftctl_frame::*;
}

/// Re-export macro file types.
pub mod macros {
    pub use liftctl_macro::*;
}

/// Re-export engine types (requires `engine` feature).
#[cfg(feature = "engine")]
pub mod engine {
    pub use liftctl_engine::*;
}
