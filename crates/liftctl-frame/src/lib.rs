//! Checksummed binary framing for the lift controller link.
//!
//! Every message on the wire is framed as:
//! - A 2-byte sync word (`0x55 0xAA`) for stream synchronization
//! - A version byte and a command byte
//! - A 2-byte big-endian payload length
//! - The payload, followed by a modulo-256 sum of all preceding bytes
//!
//! Device-control payloads carry a DataPoint (DP) id, a data type code and a
//! length-prefixed value; see [`dp`].

pub mod codec;
pub mod dp;
pub mod error;
pub mod reassembler;

#[cfg(feature = "async")]
pub mod tokio_codec;
#[cfg(feature = "async")]
pub mod writer;

pub use codec::{
    checksum, decode_frame, encode_frame, hex_dump, verify_checksum, Command, Frame,
    HEADER_SIZE, MAX_PAYLOAD, MIN_FRAME_SIZE, SYNC_WORD, VERSION,
};
pub use dp::{
    device_control_frame, heartbeat_frame, query_status_frame, AccessChannel, AfMode, AllStatus,
    DataPoint, DataType, DeviceAction, DpCommand, DpReport, SwitchState,
};
pub use error::{FrameError, Result};
pub use reassembler::{ReassemblerConfig, StreamReassembler, DEFAULT_MAX_BUFFERED};

#[cfg(feature = "async")]
pub use tokio_codec::FrameCodec;
#[cfg(feature = "async")]
pub use writer::FrameWriter;
