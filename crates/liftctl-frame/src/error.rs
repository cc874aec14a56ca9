/// Errors that can occur during frame encoding/decoding.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The byte range is too short or shorter than its declared length.
    #[error("malformed frame ({len} bytes available, {needed} needed)")]
    Format { len: usize, needed: usize },

    /// The trailing checksum byte does not match the recomputed sum.
    #[error("checksum mismatch (computed 0x{computed:02X}, received 0x{received:02X})")]
    Checksum { computed: u8, received: u8 },

    /// The frame carries a command byte this engine does not know.
    #[error("unknown command 0x{0:02X}")]
    UnknownCommand(u8),

    /// A DataPoint id that has no entry in the DP table.
    #[error("unknown data point 0x{0:02X}")]
    UnknownDataPoint(u8),

    /// The payload or DP value exceeds what a 16-bit length can describe.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// The reassembly buffer grew past its limit without yielding a frame.
    #[error("receive buffer overflow ({len} bytes without a frame)")]
    BufferOverflow { len: usize },

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, FrameError>;
