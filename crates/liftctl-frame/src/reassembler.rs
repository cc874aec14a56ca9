use bytes::BytesMut;
use tracing::{trace, warn};

use crate::codec::{checksum, decode_frame, hex_dump, Frame, HEADER_SIZE, MIN_FRAME_SIZE, SYNC_WORD};
use crate::error::{FrameError, Result};

/// Default receive buffer limit in bytes.
pub const DEFAULT_MAX_BUFFERED: usize = 4 * 1024;

const SYNC_BYTES: [u8; 2] = SYNC_WORD.to_be_bytes();

/// Stream reassembly limits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReassemblerConfig {
    /// Bytes held without yielding a frame before the buffer is dropped.
    pub max_buffered_bytes: usize,
}

impl Default for ReassemblerConfig {
    fn default() -> Self {
        Self {
            max_buffered_bytes: DEFAULT_MAX_BUFFERED,
        }
    }
}

/// Accumulates raw link bytes and extracts complete, verified frames.
///
/// Bytes arrive in arbitrary chunks: a frame may be split across reads and a
/// single read may carry several frames or line noise. Call [`extend`] with
/// every chunk, then drain with [`next_frame`] until it returns `Ok(None)`.
///
/// [`extend`]: StreamReassembler::extend
/// [`next_frame`]: StreamReassembler::next_frame
#[derive(Debug, Default)]
pub struct StreamReassembler {
    buf: BytesMut,
    config: ReassemblerConfig,
}

impl StreamReassembler {
    pub fn new() -> Self {
        Self::with_config(ReassemblerConfig::default())
    }

    pub fn with_config(config: ReassemblerConfig) -> Self {
        Self {
            buf: BytesMut::with_capacity(config.max_buffered_bytes.min(DEFAULT_MAX_BUFFERED)),
            config,
        }
    }

    /// Append received bytes.
    pub fn extend(&mut self, chunk: &[u8]) {
        self.buf.extend_from_slice(chunk);
    }

    /// Extract the next complete frame, if one is buffered.
    ///
    /// Errors are per-frame: after an error the reassembler is still usable
    /// and the caller keeps draining.
    pub fn next_frame(&mut self) -> Result<Option<Frame>> {
        split_frame(&mut self.buf, self.config.max_buffered_bytes)
    }

    /// Number of bytes currently held.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Drop all buffered bytes.
    pub fn clear(&mut self) {
        self.buf.clear();
    }

    pub fn config(&self) -> &ReassemblerConfig {
        &self.config
    }
}

/// Extract one frame from the front of `buf`.
///
/// - No sync word: nothing is consumed, `Ok(None)`.
/// - Sync word found but the header or the declared frame is incomplete:
///   nothing is consumed, `Ok(None)`.
/// - Complete frame: everything up to and including its checksum is consumed,
///   including any garbage before the sync word.
/// - Checksum mismatch: the whole buffer is dropped.
/// - Unknown command: the frame is consumed and reported.
pub fn split_frame(buf: &mut BytesMut, max_buffered: usize) -> Result<Option<Frame>> {
    if buf.len() > max_buffered {
        let len = buf.len();
        buf.clear();
        warn!(len, max_buffered, "receive buffer overflow, dropping buffered bytes");
        return Err(FrameError::BufferOverflow { len });
    }

    let Some(start) = buf.windows(2).position(|w| w == SYNC_BYTES) else {
        return Ok(None);
    };

    let available = buf.len() - start;
    if available < HEADER_SIZE {
        return Ok(None);
    }

    let payload_len = u16::from_be_bytes([buf[start + 4], buf[start + 5]]) as usize;
    let total = MIN_FRAME_SIZE + payload_len;
    if available < total {
        return Ok(None);
    }

    if start > 0 {
        trace!(skipped = start, "discarding bytes before sync word");
    }
    let raw = buf.split_to(start + total);
    let raw = &raw[start..];

    let (&received, body) = match raw.split_last() {
        Some(parts) => parts,
        None => return Ok(None),
    };
    let computed = checksum(body);
    if computed != received {
        warn!(
            computed,
            received,
            frame = %hex_dump(raw),
            dropped = buf.len(),
            "checksum mismatch, clearing receive buffer"
        );
        buf.clear();
        return Err(FrameError::Checksum { computed, received });
    }

    let frame = decode_frame(raw)?;
    trace!(command = frame.command().name(), len = payload_len, "frame reassembled");
    Ok(Some(frame))
}
