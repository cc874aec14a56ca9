use bytes::BytesMut;
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::codec::{encode_frame, Frame};
use crate::error::Result;

const INITIAL_BUFFER_CAPACITY: usize = 256;

/// Writes complete frames to any `AsyncWrite` link.
pub struct FrameWriter<T> {
    inner: T,
    buf: BytesMut,
}

impl<T: AsyncWrite + Unpin> FrameWriter<T> {
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
        }
    }

    /// Encode `frame` with its checksum, write it fully and flush.
    ///
    /// Returns the bytes that went out on the wire.
    pub async fn write_frame(&mut self, frame: &Frame) -> Result<&[u8]> {
        self.buf.clear();
        encode_frame(frame, true, &mut self.buf);
        self.inner.write_all(&self.buf).await?;
        self.inner.flush().await?;
        Ok(&self.buf)
    }

    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    pub fn into_inner(self) -> T {
        self.inner
    }
}
