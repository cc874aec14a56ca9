use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite, DuplexStream, ReadBuf};

/// Default in-memory pipe capacity in bytes.
const MEMORY_PIPE_CAPACITY: usize = 4 * 1024;

/// A connected device link implementing `AsyncRead + AsyncWrite`.
///
/// This is the fundamental I/O type handed to the protocol engine.
/// It wraps either an open serial port or one end of an in-memory pipe.
pub struct LinkStream {
    inner: LinkStreamInner,
    name: String,
}

enum LinkStreamInner {
    Serial(tokio_serial::SerialStream),
    Memory(DuplexStream),
}

impl LinkStream {
    /// Create a link from an opened serial stream.
    pub(crate) fn from_serial(stream: tokio_serial::SerialStream, name: impl Into<String>) -> Self {
        Self {
            inner: LinkStreamInner::Serial(stream),
            name: name.into(),
        }
    }

    /// Create a link from one end of an in-memory duplex pipe.
    pub fn from_memory(stream: DuplexStream, name: impl Into<String>) -> Self {
        Self {
            inner: LinkStreamInner::Memory(stream),
            name: name.into(),
        }
    }

    /// Human-readable link name (port path or `memory:<tag>`).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Transport kind for diagnostics.
    pub fn kind(&self) -> &'static str {
        match &self.inner {
            LinkStreamInner::Serial(_) => "serial",
            LinkStreamInner::Memory(_) => "memory",
        }
    }
}

/// Create a connected pair of in-memory links.
///
/// The first element is the console side, the second the device side.
pub fn memory_pair(tag: &str) -> (LinkStream, LinkStream) {
    let (console, device) = tokio::io::duplex(MEMORY_PIPE_CAPACITY);
    (
        LinkStream::from_memory(console, format!("memory:{tag}")),
        LinkStream::from_memory(device, format!("memory:{tag}:device")),
    )
}

impl AsyncRead for LinkStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match &mut self.get_mut().inner {
            LinkStreamInner::Serial(stream) => Pin::new(stream).poll_read(cx, buf),
            LinkStreamInner::Memory(stream) => Pin::new(stream).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for LinkStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match &mut self.get_mut().inner {
            LinkStreamInner::Serial(stream) => Pin::new(stream).poll_write(cx, buf),
            LinkStreamInner::Memory(stream) => Pin::new(stream).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match &mut self.get_mut().inner {
            LinkStreamInner::Serial(stream) => Pin::new(stream).poll_flush(cx),
            LinkStreamInner::Memory(stream) => Pin::new(stream).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match &mut self.get_mut().inner {
            LinkStreamInner::Serial(stream) => Pin::new(stream).poll_shutdown(cx),
            LinkStreamInner::Memory(stream) => Pin::new(stream).poll_shutdown(cx),
        }
    }
}

impl std::fmt::Debug for LinkStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinkStream")
            .field("type", &self.kind())
            .field("name", &self.name)
            .finish()
    }
}
