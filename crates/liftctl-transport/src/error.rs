/// Errors that can occur on the device link.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Failed to open the serial port.
    #[error("failed to open {port}: {source}")]
    Open {
        port: String,
        source: tokio_serial::Error,
    },

    /// Failed to enumerate serial ports.
    #[error("failed to enumerate serial ports: {0}")]
    Enumerate(tokio_serial::Error),

    /// An I/O error occurred on the link.
    #[error("link I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The link is not open or not writable.
    #[error("link not open")]
    Closed,

    /// The link configuration is not supported.
    #[error("unsupported link setting: {0}")]
    Unsupported(String),
}

pub type Result<T> = std::result::Result<T, TransportError>;
