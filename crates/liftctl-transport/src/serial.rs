use std::time::Duration;

use tokio_serial::{SerialPortBuilderExt, SerialPortType};
use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::traits::LinkStream;

/// Parity setting for the serial line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parity {
    None,
    Odd,
    Even,
}

/// Stop bit setting for the serial line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopBits {
    One,
    Two,
}

/// Serial line configuration.
///
/// Defaults match the lift controller firmware: 9600 baud, 8N1, no flow control.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkConfig {
    /// Line speed in bits per second.
    pub baud_rate: u32,
    /// Data bits per character (5..=8).
    pub data_bits: u8,
    pub parity: Parity,
    pub stop_bits: StopBits,
    /// Timeout applied by the driver to blocking port operations.
    pub port_timeout: Duration,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            baud_rate: 9600,
            data_bits: 8,
            parity: Parity::None,
            stop_bits: StopBits::One,
            port_timeout: Duration::from_millis(50),
        }
    }
}

impl LinkConfig {
    fn data_bits(&self) -> Result<tokio_serial::DataBits> {
        match self.data_bits {
            5 => Ok(tokio_serial::DataBits::Five),
            6 => Ok(tokio_serial::DataBits::Six),
            7 => Ok(tokio_serial::DataBits::Seven),
            8 => Ok(tokio_serial::DataBits::Eight),
            other => Err(TransportError::Unsupported(format!("data bits {other}"))),
        }
    }

    fn parity(&self) -> tokio_serial::Parity {
        match self.parity {
            Parity::None => tokio_serial::Parity::None,
            Parity::Odd => tokio_serial::Parity::Odd,
            Parity::Even => tokio_serial::Parity::Even,
        }
    }

    fn stop_bits(&self) -> tokio_serial::StopBits {
        match self.stop_bits {
            StopBits::One => tokio_serial::StopBits::One,
            StopBits::Two => tokio_serial::StopBits::Two,
        }
    }
}

/// Serial port transport.
pub struct SerialLink;

impl SerialLink {
    /// Open a serial port with the default line settings.
    pub fn open(port: &str) -> Result<LinkStream> {
        Self::open_with_config(port, &LinkConfig::default())
    }

    /// Open a serial port with explicit line settings.
    ///
    /// Must be called from within a tokio runtime.
    pub fn open_with_config(port: &str, config: &LinkConfig) -> Result<LinkStream> {
        let stream = tokio_serial::new(port, config.baud_rate)
            .data_bits(config.data_bits()?)
            .parity(config.parity())
            .stop_bits(config.stop_bits())
            .flow_control(tokio_serial::FlowControl::None)
            .timeout(config.port_timeout)
            .open_native_async()
            .map_err(|source| TransportError::Open {
                port: port.to_string(),
                source,
            })?;

        info!(port, baud = config.baud_rate, "serial link opened");
        Ok(LinkStream::from_serial(stream, port))
    }
}

/// Information about an available serial port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortInfo {
    /// Port name (e.g. "/dev/ttyUSB0", "COM3").
    pub name: String,
    /// Short description of the port type.
    pub description: String,
    /// Manufacturer name if reported by a USB adapter.
    pub manufacturer: Option<String>,
}

/// List serial ports present on the system.
pub fn list_ports() -> Result<Vec<PortInfo>> {
    let ports = tokio_serial::available_ports().map_err(TransportError::Enumerate)?;
    debug!(count = ports.len(), "enumerated serial ports");

    Ok(ports
        .into_iter()
        .map(|port| {
            let (description, manufacturer) = match port.port_type {
                SerialPortType::UsbPort(usb) => (
                    usb.product
                        .unwrap_or_else(|| format!("USB serial {:04x}:{:04x}", usb.vid, usb.pid)),
                    usb.manufacturer,
                ),
                SerialPortType::PciPort => ("PCI serial".to_string(), None),
                SerialPortType::BluetoothPort => ("Bluetooth serial".to_string(), None),
                SerialPortType::Unknown => ("serial".to_string(), None),
            };
            PortInfo {
                name: port.port_name,
                description,
                manufacturer,
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_9600_8n1() {
        let cfg = LinkConfig::default();
        assert_eq!(cfg.baud_rate, 9600);
        assert_eq!(cfg.data_bits, 8);
        assert_eq!(cfg.parity, Parity::None);
        assert_eq!(cfg.stop_bits, StopBits::One);
    }

    #[test]
    fn rejects_unsupported_data_bits() {
        let cfg = LinkConfig {
            data_bits: 9,
            ..LinkConfig::default()
        };
        assert!(matches!(
            cfg.data_bits(),
            Err(TransportError::Unsupported(_))
        ));
    }

    #[tokio::test]
    async fn open_missing_port_reports_open_error() {
        let err = SerialLink::open("/dev/liftctl-does-not-exist").unwrap_err();
        match err {
            TransportError::Open { port, .. } => assert_eq!(port, "/dev/liftctl-does-not-exist"),
            other => panic!("expected open error, got {other:?}"),
        }
    }
}
