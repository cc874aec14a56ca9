use std::fmt::Write as _;

use bytes::{BufMut, Bytes, BytesMut};
use serde::Serialize;

use crate::error::{FrameError, Result};

/// Frame header: sync (2) + version (1) + command (1) + length (2) = 6 bytes.
pub const HEADER_SIZE: usize = 6;

/// Smallest complete frame: header + checksum, empty payload.
pub const MIN_FRAME_SIZE: usize = HEADER_SIZE + 1;

/// Sync word marking the start of every frame.
pub const SYNC_WORD: u16 = 0x55AA;

/// Protocol version sent by the console.
pub const VERSION: u8 = 0x00;

/// Largest payload a 16-bit length field can describe.
pub const MAX_PAYLOAD: usize = u16::MAX as usize;

const SYNC_BYTES: [u8; 2] = SYNC_WORD.to_be_bytes();

/// Frame opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Command {
    Heartbeat,
    DeviceControl,
    McuResponse,
    QueryStatus,
}

impl Command {
    /// Wire value of the opcode.
    pub fn code(self) -> u8 {
        match self {
            Command::Heartbeat => 0x00,
            Command::DeviceControl => 0x06,
            Command::McuResponse => 0x07,
            Command::QueryStatus => 0x08,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Command::Heartbeat => "HEARTBEAT",
            Command::DeviceControl => "DEVICE_CONTROL",
            Command::McuResponse => "MCU_RESPONSE",
            Command::QueryStatus => "QUERY_STATUS",
        }
    }
}

impl TryFrom<u8> for Command {
    type Error = FrameError;

    fn try_from(code: u8) -> Result<Self> {
        match code {
            0x00 => Ok(Command::Heartbeat),
            0x06 => Ok(Command::DeviceControl),
            0x07 => Ok(Command::McuResponse),
            0x08 => Ok(Command::QueryStatus),
            other => Err(FrameError::UnknownCommand(other)),
        }
    }
}

/// A single protocol frame.
///
/// The payload length is always derived from the payload; it is never stored
/// separately. Frames built locally carry a freshly computed checksum, decoded
/// frames carry the checksum byte as received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    version: u8,
    command: Command,
    payload: Bytes,
    checksum: u8,
}

impl Frame {
    /// Create a new frame with the console protocol version.
    pub fn new(command: Command, payload: impl Into<Bytes>) -> Result<Self> {
        Self::with_version(VERSION, command, payload)
    }

    /// Create a new frame with an explicit version byte.
    pub fn with_version(version: u8, command: Command, payload: impl Into<Bytes>) -> Result<Self> {
        let payload = payload.into();
        if payload.len() > MAX_PAYLOAD {
            return Err(FrameError::PayloadTooLarge {
                size: payload.len(),
                max: MAX_PAYLOAD,
            });
        }
        let checksum = header_and_payload_sum(version, command, &payload);
        Ok(Self {
            version,
            command,
            payload,
            checksum,
        })
    }

    pub fn version(&self) -> u8 {
        self.version
    }

    pub fn command(&self) -> Command {
        self.command
    }

    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// Declared payload length; always equal to `payload().len()`.
    pub fn payload_len(&self) -> u16 {
        // Bounded by MAX_PAYLOAD at construction.
        self.payload.len() as u16
    }

    /// Checksum carried by this frame.
    pub fn checksum(&self) -> u8 {
        self.checksum
    }

    /// The total wire size of this frame (header + payload + checksum).
    pub fn wire_size(&self) -> usize {
        MIN_FRAME_SIZE + self.payload.len()
    }

    /// Serialize to wire bytes.
    pub fn encode(&self, include_checksum: bool) -> Bytes {
        let mut dst = BytesMut::with_capacity(self.wire_size());
        encode_frame(self, include_checksum, &mut dst);
        dst.freeze()
    }
}

/// Encode a frame into the wire format.
///
/// Wire format:
/// ```text
/// ┌───────────┬─────────┬─────────┬───────────┬─────────────┬──────────┐
/// │ Sync (2B) │ Version │ Command │ Length    │ Payload     │ Checksum │
/// │ 0x55 0xAA │ (1B)    │ (1B)    │ (2B BE)   │ (Length B)  │ (1B)     │
/// └───────────┴─────────┴─────────┴───────────┴─────────────┴──────────┘
/// ```
///
/// The checksum is recomputed from the bytes written, whether or not it is
/// appended.
pub fn encode_frame(frame: &Frame, include_checksum: bool, dst: &mut BytesMut) {
    let start = dst.len();
    dst.reserve(frame.wire_size());
    dst.put_slice(&SYNC_BYTES);
    dst.put_u8(frame.version);
    dst.put_u8(frame.command.code());
    dst.put_u16(frame.payload_len());
    dst.put_slice(&frame.payload);
    if include_checksum {
        let sum = checksum(&dst[start..]);
        dst.put_u8(sum);
    }
}

/// Decode one frame from a byte range that starts at the sync word.
///
/// Does not verify the checksum; see [`verify_checksum`].
pub fn decode_frame(src: &[u8]) -> Result<Frame> {
    if src.len() < MIN_FRAME_SIZE {
        return Err(FrameError::Format {
            len: src.len(),
            needed: MIN_FRAME_SIZE,
        });
    }

    let payload_len = u16::from_be_bytes([src[4], src[5]]) as usize;
    let needed = MIN_FRAME_SIZE + payload_len;
    if src.len() < needed {
        return Err(FrameError::Format {
            len: src.len(),
            needed,
        });
    }

    let version = src[2];
    let command = Command::try_from(src[3])?;
    let payload = Bytes::copy_from_slice(&src[HEADER_SIZE..HEADER_SIZE + payload_len]);

    Ok(Frame {
        version,
        command,
        payload,
        checksum: src[HEADER_SIZE + payload_len],
    })
}

/// Unsigned modulo-256 sum of `bytes`.
pub fn checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0u8, |acc, b| acc.wrapping_add(*b))
}

/// Verify that the last byte of `raw` is the modulo-256 sum of the rest.
pub fn verify_checksum(raw: &[u8]) -> Result<()> {
    let Some((&received, body)) = raw.split_last() else {
        return Err(FrameError::Format {
            len: 0,
            needed: MIN_FRAME_SIZE,
        });
    };
    let computed = checksum(body);
    if computed != received {
        return Err(FrameError::Checksum { computed, received });
    }
    Ok(())
}

/// Upper-case, space-separated hex rendering used in log lines.
pub fn hex_dump(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 3);
    for (i, b) in bytes.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        let _ = write!(out, "{b:02X}");
    }
    out
}

fn header_and_payload_sum(version: u8, command: Command, payload: &[u8]) -> u8 {
    let len = (payload.len() as u16).to_be_bytes();
    let header = [
        SYNC_BYTES[0],
        SYNC_BYTES[1],
        version,
        command.code(),
        len[0],
        len[1],
    ];
    checksum(&header).wrapping_add(checksum(payload))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_decode_roundtrip() {
        let frame = Frame::new(Command::DeviceControl, vec![0x14, 0x01, 0x00, 0x01, 0x01]).unwrap();
        let wire = frame.encode(true);

        assert_eq!(wire.len(), frame.wire_size());

        let decoded = decode_frame(&wire).unwrap();
        assert_eq!(decoded.command(), Command::DeviceControl);
        assert_eq!(decoded.payload(), frame.payload());
        assert_eq!(decoded.payload_len(), 5);
        assert_eq!(decoded.checksum(), frame.checksum());
        verify_checksum(&wire).unwrap();
    }

    #[test]
    fn test_position_control_up_wire_bytes() {
        let frame = Frame::new(Command::DeviceControl, vec![0x67, 0x04, 0x00, 0x01, 0x00]).unwrap();
        let wire = frame.encode(true);
        assert_eq!(
            wire.as_ref(),
            &[0x55, 0xAA, 0x00, 0x06, 0x00, 0x05, 0x67, 0x04, 0x00, 0x01, 0x00, 0x76]
        );
        assert_eq!(frame.checksum(), 0x76);
    }

    #[test]
    fn test_encode_without_checksum() {
        let frame = Frame::new(Command::Heartbeat, Bytes::new()).unwrap();
        let wire = frame.encode(false);
        assert_eq!(wire.as_ref(), &[0x55, 0xAA, 0x00, 0x00, 0x00, 0x00]);
        assert_eq!(frame.checksum(), 0xFF);
    }

    #[test]
    fn test_query_status_matches_firmware() {
        let wire = Frame::new(Command::QueryStatus, Bytes::new())
            .unwrap()
            .encode(true);
        assert_eq!(wire.as_ref(), &[0x55, 0xAA, 0x00, 0x08, 0x00, 0x00, 0x07]);
    }

    #[test]
    fn test_decode_too_short() {
        let result = decode_frame(&[0x55, 0xAA, 0x00, 0x00, 0x00, 0x00]);
        assert!(matches!(
            result,
            Err(FrameError::Format { len: 6, needed: 7 })
        ));
    }

    #[test]
    fn test_decode_declared_length_exceeds_available() {
        let result = decode_frame(&[0x55, 0xAA, 0x00, 0x07, 0x00, 0x04, 0x01, 0x02]);
        assert!(matches!(
            result,
            Err(FrameError::Format { len: 8, needed: 11 })
        ));
    }

    #[test]
    fn test_decode_unknown_command() {
        let raw = [0x55, 0xAA, 0x00, 0x03, 0x00, 0x00, 0x02];
        assert!(matches!(
            decode_frame(&raw),
            Err(FrameError::UnknownCommand(0x03))
        ));
    }

    #[test]
    fn test_decode_keeps_received_checksum() {
        // Malformed but decodable: the checksum is wrong.
        let raw = [0x55, 0xAA, 0x00, 0x00, 0x00, 0x01, 0x01, 0x42];
        let frame = decode_frame(&raw).unwrap();
        assert_eq!(frame.checksum(), 0x42);
        assert!(matches!(
            verify_checksum(&raw),
            Err(FrameError::Checksum {
                computed: 0x01,
                received: 0x42
            })
        ));
    }

    #[test]
    fn test_flipped_payload_byte_fails_verification() {
        let frame = Frame::new(Command::McuResponse, vec![0x66, 0x02, 0x00, 0x02, 0x00, 0x10]).unwrap();
        let mut wire = frame.encode(true).to_vec();
        wire[9] ^= 0x01;
        assert!(matches!(
            verify_checksum(&wire),
            Err(FrameError::Checksum { .. })
        ));
    }

    #[test]
    fn test_checksum_wraps_modulo_256() {
        assert_eq!(checksum(&[0xFF, 0x02]), 0x01);
        assert_eq!(checksum(&[]), 0x00);
    }

    #[test]
    fn test_payload_too_large() {
        let result = Frame::new(Command::DeviceControl, vec![0u8; MAX_PAYLOAD + 1]);
        assert!(matches!(result, Err(FrameError::PayloadTooLarge { .. })));
    }

    #[test]
    fn test_hex_dump() {
        assert_eq!(hex_dump(&[0x55, 0xAA, 0x0F]), "55 AA 0F");
        assert_eq!(hex_dump(&[]), "");
    }

    #[test]
    fn test_command_codes() {
        for command in [
            Command::Heartbeat,
            Command::DeviceControl,
            Command::McuResponse,
            Command::QueryStatus,
        ] {
            assert_eq!(Command::try_from(command.code()).unwrap(), command);
        }
    }
}
