//! DataPoint (DP) tables and payload layouts.
//!
//! A `DEVICE_CONTROL` payload is `[dp:1][type:1][len:2 BE][value:len]`. The
//! device answers with an `MCU_RESPONSE` using the same layout; the value
//! always starts at offset 4.

use std::fmt;

use bytes::{BufMut, Bytes, BytesMut};
use serde::Serialize;

use crate::codec::{Command, Frame};
use crate::error::{FrameError, Result};

/// Offset of the value within a DP payload.
pub const VALUE_OFFSET: usize = 4;

/// Byte length of a packed ALL_STATUS value.
pub const ALL_STATUS_LEN: usize = 8;

/// Addressable device property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DataPoint {
    OffOn,
    AccessSelect,
    MaxChannel,
    Channel,
    PositionControl,
    AfSelect,
    AllStatus,
}

/// Data type code transmitted after the DP id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DataType {
    Type01,
    Type02,
    Type04,
}

impl DataType {
    pub fn code(self) -> u8 {
        match self {
            DataType::Type01 => 0x01,
            DataType::Type02 => 0x02,
            DataType::Type04 => 0x04,
        }
    }
}

impl DataPoint {
    pub const ALL: [DataPoint; 7] = [
        DataPoint::OffOn,
        DataPoint::AccessSelect,
        DataPoint::MaxChannel,
        DataPoint::Channel,
        DataPoint::PositionControl,
        DataPoint::AfSelect,
        DataPoint::AllStatus,
    ];

    pub fn id(self) -> u8 {
        match self {
            DataPoint::OffOn => 0x14,
            DataPoint::AccessSelect => 0x15,
            DataPoint::MaxChannel => 0x65,
            DataPoint::Channel => 0x66,
            DataPoint::PositionControl => 0x67,
            DataPoint::AfSelect => 0x68,
            DataPoint::AllStatus => 0x69,
        }
    }

    /// Data type code the device expects for this DP.
    pub fn data_type(self) -> DataType {
        match self {
            DataPoint::OffOn | DataPoint::AfSelect => DataType::Type01,
            DataPoint::MaxChannel | DataPoint::Channel | DataPoint::AllStatus => DataType::Type02,
            DataPoint::AccessSelect | DataPoint::PositionControl => DataType::Type04,
        }
    }

    /// Natural value width in bytes used by the typed constructors.
    pub fn value_width(self) -> usize {
        match self {
            DataPoint::OffOn
            | DataPoint::AccessSelect
            | DataPoint::PositionControl
            | DataPoint::AfSelect => 1,
            DataPoint::MaxChannel | DataPoint::Channel => 2,
            DataPoint::AllStatus => ALL_STATUS_LEN,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            DataPoint::OffOn => "OFF_ON",
            DataPoint::AccessSelect => "ACCESS_SELECT",
            DataPoint::MaxChannel => "MAXCHANNEL",
            DataPoint::Channel => "CHANNEL",
            DataPoint::PositionControl => "POSITION_CONTROL",
            DataPoint::AfSelect => "A_F_SELECT",
            DataPoint::AllStatus => "ALL_STATUS",
        }
    }
}

impl TryFrom<u8> for DataPoint {
    type Error = FrameError;

    fn try_from(id: u8) -> Result<Self> {
        DataPoint::ALL
            .into_iter()
            .find(|dp| dp.id() == id)
            .ok_or(FrameError::UnknownDataPoint(id))
    }
}

/// Power switch state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SwitchState {
    Off,
    On,
}

impl SwitchState {
    pub fn value(self) -> u8 {
        match self {
            SwitchState::Off => 0x00,
            SwitchState::On => 0x01,
        }
    }

    pub fn from_value(value: u8) -> Option<Self> {
        match value {
            0x00 => Some(SwitchState::Off),
            0x01 => Some(SwitchState::On),
            _ => None,
        }
    }
}

impl fmt::Display for SwitchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SwitchState::Off => "OFF",
            SwitchState::On => "ON",
        })
    }
}

/// Lift movement command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DeviceAction {
    Up,
    Stop,
    Down,
}

impl DeviceAction {
    pub fn value(self) -> u8 {
        match self {
            DeviceAction::Up => 0x00,
            DeviceAction::Stop => 0x01,
            DeviceAction::Down => 0x02,
        }
    }

    pub fn from_value(value: u8) -> Option<Self> {
        match value {
            0x00 => Some(DeviceAction::Up),
            0x01 => Some(DeviceAction::Stop),
            0x02 => Some(DeviceAction::Down),
            _ => None,
        }
    }

    /// Parse the operator spelling (`UP`, `STOP`, `DOWN`).
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "UP" => Some(DeviceAction::Up),
            "STOP" => Some(DeviceAction::Stop),
            "DOWN" => Some(DeviceAction::Down),
            _ => None,
        }
    }
}

impl fmt::Display for DeviceAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DeviceAction::Up => "UP",
            DeviceAction::Stop => "STOP",
            DeviceAction::Down => "DOWN",
        })
    }
}

/// Access channel naming scheme selected on the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AfMode {
    /// Channels `A`..`D`.
    A,
    /// Channels `F0`..`F9`.
    F,
}

impl AfMode {
    pub fn value(self) -> u8 {
        match self {
            AfMode::A => 0x00,
            AfMode::F => 0x01,
        }
    }

    pub fn from_value(value: u8) -> Option<Self> {
        match value {
            0x00 => Some(AfMode::A),
            0x01 => Some(AfMode::F),
            _ => None,
        }
    }

    /// Number of access channels valid in this mode.
    pub fn channel_count(self) -> u8 {
        match self {
            AfMode::A => 4,
            AfMode::F => 10,
        }
    }
}

impl fmt::Display for AfMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AfMode::A => "A",
            AfMode::F => "F",
        })
    }
}

/// An access channel name such as `B` or `F7`.
///
/// The wire value is the index within its mode, so `A` and `F0` both encode
/// as `0x00`; which one a received byte means depends on the current
/// [`AfMode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessChannel {
    mode: AfMode,
    index: u8,
}

impl AccessChannel {
    /// Decode a wire value under the given mode.
    pub fn new(mode: AfMode, index: u8) -> Option<Self> {
        (index < mode.channel_count()).then_some(Self { mode, index })
    }

    /// Parse an operator name: `A`..`D` or `F0`..`F9`.
    pub fn parse(name: &str) -> Option<Self> {
        let bytes = name.as_bytes();
        match bytes {
            [c @ b'A'..=b'D'] => Self::new(AfMode::A, c - b'A'),
            [b'F', d @ b'0'..=b'9'] => Self::new(AfMode::F, d - b'0'),
            _ => None,
        }
    }

    pub fn mode(self) -> AfMode {
        self.mode
    }

    /// Wire value.
    pub fn value(self) -> u8 {
        self.index
    }
}

impl fmt::Display for AccessChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.mode {
            AfMode::A => write!(f, "{}", char::from(b'A' + self.index)),
            AfMode::F => write!(f, "F{}", self.index),
        }
    }
}

impl Serialize for AccessChannel {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Packed ALL_STATUS value: every device property in one 8-byte record.
///
/// Fields are kept as raw wire values; interpretation of `access_channel`
/// depends on `af_mode`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AllStatus {
    pub switch: u8,
    pub access_channel: u8,
    pub max_channel: u16,
    pub channel: u16,
    pub action: u8,
    pub af_mode: u8,
}

impl AllStatus {
    /// Layout: `[switch][access][max:2 BE][channel:2 BE][action][af_mode]`.
    pub fn pack(&self) -> [u8; ALL_STATUS_LEN] {
        let max = self.max_channel.to_be_bytes();
        let channel = self.channel.to_be_bytes();
        [
            self.switch,
            self.access_channel,
            max[0],
            max[1],
            channel[0],
            channel[1],
            self.action,
            self.af_mode,
        ]
    }

    pub fn unpack(value: &[u8]) -> Result<Self> {
        if value.len() < ALL_STATUS_LEN {
            return Err(FrameError::Format {
                len: value.len(),
                needed: ALL_STATUS_LEN,
            });
        }
        Ok(Self {
            switch: value[0],
            access_channel: value[1],
            max_channel: u16::from_be_bytes([value[2], value[3]]),
            channel: u16::from_be_bytes([value[4], value[5]]),
            action: value[6],
            af_mode: value[7],
        })
    }
}

/// A device-control command: one DP and its value bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DpCommand {
    dp: DataPoint,
    value: Bytes,
}

impl DpCommand {
    pub fn new(dp: DataPoint, value: impl Into<Bytes>) -> Result<Self> {
        let value = value.into();
        if value.len() > u16::MAX as usize {
            return Err(FrameError::PayloadTooLarge {
                size: value.len(),
                max: u16::MAX as usize,
            });
        }
        Ok(Self { dp, value })
    }

    /// Build from a raw DP id; unknown ids fail here rather than on the wire.
    pub fn from_raw(id: u8, value: impl Into<Bytes>) -> Result<Self> {
        Self::new(DataPoint::try_from(id)?, value)
    }

    pub fn switch(state: SwitchState) -> Self {
        Self::fixed(DataPoint::OffOn, &[state.value()])
    }

    pub fn access_channel(channel: AccessChannel) -> Self {
        Self::fixed(DataPoint::AccessSelect, &[channel.value()])
    }

    pub fn max_channel(max: u16) -> Self {
        Self::fixed(DataPoint::MaxChannel, &max.to_be_bytes())
    }

    pub fn channel(channel: u16) -> Self {
        Self::fixed(DataPoint::Channel, &channel.to_be_bytes())
    }

    pub fn position(action: DeviceAction) -> Self {
        Self::fixed(DataPoint::PositionControl, &[action.value()])
    }

    pub fn af_select(mode: AfMode) -> Self {
        Self::fixed(DataPoint::AfSelect, &[mode.value()])
    }

    pub fn all_status(status: &AllStatus) -> Self {
        Self::fixed(DataPoint::AllStatus, &status.pack())
    }

    fn fixed(dp: DataPoint, value: &[u8]) -> Self {
        Self {
            dp,
            value: Bytes::copy_from_slice(value),
        }
    }

    pub fn data_point(&self) -> DataPoint {
        self.dp
    }

    pub fn value(&self) -> &Bytes {
        &self.value
    }

    /// Encode as a `DEVICE_CONTROL` payload.
    pub fn encode_payload(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(VALUE_OFFSET + self.value.len());
        buf.put_u8(self.dp.id());
        buf.put_u8(self.dp.data_type().code());
        // Bounded by u16::MAX at construction.
        buf.put_u16(self.value.len() as u16);
        buf.put_slice(&self.value);
        buf.freeze()
    }

    /// Wrap into a `DEVICE_CONTROL` frame.
    pub fn into_frame(self) -> Result<Frame> {
        Frame::new(Command::DeviceControl, self.encode_payload())
    }
}

/// Status carried by an `MCU_RESPONSE` payload.
///
/// Values are raw; mode-dependent interpretation happens in the status model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DpReport {
    Switch(u8),
    AccessChannel(u8),
    MaxChannel(u16),
    Channel(u16),
    Position(u8),
    AfMode(u8),
    AllStatus(AllStatus),
}

impl DpReport {
    /// Decode an `MCU_RESPONSE` payload.
    pub fn decode(payload: &[u8]) -> Result<Self> {
        require(payload, VALUE_OFFSET + 1)?;
        let dp = DataPoint::try_from(payload[0])?;
        let value = &payload[VALUE_OFFSET..];

        Ok(match dp {
            DataPoint::OffOn => DpReport::Switch(value[0]),
            DataPoint::AccessSelect => DpReport::AccessChannel(value[0]),
            DataPoint::MaxChannel => {
                require(payload, VALUE_OFFSET + 2)?;
                DpReport::MaxChannel(u16::from_be_bytes([value[0], value[1]]))
            }
            DataPoint::Channel => {
                require(payload, VALUE_OFFSET + 2)?;
                DpReport::Channel(u16::from_be_bytes([value[0], value[1]]))
            }
            DataPoint::PositionControl => DpReport::Position(value[0]),
            DataPoint::AfSelect => DpReport::AfMode(value[0]),
            DataPoint::AllStatus => {
                require(payload, VALUE_OFFSET + ALL_STATUS_LEN)?;
                DpReport::AllStatus(AllStatus::unpack(value)?)
            }
        })
    }

    pub fn data_point(&self) -> DataPoint {
        match self {
            DpReport::Switch(_) => DataPoint::OffOn,
            DpReport::AccessChannel(_) => DataPoint::AccessSelect,
            DpReport::MaxChannel(_) => DataPoint::MaxChannel,
            DpReport::Channel(_) => DataPoint::Channel,
            DpReport::Position(_) => DataPoint::PositionControl,
            DpReport::AfMode(_) => DataPoint::AfSelect,
            DpReport::AllStatus(_) => DataPoint::AllStatus,
        }
    }
}

fn require(payload: &[u8], needed: usize) -> Result<()> {
    if payload.len() < needed {
        return Err(FrameError::Format {
            len: payload.len(),
            needed,
        });
    }
    Ok(())
}

/// Liveness probe; empty payload.
pub fn heartbeat_frame() -> Frame {
    empty_frame(Command::Heartbeat)
}

/// Ask the device to report ALL_STATUS.
pub fn query_status_frame() -> Frame {
    empty_frame(Command::QueryStatus)
}

/// `DEVICE_CONTROL` frame for a DP and explicit value bytes.
pub fn device_control_frame(dp: DataPoint, value: &[u8]) -> Result<Frame> {
    DpCommand::new(dp, Bytes::copy_from_slice(value))?.into_frame()
}

fn empty_frame(command: Command) -> Frame {
    match Frame::new(command, Bytes::new()) {
        Ok(frame) => frame,
        // An empty payload is always within the length limit.
        Err(_) => unreachable!("empty payload rejected"),
    }
}
