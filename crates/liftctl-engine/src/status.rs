use liftctl_frame::{
    AccessChannel, AfMode, AllStatus, DataPoint, DeviceAction, DpReport, SwitchState,
};
use serde::Serialize;

/// Access channel as reported by the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum AccessState {
    Known(AccessChannel),
    /// A value outside the range of the current A/F mode.
    Unknown(u8),
}

impl AccessState {
    fn decode(mode: AfMode, value: u8) -> Self {
        AccessChannel::new(mode, value).map_or(AccessState::Unknown(value), AccessState::Known)
    }
}

/// One changed status field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "field", content = "value", rename_all = "snake_case")]
pub enum StatusUpdate {
    Switch(SwitchState),
    AccessChannel(AccessState),
    MaxChannel(u16),
    Channel(u16),
    Action(DeviceAction),
    AfMode(AfMode),
}

/// Last known device state. Fields stay `None` until the device reports them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeviceStatus {
    pub switch: Option<SwitchState>,
    pub access_channel: Option<AccessState>,
    pub max_channel: Option<u16>,
    pub channel: Option<u16>,
    pub action: Option<DeviceAction>,
    pub af_mode: Option<AfMode>,
}

/// Result of applying a report: the fields that were set and any raw values
/// that had no meaning.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Applied {
    pub updates: Vec<StatusUpdate>,
    pub unrecognized: Vec<(DataPoint, u8)>,
}

impl DeviceStatus {
    /// A/F mode used to interpret access channel values; the device powers
    /// up in mode A.
    pub fn mode(&self) -> AfMode {
        self.af_mode.unwrap_or(AfMode::A)
    }

    /// Fold a decoded `MCU_RESPONSE` into the snapshot.
    pub fn apply(&mut self, report: &DpReport) -> Applied {
        let mut applied = Applied::default();
        match *report {
            DpReport::Switch(v) => self.apply_switch(v, &mut applied),
            DpReport::AccessChannel(v) => self.apply_access(v, &mut applied),
            DpReport::MaxChannel(v) => {
                self.max_channel = Some(v);
                applied.updates.push(StatusUpdate::MaxChannel(v));
            }
            DpReport::Channel(v) => {
                self.channel = Some(v);
                applied.updates.push(StatusUpdate::Channel(v));
            }
            DpReport::Position(v) => self.apply_action(v, &mut applied),
            DpReport::AfMode(v) => self.apply_mode(v, &mut applied),
            DpReport::AllStatus(all) => {
                // Mode first: it decides how the access byte reads.
                self.apply_mode(all.af_mode, &mut applied);
                self.apply_switch(all.switch, &mut applied);
                self.apply_access(all.access_channel, &mut applied);
                self.max_channel = Some(all.max_channel);
                applied.updates.push(StatusUpdate::MaxChannel(all.max_channel));
                self.channel = Some(all.channel);
                applied.updates.push(StatusUpdate::Channel(all.channel));
                self.apply_action(all.action, &mut applied);
            }
        }
        applied
    }

    /// The ALL_STATUS record that returns the device to a safe state:
    /// switch off, first access channel, channel 99, action UP. The max
    /// channel and A/F mode are preserved.
    pub fn reset_record(&self) -> AllStatus {
        AllStatus {
            switch: SwitchState::Off.value(),
            access_channel: 0,
            max_channel: self.max_channel.unwrap_or_default(),
            channel: 99,
            action: DeviceAction::Up.value(),
            af_mode: self.mode().value(),
        }
    }

    fn apply_switch(&mut self, value: u8, applied: &mut Applied) {
        match SwitchState::from_value(value) {
            Some(state) => {
                self.switch = Some(state);
                applied.updates.push(StatusUpdate::Switch(state));
            }
            None => applied.unrecognized.push((DataPoint::OffOn, value)),
        }
    }

    fn apply_access(&mut self, value: u8, applied: &mut Applied) {
        let state = AccessState::decode(self.mode(), value);
        self.access_channel = Some(state);
        applied.updates.push(StatusUpdate::AccessChannel(state));
    }

    fn apply_action(&mut self, value: u8, applied: &mut Applied) {
        match DeviceAction::from_value(value) {
            Some(action) => {
                self.action = Some(action);
                applied.updates.push(StatusUpdate::Action(action));
            }
            None => applied.unrecognized.push((DataPoint::PositionControl, value)),
        }
    }

    fn apply_mode(&mut self, value: u8, applied: &mut Applied) {
        match AfMode::from_value(value) {
            Some(mode) => {
                self.af_mode = Some(mode);
                applied.updates.push(StatusUpdate::AfMode(mode));
            }
            None => applied.unrecognized.push((DataPoint::AfSelect, value)),
        }
    }
}
