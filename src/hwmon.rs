//! Presents the PSU readings in the shape of a Linux hwmon chip.
//!
//! Channels are addressed by sensor type, attribute and index, values use
//! hwmon units (millivolts, milliamps, microwatts) and every attribute is read only.

use crate::{
    command::TemperatureChannel,
    error::{Error, Result},
    psu::HxiPsu,
    rail::{Measurement, RAIL_COUNT, RailId},
    transport::HidTransport,
};

/// Name the chip registers under.
pub const CHIP_NAME: &str = "hxipsu";

/// File mode of every attribute: read only for everyone.
pub const ATTRIBUTE_MODE: u16 = 0o444;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SensorType {
    Temperature,
    Voltage,
    Current,
    Power,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Attribute {
    Input,
    Label,
}

/// Channels of one sensor type and the attributes each of them has.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelInfo {
    pub sensor_type: SensorType,
    pub count: usize,
    pub attributes: &'static [Attribute],
}

/// Fixed channel layout. The wall input has no current channel.
pub const CHANNEL_INFO: [ChannelInfo; 4] = [
    ChannelInfo {
        sensor_type: SensorType::Temperature,
        count: 2,
        attributes: &[Attribute::Input],
    },
    ChannelInfo {
        sensor_type: SensorType::Voltage,
        count: RAIL_COUNT,
        attributes: &[Attribute::Input, Attribute::Label],
    },
    ChannelInfo {
        sensor_type: SensorType::Current,
        count: RAIL_COUNT - 1,
        attributes: &[Attribute::Input, Attribute::Label],
    },
    ChannelInfo {
        sensor_type: SensorType::Power,
        count: RAIL_COUNT,
        attributes: &[Attribute::Input, Attribute::Label],
    },
];

impl SensorType {
    pub fn info(self) -> &'static ChannelInfo {
        match self {
            SensorType::Temperature => &CHANNEL_INFO[0],
            SensorType::Voltage => &CHANNEL_INFO[1],
            SensorType::Current => &CHANNEL_INFO[2],
            SensorType::Power => &CHANNEL_INFO[3],
        }
    }

    /// Whether `attribute` exists on `channel` of this type.
    pub fn has(self, attribute: Attribute, channel: usize) -> bool {
        let info = self.info();
        channel < info.count && info.attributes.contains(&attribute)
    }

    const fn measurement(self) -> Option<Measurement> {
        match self {
            SensorType::Temperature => None,
            SensorType::Voltage => Some(Measurement::Voltage),
            SensorType::Current => Some(Measurement::Current),
            SensorType::Power => Some(Measurement::Power),
        }
    }
}

/// hwmon style view of an [`HxiPsu`].
pub struct HwmonChip<T: HidTransport> {
    psu: HxiPsu<T>,
}

impl<T: HidTransport> HwmonChip<T> {
    pub fn new(psu: HxiPsu<T>) -> Self {
        Self { psu }
    }

    pub fn name(&self) -> &'static str {
        CHIP_NAME
    }

    pub fn psu(&self) -> &HxiPsu<T> {
        &self.psu
    }

    pub fn into_inner(self) -> HxiPsu<T> {
        self.psu
    }

    pub fn is_visible(
        &self,
        _sensor_type: SensorType,
        _attribute: Attribute,
        _channel: usize,
    ) -> u16 {
        ATTRIBUTE_MODE
    }

    /// Read a numeric attribute.
    ///
    /// Temperatures are passed through as reported, power is converted from
    /// milliwatts to microwatts.
    pub fn read(
        &self,
        sensor_type: SensorType,
        attribute: Attribute,
        channel: usize,
    ) -> Result<i64, T::Error> {
        if attribute != Attribute::Input || !sensor_type.has(attribute, channel) {
            return Err(Error::Unsupported);
        }

        let Some(measurement) = sensor_type.measurement() else {
            let channel = TemperatureChannel::from_index(channel).ok_or(Error::Unsupported)?;
            return Ok(i64::from(self.psu.read_temperature(channel)?));
        };

        let rail = RailId::from_index(channel).ok_or(Error::Unsupported)?;
        let value = i64::from(self.psu.read_measurement(self.psu.rail(rail), measurement)?);
        match measurement {
            Measurement::Power => Ok(value * 1000),
            Measurement::Voltage | Measurement::Current => Ok(value),
        }
    }

    /// Read a string attribute. Only the rail labels exist.
    pub fn read_string(
        &self,
        sensor_type: SensorType,
        attribute: Attribute,
        channel: usize,
    ) -> Result<&'static str, T::Error> {
        if attribute != Attribute::Label || !sensor_type.has(attribute, channel) {
            return Err(Error::Unsupported);
        }
        let rail = RailId::from_index(channel).ok_or(Error::Unsupported)?;
        Ok(self.psu.rail(rail).label)
    }

    /// The PSU is read only, every write is rejected.
    pub fn write(
        &self,
        _sensor_type: SensorType,
        _attribute: Attribute,
        _channel: usize,
        _value: i64,
    ) -> Result<(), T::Error> {
        Err(Error::Unsupported)
    }
}
