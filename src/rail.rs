//! Static description of the measurement rails of the PSU.

use strum::EnumCount as _;
use strum_macros::{EnumCount, EnumIter};

use crate::command::{SensorId, Signal};

/// Number of rails, including the unswitched wall input.
pub const RAIL_COUNT: usize = RailId::COUNT;

/// The four logical measurement channels, in hwmon channel order.
#[derive(Debug, EnumIter, EnumCount, Copy, Clone, PartialEq, Eq)]
pub enum RailId {
    Rail12V,
    Rail5V,
    Rail3V3,
    /// AC input.
    Wall,
}

impl RailId {
    pub const fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(RailId::Rail12V),
            1 => Some(RailId::Rail5V),
            2 => Some(RailId::Rail3V3),
            3 => Some(RailId::Wall),
            _ => None,
        }
    }
}

/// Kind of electrical reading.
#[derive(Debug, EnumIter, Copy, Clone, PartialEq, Eq)]
pub enum Measurement {
    /// Reported in millivolts.
    Voltage,
    /// Reported in milliamps.
    Current,
    /// Reported in milliwatts.
    Power,
}

/// One measurement point and the signal codes used to read it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rail {
    pub sensor: SensorId,
    pub voltage: Signal,
    /// The wall input has no current reading.
    pub current: Option<Signal>,
    pub power: Signal,
    pub label: &'static str,
}

impl Rail {
    const fn dc(sensor: SensorId, label: &'static str) -> Self {
        Self {
            sensor,
            voltage: Signal::Volts,
            current: Some(Signal::Amps),
            power: Signal::Watts,
            label,
        }
    }

    /// Signal used to read `measurement` on this rail, if the PSU provides one.
    pub const fn signal(&self, measurement: Measurement) -> Option<Signal> {
        match measurement {
            Measurement::Voltage => Some(self.voltage),
            Measurement::Current => self.current,
            Measurement::Power => Some(self.power),
        }
    }

    /// Whether a channel select has to precede readings from this rail.
    pub const fn is_switched(&self) -> bool {
        self.sensor.select_code().is_some()
    }
}

/// Rail table, indexed by [`RailId::index`].
pub const RAILS: [Rail; RAIL_COUNT] = [
    Rail::dc(SensorId::Rail12V, "12V"),
    Rail::dc(SensorId::Rail5V, "5V"),
    Rail::dc(SensorId::Rail3V3, "3V"),
    Rail {
        sensor: SensorId::Unswitched,
        voltage: Signal::WallVolts,
        current: None,
        power: Signal::TotalWatts,
        label: "Wall",
    },
];
