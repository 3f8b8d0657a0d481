//! This module is used to define the command codes understood by the HXi PSUs.
//!
//! Every request is a single output report of the form `[opcode, arg1, arg2, 0...]`.

use strum_macros::{EnumCount, EnumIter};

/// Corsair's USB vendor ID.
pub const CORSAIR_VENDOR_ID: u16 = 0x1b1c;

/// Length of every output report sent to the PSU.
pub const OUT_REPORT_LEN: usize = 63;

/// Number of bytes kept from every input report received from the PSU.
pub const IN_REPORT_LEN: usize = 16;

/// First byte of an output report.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[repr(u8)]
pub enum Opcode {
    /// Select which DC rail subsequent readings refer to.
    ///
    /// `arg2` carries the [`SensorId`].
    SelectChannel = 0x02,
    /// Read a signal. `arg1` carries the signal code.
    ReadSignal = 0x03,
}

impl From<Opcode> for u8 {
    fn from(value: Opcode) -> Self {
        value as u8
    }
}

/// PMBus-style signals which are reported in the linear float format.
#[derive(Debug, EnumIter, Copy, Clone, PartialEq, Eq)]
#[repr(u8)]
pub enum Signal {
    /// __R__ - Output voltage of the selected rail. (READ_VOUT)
    Volts = 0x8B,
    /// __R__ - Output current of the selected rail. (READ_IOUT)
    Amps = 0x8C,
    /// __R__ - Output power of the selected rail. (READ_POUT)
    Watts = 0x96,
    /// __R__ - Input (wall) voltage. (READ_VIN)
    WallVolts = 0x88,
    /// __R__ - Total input (wall) power.
    TotalWatts = 0xEE,
}

impl From<Signal> for u8 {
    fn from(value: Signal) -> Self {
        value as u8
    }
}

impl TryFrom<u8> for Signal {
    type Error = ();
    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x8B => Ok(Signal::Volts),
            0x8C => Ok(Signal::Amps),
            0x96 => Ok(Signal::Watts),
            0x88 => Ok(Signal::WallVolts),
            0xEE => Ok(Signal::TotalWatts),
            _ => Err(()),
        }
    }
}

/// The two temperature sensors. These are read as plain integers, not linear floats.
#[derive(Debug, EnumIter, EnumCount, Copy, Clone, PartialEq, Eq)]
pub enum TemperatureChannel {
    First,
    Second,
}

impl TemperatureChannel {
    /// Signal code used to read this sensor.
    pub const fn code(self) -> u8 {
        match self {
            TemperatureChannel::First => 0x8D,
            TemperatureChannel::Second => 0x8E,
        }
    }

    /// Zero based channel index, as used by the hwmon facade.
    pub const fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(TemperatureChannel::First),
            1 => Some(TemperatureChannel::Second),
            _ => None,
        }
    }
}

/// Which sensor a reading comes from.
///
/// The DC rails share the PMBus signal codes, so the PSU has to be told which
/// rail to report on first. Unswitched signals are read directly.
#[derive(Debug, EnumIter, Copy, Clone, PartialEq, Eq)]
pub enum SensorId {
    Rail12V,
    Rail5V,
    Rail3V3,
    /// Do not send a channel select before reading.
    Unswitched,
}

impl SensorId {
    /// Value sent as `arg2` of [`Opcode::SelectChannel`], or `None` when no select is needed.
    pub const fn select_code(self) -> Option<u8> {
        match self {
            SensorId::Rail12V => Some(0x00),
            SensorId::Rail5V => Some(0x01),
            SensorId::Rail3V3 => Some(0x02),
            SensorId::Unswitched => None,
        }
    }
}

/// Supported PSU models and their USB product IDs.
#[derive(Debug, EnumIter, Copy, Clone, PartialEq, Eq)]
#[repr(u16)]
pub enum SupportedModel {
    HX750i = 0x1c05,
    HX850i = 0x1c06,
    HX1000i = 0x1c07,
    HX1200i = 0x1c08,
}

impl SupportedModel {
    pub const fn product_id(self) -> u16 {
        self as u16
    }

    /// Look up a model by USB vendor and product ID.
    pub fn from_ids(vendor_id: u16, product_id: u16) -> Option<Self> {
        use strum::IntoEnumIterator;

        if vendor_id != CORSAIR_VENDOR_ID {
            return None;
        }
        Self::iter().find(|model| model.product_id() == product_id)
    }

    pub const fn name(self) -> &'static str {
        match self {
            SupportedModel::HX750i => "HX750i",
            SupportedModel::HX850i => "HX850i",
            SupportedModel::HX1000i => "HX1000i",
            SupportedModel::HX1200i => "HX1200i",
        }
    }
}
