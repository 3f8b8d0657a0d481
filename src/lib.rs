//! This crate provides read-only telemetry for the Corsair HXi series of ATX power supplies.
//!
//! Supported PSU models:
//! * HX750i
//! * HX850i
//! * HX1000i
//! * HX1200i
//!
//! The PSU speaks a PMBus-like protocol over USB HID. Each request is a 63 byte
//! output report, and the PSU answers with an input report. Readings available:
//! * both temperature sensors
//! * voltage, current and power of the 12V, 5V and 3.3V rails
//! * input (wall) voltage
//! * total input (wall) power
//!
//! Fan control and over-current protection modes are not supported.
//!
//! Any HID library can be used by implementing [`transport::HidTransport`] and
//! passing every input report to a [`channel::InboundHandler`]. With the
//! `hidapi` feature, [`transport::HidapiTransport`] does both.

pub mod channel;
pub mod command;
pub mod error;
pub mod hwmon;
pub mod linear;
pub mod psu;
pub mod rail;
pub mod transport;

#[cfg(test)]
mod mock_hid;
