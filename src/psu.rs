use tracing::warn;

use crate::{
    channel::{CommandChannel, InboundHandler, Response, SessionConfig},
    command::{Opcode, SensorId, Signal, TemperatureChannel},
    error::{Error, Result},
    linear,
    rail::{Measurement, RAIL_COUNT, RAILS, Rail, RailId},
    transport::HidTransport,
};

/// A session with one HXi PSU, over any [`HidTransport`].
///
/// The transport must pass every input report it receives to the
/// [`InboundHandler`] given to [`HxiPsu::new`]. All reads block the calling
/// thread; concurrent callers are served one at a time.
///
/// For its methods, "read" means to get a measured value. The PSU is treated as read only.
pub struct HxiPsu<T: HidTransport> {
    channel: CommandChannel<T>,
    rails: [Rail; RAIL_COUNT],
}

impl<T: HidTransport> HxiPsu<T> {
    /// Create a session using the default response timeout.
    pub fn new(transport: T, inbound: InboundHandler) -> Self {
        Self::with_config(transport, inbound, SessionConfig::default())
    }

    pub fn with_config(transport: T, inbound: InboundHandler, config: SessionConfig) -> Self {
        Self {
            channel: CommandChannel::new(transport, inbound, config),
            rails: RAILS,
        }
    }

    pub fn inbound_handler(&self) -> InboundHandler {
        self.channel.inbound_handler()
    }

    pub fn rails(&self) -> &[Rail; RAIL_COUNT] {
        &self.rails
    }

    pub fn rail(&self, id: RailId) -> &Rail {
        &self.rails[id.index()]
    }

    /// Send a raw request and return the raw response.
    pub fn exchange(&self, command: u8, arg1: u8, arg2: u8) -> Result<Response, T::Error> {
        self.channel.exchange(command, arg1, arg2)
    }

    /// Return one of the two temperature sensors.
    ///
    /// The PSU reports temperatures as a plain big-endian integer, not in the linear format.
    pub fn read_temperature(&self, channel: TemperatureChannel) -> Result<i32, T::Error> {
        let response = self
            .channel
            .exchange(Opcode::ReadSignal.into(), channel.code(), 0x00)
            .map_err(|err| no_data("temperature", err))?;
        Ok(i32::from(response.word_be(2)))
    }

    /// Return a linear-format signal in milli-units, selecting the rail first if needed.
    ///
    /// The select and the read are done under one lock, so no other request can
    /// change the selected rail in between.
    pub fn read_signal(&self, sensor: SensorId, signal: Signal) -> Result<i32, T::Error> {
        let mut link = self.channel.lock();

        if let Some(select) = sensor.select_code() {
            link.exchange(Opcode::SelectChannel.into(), 0x00, select)
                .map_err(|err| no_data("channel select", err))?;
        }

        let response = link
            .exchange(Opcode::ReadSignal.into(), signal.into(), 0x00)
            .map_err(|err| no_data("signal", err))?;
        drop(link);

        // Unlike temperatures, these come low byte first.
        Ok(linear::decode(response.word_le(2)))
    }

    /// Return `measurement` for `rail` in milli-units.
    ///
    /// Fails with [`Error::Unsupported`] without touching the device if the
    /// rail has no such reading.
    pub fn read_measurement(&self, rail: &Rail, measurement: Measurement) -> Result<i32, T::Error> {
        let signal = rail.signal(measurement).ok_or(Error::Unsupported)?;
        self.read_signal(rail.sensor, signal)
    }

    /// Return the measured voltage of a rail in millivolts.
    pub fn read_voltage_mv(&self, rail: RailId) -> Result<i32, T::Error> {
        self.read_measurement(self.rail(rail), Measurement::Voltage)
    }

    /// Return the measured current of a rail in milliamps.
    pub fn read_current_ma(&self, rail: RailId) -> Result<i32, T::Error> {
        self.read_measurement(self.rail(rail), Measurement::Current)
    }

    /// Return the measured power of a rail in milliwatts.
    pub fn read_power_mw(&self, rail: RailId) -> Result<i32, T::Error> {
        self.read_measurement(self.rail(rail), Measurement::Power)
    }

    /// Access the transport, e.g. to inspect a mock.
    pub fn with_transport<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        self.channel.with_transport(f)
    }
}

fn no_data<E: embedded_io::Error>(what: &str, err: Error<E>) -> Error<E> {
    match &err {
        Error::Transport(inner) => warn!("{} request could not be sent: {:?}", what, inner),
        _ => warn!("{} request failed: {}", what, err),
    }
    err.into_no_data()
}
