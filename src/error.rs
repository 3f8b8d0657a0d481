//! Our error types for the HXi PSUs.

use thiserror::Error;

pub type Result<T, E> = core::result::Result<T, Error<E>>;

/// Custom error type for Corsair HXi PSU communications.
///
/// Generic over the error type of the HID transport in use.
#[derive(Error, Debug)]
pub enum Error<E: embedded_io::Error> {
    /// The outbound report could not be handed to the transport.
    #[error("HID transport error")]
    Transport(E),
    /// No inbound report arrived before the response timeout elapsed.
    #[error("Communication timeout")]
    Timeout,
    /// The requested reading is not defined by the protocol.
    #[error("Unsupported sensor or attribute")]
    Unsupported,
    /// An exchange with the PSU failed, so no reading is available.
    #[error("No data available")]
    NoData,
}

impl<E: embedded_io::Error> Error<E> {
    /// Collapse exchange failures into [`Error::NoData`], as reported to sensor consumers.
    pub(crate) fn into_no_data(self) -> Self {
        match self {
            Error::Unsupported => Error::Unsupported,
            _ => Error::NoData,
        }
    }
}
