//! The HID transport used to reach the PSU.
//!
//! A transport only needs to send output reports. Input reports arrive
//! asynchronously: whoever owns the transport's read side passes each one to an
//! [`InboundHandler`](crate::channel::InboundHandler).

use crate::command::OUT_REPORT_LEN;

/// Sends output reports to the PSU.
///
/// The PSU does not use report IDs, `report` is exactly what goes on the wire.
pub trait HidTransport: embedded_io::ErrorType {
    fn write_report(&mut self, report: &[u8; OUT_REPORT_LEN]) -> Result<(), Self::Error>;
}

#[cfg(feature = "hidapi")]
pub use self::hidapi_transport::{HidapiError, HidapiTransport};

#[cfg(feature = "hidapi")]
mod hidapi_transport {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::thread::JoinHandle;

    use hidapi::{HidApi, HidDevice};
    use parking_lot::Mutex;
    use tracing::{info, trace, warn};

    use super::HidTransport;
    use crate::channel::InboundHandler;
    use crate::command::{IN_REPORT_LEN, OUT_REPORT_LEN, SupportedModel};

    /// How long the reader thread holds the device per poll, in milliseconds.
    const READ_POLL_MS: i32 = 50;

    /// Wrapper so hidapi errors can be used through [`embedded_io::Error`].
    #[derive(Debug)]
    pub struct HidapiError(pub hidapi::HidError);

    impl core::fmt::Display for HidapiError {
        fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
            write!(f, "{}", self.0)
        }
    }

    impl std::error::Error for HidapiError {
        fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
            Some(&self.0)
        }
    }

    impl embedded_io::Error for HidapiError {
        fn kind(&self) -> embedded_io::ErrorKind {
            match &self.0 {
                hidapi::HidError::IncompleteSendError { .. } => {
                    embedded_io::ErrorKind::WriteZero
                }
                _ => embedded_io::ErrorKind::Other,
            }
        }
    }

    /// USB HID transport backed by `hidapi`.
    ///
    /// A background thread polls the device for input reports and forwards them
    /// to the handler. The thread stops when the transport is dropped.
    pub struct HidapiTransport {
        device: Arc<Mutex<HidDevice>>,
        model: SupportedModel,
        running: Arc<AtomicBool>,
        reader: Option<JoinHandle<()>>,
    }

    impl embedded_io::ErrorType for HidapiTransport {
        type Error = HidapiError;
    }

    impl HidapiTransport {
        /// Open the first supported PSU found on the system.
        pub fn open_first(api: &HidApi, handler: InboundHandler) -> Result<Self, HidapiError> {
            let (info, model) = api
                .device_list()
                .find_map(|info| {
                    SupportedModel::from_ids(info.vendor_id(), info.product_id())
                        .map(|model| (info, model))
                })
                .ok_or_else(|| {
                    HidapiError(hidapi::HidError::HidApiError {
                        message: "no supported Corsair HXi PSU found".into(),
                    })
                })?;
            let device = info.open_device(api).map_err(HidapiError)?;
            Ok(Self::from_device(device, model, handler))
        }

        /// Wrap an already opened device.
        pub fn from_device(
            device: HidDevice,
            model: SupportedModel,
            handler: InboundHandler,
        ) -> Self {
            info!(model = model.name(), "opened PSU");
            let device = Arc::new(Mutex::new(device));
            let running = Arc::new(AtomicBool::new(true));

            let reader = {
                let device = Arc::clone(&device);
                let running = Arc::clone(&running);
                std::thread::spawn(move || read_loop(device, running, handler))
            };

            Self {
                device,
                model,
                running,
                reader: Some(reader),
            }
        }

        pub fn model(&self) -> SupportedModel {
            self.model
        }
    }

    fn read_loop(device: Arc<Mutex<HidDevice>>, running: Arc<AtomicBool>, handler: InboundHandler) {
        let mut buf = [0u8; IN_REPORT_LEN];
        while running.load(Ordering::Relaxed) {
            let read = device.lock().read_timeout(&mut buf, READ_POLL_MS);
            match read {
                Ok(0) => continue,
                Ok(len) => handler.handle_report(&buf[..len]),
                Err(err) => {
                    warn!("HID read failed, stopping reader: {}", err);
                    break;
                }
            }
        }
        trace!("HID reader thread exited");
    }

    impl HidTransport for HidapiTransport {
        fn write_report(&mut self, report: &[u8; OUT_REPORT_LEN]) -> Result<(), HidapiError> {
            // hidapi expects a leading report ID, which is zero for devices without them.
            let mut buf = [0u8; OUT_REPORT_LEN + 1];
            buf[1..].copy_from_slice(report);
            self.device.lock().write(&buf).map_err(HidapiError)?;
            Ok(())
        }
    }

    impl Drop for HidapiTransport {
        fn drop(&mut self) {
            self.running.store(false, Ordering::Relaxed);
            if let Some(reader) = self.reader.take() {
                let _ = reader.join();
            }
        }
    }
}
