//! We use this mocking module in unit tests to emulate the PSU's HID interface.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use thiserror::Error;

use crate::channel::InboundHandler;
use crate::command::OUT_REPORT_LEN;
use crate::transport::HidTransport;

/// How the mock answers each output report.
#[derive(Debug, Clone)]
pub enum Reply {
    /// Answer immediately, from inside `write_report`.
    Fixed(Vec<u8>),
    /// Never answer.
    Silent,
    /// Answer from another thread after a delay.
    Delayed(Vec<u8>, Duration),
    /// Answer twice in a row.
    Duplicate(Vec<u8>),
}

/// Something observed on the wire, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// An output report was sent, with its opcode.
    Request(u8),
    /// An input report was handed to the inbound handler.
    Reply,
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum MockHidError {
    /// Simulated unplugged device.
    #[error("Device disconnected")]
    Disconnected,
}

impl embedded_io::Error for MockHidError {
    fn kind(&self) -> embedded_io::ErrorKind {
        match self {
            MockHidError::Disconnected => embedded_io::ErrorKind::NotConnected,
        }
    }
}

/// Our mock type used to emulate the PSU.
pub struct MockHid {
    inbound: InboundHandler,
    reply: Reply,
    /// Every output report written, in order.
    written: Vec<Vec<u8>>,
    /// Shared so replies delivered from other threads are logged in order.
    events: Arc<Mutex<Vec<Event>>>,
    /// Flag to simulate write errors
    should_error_on_write: bool,
}

impl embedded_io::ErrorType for MockHid {
    type Error = MockHidError;
}

impl HidTransport for MockHid {
    fn write_report(&mut self, report: &[u8; OUT_REPORT_LEN]) -> Result<(), Self::Error> {
        if self.should_error_on_write {
            return Err(MockHidError::Disconnected);
        }

        self.written.push(report.to_vec());
        self.events.lock().push(Event::Request(report[0]));

        match &self.reply {
            Reply::Fixed(data) => deliver(&self.events, &self.inbound, data),
            Reply::Silent => {}
            Reply::Delayed(data, delay) => {
                let events = Arc::clone(&self.events);
                let inbound = self.inbound.clone();
                let data = data.clone();
                let delay = *delay;
                std::thread::spawn(move || {
                    std::thread::sleep(delay);
                    deliver(&events, &inbound, &data);
                });
            }
            Reply::Duplicate(data) => {
                deliver(&self.events, &self.inbound, data);
                deliver(&self.events, &self.inbound, data);
            }
        }
        Ok(())
    }
}

fn deliver(events: &Mutex<Vec<Event>>, inbound: &InboundHandler, data: &[u8]) {
    events.lock().push(Event::Reply);
    inbound.handle_report(data);
}

impl MockHid {
    pub fn new(inbound: InboundHandler, reply: Reply) -> Self {
        Self {
            inbound,
            reply,
            written: Vec::new(),
            events: Arc::new(Mutex::new(Vec::new())),
            should_error_on_write: false,
        }
    }

    /// Every output report written so far.
    pub fn written_reports(&self) -> &[Vec<u8>] {
        &self.written
    }

    /// Opcode and first two arguments of every output report written so far.
    pub fn written_commands(&self) -> Vec<[u8; 3]> {
        self.written
            .iter()
            .map(|report| [report[0], report[1], report[2]])
            .collect()
    }

    pub fn clear_written_reports(&mut self) {
        self.written.clear();
    }

    /// Handle to the event log, usable after the mock moved into a session.
    pub fn events(&self) -> Arc<Mutex<Vec<Event>>> {
        Arc::clone(&self.events)
    }

    pub fn set_reply(&mut self, reply: Reply) {
        self.reply = reply;
    }

    /// Configure whether write operations should fail with an error
    pub fn set_write_error(&mut self, should_error: bool) {
        self.should_error_on_write = should_error;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_io::Error;

    #[test]
    fn records_reports_and_events() {
        let inbound = InboundHandler::new();
        let mut mock = MockHid::new(inbound, Reply::Fixed(vec![1, 2, 3]));

        let mut report = [0u8; OUT_REPORT_LEN];
        report[..3].copy_from_slice(&[0x03, 0x8D, 0x00]);
        mock.write_report(&report).unwrap();

        assert_eq!(mock.written_reports().len(), 1);
        assert_eq!(mock.written_commands(), [[0x03, 0x8D, 0x00]]);
        assert_eq!(*mock.events().lock(), [Event::Request(0x03), Event::Reply]);

        mock.clear_written_reports();
        assert!(mock.written_reports().is_empty());
    }

    #[test]
    fn write_error_simulation() {
        let mut mock = MockHid::new(InboundHandler::new(), Reply::Silent);
        mock.set_write_error(true);

        let result = mock.write_report(&[0u8; OUT_REPORT_LEN]);
        assert_eq!(result, Err(MockHidError::Disconnected));
        assert!(mock.written_reports().is_empty());
        assert!(matches!(
            MockHidError::Disconnected.kind(),
            embedded_io::ErrorKind::NotConnected
        ));
    }
}
