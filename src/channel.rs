//! Command/response exchanges with the PSU.
//!
//! The PSU answers every output report with one input report, but input reports
//! are delivered asynchronously by the transport. [`CommandChannel`] turns this
//! into a blocking call: it holds an exclusive lock for the whole exchange, arms
//! a fresh one-shot channel, sends the request and waits for
//! [`InboundHandler::handle_report`] to deliver the answer.

use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{RecvTimeoutError, Sender};
use fugit::MillisDurationU32;
use parking_lot::{Mutex, MutexGuard};
use tracing::{debug, trace, warn};

use crate::command::{IN_REPORT_LEN, OUT_REPORT_LEN};
use crate::error::{Error, Result};
use crate::transport::HidTransport;

/// Per-session settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    /// How long to wait for the answer to a single request.
    pub response_timeout: MillisDurationU32,
}

impl Default for SessionConfig {
    /// The PSU normally answers well within 300ms.
    fn default() -> Self {
        Self::new(MillisDurationU32::millis(300))
    }
}

impl SessionConfig {
    pub const fn new(response_timeout: MillisDurationU32) -> Self {
        Self { response_timeout }
    }

    pub const fn with_response_timeout(mut self, response_timeout: MillisDurationU32) -> Self {
        self.response_timeout = response_timeout;
        self
    }

    fn timeout(&self) -> Duration {
        Duration::from_millis(u64::from(self.response_timeout.to_millis()))
    }
}

/// Payload of one input report, truncated to [`IN_REPORT_LEN`] bytes.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Response {
    payload: heapless::Vec<u8, IN_REPORT_LEN>,
}

impl Response {
    pub fn from_report(report: &[u8]) -> Self {
        let len = report.len().min(IN_REPORT_LEN);
        Self {
            payload: heapless::Vec::from_slice(&report[..len]).unwrap_or_default(),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.payload
    }

    /// Byte at `index`. Bytes past the end of a short report read as zero.
    pub fn byte(&self, index: usize) -> u8 {
        self.payload.get(index).copied().unwrap_or(0)
    }

    /// `[offset]` as the high byte, `[offset + 1]` as the low byte.
    pub fn word_be(&self, offset: usize) -> u16 {
        u16::from_be_bytes([self.byte(offset), self.byte(offset + 1)])
    }

    /// `[offset]` as the low byte, `[offset + 1]` as the high byte.
    pub fn word_le(&self, offset: usize) -> u16 {
        u16::from_le_bytes([self.byte(offset), self.byte(offset + 1)])
    }
}

/// Sender half of the exchange currently waiting for an answer, if any.
type PendingSlot = Arc<Mutex<Option<Sender<Response>>>>;

/// Receives input reports from the transport.
///
/// Clone this into whatever reads from the device. It never blocks for longer
/// than it takes to swap an `Option`, and never reports errors back.
#[derive(Debug, Clone, Default)]
pub struct InboundHandler {
    pending: PendingSlot,
}

impl InboundHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver one input report.
    ///
    /// Reports arriving while no exchange is waiting are dropped without being copied.
    pub fn handle_report(&self, report: &[u8]) {
        let Some(sender) = self.pending.lock().take() else {
            trace!(len = report.len(), "dropping unsolicited input report");
            return;
        };
        let response = Response::from_report(report);
        trace!(payload = ?response.as_bytes(), "input report delivered");
        // One-shot with capacity 1, so this cannot block. The waiter may have
        // timed out in the meantime, in which case the report is discarded.
        let _ = sender.try_send(response);
    }

    fn arm(&self, sender: Sender<Response>) {
        *self.pending.lock() = Some(sender);
    }

    fn disarm(&self) {
        self.pending.lock().take();
    }

    /// Whether an exchange is currently waiting for a report.
    pub fn is_armed(&self) -> bool {
        self.pending.lock().is_some()
    }
}

/// State only touched while holding the exchange lock.
struct Link<T> {
    transport: T,
    report: [u8; OUT_REPORT_LEN],
}

/// Serializes exchanges with one PSU.
pub struct CommandChannel<T: HidTransport> {
    link: Mutex<Link<T>>,
    inbound: InboundHandler,
    config: SessionConfig,
}

impl<T: HidTransport> CommandChannel<T> {
    /// `inbound` must be the handler (or a clone of it) the transport delivers input reports to.
    pub fn new(transport: T, inbound: InboundHandler, config: SessionConfig) -> Self {
        Self {
            link: Mutex::new(Link {
                transport,
                report: [0u8; OUT_REPORT_LEN],
            }),
            inbound,
            config,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn inbound_handler(&self) -> InboundHandler {
        self.inbound.clone()
    }

    /// Send `[command, arg1, arg2]` and wait for the answer.
    ///
    /// Must not be called while the same thread holds [`Self::lock`].
    pub fn exchange(&self, command: u8, arg1: u8, arg2: u8) -> Result<Response, T::Error> {
        self.lock().exchange(command, arg1, arg2)
    }

    /// Take the exchange lock, for sequences of exchanges that must not be interleaved.
    pub fn lock(&self) -> Exclusive<'_, T> {
        Exclusive {
            link: self.link.lock(),
            inbound: &self.inbound,
            timeout: self.config.timeout(),
        }
    }

    /// Access the transport, e.g. to inspect a mock.
    pub fn with_transport<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        f(&mut self.link.lock().transport)
    }
}

/// Exclusive access to a [`CommandChannel`]. Dropping it releases the lock.
pub struct Exclusive<'a, T: HidTransport> {
    link: MutexGuard<'a, Link<T>>,
    inbound: &'a InboundHandler,
    timeout: Duration,
}

impl<T: HidTransport> Exclusive<'_, T> {
    pub fn exchange(&mut self, command: u8, arg1: u8, arg2: u8) -> Result<Response, T::Error> {
        let link = &mut *self.link;
        link.report.fill(0);
        link.report[0] = command;
        link.report[1] = arg1;
        link.report[2] = arg2;

        // Arm before sending, the answer can arrive before write_report returns.
        // A fresh channel per exchange means nothing from a previous exchange
        // can satisfy this one.
        let (sender, receiver) = crossbeam_channel::bounded(1);
        self.inbound.arm(sender);

        debug!(command, arg1, arg2, "sending request");
        if let Err(err) = link.transport.write_report(&link.report) {
            self.inbound.disarm();
            return Err(Error::Transport(err));
        }

        match receiver.recv_timeout(self.timeout) {
            Ok(response) => Ok(response),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => {
                // Late answers to this request are dropped instead of being
                // taken as the answer to the next one.
                self.inbound.disarm();
                warn!(command, arg1, arg2, "no response from PSU");
                Err(Error::Timeout)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock_hid::{MockHid, MockHidError, Reply};
    use std::time::Instant;

    fn channel(reply: Reply) -> CommandChannel<MockHid> {
        let inbound = InboundHandler::new();
        let mock = MockHid::new(inbound.clone(), reply);
        CommandChannel::new(
            mock,
            inbound,
            SessionConfig::default().with_response_timeout(MillisDurationU32::millis(50)),
        )
    }

    #[test]
    fn default_timeout_is_300ms() {
        assert_eq!(SessionConfig::default().timeout(), Duration::from_millis(300));
    }

    #[test]
    fn request_frame_layout() {
        let channel = channel(Reply::Fixed(vec![0x03, 0x8B, 0x12, 0x34]));
        let response = channel.exchange(0x03, 0x8B, 0x00).unwrap();
        assert_eq!(response.as_bytes(), [0x03, 0x8B, 0x12, 0x34]);

        channel.with_transport(|mock| {
            let written = mock.written_reports();
            assert_eq!(written.len(), 1);
            let report = &written[0];
            assert_eq!(report.len(), OUT_REPORT_LEN);
            assert_eq!(report[..3], [0x03, 0x8B, 0x00]);
            assert!(report[3..].iter().all(|&b| b == 0));
        });
    }

    #[test]
    fn report_is_zero_filled_between_requests() {
        let channel = channel(Reply::Fixed(vec![0; 4]));
        channel.exchange(0x02, 0x00, 0x02).unwrap();
        channel.exchange(0x03, 0x8C, 0x00).unwrap();

        channel.with_transport(|mock| {
            let written = mock.written_reports();
            assert_eq!(written[0][..3], [0x02, 0x00, 0x02]);
            assert_eq!(written[1][..3], [0x03, 0x8C, 0x00]);
        });
    }

    #[test]
    fn long_reports_are_truncated() {
        let report: Vec<u8> = (0..64).collect();
        let channel = channel(Reply::Fixed(report));
        let response = channel.exchange(0x03, 0x8D, 0x00).unwrap();
        assert_eq!(response.as_bytes().len(), IN_REPORT_LEN);
        assert_eq!(response.byte(15), 15);
    }

    #[test]
    fn short_reports_read_as_zero() {
        let response = Response::from_report(&[0x03, 0x8B, 0x12]);
        assert_eq!(response.byte(2), 0x12);
        assert_eq!(response.byte(3), 0x00);
        assert_eq!(response.word_be(2), 0x1200);
        assert_eq!(response.word_le(2), 0x0012);
    }

    #[test]
    fn byte_order_helpers() {
        let response = Response::from_report(&[0, 0, 0x12, 0x34]);
        assert_eq!(response.word_be(2), 0x1234);
        assert_eq!(response.word_le(2), 0x3412);
    }

    #[test]
    fn transport_failure_is_immediate() {
        let channel = channel(Reply::Fixed(vec![0; 4]));
        channel.with_transport(|mock| mock.set_write_error(true));

        let start = Instant::now();
        let result = channel.exchange(0x03, 0x8B, 0x00);
        assert!(matches!(result, Err(Error::Transport(MockHidError::Disconnected))));
        assert!(start.elapsed() < Duration::from_millis(50));
        assert!(!channel.inbound_handler().is_armed());
    }

    #[test]
    fn timeout_waits_full_duration_then_releases_lock() {
        let channel = channel(Reply::Silent);

        let start = Instant::now();
        let result = channel.exchange(0x03, 0x8D, 0x00);
        assert!(matches!(result, Err(Error::Timeout)));
        assert!(start.elapsed() >= Duration::from_millis(50));
        assert!(!channel.inbound_handler().is_armed());

        // The lock was released, so the next exchange goes through.
        channel.with_transport(|mock| mock.set_reply(Reply::Fixed(vec![0, 0, 0, 42])));
        let response = channel.exchange(0x03, 0x8D, 0x00).unwrap();
        assert_eq!(response.byte(3), 42);
    }

    #[test]
    fn unsolicited_reports_are_dropped() {
        let channel = channel(Reply::Fixed(vec![0, 0, 0xAA, 0xBB]));
        let inbound = channel.inbound_handler();

        // Nobody is waiting, so this goes nowhere.
        inbound.handle_report(&[0, 0, 0xDE, 0xAD]);

        let response = channel.exchange(0x03, 0x8B, 0x00).unwrap();
        assert_eq!(response.word_be(2), 0xAABB);
    }

    #[test]
    fn late_report_does_not_answer_next_request() {
        let channel = channel(Reply::Silent);
        assert!(matches!(channel.exchange(0x03, 0x8B, 0x00), Err(Error::Timeout)));

        // The answer to the timed out request turns up late.
        channel.inbound_handler().handle_report(&[0, 0, 0xDE, 0xAD]);

        channel.with_transport(|mock| mock.set_reply(Reply::Fixed(vec![0, 0, 0x12, 0x34])));
        let response = channel.exchange(0x03, 0x8B, 0x00).unwrap();
        assert_eq!(response.word_be(2), 0x1234);
    }

    #[test]
    fn delayed_reply_from_another_thread() {
        let channel = channel(Reply::Delayed(
            vec![0, 0, 0x01, 0x02],
            Duration::from_millis(10),
        ));
        let response = channel.exchange(0x03, 0x8E, 0x00).unwrap();
        assert_eq!(response.word_be(2), 0x0102);
    }

    #[test]
    fn only_first_report_is_taken() {
        let channel = channel(Reply::Duplicate(vec![0, 0, 0x00, 0x01]));
        let response = channel.exchange(0x03, 0x8D, 0x00).unwrap();
        assert_eq!(response.byte(3), 0x01);
        assert!(!channel.inbound_handler().is_armed());
    }
}
