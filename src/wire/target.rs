// Licensed under the Apache-2.0 license

//! Target-role half of the `Wire` adapter.
//!
//! [`WireState`] is the transaction handler a `Wire` registers when it enters
//! the target role. It collects received bytes into its buffer and hands them
//! to the receive callback once the transfer finishes, and it runs the
//! request callback when the remote controller reads.

use crate::common::{Logger, NoOpLogger};
use crate::i2c::common::{ControllerId, TransactionEvent};
use crate::i2c::traits::{TargetHardware, TransactionHandler};
use crate::wire::buffer::{ByteBuffer, WIRE_BUFFER_LENGTH};
use embedded_io::ErrorKind;

/// Called at the end of a write transfer with the number of bytes received.
pub type ReceiveCallback<H, const N: usize> = for<'a> fn(&mut TargetContext<'a, H, N>, usize);

/// Called when the remote controller requests data.
pub type RequestCallback<H, const N: usize> = for<'a> fn(&mut TargetContext<'a, H, N>);

/// View of the target binding handed to user callbacks.
///
/// Reads consume the received bytes; writes go straight into the hardware
/// TX FIFO.
pub struct TargetContext<'a, H, const N: usize = WIRE_BUFFER_LENGTH> {
    buffer: &'a mut ByteBuffer<N>,
    hw: &'a mut H,
    tx_spin_limit: Option<u32>,
    stalled: bool,
}

impl<'a, H: TargetHardware, const N: usize> TargetContext<'a, H, N> {
    fn new(buffer: &'a mut ByteBuffer<N>, hw: &'a mut H, tx_spin_limit: Option<u32>) -> Self {
        Self {
            buffer,
            hw,
            tx_spin_limit,
            stalled: false,
        }
    }

    #[must_use]
    pub fn available(&self) -> usize {
        self.buffer.available()
    }

    #[must_use]
    pub fn peek(&self) -> Option<u8> {
        self.buffer.peek()
    }

    pub fn read(&mut self) -> Option<u8> {
        self.buffer.read()
    }

    /// Whether a write gave up waiting for TX FIFO space.
    #[must_use]
    pub fn stalled(&self) -> bool {
        self.stalled
    }

    /// Push `value` into the TX FIFO, waiting while it is full.
    ///
    /// Returns 1 on success. Returns 0 once the configured spin limit has
    /// expired; every later write in the same callback is skipped.
    pub fn write(&mut self, value: u8) -> usize {
        if self.stalled {
            return 0;
        }
        let pushed = match self.tx_spin_limit {
            None => match nb::block!(self.hw.try_write_byte(value)) {
                Ok(()) => true,
                Err(never) => match never {},
            },
            Some(limit) => self.push_bounded(value, limit),
        };
        if pushed {
            1
        } else {
            self.stalled = true;
            0
        }
    }

    /// Push `bytes` in order and return how many reached the FIFO.
    pub fn write_bytes(&mut self, bytes: &[u8]) -> usize {
        bytes
            .iter()
            .take_while(|&&value| self.write(value) == 1)
            .count()
    }

    fn push_bounded(&mut self, value: u8, limit: u32) -> bool {
        for _ in 0..=limit {
            match self.hw.try_write_byte(value) {
                Ok(()) => return true,
                Err(nb::Error::WouldBlock) => core::hint::spin_loop(),
                Err(nb::Error::Other(never)) => match never {},
            }
        }
        false
    }
}

impl<H, const N: usize> embedded_io::ErrorType for TargetContext<'_, H, N> {
    type Error = ErrorKind;
}

impl<H: TargetHardware, const N: usize> embedded_io::Read for TargetContext<'_, H, N> {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        let mut count = 0;
        for slot in buf.iter_mut() {
            let Some(value) = self.buffer.read() else {
                break;
            };
            *slot = value;
            count += 1;
        }
        Ok(count)
    }
}

impl<H: TargetHardware, const N: usize> embedded_io::Write for TargetContext<'_, H, N> {
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        match self.write_bytes(buf) {
            0 if !buf.is_empty() => Err(ErrorKind::TimedOut),
            written => Ok(written),
        }
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// Transaction handler backing a `Wire` in the target role.
pub struct WireState<H, L = NoOpLogger, const N: usize = WIRE_BUFFER_LENGTH> {
    buffer: ByteBuffer<N>,
    on_receive: Option<ReceiveCallback<H, N>>,
    on_request: Option<RequestCallback<H, N>>,
    tx_spin_limit: Option<u32>,
    discarded: usize,
    pub(crate) logger: L,
}

impl<H, L: Logger, const N: usize> WireState<H, L, N> {
    pub fn new(tx_spin_limit: Option<u32>, logger: L) -> Self {
        Self {
            buffer: ByteBuffer::new(),
            on_receive: None,
            on_request: None,
            tx_spin_limit,
            discarded: 0,
            logger,
        }
    }

    pub fn set_on_receive(&mut self, callback: ReceiveCallback<H, N>) {
        self.on_receive = Some(callback);
    }

    pub fn set_on_request(&mut self, callback: RequestCallback<H, N>) {
        self.on_request = Some(callback);
    }

    /// Drop any partially received transfer.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.discarded = 0;
    }
}

impl<H: TargetHardware, L: Logger, const N: usize> WireState<H, L, N> {
    fn receive(&mut self, hw: &mut H) {
        for _ in 0..hw.rx_available() {
            let value = hw.read_byte();
            if !self.buffer.push(value) {
                // The controller cannot NACK once the byte is in the FIFO.
                self.discarded += 1;
            }
        }
    }

    fn request(&mut self, hw: &mut H) {
        debug_assert!(self.buffer.is_empty(), "read request with unconsumed data");
        let Some(callback) = self.on_request else {
            return;
        };
        let mut context = TargetContext::new(&mut self.buffer, hw, self.tx_spin_limit);
        callback(&mut context);
        if context.stalled {
            self.logger.error("wire: tx fifo stalled, response truncated");
        }
    }

    fn finish(&mut self, hw: &mut H) {
        if self.discarded > 0 {
            self.logger.error("wire: receive overrun, excess bytes discarded");
            self.discarded = 0;
        }
        if self.buffer.is_empty() {
            return;
        }
        if let Some(callback) = self.on_receive {
            let count = self.buffer.len();
            let mut context = TargetContext::new(&mut self.buffer, hw, self.tx_spin_limit);
            callback(&mut context, count);
        }
        self.buffer.clear();
    }
}

impl<H: TargetHardware, L: Logger, const N: usize> TransactionHandler<H> for WireState<H, L, N> {
    fn handle(&mut self, hw: &mut H, _controller: ControllerId, event: TransactionEvent) {
        match event {
            TransactionEvent::Receive => self.receive(hw),
            TransactionEvent::Request => self.request(hw),
            TransactionEvent::Finish => self.finish(hw),
        }
    }
}
