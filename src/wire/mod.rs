// Licensed under the Apache-2.0 license

//! Byte-buffer adapter over one I2C controller.
//!
//! `Wire` plays either role on the bus:
//!
//! - **Controller**: outgoing bytes are staged between
//!   [`Wire::begin_transmission`] and [`Wire::end_transmission`] and sent in
//!   one blocking write; [`Wire::request_from`] fills the buffer with one
//!   blocking read.
//! - **Target**: [`Wire::begin_target`] binds the controller in the
//!   registry with a [`WireState`] handler. Received bytes reach the receive
//!   callback when the transfer ends; the request callback answers reads by
//!   writing straight into the TX FIFO.
//!
//! Callbacks are plain functions and receive a [`TargetContext`] for reading
//! and writing, so application state lives in statics.

pub mod buffer;
pub mod target;

pub use buffer::{ByteBuffer, WIRE_BUFFER_LENGTH};
pub use target::{ReceiveCallback, RequestCallback, TargetContext, WireState};

use crate::common::{Logger, NoOpLogger};
use crate::i2c::common::{validate_target_address, ControllerId, Error, TargetConfig};
use crate::i2c::registry::TargetRegistry;
use crate::i2c::traits::{ControllerBus, ExecutionContext, TargetHardware};
use embedded_hal::i2c::{NoAcknowledgeSource, SevenBitAddress};

/// Result code of [`Wire::end_transmission`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum EndStatus {
    Success = 0,
    /// Fewer bytes were accepted than sent.
    DataNack = 3,
    Other = 4,
}

impl EndStatus {
    #[must_use]
    pub const fn code(self) -> u8 {
        self as u8
    }
}

impl From<EndStatus> for u8 {
    fn from(status: EndStatus) -> Self {
        status.code()
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Role {
    Unassigned,
    Controller,
    Target,
}

pub struct Wire<'r, H, B, X, L = NoOpLogger, const N: usize = WIRE_BUFFER_LENGTH> {
    registry: &'r TargetRegistry<H, WireState<H, L, N>, X>,
    /// Hardware and handler while not registered as target.
    held: Option<(H, WireState<H, L, N>)>,
    bus: B,
    buffer: ByteBuffer<N>,
    role: Role,
    tx_address: Option<SevenBitAddress>,
}

impl<'r, H, B, X, L, const N: usize> Wire<'r, H, B, X, L, N>
where
    H: TargetHardware,
    B: ControllerBus,
    X: ExecutionContext,
    L: Logger,
{
    pub fn new(
        registry: &'r TargetRegistry<H, WireState<H, L, N>, X>,
        hw: H,
        bus: B,
        config: &TargetConfig,
        logger: L,
    ) -> Self {
        Self {
            registry,
            held: Some((hw, WireState::new(config.tx_spin_limit, logger))),
            bus,
            buffer: ByteBuffer::new(),
            role: Role::Unassigned,
            tx_address: None,
        }
    }

    #[must_use]
    pub fn role(&self) -> Role {
        self.role
    }

    pub fn bus_mut(&mut self) -> &mut B {
        &mut self.bus
    }

    fn log_debug(&mut self, msg: &str) {
        match self.held.as_mut() {
            Some((_, state)) => state.logger.debug(msg),
            None => {
                self.registry.with_handler(|state| state.logger.debug(msg));
            }
        }
    }

    fn log_error(&mut self, msg: &str) {
        match self.held.as_mut() {
            Some((_, state)) => state.logger.error(msg),
            None => {
                self.registry.with_handler(|state| state.logger.error(msg));
            }
        }
    }

    /// Unregister the target binding, if any, and take the parts back.
    fn release_target(&mut self) {
        if self.role == Role::Target {
            let (hw, mut state) = self.registry.deinit();
            state.reset();
            self.held = Some((hw, state));
            self.role = Role::Unassigned;
        }
    }

    /// Enter the controller role.
    pub fn begin(&mut self) {
        debug_assert!(self.tx_address.is_none(), "begin during transmission");
        self.release_target();
        self.role = Role::Controller;
        self.buffer.clear();
        self.log_debug("wire: controller role");
    }

    /// Enter the target role at `address`.
    ///
    /// On error the adapter keeps its hardware and is left unassigned if it
    /// was a target before.
    ///
    /// # Errors
    ///
    /// - `Error::InvalidAddress` for a reserved or out-of-range address
    /// - `Error::InvalidController` if the hardware index is not 0 or 1
    /// - `Error::AlreadyInitialized` if another binding owns this core's slot
    pub fn begin_target(&mut self, address: SevenBitAddress) -> Result<ControllerId, Error> {
        debug_assert!(self.tx_address.is_none(), "begin during transmission");
        validate_target_address(address)?;
        self.release_target();

        let Some((hw, state)) = self.held.take() else {
            unreachable!("wire parts are held outside the target role");
        };
        if let Err(err) = ControllerId::try_from(hw.index()) {
            self.held = Some((hw, state));
            return Err(err);
        }
        if self.registry.status().is_some() {
            self.held = Some((hw, state));
            return Err(Error::AlreadyInitialized(X::current()));
        }

        self.buffer.clear();
        let controller = self.registry.init(hw, address, state);
        self.role = Role::Target;
        self.log_debug("wire: target role");
        Ok(controller)
    }

    /// Leave whatever role is active.
    pub fn end(&mut self) {
        debug_assert!(self.tx_address.is_none(), "end during transmission");
        self.release_target();
        self.role = Role::Unassigned;
    }

    pub fn on_receive(&mut self, callback: ReceiveCallback<H, N>) {
        match self.held.as_mut() {
            Some((_, state)) => state.set_on_receive(callback),
            None => {
                self.registry
                    .with_handler(|state| state.set_on_receive(callback));
            }
        }
    }

    pub fn on_request(&mut self, callback: RequestCallback<H, N>) {
        match self.held.as_mut() {
            Some((_, state)) => state.set_on_request(callback),
            None => {
                self.registry
                    .with_handler(|state| state.set_on_request(callback));
            }
        }
    }

    /// Start staging a write to `address`.
    pub fn begin_transmission(&mut self, address: SevenBitAddress) {
        debug_assert_eq!(self.role, Role::Controller, "not in controller role");
        debug_assert!(self.tx_address.is_none(), "transmission already open");
        self.tx_address = Some(address);
        self.buffer.clear();
    }

    /// Stage one byte. Returns 1 if it fit, 0 otherwise.
    ///
    /// Only meaningful in the controller role between `begin_transmission`
    /// and `end_transmission`; target responses are written through the
    /// [`TargetContext`] passed to the request callback.
    pub fn write(&mut self, value: u8) -> usize {
        if !self.transmitting() {
            return 0;
        }
        usize::from(self.buffer.push(value))
    }

    /// Stage as many of `bytes` as fit and return how many were taken.
    pub fn write_bytes(&mut self, bytes: &[u8]) -> usize {
        if !self.transmitting() {
            return 0;
        }
        self.buffer.extend_truncating(bytes)
    }

    fn transmitting(&self) -> bool {
        debug_assert_ne!(self.role, Role::Unassigned, "begin not called");
        self.role == Role::Controller && self.tx_address.is_some()
    }

    /// Send the staged bytes in one blocking write.
    ///
    /// The staged address and bytes are dropped whatever the outcome.
    pub fn end_transmission(&mut self, send_stop: bool) -> EndStatus {
        debug_assert_eq!(self.role, Role::Controller, "not in controller role");
        debug_assert!(self.tx_address.is_some(), "no transmission open");
        debug_assert_eq!(self.buffer.position(), 0);
        let Some(address) = self.tx_address.take() else {
            return EndStatus::Other;
        };

        let requested = self.buffer.len();
        let result = self
            .bus
            .write_blocking(address, self.buffer.as_slice(), !send_stop);
        self.buffer.clear();

        let status = match result {
            Ok(written) if written >= requested => EndStatus::Success,
            Ok(_) | Err(Error::NoAcknowledge(NoAcknowledgeSource::Data)) => EndStatus::DataNack,
            Err(_) => EndStatus::Other,
        };
        match status {
            EndStatus::Success => {}
            EndStatus::DataNack => self.log_error("wire: write interrupted by data nack"),
            EndStatus::Other => self.log_error("wire: write failed"),
        }
        status
    }

    /// Read up to `count` bytes (clamped to the buffer capacity) from
    /// `address`, replacing the buffer contents. Returns the number of bytes
    /// obtained; 0 on any error.
    pub fn request_from(
        &mut self,
        address: SevenBitAddress,
        count: usize,
        send_stop: bool,
    ) -> usize {
        debug_assert_eq!(self.role, Role::Controller, "not in controller role");
        debug_assert!(self.tx_address.is_none(), "request during transmission");

        let bus = &mut self.bus;
        match self
            .buffer
            .fill_with(count, |out| bus.read_blocking(address, out, !send_stop))
        {
            Ok(obtained) => obtained,
            Err(_) => {
                self.log_error("wire: read failed");
                0
            }
        }
    }

    /// Bytes left to read from the last `request_from`.
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

    /// Leave the current role and return the hardware and bus.
    pub fn release(mut self) -> (H, B) {
        self.end();
        let Some((hw, _)) = self.held.take() else {
            unreachable!("wire parts are held outside the target role");
        };
        (hw, self.bus)
    }
}

impl<H, B, X, L, const N: usize> embedded_io::ErrorType for Wire<'_, H, B, X, L, N> {
    type Error = embedded_io::ErrorKind;
}

impl<H, B, X, L, const N: usize> embedded_io::Read for Wire<'_, H, B, X, L, N>
where
    H: TargetHardware,
    B: ControllerBus,
    X: ExecutionContext,
    L: Logger,
{
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

impl<H, B, X, L, const N: usize> embedded_io::Write for Wire<'_, H, B, X, L, N>
where
    H: TargetHardware,
    B: ControllerBus,
    X: ExecutionContext,
    L: Logger,
{
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        match self.write_bytes(buf) {
            0 if !buf.is_empty() => Err(embedded_io::ErrorKind::OutOfMemory),
            written => Ok(written),
        }
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}
