// Licensed under the Apache-2.0 license

//! # I2C Target Abstraction Traits
//!
//! This module defines the seams between the protocol engine and the world
//! around it. The dispatcher never touches registers directly; it talks to a
//! [`TargetHardware`] implementation, so the same state machine runs against
//! the RP2040 peripheral and against the software simulator.
//!
//! ## Trait Overview
//!
//! ```text
//! TargetHardware      (status/mask/clear registers, FIFOs, interrupt line)
//! ExecutionContext    (which core is running, selects the per-core slot)
//! TransactionHandler  (consumer of RECEIVE / REQUEST / FINISH)
//! ControllerBus       (blocking controller-mode write/read primitives)
//! ```

use crate::i2c::common::{Condition, ControllerId, CoreId, Error, InterruptStatus, TransactionEvent};
use core::convert::Infallible;
use embedded_hal::i2c::SevenBitAddress;

/// Register-level capabilities of one I2C controller operating as a target.
///
/// All methods are expected to be called from the core that bound the
/// controller; implementations do no locking of their own.
///
/// # Examples
///
/// ```rust,ignore
/// use rp2040_i2c_target::i2c::{InterruptStatus, TargetHardware};
///
/// fn drain<T: TargetHardware>(hw: &mut T, out: &mut heapless::Vec<u8, 16>) {
///     if hw.interrupt_status().contains(InterruptStatus::RX_FULL) {
///         for _ in 0..hw.rx_available() {
///             let _ = out.push(hw.read_byte());
///         }
///     }
/// }
/// ```
pub trait TargetHardware {
    /// Hardware index of the controller (0 for I2C0, 1 for I2C1).
    fn index(&self) -> usize;

    /// Enter addressed-target mode at `address`, or revert to controller
    /// mode with `None`.
    fn set_target_mode(&mut self, address: Option<SevenBitAddress>);

    /// Read the masked interrupt status register.
    fn interrupt_status(&mut self) -> InterruptStatus;

    /// Replace the interrupt mask; set bits are unmasked sources.
    fn set_interrupt_mask(&mut self, mask: InterruptStatus);

    /// Clear a latched interrupt condition.
    fn clear(&mut self, condition: Condition);

    /// Enable or disable the controller's interrupt line on the calling core.
    fn set_irq_enabled(&mut self, enabled: bool);

    /// Number of bytes waiting in the RX FIFO.
    fn rx_available(&self) -> usize;

    /// Pop one byte from the RX FIFO.
    fn read_byte(&mut self) -> u8;

    /// Whether the TX FIFO can take another byte.
    fn tx_not_full(&self) -> bool;

    /// Push one byte into the TX FIFO without checking for space.
    fn write_byte(&mut self, value: u8);

    /// Push one byte into the TX FIFO if there is room.
    ///
    /// # Errors
    ///
    /// Returns `nb::Error::WouldBlock` while the FIFO is full.
    fn try_write_byte(&mut self, value: u8) -> nb::Result<(), Infallible> {
        if self.tx_not_full() {
            self.write_byte(value);
            Ok(())
        } else {
            Err(nb::Error::WouldBlock)
        }
    }
}

/// Identifies the execution context (core) the caller runs on.
pub trait ExecutionContext {
    fn current() -> CoreId;
}

/// Consumer of the three-event target protocol.
///
/// Called only from interrupt context, with exclusive access to the bound
/// hardware. On `Receive` the handler must drain the RX FIFO before
/// returning; the hardware cannot refuse bytes it has already buffered.
pub trait TransactionHandler<H> {
    fn handle(&mut self, hw: &mut H, controller: ControllerId, event: TransactionEvent);
}

/// Plain function handler.
pub type EventFn<H> = fn(&mut H, ControllerId, TransactionEvent);

impl<H> TransactionHandler<H> for fn(&mut H, ControllerId, TransactionEvent) {
    fn handle(&mut self, hw: &mut H, controller: ControllerId, event: TransactionEvent) {
        (*self)(hw, controller, event);
    }
}

/// Blocking controller-mode bus primitives.
///
/// Both operations return the number of bytes actually transferred. A data
/// NACK part way through a write may be reported either as a short count or
/// as `Error::NoAcknowledge(NoAcknowledgeSource::Data)`.
pub trait ControllerBus {
    /// Write `bytes` to `address`. With `no_stop` the bus is kept for a
    /// repeated start.
    ///
    /// # Errors
    ///
    /// Returns an error if the address is not acknowledged or the transfer
    /// fails on the bus.
    fn write_blocking(
        &mut self,
        address: SevenBitAddress,
        bytes: &[u8],
        no_stop: bool,
    ) -> Result<usize, Error>;

    /// Read into `buffer` from `address`.
    ///
    /// # Errors
    ///
    /// Returns an error if the address is not acknowledged or the transfer
    /// fails on the bus.
    fn read_blocking(
        &mut self,
        address: SevenBitAddress,
        buffer: &mut [u8],
        no_stop: bool,
    ) -> Result<usize, Error>;
}

impl<B: ControllerBus + ?Sized> ControllerBus for &mut B {
    fn write_blocking(
        &mut self,
        address: SevenBitAddress,
        bytes: &[u8],
        no_stop: bool,
    ) -> Result<usize, Error> {
        (**self).write_blocking(address, bytes, no_stop)
    }

    fn read_blocking(
        &mut self,
        address: SevenBitAddress,
        buffer: &mut [u8],
        no_stop: bool,
    ) -> Result<usize, Error> {
        (**self).read_blocking(address, buffer, no_stop)
    }
}
