// Licensed under the Apache-2.0 license

//! Target-mode protocol state machine.
//!
//! A [`ControllerSlot`] owns one bound controller together with its handler
//! and the transfer-in-progress flag. [`ControllerSlot::dispatch`] is the
//! body of the interrupt service routine: it reads the status register once
//! and turns the set bits into an ordered event sequence.
//!
//! ## Ordering
//!
//! ```text
//! TX_ABRT   -> FINISH (if open), clear
//! START_DET -> FINISH (if open), clear
//! STOP_DET  -> FINISH (if open), clear
//! RX_FULL   -> open, RECEIVE          (level, cleared by draining the FIFO)
//! RD_REQ    -> open, REQUEST, clear
//! ```
//!
//! Boundary conditions resolve before data events of the same snapshot, so a
//! stop followed immediately by the next transfer's first byte finishes the
//! old transfer before the new one is opened.

use crate::i2c::common::{
    validate_target_address, Condition, ControllerId, CoreId, Error, InterruptStatus,
    TargetStatus, TransactionEvent,
};
use crate::i2c::traits::{TargetHardware, TransactionHandler};
use embedded_hal::i2c::SevenBitAddress;

struct Binding<H, T> {
    controller: ControllerId,
    address: SevenBitAddress,
    hw: H,
    handler: T,
    transfer_in_progress: bool,
}

impl<H: TargetHardware, T: TransactionHandler<H>> Binding<H, T> {
    fn emit(&mut self, event: TransactionEvent) {
        self.handler.handle(&mut self.hw, self.controller, event);
    }

    fn finish_transfer(&mut self) {
        if self.transfer_in_progress {
            self.emit(TransactionEvent::Finish);
            self.transfer_in_progress = false;
        }
    }

    fn finish_and_clear(&mut self, condition: Condition) {
        self.finish_transfer();
        self.hw.clear(condition);
    }
}

/// Storage for one core's target binding.
pub struct ControllerSlot<H, T> {
    binding: Option<Binding<H, T>>,
}

impl<H, T> Default for ControllerSlot<H, T> {
    fn default() -> Self {
        Self::vacant()
    }
}

impl<H, T> ControllerSlot<H, T> {
    #[must_use]
    pub const fn vacant() -> Self {
        Self { binding: None }
    }

    #[must_use]
    pub fn is_bound(&self) -> bool {
        self.binding.is_some()
    }

    /// Whether a transfer is open; always false for a vacant slot.
    #[must_use]
    pub fn transfer_in_progress(&self) -> bool {
        self.binding
            .as_ref()
            .is_some_and(|binding| binding.transfer_in_progress)
    }

    #[must_use]
    pub fn status(&self) -> Option<TargetStatus> {
        self.binding.as_ref().map(|binding| TargetStatus {
            controller: binding.controller,
            address: binding.address,
            transfer_in_progress: binding.transfer_in_progress,
        })
    }

    pub fn hardware_mut(&mut self) -> Option<&mut H> {
        self.binding.as_mut().map(|binding| &mut binding.hw)
    }

    pub fn handler_mut(&mut self) -> Option<&mut T> {
        self.binding.as_mut().map(|binding| &mut binding.handler)
    }
}

impl<H: TargetHardware, T: TransactionHandler<H>> ControllerSlot<H, T> {
    /// Put `hw` into addressed-target mode and bind it with `handler`.
    ///
    /// Unmasks exactly [`InterruptStatus::TARGET_EVENTS`] and enables the
    /// controller's interrupt line.
    ///
    /// # Errors
    ///
    /// - `Error::InvalidController` if `hw` reports an index outside 0..2
    /// - `Error::InvalidAddress` for reserved or out-of-range addresses
    /// - `Error::AlreadyInitialized` if the slot is already bound; the core
    ///   id is filled in by the registry
    pub fn bind(
        &mut self,
        mut hw: H,
        address: SevenBitAddress,
        handler: T,
    ) -> Result<ControllerId, Error> {
        let controller = ControllerId::try_from(hw.index())?;
        let address = validate_target_address(address)?;
        if self.binding.is_some() {
            return Err(Error::AlreadyInitialized(CoreId::Core0));
        }

        // The controller stretches the clock after RD_REQ while the TX FIFO
        // is empty, so REQUEST handling has time to respond.
        hw.set_target_mode(Some(address));
        hw.set_interrupt_mask(InterruptStatus::TARGET_EVENTS);
        hw.set_irq_enabled(true);

        self.binding = Some(Binding {
            controller,
            address,
            hw,
            handler,
            transfer_in_progress: false,
        });
        Ok(controller)
    }

    /// Tear down the binding and hand the hardware and handler back.
    ///
    /// # Errors
    ///
    /// Returns `Error::NotInitialized` if the slot is vacant; the core id is
    /// filled in by the registry.
    pub fn unbind(&mut self) -> Result<(H, T), Error> {
        let Some(binding) = self.binding.take() else {
            return Err(Error::NotInitialized(CoreId::Core0));
        };
        let Binding {
            mut hw, handler, ..
        } = binding;

        hw.set_irq_enabled(false);
        hw.set_interrupt_mask(InterruptStatus::empty());
        hw.set_target_mode(None);
        Ok((hw, handler))
    }

    /// Service one interrupt of `controller`.
    ///
    /// Returns `false` without touching the hardware if the slot is vacant
    /// or bound to another controller, and after an all-zero status read.
    pub fn dispatch(&mut self, controller: ControllerId) -> bool {
        let Some(binding) = self.binding.as_mut() else {
            return false;
        };
        if binding.controller != controller {
            return false;
        }

        let status = binding.hw.interrupt_status();
        if status.is_empty() {
            return false;
        }

        if status.contains(InterruptStatus::TX_ABRT) {
            binding.finish_and_clear(Condition::TxAbort);
        }
        if status.contains(InterruptStatus::START_DET) {
            binding.finish_and_clear(Condition::StartDetected);
        }
        if status.contains(InterruptStatus::STOP_DET) {
            binding.finish_and_clear(Condition::StopDetected);
        }
        if status.contains(InterruptStatus::RX_FULL) {
            binding.transfer_in_progress = true;
            binding.emit(TransactionEvent::Receive);
        }
        if status.contains(InterruptStatus::RD_REQ) {
            binding.transfer_in_progress = true;
            binding.emit(TransactionEvent::Request);
            binding.hw.clear(Condition::ReadRequest);
        }
        true
    }
}
