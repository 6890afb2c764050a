// Licensed under the Apache-2.0 license

//! Per-core controller registry.
//!
//! Each core owns exactly one [`ControllerSlot`]. The slot is picked by the
//! core that makes the call, never by the controller being bound, so the
//! interrupt handler on a core only ever sees the binding that core created.

use crate::i2c::common::{ControllerId, CoreId, Error, TargetStatus};
use crate::i2c::target::ControllerSlot;
use crate::i2c::traits::{ExecutionContext, TargetHardware, TransactionHandler};
use core::cell::UnsafeCell;
use core::marker::PhantomData;
use embedded_hal::i2c::SevenBitAddress;

/// Two statically allocated target slots, one per core.
///
/// ```rust,ignore
/// static REGISTRY: TargetRegistry<Rp2040I2c, EventFn<Rp2040I2c>, Rp2040Core> =
///     TargetRegistry::new();
///
/// #[interrupt]
/// fn I2C0_IRQ() {
///     // SAFETY: only called from the I2C0 vector of this core.
///     unsafe { REGISTRY.on_interrupt(ControllerId::I2c0) };
/// }
/// ```
pub struct TargetRegistry<H, T, X> {
    core0: UnsafeCell<ControllerSlot<H, T>>,
    core1: UnsafeCell<ControllerSlot<H, T>>,
    _context: PhantomData<fn() -> X>,
}

// SAFETY: a slot is only reached through `X::current()`, so each core touches
// only its own slot. Thread-mode access happens inside a critical section,
// which masks the local interrupt that would otherwise alias it.
unsafe impl<H: Send, T: Send, X> Sync for TargetRegistry<H, T, X> {}

impl<H, T, X> Default for TargetRegistry<H, T, X> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H, T, X> TargetRegistry<H, T, X> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            core0: UnsafeCell::new(ControllerSlot::vacant()),
            core1: UnsafeCell::new(ControllerSlot::vacant()),
            _context: PhantomData,
        }
    }

    fn slot(&self, core: CoreId) -> &UnsafeCell<ControllerSlot<H, T>> {
        match core {
            CoreId::Core0 => &self.core0,
            CoreId::Core1 => &self.core1,
        }
    }
}

fn attribute(core: CoreId, err: Error) -> Error {
    match err {
        Error::AlreadyInitialized(_) => Error::AlreadyInitialized(core),
        Error::NotInitialized(_) => Error::NotInitialized(core),
        other => other,
    }
}

impl<H, T, X> TargetRegistry<H, T, X>
where
    H: TargetHardware,
    T: TransactionHandler<H>,
    X: ExecutionContext,
{
    /// Bind `hw` as an addressed target on the calling core's slot.
    ///
    /// # Errors
    ///
    /// - `Error::InvalidController` if the hardware index is not 0 or 1
    /// - `Error::InvalidAddress` for a reserved or out-of-range address
    /// - `Error::AlreadyInitialized` if this core already has a binding
    pub fn try_init(
        &self,
        hw: H,
        address: SevenBitAddress,
        handler: T,
    ) -> Result<ControllerId, Error> {
        let core = X::current();
        let slot = self.slot(core);
        critical_section::with(|_| {
            // SAFETY: local interrupts are masked and only this core
            // reaches this slot.
            let slot = unsafe { &mut *slot.get() };
            slot.bind(hw, address, handler)
        })
        .map_err(|err| attribute(core, err))
    }

    /// Like [`try_init`](Self::try_init), treating every error as fatal.
    ///
    /// # Panics
    ///
    /// On any configuration error.
    pub fn init(&self, hw: H, address: SevenBitAddress, handler: T) -> ControllerId {
        match self.try_init(hw, address, handler) {
            Ok(controller) => controller,
            Err(err) => panic!("i2c target init failed: {err:?}"),
        }
    }

    /// Unbind the calling core's slot and return the hardware and handler.
    ///
    /// # Errors
    ///
    /// Returns `Error::NotInitialized` if this core has no binding.
    pub fn try_deinit(&self) -> Result<(H, T), Error> {
        let core = X::current();
        let slot = self.slot(core);
        critical_section::with(|_| {
            // SAFETY: see `try_init`.
            let slot = unsafe { &mut *slot.get() };
            slot.unbind()
        })
        .map_err(|err| attribute(core, err))
    }

    /// # Panics
    ///
    /// If the calling core has no binding.
    pub fn deinit(&self) -> (H, T) {
        match self.try_deinit() {
            Ok(parts) => parts,
            Err(err) => panic!("i2c target deinit failed: {err:?}"),
        }
    }

    /// Interrupt-vector entry point for `controller`.
    ///
    /// Dispatches only when the calling core's slot is bound to
    /// `controller`. Returns whether any status bit was handled.
    ///
    /// # Safety
    ///
    /// Must be called from the interrupt handler of `controller` on the
    /// calling core, or with that interrupt masked. Nested calls for the same
    /// core alias the slot.
    pub unsafe fn on_interrupt(&self, controller: ControllerId) -> bool {
        let slot = self.slot(X::current());
        // SAFETY: guaranteed by the caller.
        let slot = unsafe { &mut *slot.get() };
        slot.dispatch(controller)
    }

    /// Snapshot of the calling core's binding.
    #[must_use]
    pub fn status(&self) -> Option<TargetStatus> {
        let slot = self.slot(X::current());
        // SAFETY: see `try_init`.
        critical_section::with(|_| unsafe { &*slot.get() }.status())
    }

    /// Run `f` on the bound hardware with the controller interrupt masked.
    pub fn with_hardware<R>(&self, f: impl FnOnce(&mut H) -> R) -> Option<R> {
        let slot = self.slot(X::current());
        critical_section::with(|_| {
            // SAFETY: see `try_init`.
            let slot = unsafe { &mut *slot.get() };
            slot.hardware_mut().map(f)
        })
    }

    /// Run `f` on the bound handler with the controller interrupt masked.
    pub fn with_handler<R>(&self, f: impl FnOnce(&mut T) -> R) -> Option<R> {
        let slot = self.slot(X::current());
        critical_section::with(|_| {
            // SAFETY: see `try_init`.
            let slot = unsafe { &mut *slot.get() };
            slot.handler_mut().map(f)
        })
    }
}
