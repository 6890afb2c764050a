// Licensed under the Apache-2.0 license

//! Host-side simulation of the RP2040 I2C target hardware.
//!
//! [`SimTarget`] models one DW_apb_i2c controller: latched interrupt
//! conditions, a level-triggered RX_FULL derived from FIFO occupancy and
//! 16-entry FIFOs. [`SimCore`] stands in for the SIO CPUID register with a
//! per-thread core id. [`ScriptedBus`] and [`Loopback`] are controller-role
//! buses: the first answers from a script, the second drives a target bound
//! in a [`TargetRegistry`] the way a remote controller would.

use crate::common::Logger;
use crate::i2c::common::{Condition, ControllerId, CoreId, Error, InterruptStatus};
use crate::i2c::registry::TargetRegistry;
use crate::i2c::traits::{ControllerBus, ExecutionContext, TargetHardware, TransactionHandler};
use core::convert::Infallible;
use embedded_hal::i2c::{NoAcknowledgeSource, SevenBitAddress};
use heapless::Deque;
use std::cell::Cell;
use std::collections::VecDeque;

/// Depth of both hardware FIFOs.
pub const FIFO_DEPTH: usize = 16;

#[derive(Debug, Default)]
pub struct SimTarget {
    index: usize,
    address: Option<SevenBitAddress>,
    latched: InterruptStatus,
    mask: InterruptStatus,
    irq_enabled: bool,
    rx: Deque<u8, FIFO_DEPTH>,
    tx: Deque<u8, FIFO_DEPTH>,
    tx_depth: usize,
    clock_budget: usize,
    shifted: VecDeque<u8>,
    rx_dropped: usize,
    tx_overflow: usize,
    status_reads: usize,
    clears: Vec<Condition>,
}

impl SimTarget {
    #[must_use]
    pub fn new(index: usize) -> Self {
        Self {
            index,
            tx_depth: FIFO_DEPTH,
            ..Self::default()
        }
    }

    /// Shrink the usable TX FIFO to `depth` entries.
    #[must_use]
    pub fn with_tx_depth(mut self, depth: usize) -> Self {
        self.tx_depth = depth.min(FIFO_DEPTH);
        self
    }

    /// Latch `flags` as if the bus had produced them.
    pub fn raise(&mut self, flags: InterruptStatus) {
        self.latched |= flags;
    }

    /// Shift `bytes` into the RX FIFO; bytes that do not fit are dropped.
    pub fn receive(&mut self, bytes: &[u8]) -> usize {
        let mut accepted = 0;
        for &value in bytes {
            if self.rx.push_back(value).is_ok() {
                accepted += 1;
            } else {
                self.rx_dropped += 1;
            }
        }
        accepted
    }

    /// Let the remote controller clock up to `count` bytes out of a full TX
    /// FIFO while the target is still filling it.
    pub fn clock_out(&mut self, count: usize) {
        self.clock_budget = count;
    }

    /// Next byte on the bus: bytes already clocked out, then the TX FIFO.
    pub fn pop_tx(&mut self) -> Option<u8> {
        self.shifted.pop_front().or_else(|| self.tx.pop_front())
    }

    pub fn take_tx(&mut self) -> Vec<u8> {
        core::iter::from_fn(|| self.pop_tx()).collect()
    }

    /// Discard the TX FIFO and return how many bytes it held.
    pub fn flush_tx(&mut self) -> usize {
        let pending = self.tx.len();
        self.tx.clear();
        self.clock_budget = 0;
        pending
    }

    #[must_use]
    pub fn target_address(&self) -> Option<SevenBitAddress> {
        self.address
    }

    #[must_use]
    pub fn interrupt_mask(&self) -> InterruptStatus {
        self.mask
    }

    #[must_use]
    pub fn irq_enabled(&self) -> bool {
        self.irq_enabled
    }

    #[must_use]
    pub fn status_reads(&self) -> usize {
        self.status_reads
    }

    #[must_use]
    pub fn clears(&self) -> &[Condition] {
        &self.clears
    }

    #[must_use]
    pub fn rx_dropped(&self) -> usize {
        self.rx_dropped
    }

    #[must_use]
    pub fn tx_overflow(&self) -> usize {
        self.tx_overflow
    }
}

impl TargetHardware for SimTarget {
    fn index(&self) -> usize {
        self.index
    }

    fn set_target_mode(&mut self, address: Option<SevenBitAddress>) {
        self.address = address;
    }

    fn interrupt_status(&mut self) -> InterruptStatus {
        self.status_reads += 1;
        let mut raw = self.latched;
        if !self.rx.is_empty() {
            raw |= InterruptStatus::RX_FULL;
        }
        raw & self.mask
    }

    fn set_interrupt_mask(&mut self, mask: InterruptStatus) {
        self.mask = mask;
    }

    fn clear(&mut self, condition: Condition) {
        self.latched.remove(condition.flag());
        self.clears.push(condition);
    }

    fn set_irq_enabled(&mut self, enabled: bool) {
        self.irq_enabled = enabled;
    }

    fn rx_available(&self) -> usize {
        self.rx.len()
    }

    fn read_byte(&mut self) -> u8 {
        self.rx.pop_front().unwrap_or(0)
    }

    fn tx_not_full(&self) -> bool {
        self.tx.len() < self.tx_depth
    }

    fn write_byte(&mut self, value: u8) {
        if !self.tx_not_full() || self.tx.push_back(value).is_err() {
            self.tx_overflow += 1;
        }
    }

    fn try_write_byte(&mut self, value: u8) -> nb::Result<(), Infallible> {
        if !self.tx_not_full() && self.clock_budget > 0 {
            if let Some(front) = self.tx.pop_front() {
                self.shifted.push_back(front);
                self.clock_budget -= 1;
            }
        }
        if self.tx_not_full() {
            self.write_byte(value);
            Ok(())
        } else {
            Err(nb::Error::WouldBlock)
        }
    }
}

thread_local! {
    static CURRENT_CORE: Cell<CoreId> = const { Cell::new(CoreId::Core0) };
}

/// Simulated core identity; each thread starts on `Core0`.
pub struct SimCore;

struct RestoreCore(CoreId);

impl Drop for RestoreCore {
    fn drop(&mut self) {
        CURRENT_CORE.set(self.0);
    }
}

impl SimCore {
    /// Run `f` as if executing on `core`.
    pub fn run_on<R>(core: CoreId, f: impl FnOnce() -> R) -> R {
        let _restore = RestoreCore(CURRENT_CORE.replace(core));
        f()
    }
}

impl ExecutionContext for SimCore {
    fn current() -> CoreId {
        CURRENT_CORE.get()
    }
}

/// Controller bus answering one address from a script.
#[derive(Debug, Default)]
pub struct ScriptedBus {
    address: SevenBitAddress,
    accept_limit: Option<usize>,
    writes: Vec<(SevenBitAddress, Vec<u8>, bool)>,
    reads: VecDeque<u8>,
}

impl ScriptedBus {
    #[must_use]
    pub fn new(address: SevenBitAddress) -> Self {
        Self {
            address,
            ..Self::default()
        }
    }

    /// NACK data after `limit` bytes of each write.
    #[must_use]
    pub fn accept_limit(mut self, limit: usize) -> Self {
        self.accept_limit = Some(limit);
        self
    }

    pub fn queue_read(&mut self, bytes: &[u8]) {
        self.reads.extend(bytes.iter().copied());
    }

    /// Accepted bytes of every write with its `no_stop` flag.
    #[must_use]
    pub fn writes(&self) -> &[(SevenBitAddress, Vec<u8>, bool)] {
        &self.writes
    }

    fn check_address(&self, address: SevenBitAddress) -> Result<(), Error> {
        if address == self.address {
            Ok(())
        } else {
            Err(Error::NoAcknowledge(NoAcknowledgeSource::Address))
        }
    }
}

impl ControllerBus for ScriptedBus {
    fn write_blocking(
        &mut self,
        address: SevenBitAddress,
        bytes: &[u8],
        no_stop: bool,
    ) -> Result<usize, Error> {
        self.check_address(address)?;
        let accepted = self.accept_limit.map_or(bytes.len(), |limit| limit.min(bytes.len()));
        let taken = bytes.iter().take(accepted).copied().collect();
        self.writes.push((address, taken, no_stop));
        Ok(accepted)
    }

    fn read_blocking(
        &mut self,
        address: SevenBitAddress,
        buffer: &mut [u8],
        _no_stop: bool,
    ) -> Result<usize, Error> {
        self.check_address(address)?;
        let mut obtained = 0;
        for slot in buffer.iter_mut() {
            let Some(value) = self.reads.pop_front() else {
                break;
            };
            *slot = value;
            obtained += 1;
        }
        Ok(obtained)
    }
}

/// Controller bus wired to the target bound on the calling core.
///
/// Every bus condition is latched on the bound [`SimTarget`] and followed by
/// a simulated interrupt. While a read request is being served the controller
/// keeps clocking, so a full TX FIFO drains up to the bytes still wanted. A
/// read stops early if the target leaves the TX FIFO empty after a read
/// request; real hardware would stretch the clock instead.
pub struct Loopback<'r, T, X> {
    registry: &'r TargetRegistry<SimTarget, T, X>,
}

impl<'r, T, X> Loopback<'r, T, X>
where
    T: TransactionHandler<SimTarget>,
    X: ExecutionContext,
{
    #[must_use]
    pub fn new(registry: &'r TargetRegistry<SimTarget, T, X>) -> Self {
        Self { registry }
    }

    fn addressed(&self, address: SevenBitAddress) -> Result<ControllerId, Error> {
        self.registry
            .status()
            .filter(|status| status.address == address)
            .map(|status| status.controller)
            .ok_or(Error::NoAcknowledge(NoAcknowledgeSource::Address))
    }

    fn signal(&self, controller: ControllerId, flags: InterruptStatus) {
        self.registry.with_hardware(|hw| hw.raise(flags));
        self.interrupt(controller);
    }

    fn interrupt(&self, controller: ControllerId) {
        // SAFETY: the simulated interrupt runs on this thread, never nested.
        unsafe { self.registry.on_interrupt(controller) };
    }

    fn pop_tx(&self) -> Option<u8> {
        self.registry.with_hardware(SimTarget::pop_tx).flatten()
    }
}

impl<T, X> ControllerBus for Loopback<'_, T, X>
where
    T: TransactionHandler<SimTarget>,
    X: ExecutionContext,
{
    fn write_blocking(
        &mut self,
        address: SevenBitAddress,
        bytes: &[u8],
        no_stop: bool,
    ) -> Result<usize, Error> {
        let controller = self.addressed(address)?;
        self.signal(controller, InterruptStatus::START_DET);
        for chunk in bytes.chunks(FIFO_DEPTH) {
            self.registry.with_hardware(|hw| hw.receive(chunk));
            self.interrupt(controller);
        }
        if !no_stop {
            self.signal(controller, InterruptStatus::STOP_DET);
        }
        Ok(bytes.len())
    }

    fn read_blocking(
        &mut self,
        address: SevenBitAddress,
        buffer: &mut [u8],
        no_stop: bool,
    ) -> Result<usize, Error> {
        let controller = self.addressed(address)?;
        self.signal(controller, InterruptStatus::START_DET);

        let wanted = buffer.len();
        let mut obtained = 0;
        for slot in buffer.iter_mut() {
            let value = match self.pop_tx() {
                Some(value) => Some(value),
                None => {
                    self.registry
                        .with_hardware(|hw| hw.clock_out(wanted - obtained));
                    self.signal(controller, InterruptStatus::RD_REQ);
                    self.registry.with_hardware(|hw| hw.clock_out(0));
                    self.pop_tx()
                }
            };
            let Some(value) = value else {
                break;
            };
            *slot = value;
            obtained += 1;
        }

        // Bytes still queued when the controller NACKs the last one are
        // flushed by the hardware with a transmit abort.
        let leftover = self.registry.with_hardware(SimTarget::flush_tx).unwrap_or(0);
        if leftover > 0 {
            self.signal(controller, InterruptStatus::TX_ABRT);
        }
        if !no_stop {
            self.signal(controller, InterruptStatus::STOP_DET);
        }
        Ok(obtained)
    }
}

/// Logger that keeps every message, prefixed with its level.
#[derive(Clone, Debug, Default)]
pub struct MemoryLogger {
    lines: Vec<String>,
}

impl MemoryLogger {
    #[must_use]
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn errors(&self) -> impl Iterator<Item = &str> {
        self.lines
            .iter()
            .filter_map(|line| line.strip_prefix("ERROR "))
    }
}

impl Logger for MemoryLogger {
    fn debug(&mut self, msg: &str) {
        self.lines.push(format!("DEBUG {msg}"));
    }

    fn error(&mut self, msg: &str) {
        self.lines.push(format!("ERROR {msg}"));
    }
}
