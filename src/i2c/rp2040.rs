// Licensed under the Apache-2.0 license

//! RP2040 DW_apb_i2c target backend.
//!
//! Registers are reached through the `rp2040-pac` register blocks. Pin
//! muxing, resets and clocking are left to the board support code; this
//! type only switches an already-running controller into and out of target
//! mode and services its FIFOs.

use crate::i2c::common::{Condition, ControllerId, CoreId, InterruptStatus, TargetConfig};
use crate::i2c::traits::{ExecutionContext, TargetHardware};
use cortex_m::peripheral::NVIC;
use embedded_hal::i2c::SevenBitAddress;
use rp2040_pac as pac;

/// NVIC line serving `controller`.
#[must_use]
pub const fn interrupt(controller: ControllerId) -> pac::Interrupt {
    match controller {
        ControllerId::I2c0 => pac::Interrupt::I2C0_IRQ,
        ControllerId::I2c1 => pac::Interrupt::I2C1_IRQ,
    }
}

pub struct Rp2040I2c {
    controller: ControllerId,
    regs: &'static pac::i2c0::RegisterBlock,
    hold_bus_on_rx_full: bool,
}

impl Rp2040I2c {
    /// Take over I2C0. The controller must already be out of reset and
    /// clocked.
    #[must_use]
    pub fn i2c0(_i2c: pac::I2C0, config: &TargetConfig) -> Self {
        // SAFETY: the PAC singleton is consumed, so this value is the only
        // owner of the register block.
        let regs = unsafe { &*pac::I2C0::ptr() };
        Self::with_registers(ControllerId::I2c0, regs, config)
    }

    /// Take over I2C1. The controller must already be out of reset and
    /// clocked.
    #[must_use]
    pub fn i2c1(_i2c: pac::I2C1, config: &TargetConfig) -> Self {
        // SAFETY: as in `i2c0`.
        let regs = unsafe { &*pac::I2C1::ptr() };
        Self::with_registers(ControllerId::I2c1, regs, config)
    }

    fn with_registers(
        controller: ControllerId,
        regs: &'static pac::i2c0::RegisterBlock,
        config: &TargetConfig,
    ) -> Self {
        Self {
            controller,
            regs,
            hold_bus_on_rx_full: config.hold_bus_on_rx_full,
        }
    }
}

impl TargetHardware for Rp2040I2c {
    fn index(&self) -> usize {
        self.controller.index()
    }

    fn set_target_mode(&mut self, address: Option<SevenBitAddress>) {
        self.regs.ic_enable().write(|w| w.enable().clear_bit());
        let hold = self.hold_bus_on_rx_full;
        self.regs.ic_con().modify(|_, w| match address {
            Some(_) => w
                .master_mode()
                .clear_bit()
                .ic_slave_disable()
                .clear_bit()
                .stop_det_ifaddressed()
                .set_bit()
                .rx_fifo_full_hld_ctrl()
                .bit(hold),
            None => w
                .master_mode()
                .set_bit()
                .ic_slave_disable()
                .set_bit()
                .rx_fifo_full_hld_ctrl()
                .clear_bit(),
        });
        if let Some(address) = address {
            self.regs
                .ic_sar()
                .write(|w| unsafe { w.bits(u32::from(address)) });
        }
        self.regs.ic_enable().write(|w| w.enable().set_bit());
    }

    fn interrupt_status(&mut self) -> InterruptStatus {
        InterruptStatus::from_bits(self.regs.ic_intr_stat().read().bits())
    }

    fn set_interrupt_mask(&mut self, mask: InterruptStatus) {
        self.regs
            .ic_intr_mask()
            .write(|w| unsafe { w.bits(mask.bits()) });
    }

    fn clear(&mut self, condition: Condition) {
        // Reading a clear register clears its condition.
        let _ = match condition {
            Condition::TxAbort => self.regs.ic_clr_tx_abrt().read().bits(),
            Condition::StartDetected => self.regs.ic_clr_start_det().read().bits(),
            Condition::StopDetected => self.regs.ic_clr_stop_det().read().bits(),
            Condition::ReadRequest => self.regs.ic_clr_rd_req().read().bits(),
        };
    }

    fn set_irq_enabled(&mut self, enabled: bool) {
        let irq = interrupt(self.controller);
        if enabled {
            NVIC::unpend(irq);
            // SAFETY: the line is serviced by `TargetRegistry::on_interrupt`,
            // which is installed before the controller is bound.
            unsafe { NVIC::unmask(irq) };
        } else {
            NVIC::mask(irq);
        }
    }

    fn rx_available(&self) -> usize {
        usize::from(self.regs.ic_rxflr().read().rxflr().bits())
    }

    fn read_byte(&mut self) -> u8 {
        self.regs.ic_data_cmd().read().dat().bits()
    }

    fn tx_not_full(&self) -> bool {
        self.regs.ic_status().read().tfnf().bit_is_set()
    }

    fn write_byte(&mut self, value: u8) {
        self.regs
            .ic_data_cmd()
            .write(|w| unsafe { w.bits(u32::from(value)) });
    }
}

/// Core identification through the SIO `CPUID` register.
pub struct Rp2040Core;

impl ExecutionContext for Rp2040Core {
    fn current() -> CoreId {
        // SAFETY: CPUID is a read-only SIO register present on both cores.
        let sio = unsafe { &*pac::SIO::ptr() };
        CoreId::from_cpuid(sio.cpuid().read().bits())
    }
}
