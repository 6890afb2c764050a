// Licensed under the Apache-2.0 license

//! Common types and constants for the RP2040 I2C target engine.
//!
//! This module provides shared definitions for error handling, interrupt
//! status bits, controller/core identifiers and configuration used across the
//! registry, the dispatcher and the `Wire` adapter.

use core::ops::{BitAnd, BitOr, BitOrAssign};
use embedded_hal::i2c::{ErrorKind, NoAcknowledgeSource, SevenBitAddress};

/// Default bound on FIFO-full polls before a target-mode write gives up.
///
/// At 100 kHz one byte leaves the TX FIFO roughly every 90 us; this limit
/// covers several byte times at the RP2040's default system clock.
pub const DEFAULT_TX_SPIN_LIMIT: u32 = 100_000;

/// Crate-wide error type.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// Controller index other than 0 or 1.
    InvalidController(usize),
    /// Address is not a usable 7-bit target address.
    InvalidAddress(u8),
    /// The calling core already has a bound slot.
    AlreadyInitialized(CoreId),
    /// The calling core has no bound slot.
    NotInitialized(CoreId),
    /// The remote target did not acknowledge.
    NoAcknowledge(NoAcknowledgeSource),
    ArbitrationLoss,
    Bus,
    Overrun,
    /// Any other transport failure.
    Other,
}

impl Error {
    /// Classify an `embedded-hal` error kind.
    #[must_use]
    pub fn from_kind(kind: ErrorKind) -> Self {
        match kind {
            ErrorKind::NoAcknowledge(source) => Self::NoAcknowledge(source),
            ErrorKind::ArbitrationLoss => Self::ArbitrationLoss,
            ErrorKind::Bus => Self::Bus,
            ErrorKind::Overrun => Self::Overrun,
            _ => Self::Other,
        }
    }
}

impl embedded_hal::i2c::Error for Error {
    fn kind(&self) -> ErrorKind {
        match self {
            Self::NoAcknowledge(source) => ErrorKind::NoAcknowledge(*source),
            Self::ArbitrationLoss => ErrorKind::ArbitrationLoss,
            Self::Bus => ErrorKind::Bus,
            Self::Overrun => ErrorKind::Overrun,
            Self::InvalidController(_)
            | Self::InvalidAddress(_)
            | Self::AlreadyInitialized(_)
            | Self::NotInitialized(_)
            | Self::Other => ErrorKind::Other,
        }
    }
}

/// Hardware I2C controller instance.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum ControllerId {
    I2c0 = 0,
    I2c1 = 1,
}

impl ControllerId {
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }
}

impl TryFrom<usize> for ControllerId {
    type Error = Error;

    fn try_from(index: usize) -> Result<Self, Self::Error> {
        match index {
            0 => Ok(Self::I2c0),
            1 => Ok(Self::I2c1),
            other => Err(Error::InvalidController(other)),
        }
    }
}

/// Execution context (processor core) identifier.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CoreId {
    Core0,
    Core1,
}

impl CoreId {
    /// Decode the value of the SIO `CPUID` register.
    #[must_use]
    pub const fn from_cpuid(cpuid: u32) -> Self {
        if cpuid == 0 {
            Self::Core0
        } else {
            Self::Core1
        }
    }
}

/// The three events of the target transaction protocol.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TransactionEvent {
    /// Data from the controller is waiting in the RX FIFO. The handler must
    /// drain the FIFO before returning.
    Receive,
    /// The controller is reading; the handler should fill the TX FIFO.
    Request,
    /// The current transfer ended (stop, restart or abort).
    Finish,
}

/// Interrupt status / mask bits in the DW_apb_i2c `IC_INTR_STAT` layout.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct InterruptStatus(u32);

impl InterruptStatus {
    pub const RX_FULL: Self = Self(1 << 2);
    pub const RD_REQ: Self = Self(1 << 5);
    pub const TX_ABRT: Self = Self(1 << 6);
    pub const STOP_DET: Self = Self(1 << 9);
    pub const START_DET: Self = Self(1 << 10);

    /// Sources unmasked while a controller is bound as target.
    pub const TARGET_EVENTS: Self = Self(
        Self::RX_FULL.0 | Self::RD_REQ.0 | Self::TX_ABRT.0 | Self::STOP_DET.0 | Self::START_DET.0,
    );

    #[must_use]
    pub const fn empty() -> Self {
        Self(0)
    }

    #[must_use]
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    #[must_use]
    pub const fn bits(self) -> u32 {
        self.0
    }

    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn remove(&mut self, other: Self) {
        self.0 &= !other.0;
    }
}

impl BitOr for InterruptStatus {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for InterruptStatus {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for InterruptStatus {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}

/// Conditions the dispatcher clears explicitly after handling them.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Condition {
    TxAbort,
    StartDetected,
    StopDetected,
    ReadRequest,
}

impl Condition {
    /// Status bit this condition clears.
    #[must_use]
    pub const fn flag(self) -> InterruptStatus {
        match self {
            Self::TxAbort => InterruptStatus::TX_ABRT,
            Self::StartDetected => InterruptStatus::START_DET,
            Self::StopDetected => InterruptStatus::STOP_DET,
            Self::ReadRequest => InterruptStatus::RD_REQ,
        }
    }
}

/// Diagnostic snapshot of a bound target slot.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TargetStatus {
    /// Controller bound on the calling core
    pub controller: ControllerId,
    /// Address the controller answers to
    pub address: SevenBitAddress,
    /// Whether a transfer is open (RECEIVE/REQUEST seen, no FINISH yet)
    pub transfer_in_progress: bool,
}

/// Check that `address` is a 7-bit address outside the reserved ranges
/// `0x00..=0x07` and `0x78..=0x7F`.
///
/// # Errors
///
/// Returns `Error::InvalidAddress` otherwise.
pub fn validate_target_address(address: SevenBitAddress) -> Result<SevenBitAddress, Error> {
    if address > 0x7f || address & 0x78 == 0 || address & 0x78 == 0x78 {
        return Err(Error::InvalidAddress(address));
    }
    Ok(address)
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TargetConfig {
    /// Maximum FIFO-full polls per byte for target-mode writes; `None` waits
    /// forever, which hangs the handler if the remote controller stalls.
    pub tx_spin_limit: Option<u32>,
    /// Stretch the clock instead of dropping bytes when the RX FIFO is full.
    pub hold_bus_on_rx_full: bool,
}

impl Default for TargetConfig {
    fn default() -> Self {
        TargetConfigBuilder::new().build()
    }
}

pub struct TargetConfigBuilder {
    tx_spin_limit: Option<u32>,
    hold_bus_on_rx_full: bool,
}

impl Default for TargetConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TargetConfigBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            tx_spin_limit: Some(DEFAULT_TX_SPIN_LIMIT),
            hold_bus_on_rx_full: false,
        }
    }
    #[must_use]
    pub fn tx_spin_limit(mut self, limit: u32) -> Self {
        self.tx_spin_limit = Some(limit);
        self
    }
    #[must_use]
    pub fn unbounded_tx_wait(mut self) -> Self {
        self.tx_spin_limit = None;
        self
    }
    #[must_use]
    pub fn hold_bus_on_rx_full(mut self, enabled: bool) -> Self {
        self.hold_bus_on_rx_full = enabled;
        self
    }
    #[must_use]
    pub fn build(self) -> TargetConfig {
        TargetConfig {
            tx_spin_limit: self.tx_spin_limit,
            hold_bus_on_rx_full: self.hold_bus_on_rx_full,
        }
    }
}
