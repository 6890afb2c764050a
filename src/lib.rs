// Licensed under the Apache-2.0 license

//! Interrupt-driven I2C target support for the RP2040.
//!
//! - [`i2c`]: per-core controller registry, the interrupt dispatcher that
//!   turns controller status into RECEIVE / REQUEST / FINISH events, and the
//!   RP2040 register backend.
//! - [`wire`]: a buffered adapter with controller-role transmissions and
//!   target-role callbacks on top of the registry.
//! - `sim` (feature `sim`): a host-side model of the controller for tests.

// Keep panic-prone patterns out of production code
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::indexing_slicing))]
#![cfg_attr(not(test), warn(clippy::expect_used))]
#![cfg_attr(not(any(test, feature = "std")), no_std)]
pub mod common;
pub mod i2c;
#[cfg(any(test, feature = "sim"))]
pub mod sim;
#[cfg(test)]
mod tests;
pub mod wire;
