// Licensed under the Apache-2.0 license

//! Controller-role bus access for the `Wire` adapter.
//!
//! [`I2cController`] wraps any `embedded-hal` I2C driver and exposes it as a
//! [`ControllerBus`]. `embedded-hal` cannot leave the bus claimed between
//! calls, so a write with `no_stop` is held back and sent together with the
//! following read to the same address as one `write_read` transaction. Any
//! other call sends the held write on its own first.

use crate::common::{Logger, NoOpLogger};
use crate::i2c::common::Error;
use crate::i2c::traits::ControllerBus;
use embedded_hal::i2c::{Error as _, I2c, SevenBitAddress};

/// Longest write that can be held for a repeated start.
pub const HELD_WRITE_CAPACITY: usize = 32;

pub struct I2cController<I, L: Logger = NoOpLogger> {
    pub hardware: I,
    pub logger: L,
    held: Option<(SevenBitAddress, heapless::Vec<u8, HELD_WRITE_CAPACITY>)>,
}

impl<I: I2c> I2cController<I> {
    pub fn new(hardware: I) -> Self {
        Self::with_logger(hardware, NoOpLogger)
    }
}

impl<I: I2c, L: Logger> I2cController<I, L> {
    pub fn with_logger(hardware: I, logger: L) -> Self {
        Self {
            hardware,
            logger,
            held: None,
        }
    }

    /// Whether a `no_stop` write is waiting for the next read.
    #[must_use]
    pub fn has_held_write(&self) -> bool {
        self.held.is_some()
    }

    /// Send any held write and hand the driver back.
    pub fn release(mut self) -> I {
        if self.send_held().is_err() {
            self.logger.error("i2c: held write failed on release");
        }
        self.hardware
    }

    fn send_held(&mut self) -> Result<(), Error> {
        match self.held.take() {
            Some((address, bytes)) => self.hardware.write(address, &bytes).map_err(classify),
            None => Ok(()),
        }
    }
}

fn classify<E: embedded_hal::i2c::Error>(error: E) -> Error {
    Error::from_kind(error.kind())
}

impl<I: I2c, L: Logger> ControllerBus for I2cController<I, L> {
    fn write_blocking(
        &mut self,
        address: SevenBitAddress,
        bytes: &[u8],
        no_stop: bool,
    ) -> Result<usize, Error> {
        self.send_held()?;
        if no_stop {
            if let Ok(held) = heapless::Vec::from_slice(bytes) {
                self.held = Some((address, held));
                return Ok(bytes.len());
            }
            self.logger.debug("i2c: write too long to hold, sending stop");
        }
        self.hardware
            .write(address, bytes)
            .map(|()| bytes.len())
            .map_err(classify)
    }

    fn read_blocking(
        &mut self,
        address: SevenBitAddress,
        buffer: &mut [u8],
        no_stop: bool,
    ) -> Result<usize, Error> {
        if no_stop {
            self.logger.debug("i2c: read cannot hold the bus, sending stop");
        }
        let result = match self.held.take() {
            Some((held_address, bytes)) if held_address == address => {
                self.hardware.write_read(address, &bytes, buffer)
            }
            Some((held_address, bytes)) => {
                self.hardware.write(held_address, &bytes).map_err(classify)?;
                self.hardware.read(address, buffer)
            }
            None => self.hardware.read(address, buffer),
        };
        result.map(|()| buffer.len()).map_err(classify)
    }
}
