// Licensed under the Apache-2.0 license

//! Logging plumbing shared by the I2C target engine and the `Wire` adapter.
//!
//! Components that want to report anything take a `L: Logger` type parameter
//! defaulting to [`NoOpLogger`], so firmware that does not care about
//! diagnostics pays nothing for them.

/// Minimal sink for diagnostic messages.
///
/// Messages are static strings so that implementations can run from
/// interrupt context without formatting or allocation.
pub trait Logger {
    fn debug(&mut self, msg: &str);
    fn error(&mut self, msg: &str);
}

/// Logger that discards everything.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct NoOpLogger;

impl Logger for NoOpLogger {
    fn debug(&mut self, _msg: &str) {}
    fn error(&mut self, _msg: &str) {}
}

/// Logger forwarding to `defmt`.
#[cfg(feature = "defmt")]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct DefmtLogger;

#[cfg(feature = "defmt")]
impl Logger for DefmtLogger {
    fn debug(&mut self, msg: &str) {
        defmt::debug!("{=str}", msg);
    }

    fn error(&mut self, msg: &str) {
        defmt::error!("{=str}", msg);
    }
}

impl<L: Logger + ?Sized> Logger for &mut L {
    fn debug(&mut self, msg: &str) {
        (**self).debug(msg);
    }

    fn error(&mut self, msg: &str) {
        (**self).error(msg);
    }
}
