// Licensed under the Apache-2.0 license

//! RP2040 I2C target-mode engine.
//!
//! The registry binds one controller per core, the dispatcher turns the
//! controller's interrupt status into RECEIVE / REQUEST / FINISH events, and
//! the traits module describes the hardware the two are written against.

pub mod common;
pub mod i2c_controller;
pub mod registry;
pub mod rp2040;
pub mod target;
pub mod traits;

pub use common::{
    Condition, ControllerId, CoreId, Error, InterruptStatus, TargetConfig, TargetConfigBuilder,
    TargetStatus, TransactionEvent,
};
pub use i2c_controller::I2cController;
pub use registry::TargetRegistry;
pub use rp2040::{Rp2040Core, Rp2040I2c};
pub use target::ControllerSlot;
pub use traits::{ControllerBus, EventFn, ExecutionContext, TargetHardware, TransactionHandler};
