// Licensed under the Apache-2.0 license

//! A 256-byte memory served over the target role and driven by a second
//! `Wire` in the controller role through the loopback bus.
//!
//! Writes start with the memory address followed by data; reads continue
//! from the current address. The address wraps at 256.

use crate::i2c::{ControllerId, TargetConfig, TargetRegistry};
use crate::sim::{Loopback, MemoryLogger, ScriptedBus, SimCore, SimTarget};
use crate::wire::{EndStatus, TargetContext, Wire, WireState};
use std::cell::RefCell;

const DEVICE_ADDRESS: u8 = 0x17;

struct Memory {
    cells: [u8; 256],
    address: u8,
}

thread_local! {
    static MEMORY: RefCell<Memory> = const {
        RefCell::new(Memory {
            cells: [0; 256],
            address: 0,
        })
    };
}

fn on_receive(ctx: &mut TargetContext<'_, SimTarget>, count: usize) {
    assert!(count > 0);
    MEMORY.with(|memory| {
        let mut memory = memory.borrow_mut();
        memory.address = ctx.read().unwrap();
        while let Some(value) = ctx.read() {
            let address = memory.address;
            memory.cells[usize::from(address)] = value;
            memory.address = address.wrapping_add(1);
        }
    });
}

fn on_request(ctx: &mut TargetContext<'_, SimTarget>) {
    MEMORY.with(|memory| {
        let mut memory = memory.borrow_mut();
        let address = memory.address;
        ctx.write(memory.cells[usize::from(address)]);
        memory.address = address.wrapping_add(1);
    });
}

type Registry = TargetRegistry<SimTarget, WireState<SimTarget, MemoryLogger>, SimCore>;

fn read_back<B: crate::i2c::ControllerBus>(
    wire: &mut Wire<'_, SimTarget, B, SimCore, MemoryLogger>,
    count: usize,
    send_stop: bool,
) -> Vec<u8> {
    assert_eq!(wire.request_from(DEVICE_ADDRESS, count, send_stop), count);
    std::iter::from_fn(|| wire.read()).collect()
}

#[test]
fn test_memory_device_round_trip() {
    MEMORY.with(|memory| memory.borrow_mut().cells = [0; 256]);
    let registry = Registry::new();
    let config = TargetConfig::default();

    let mut device = Wire::new(
        &registry,
        SimTarget::new(0),
        ScriptedBus::default(),
        &config,
        MemoryLogger::default(),
    );
    device.on_receive(on_receive);
    device.on_request(on_request);
    assert_eq!(device.begin_target(DEVICE_ADDRESS), Ok(ControllerId::I2c0));

    let mut host = Wire::new(
        &registry,
        SimTarget::new(1),
        Loopback::new(&registry),
        &config,
        MemoryLogger::default(),
    );
    host.begin();

    for mem_address in (0..=255u8).step_by(32) {
        let message = format!("Hello, I2C target! - 0x{mem_address:02X}");
        let message = message.as_bytes();

        host.begin_transmission(DEVICE_ADDRESS);
        assert_eq!(host.write(mem_address), 1);
        assert_eq!(host.write_bytes(message), message.len());
        assert_eq!(host.end_transmission(true), EndStatus::Success);

        // Seek, then read across a repeated start in two parts.
        host.begin_transmission(DEVICE_ADDRESS);
        host.write(mem_address);
        assert_eq!(host.end_transmission(false), EndStatus::Success);

        let split = 5;
        let head = read_back(&mut host, split, false);
        assert_eq!(head.as_slice(), &message[..split]);
        let tail = read_back(&mut host, message.len() - split, true);
        assert_eq!(tail.as_slice(), &message[split..]);
    }

    MEMORY.with(|memory| {
        let memory = memory.borrow();
        assert_eq!(&memory.cells[224..229], b"Hello");
    });
    assert!(!registry.status().unwrap().transfer_in_progress);
}

#[test]
fn test_callbacks_replaced_while_registered() {
    fn silent(ctx: &mut TargetContext<'_, SimTarget>) {
        ctx.write(0x00);
    }

    let registry = Registry::new();
    let config = TargetConfig::default();
    let mut device = Wire::new(
        &registry,
        SimTarget::new(0),
        ScriptedBus::default(),
        &config,
        MemoryLogger::default(),
    );
    device.on_request(silent);
    device.begin_target(DEVICE_ADDRESS).unwrap();

    let mut host = Wire::new(
        &registry,
        SimTarget::new(1),
        Loopback::new(&registry),
        &config,
        MemoryLogger::default(),
    );
    host.begin();
    assert_eq!(read_back(&mut host, 2, true), vec![0x00, 0x00]);

    MEMORY.with(|memory| {
        let mut memory = memory.borrow_mut();
        memory.cells[0x40] = 0x5a;
        memory.cells[0x41] = 0xa5;
        memory.address = 0x40;
    });
    device.on_request(on_request);
    assert_eq!(read_back(&mut host, 2, true), vec![0x5a, 0xa5]);
}
