// Licensed under the Apache-2.0 license

use crate::i2c::{ControllerBus, CoreId, Error, TargetConfig, TargetConfigBuilder, TargetRegistry};
use crate::sim::{Loopback, MemoryLogger, ScriptedBus, SimCore, SimTarget};
use crate::wire::{EndStatus, TargetContext, Wire, WireState, WIRE_BUFFER_LENGTH};
use embedded_hal::i2c::NoAcknowledgeSource;
use hex_literal::hex;
use std::cell::RefCell;

type Registry = TargetRegistry<SimTarget, WireState<SimTarget, MemoryLogger>, SimCore>;
type Device<'r> = Wire<'r, SimTarget, ScriptedBus, SimCore, MemoryLogger>;
type Host<'r> =
    Wire<'r, SimTarget, Loopback<'r, WireState<SimTarget, MemoryLogger>, SimCore>, SimCore, MemoryLogger>;

thread_local! {
    static RECEIVED: RefCell<Vec<(usize, Vec<u8>)>> = const { RefCell::new(Vec::new()) };
    static RESPONSE: RefCell<Vec<u8>> = const { RefCell::new(Vec::new()) };
}

fn record(ctx: &mut TargetContext<'_, SimTarget>, count: usize) {
    let bytes = std::iter::from_fn(|| ctx.read()).collect();
    RECEIVED.with(|received| received.borrow_mut().push((count, bytes)));
}

fn respond(ctx: &mut TargetContext<'_, SimTarget>) {
    RESPONSE.with(|response| {
        ctx.write_bytes(&response.borrow());
    });
}

fn device<'r>(registry: &'r Registry, index: usize, config: &TargetConfig) -> Device<'r> {
    let mut device = Wire::new(
        registry,
        SimTarget::new(index),
        ScriptedBus::default(),
        config,
        MemoryLogger::default(),
    );
    device.on_receive(record);
    device.on_request(respond);
    device
}

fn host(registry: &Registry) -> Host<'_> {
    let mut host = Wire::new(
        registry,
        SimTarget::new(1),
        Loopback::new(registry),
        &TargetConfig::default(),
        MemoryLogger::default(),
    );
    host.begin();
    host
}

#[test]
fn test_response_round_trip() {
    let registry = Registry::new();
    let mut target = device(&registry, 0, &TargetConfig::default());
    target.begin_target(0x17).unwrap();
    let mut controller = host(&registry);

    for n in [1usize, 7, 16, 17, WIRE_BUFFER_LENGTH] {
        let expected: Vec<u8> = (0..n).map(|i| (i as u8).wrapping_mul(37)).collect();
        RESPONSE.with(|response| *response.borrow_mut() = expected.clone());

        assert_eq!(controller.request_from(0x17, n, true), n);
        let got: Vec<u8> = std::iter::from_fn(|| controller.read()).collect();
        assert_eq!(got, expected);
    }
}

#[test]
fn test_receive_overrun_keeps_capacity() {
    RECEIVED.with(|received| received.borrow_mut().clear());
    let registry = Registry::new();
    let mut target = device(&registry, 0, &TargetConfig::default());
    target.begin_target(0x17).unwrap();

    let payload: Vec<u8> = (0..WIRE_BUFFER_LENGTH as u8 + 8).collect();
    let mut bus = Loopback::new(&registry);
    assert_eq!(bus.write_blocking(0x17, &payload, false), Ok(payload.len()));

    RECEIVED.with(|received| {
        let received = received.borrow();
        assert_eq!(received.len(), 1);
        let (count, bytes) = &received[0];
        assert_eq!(*count, WIRE_BUFFER_LENGTH);
        assert_eq!(bytes.as_slice(), &payload[..WIRE_BUFFER_LENGTH]);
    });
    let overruns = registry
        .with_handler(|state| state.logger.errors().filter(|e| e.contains("overrun")).count());
    assert_eq!(overruns, Some(1));
}

#[test]
fn test_short_write_reports_data_nack() {
    let registry = Registry::new();
    let mut controller = Wire::new(
        &registry,
        SimTarget::new(0),
        ScriptedBus::new(0x2a).accept_limit(3),
        &TargetConfig::default(),
        MemoryLogger::default(),
    );
    controller.begin();
    controller.begin_transmission(0x2a);
    controller.write_bytes(&hex!("00 11 22 33 44 55"));
    assert_eq!(controller.end_transmission(true).code(), 3);
    assert_eq!(
        controller.bus_mut().writes(),
        &[(0x2a, hex!("00 11 22").to_vec(), false)]
    );
}

#[test]
fn test_stalled_response_is_truncated() {
    let registry = Registry::new();
    let config = TargetConfigBuilder::new().tx_spin_limit(8).build();
    let mut target = Wire::new(
        &registry,
        SimTarget::new(0).with_tx_depth(4),
        ScriptedBus::default(),
        &config,
        MemoryLogger::default(),
    );
    target.on_request(respond);
    target.begin_target(0x17).unwrap();
    RESPONSE.with(|response| *response.borrow_mut() = (1..=20).collect());

    let mut controller = host(&registry);
    // The controller clocks out six bytes and four more fill the FIFO; the
    // rest of the response gives up. Each request starts the response over.
    for _ in 0..2 {
        assert_eq!(controller.request_from(0x17, 6, true), 6);
        let got: Vec<u8> = std::iter::from_fn(|| controller.read()).collect();
        assert_eq!(got, hex!("01 02 03 04 05 06"));
    }

    let stalls = registry.with_handler(|state| state.logger.errors().count());
    assert_eq!(stalls, Some(2));
}

#[test]
fn test_target_gone_after_switch_to_controller() {
    RECEIVED.with(|received| received.borrow_mut().clear());
    let registry = Registry::new();
    let mut target = device(&registry, 0, &TargetConfig::default());
    target.begin_target(0x17).unwrap();
    target.begin();

    let mut bus = Loopback::new(&registry);
    assert_eq!(
        bus.write_blocking(0x17, &[1, 2, 3], false),
        Err(Error::NoAcknowledge(NoAcknowledgeSource::Address))
    );
    RECEIVED.with(|received| assert!(received.borrow().is_empty()));

    let mut controller = host(&registry);
    controller.begin_transmission(0x17);
    controller.write(0x01);
    assert_eq!(controller.end_transmission(true), EndStatus::Other);
}

#[test]
fn test_each_core_serves_its_own_target() {
    let registry = Registry::new();

    std::thread::scope(|scope| {
        scope.spawn(|| {
            SimCore::run_on(CoreId::Core1, || {
                RECEIVED.with(|received| received.borrow_mut().clear());
                let mut target = device(&registry, 1, &TargetConfig::default());
                target.begin_target(0x42).unwrap();

                let mut controller = host(&registry);
                controller.begin_transmission(0x42);
                controller.write_bytes(&hex!("c0 ff ee"));
                assert_eq!(controller.end_transmission(true), EndStatus::Success);
                RECEIVED.with(|received| {
                    assert_eq!(*received.borrow(), vec![(3, hex!("c0 ff ee").to_vec())]);
                });

                // Core 0's target is not reachable from here.
                controller.begin_transmission(0x17);
                assert_eq!(controller.end_transmission(true), EndStatus::Other);
                target.end();
            });
        });
    });

    let mut target = device(&registry, 0, &TargetConfig::default());
    target.begin_target(0x17).unwrap();
    let mut controller = host(&registry);
    controller.begin_transmission(0x42);
    assert_eq!(controller.end_transmission(true), EndStatus::Other);
    SimCore::run_on(CoreId::Core1, || assert_eq!(registry.status(), None));
}
