// Licensed under the Apache-2.0 license

use crate::i2c::{
    ControllerId, EventFn, InterruptStatus, TargetHardware, TargetRegistry, TransactionEvent,
};
use crate::sim::{MemoryLogger, SimCore, SimTarget};
use crate::wire::{TargetContext, WireState};
use hex_literal::hex;
use std::cell::RefCell;

thread_local! {
    static EVENTS: RefCell<Vec<(TransactionEvent, usize)>> = const { RefCell::new(Vec::new()) };
    static RECEIVED: RefCell<Vec<(usize, Vec<u8>)>> = const { RefCell::new(Vec::new()) };
}

/// Logs each event with the number of bytes it drained.
fn log_events(hw: &mut SimTarget, _: ControllerId, event: TransactionEvent) {
    let mut drained = 0;
    if event == TransactionEvent::Receive {
        while hw.rx_available() > 0 {
            hw.read_byte();
            drained += 1;
        }
    }
    EVENTS.with(|events| events.borrow_mut().push((event, drained)));
}

fn record_receive(ctx: &mut TargetContext<'_, SimTarget>, count: usize) {
    let mut bytes = Vec::new();
    while let Some(value) = ctx.read() {
        bytes.push(value);
    }
    RECEIVED.with(|received| received.borrow_mut().push((count, bytes)));
}

fn respond_ab(ctx: &mut TargetContext<'_, SimTarget>) {
    assert_eq!(ctx.available(), 0);
    ctx.write(0xab);
}

fn interrupt<T, X>(registry: &TargetRegistry<SimTarget, T, X>) -> bool
where
    T: crate::i2c::TransactionHandler<SimTarget>,
    X: crate::i2c::ExecutionContext,
{
    // SAFETY: simulated interrupt on the test thread.
    unsafe { registry.on_interrupt(ControllerId::I2c0) }
}

#[test]
fn test_receive_five_bytes_then_stop_events() {
    EVENTS.with(|events| events.borrow_mut().clear());
    let registry: TargetRegistry<SimTarget, EventFn<SimTarget>, SimCore> = TargetRegistry::new();
    assert_eq!(
        registry.init(SimTarget::new(0), 0x17, log_events),
        ControllerId::I2c0
    );

    registry.with_hardware(|hw| hw.receive(&hex!("01 02 03 04 05")));
    assert!(interrupt(&registry));
    registry.with_hardware(|hw| hw.raise(InterruptStatus::STOP_DET));
    assert!(interrupt(&registry));

    EVENTS.with(|events| {
        assert_eq!(
            *events.borrow(),
            vec![(TransactionEvent::Receive, 5), (TransactionEvent::Finish, 0)]
        );
    });
}

#[test]
fn test_receive_five_bytes_reaches_callback() {
    RECEIVED.with(|received| received.borrow_mut().clear());
    let registry: TargetRegistry<SimTarget, WireState<SimTarget, MemoryLogger>, SimCore> =
        TargetRegistry::new();
    let mut state = WireState::new(None, MemoryLogger::default());
    state.set_on_receive(record_receive);
    registry.init(SimTarget::new(0), 0x17, state);

    registry.with_hardware(|hw| hw.receive(&hex!("01 02 03 04 05")));
    interrupt(&registry);
    RECEIVED.with(|received| assert!(received.borrow().is_empty()));

    registry.with_hardware(|hw| hw.raise(InterruptStatus::STOP_DET));
    interrupt(&registry);
    RECEIVED.with(|received| {
        assert_eq!(*received.borrow(), vec![(5, hex!("01 02 03 04 05").to_vec())]);
    });
    assert!(!registry.status().unwrap().transfer_in_progress);
}

#[test]
fn test_read_request_answered_without_receive_callback() {
    RECEIVED.with(|received| received.borrow_mut().clear());
    let registry: TargetRegistry<SimTarget, WireState<SimTarget, MemoryLogger>, SimCore> =
        TargetRegistry::new();
    let mut state = WireState::new(None, MemoryLogger::default());
    state.set_on_receive(record_receive);
    state.set_on_request(respond_ab);
    registry.init(SimTarget::new(0), 0x17, state);

    registry.with_hardware(|hw| hw.raise(InterruptStatus::RD_REQ));
    interrupt(&registry);
    assert!(registry.status().unwrap().transfer_in_progress);
    assert_eq!(registry.with_hardware(SimTarget::take_tx), Some(vec![0xab]));

    registry.with_hardware(|hw| hw.raise(InterruptStatus::STOP_DET));
    interrupt(&registry);
    assert!(!registry.status().unwrap().transfer_in_progress);
    RECEIVED.with(|received| assert!(received.borrow().is_empty()));
}

#[test]
fn test_deinit_masks_and_silences_the_line() {
    EVENTS.with(|events| events.borrow_mut().clear());
    let registry: TargetRegistry<SimTarget, EventFn<SimTarget>, SimCore> = TargetRegistry::new();
    registry.init(SimTarget::new(0), 0x17, log_events);
    let (mut hw, _) = registry.deinit();

    assert_eq!(hw.interrupt_mask(), InterruptStatus::empty());
    assert!(!hw.irq_enabled());
    hw.receive(&[0x01]);
    hw.raise(InterruptStatus::RD_REQ | InterruptStatus::STOP_DET);
    assert!(hw.interrupt_status().is_empty());

    assert!(!interrupt(&registry));
    EVENTS.with(|events| assert!(events.borrow().is_empty()));
}
