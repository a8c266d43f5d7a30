//! Event decoding tests: interrupt mapping, clearing, bus errors and the
//! fault-confinement state machine driven through the registers.
mod helpers {
    include!("../../helpers/mod.rs");
}

use embedded_can::StandardId;
use helpers::{Access, MockRegisters};
use twaifd_hal::{
    infra::registers::{fields, fields::int, Reg},
    protocol::controller::config::ControllerConfig,
    BusErrorReason, Controller, ErrorState, Events, TwaiError, TwaiFrame,
};

fn running_controller(regs: &MockRegisters) -> Controller<MockRegisters> {
    let mut controller = Controller::init(regs.clone(), ControllerConfig::default()).unwrap();
    controller.enable().unwrap();
    controller.start().unwrap();
    controller
}

#[test]
/// Nothing pending: repeated decodes yield no events, no writes and no overflow.
fn test_idle_decode() {
    let regs = MockRegisters::new();
    let controller = running_controller(&regs);
    let before = controller.snapshot();
    regs.clear_log();
    assert!(controller.decode_events().is_empty());
    assert!(controller.decode_events().is_empty());
    assert_eq!(controller.snapshot(), before);
    assert_eq!(controller.snapshot().timer_overflow_cnt, 0);
    assert!(!regs
        .log()
        .iter()
        .any(|access| matches!(access, Access::Write(..))));
}

#[test]
/// TX completion raises both TX events and clears them.
fn test_tx_events() {
    let regs = MockRegisters::new();
    let controller = running_controller(&regs);
    regs.complete_tx(0);

    let events = controller.decode_events();
    assert_eq!(events, Events::TX_SUCCESS | Events::TX_BUFFER_FREE);
    assert_eq!(regs.state().int_stat, 0);
    assert!(controller.decode_events().is_empty());
}

#[test]
/// A received frame is announced, arbitration loss is informational.
fn test_rx_and_arbitration_events() {
    let regs = MockRegisters::new();
    let controller = running_controller(&regs);
    let frame = TwaiFrame::new_classic(StandardId::new(0x100).unwrap(), &[1]).unwrap();
    regs.inject_rx(&frame.encode());
    regs.raise(int::ALI);

    let events = controller.decode_events();
    assert!(events.contains(Events::RX_FRAME_AVAILABLE | Events::ARBITRATION_LOST));
    assert!(!events.contains(Events::BUS_ERROR));
}

#[test]
/// Only the captured bits are written back; later arrivals stay pending.
fn test_clear_writes_back_snapshot() {
    let regs = MockRegisters::new();
    let controller = running_controller(&regs);
    regs.raise(int::TXI);
    regs.clear_log();
    controller.decode_events();
    assert!(regs.log().contains(&Access::Write(Reg::INT_STAT, int::TXI)));
}

#[test]
/// The captured error type is latched with the BUS_ERROR event.
fn test_bus_error_reason() {
    let regs = MockRegisters::new();
    let controller = running_controller(&regs);
    regs.bus_error(0b100);
    assert_eq!(controller.decode_events(), Events::BUS_ERROR);
    assert_eq!(controller.latched_error(), Some(BusErrorReason::Stuff));

    // The reason stays latched across unrelated events.
    regs.raise(int::TXI);
    controller.decode_events();
    assert_eq!(controller.latched_error(), Some(BusErrorReason::Stuff));
}

#[test]
/// Data overrun issues the clear-overrun command and reports an overrun.
fn test_data_overrun() {
    let regs = MockRegisters::new();
    let controller = running_controller(&regs);
    regs.raise(int::DOI);
    assert_eq!(controller.decode_events(), Events::BUS_ERROR);
    assert_eq!(controller.latched_error(), Some(BusErrorReason::Overrun));
    assert!(regs
        .commands()
        .iter()
        .any(|command| fields::COMMAND_CDO.extract(*command) == 1));

    regs.raise(int::RXFI);
    controller.decode_events();
    assert_eq!(controller.latched_error(), Some(BusErrorReason::RxFull));
}

#[test]
/// Counter changes without an FSM-change interrupt are not classified.
fn test_counters_read_only_on_fsm_change() {
    let regs = MockRegisters::new();
    let controller = running_controller(&regs);
    regs.state().tec = 200;
    regs.raise(int::TXI);
    regs.clear_log();

    controller.decode_events();
    assert_eq!(controller.error_state(), ErrorState::ErrorActive);
    assert!(!regs.log().contains(&Access::Read(Reg::REC_TEC)));
}

#[test]
/// Rising counters walk through warning and passive.
fn test_error_state_progression() {
    let regs = MockRegisters::new();
    let controller = running_controller(&regs);

    regs.set_counters(100, 0);
    assert_eq!(controller.decode_events(), Events::ERROR_WARNING);
    assert_eq!(controller.error_state(), ErrorState::ErrorWarning);

    regs.set_counters(200, 0);
    assert_eq!(controller.decode_events(), Events::ERROR_PASSIVE);

    regs.set_counters(90, 10);
    assert_eq!(controller.decode_events(), Events::ERROR_ACTIVE);
}

#[test]
/// Bus-off blocks transmission until recovery completes.
fn test_bus_off_recovery() {
    let regs = MockRegisters::new();
    let controller = running_controller(&regs);
    let frame = TwaiFrame::new_classic(StandardId::new(0x1).unwrap(), &[]).unwrap();

    regs.enter_bus_off();
    assert_eq!(controller.decode_events(), Events::BUS_OFF);
    assert_eq!(controller.mount_and_transmit(&frame, 0), Err(TwaiError::BusOff));

    // Counters dropping do not leave bus-off on their own.
    regs.set_counters(0, 0);
    assert!(controller.decode_events().is_empty());
    assert_eq!(controller.error_state(), ErrorState::BusOff);

    controller.start_bus_recovery().unwrap();
    assert_eq!(controller.error_state(), ErrorState::Recovering);
    assert!(regs
        .commands()
        .iter()
        .any(|command| fields::COMMAND_ERCRST.extract(*command) == 1));
    assert_eq!(controller.mount_and_transmit(&frame, 0), Err(TwaiError::BusOff));
    assert!(matches!(
        controller.start_bus_recovery(),
        Err(TwaiError::NotBusOff {
            state: ErrorState::Recovering
        })
    ));

    // Hardware reports error-active again.
    regs.raise(int::FCSI);
    assert_eq!(controller.decode_events(), Events::ERROR_ACTIVE);
    assert_eq!(controller.error_state(), ErrorState::ErrorActive);
    controller.mount_and_transmit(&frame, 0).unwrap();
}

#[test]
/// Faults picked up during reintegration end recovery, and a second bus-off
/// can be recovered again.
fn test_bus_off_again_while_recovering() {
    let regs = MockRegisters::new();
    let controller = running_controller(&regs);

    regs.enter_bus_off();
    controller.decode_events();
    controller.start_bus_recovery().unwrap();

    regs.set_counters(140, 0);
    assert_eq!(controller.decode_events(), Events::ERROR_PASSIVE);
    assert_eq!(controller.error_state(), ErrorState::ErrorPassive);

    assert!(matches!(
        controller.start_bus_recovery(),
        Err(TwaiError::NotBusOff {
            state: ErrorState::ErrorPassive
        })
    ));
    regs.enter_bus_off();
    assert_eq!(controller.decode_events(), Events::BUS_OFF);

    controller.start_bus_recovery().unwrap();
    regs.enter_bus_off();
    assert_eq!(controller.decode_events(), Events::BUS_OFF);
    assert_eq!(controller.error_state(), ErrorState::BusOff);
    controller.start_bus_recovery().unwrap();
    assert_eq!(controller.error_state(), ErrorState::Recovering);
}

#[test]
/// The overflow counter is bumped once per flagged decode.
fn test_timer_overflow_counted() {
    let regs = MockRegisters::new();
    let controller = running_controller(&regs);
    for _ in 0..3 {
        regs.raise_timer_overflow();
        controller.decode_events();
    }
    controller.decode_events();
    assert_eq!(controller.snapshot().timer_overflow_cnt, 3);
    assert_eq!(regs.state().timer_int_st, 0);
}
