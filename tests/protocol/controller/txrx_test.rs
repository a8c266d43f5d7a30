//! TX buffer and RX FIFO tests against the emulated register block.
mod helpers {
    include!("../../helpers/mod.rs");
}

use embedded_can::{nb::Can, ExtendedId, Frame, Id, StandardId};
use helpers::{Access, MockRegisters, MOCK_TXT_BUFFERS};
use twaifd_hal::{
    infra::registers::{fields, fields::int, Reg},
    protocol::{
        controller::{config::ControllerConfig, txrx::TxBufferState},
        frame::{self, FrameHeader},
    },
    Controller, TwaiError, TwaiFrame,
};

fn running_controller(regs: &MockRegisters) -> Controller<MockRegisters> {
    let mut controller = Controller::init(regs.clone(), ControllerConfig::default()).unwrap();
    controller.enable().unwrap();
    controller.start().unwrap();
    controller
}

fn std_id(raw: u16) -> StandardId {
    StandardId::new(raw).unwrap()
}

//==================================================================================TX
#[test]
/// The frame image lands in the selected TXT buffer, then the slot is marked ready.
fn test_mount_and_transmit() {
    let regs = MockRegisters::new();
    let controller = running_controller(&regs);
    let frame = TwaiFrame::new_fd(std_id(0x321), &[0xAA; 20], true).unwrap();

    regs.clear_log();
    controller.mount_and_transmit(&frame, 2).unwrap();

    assert_eq!(regs.txt_frame(2).used_words(), frame.encode().used_words());
    assert_eq!(
        controller.tx_buffer_state(2),
        Ok(TxBufferState::Ready)
    );

    // Ready command is the last write, after the whole image.
    let writes: Vec<_> = regs
        .log()
        .into_iter()
        .filter_map(|access| match access {
            Access::Write(reg, value) => Some((reg, value)),
            Access::Read(_) => None,
        })
        .collect();
    let (last_reg, last_value) = *writes.last().unwrap();
    assert_eq!(last_reg, Reg::TX_COMMAND);
    assert_eq!(fields::TX_COMMAND_TXCR.extract(last_value), 1);
    assert_eq!(fields::tx_command_buffer(2).extract(last_value), 1);
    assert_eq!(writes.len(), frame.encode().word_count() + 1);
}

#[test]
/// Header + payload transmit goes through the same path.
fn test_transmit_raw() {
    let regs = MockRegisters::new();
    let controller = running_controller(&regs);
    let header = FrameHeader::new(ExtendedId::new(0x1234_5678).unwrap());
    controller.transmit_raw(&header, &[1, 2, 3], 0).unwrap();

    let mut dest = [0u8; 8];
    let (decoded, len) = frame::decode(&regs.txt_frame(0), &mut dest);
    assert_eq!(decoded.id, header.id);
    assert_eq!(&dest[..len], &[1, 2, 3]);
}

#[test]
/// Slots beyond the hardware buffer count are rejected.
fn test_no_such_tx_buffer() {
    let regs = MockRegisters::new();
    let controller = running_controller(&regs);
    let frame = TwaiFrame::new_classic(std_id(1), &[1]).unwrap();
    assert_eq!(
        controller.mount_and_transmit(&frame, MOCK_TXT_BUFFERS),
        Err(TwaiError::NoSuchTxBuffer {
            slot: MOCK_TXT_BUFFERS,
            available: MOCK_TXT_BUFFERS
        })
    );
    assert!(controller.abort_transmit(7).is_err());
    assert!(controller.set_tx_priority(9, 1).is_err());
}

#[test]
/// Transmission needs a running core.
fn test_transmit_requires_running() {
    let regs = MockRegisters::new();
    let mut controller = Controller::<_>::init(regs.clone(), ControllerConfig::default()).unwrap();
    controller.enable().unwrap();
    let frame = TwaiFrame::new_classic(std_id(1), &[1]).unwrap();
    assert_eq!(
        controller.mount_and_transmit(&frame, 0),
        Err(TwaiError::InvalidState { operation: "transmit" })
    );
}

#[test]
/// Abort and priority commands target the right slot.
fn test_abort_and_priority() {
    let regs = MockRegisters::new();
    let controller = running_controller(&regs);
    let frame = TwaiFrame::new_classic(std_id(5), &[5]).unwrap();
    controller.mount_and_transmit(&frame, 1).unwrap();
    controller.abort_transmit(1).unwrap();
    assert_eq!(controller.tx_buffer_state(1), Ok(TxBufferState::Aborted));

    controller.set_tx_priority(3, 6).unwrap();
    assert_eq!(
        fields::tx_priority(3).extract(regs.plain(Reg::TX_PRIORITY)),
        6
    );
}

#[test]
/// Priorities wider than the field are rejected, not truncated.
fn test_tx_priority_out_of_range() {
    let regs = MockRegisters::new();
    let controller = running_controller(&regs);
    controller.set_tx_priority(1, 7).unwrap();

    assert_eq!(
        controller.set_tx_priority(1, 8),
        Err(TwaiError::TxPriorityOutOfRange { priority: 8, max: 7 })
    );
    assert_eq!(
        fields::tx_priority(1).extract(regs.plain(Reg::TX_PRIORITY)),
        7
    );
}

#[test]
/// The embedded-can transmit picks a free buffer and blocks when none is left.
fn test_nb_transmit_uses_free_buffer() {
    let regs = MockRegisters::new();
    let mut controller = running_controller(&regs);
    let frame = TwaiFrame::new_classic(std_id(0x10), &[1, 2]).unwrap();

    for expected in 0..MOCK_TXT_BUFFERS {
        assert_eq!(Can::transmit(&mut controller, &frame), Ok(None));
        assert_eq!(controller.tx_buffer_state(expected), Ok(TxBufferState::Ready));
    }
    assert_eq!(
        Can::transmit(&mut controller, &frame),
        Err(nb::Error::WouldBlock)
    );

    regs.complete_tx(2);
    assert_eq!(Can::transmit(&mut controller, &frame), Ok(None));
    assert_eq!(controller.tx_buffer_state(2), Ok(TxBufferState::Ready));
}

//==================================================================================RX
#[test]
/// An empty FIFO pops nothing and clears nothing.
fn test_pop_empty_fifo() {
    let regs = MockRegisters::new();
    let controller = running_controller(&regs);
    regs.clear_log();
    let mut dest = [0u8; 64];
    assert!(controller.pop_rx_frame(&mut dest).is_none());
    assert!(!regs
        .log()
        .iter()
        .any(|access| matches!(access, Access::Write(..))));
}

#[test]
/// RBNEI is cleared only after every word of the frame has been read.
fn test_rx_clear_after_read() {
    let regs = MockRegisters::new();
    let controller = running_controller(&regs);
    let sent = TwaiFrame::new_fd(std_id(0x77), &[3; 12], false).unwrap();
    regs.inject_rx(&sent.encode());
    regs.clear_log();

    let mut dest = [0u8; 64];
    let (header, len) = controller.pop_rx_frame(&mut dest).unwrap();
    assert_eq!(header.id, sent.id());
    assert_eq!(&dest[..len], sent.payload());

    let log = regs.log();
    let clear = log
        .iter()
        .position(|access| *access == Access::Write(Reg::INT_STAT, int::RBNEI))
        .unwrap();
    let data_reads: Vec<usize> = log
        .iter()
        .enumerate()
        .filter(|(_, access)| **access == Access::Read(Reg::RX_DATA))
        .map(|(index, _)| index)
        .collect();
    assert_eq!(data_reads.len(), sent.encode().word_count());
    assert!(data_reads.iter().all(|index| *index < clear));
    assert_eq!(regs.state().int_stat & int::RBNEI, 0);
}

#[test]
/// Frames come out in arrival order and the pending count follows.
fn test_fifo_order() {
    let regs = MockRegisters::new();
    let controller = running_controller(&regs);
    for id in 1..=3u16 {
        let frame = TwaiFrame::new_classic(std_id(id), &[id as u8]).unwrap();
        regs.inject_rx(&frame.encode());
    }
    assert_eq!(controller.rx_pending_count(), 3);

    for id in 1..=3u16 {
        let frame = controller.pop_frame().unwrap();
        assert_eq!(frame.id(), Id::Standard(std_id(id)));
        assert_eq!(frame.data(), &[id as u8]);
    }
    assert_eq!(controller.rx_pending_count(), 0);
    assert!(controller.pop_frame().is_none());
}

#[test]
/// The received timestamp carries the overflow count in its upper half.
fn test_rx_timestamp_compensated() {
    let regs = MockRegisters::new();
    let controller = running_controller(&regs);
    regs.raise_timer_overflow();
    controller.decode_events();
    regs.raise_timer_overflow();
    controller.decode_events();

    let mut header = FrameHeader::new(std_id(9));
    header.timestamp = 0x0000_00FF_0000_1234;
    regs.inject_rx(&frame::encode(&header, &[]));

    let mut dest = [0u8; 8];
    let (received, _) = controller.pop_rx_frame(&mut dest).unwrap();
    // Hardware high word is ignored in favour of the software overflow count.
    assert_eq!(received.timestamp, (2u64 << 32) | 0x1234);
}

#[test]
/// Flushing releases every pending frame.
fn test_flush_rx() {
    let regs = MockRegisters::new();
    let mut controller = running_controller(&regs);
    let frame = TwaiFrame::new_classic(std_id(1), &[]).unwrap();
    regs.inject_rx(&frame.encode());
    regs.inject_rx(&frame.encode());

    controller.flush_rx();
    assert_eq!(controller.rx_pending_count(), 0);
    assert_eq!(Can::receive(&mut controller), Err(nb::Error::WouldBlock));
}
