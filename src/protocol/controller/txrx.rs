//! TX buffers and RX FIFO.
//!
//! Slot and FIFO accesses are not serialised here: concurrent transmitters
//! must use distinct slots or lock around the call, and only one context may
//! pop the RX FIFO.
use embassy_sync::blocking_mutex::raw::RawMutex;

use super::{Controller, Lifecycle, RunState};
use crate::core::{ErrorState, HW_FRAME_WORDS};
use crate::error::TwaiError;
use crate::infra::registers::{fields, fields::int, Field, Reg, RegisterBlock};
use crate::protocol::frame::{self, FrameHeader, HwFrame, TwaiFrame};

//==================================================================================TX_BUFFER_STATE
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
/// State nibble of one TXT buffer as reported by TX_STATUS.
pub enum TxBufferState {
    NotExist,
    Ready,
    InProgress,
    AbortInProgress,
    TxOk,
    Failed,
    Aborted,
    Empty,
    Unknown(u8),
}

impl TxBufferState {
    pub const fn from_bits(bits: u32) -> Self {
        match bits {
            0b0000 => Self::NotExist,
            0b0001 => Self::Ready,
            0b0010 => Self::InProgress,
            0b0011 => Self::AbortInProgress,
            0b0100 => Self::TxOk,
            0b0110 => Self::Failed,
            0b0111 => Self::Aborted,
            0b1000 => Self::Empty,
            other => Self::Unknown(other as u8),
        }
    }

    /// Whether a new frame may be mounted.
    pub const fn is_free(self) -> bool {
        matches!(self, Self::Empty | Self::TxOk | Self::Failed | Self::Aborted)
    }
}

//==================================================================================TX
impl<R: RegisterBlock, M: RawMutex> Controller<R, M> {
    /// Number of TXT buffers the core was built with.
    pub fn tx_buffer_count(&self) -> u8 {
        self.regs.read_field(Reg::TX_COMMAND, fields::TXT_BUFFER_COUNT) as u8
    }

    fn check_slot(&self, slot: u8) -> Result<(), TwaiError> {
        let available = self.tx_buffer_count();
        if slot >= available {
            return Err(TwaiError::NoSuchTxBuffer { slot, available });
        }
        Ok(())
    }

    fn ensure_can_transmit(&self) -> Result<(), TwaiError> {
        if self.lifecycle != Lifecycle::Enabled(RunState::Running) {
            return Err(TwaiError::InvalidState { operation: "transmit" });
        }
        match self.error_state() {
            ErrorState::BusOff | ErrorState::Recovering => Err(TwaiError::BusOff),
            _ => Ok(()),
        }
    }

    fn tx_command(&self, command: Field, slot: u8) {
        self.regs
            .write(Reg::TX_COMMAND, command.place(1) | fields::tx_command_buffer(slot).place(1));
    }

    /// Copy `frame` into TXT buffer `slot` and mark it ready.
    pub fn mount_and_transmit(&self, frame: &TwaiFrame, slot: u8) -> Result<(), TwaiError> {
        self.mount(&frame.encode(), slot)
    }

    /// Same as [`mount_and_transmit`](Self::mount_and_transmit) from a header and a payload.
    pub fn transmit_raw(&self, header: &FrameHeader, payload: &[u8], slot: u8) -> Result<(), TwaiError> {
        self.mount(&frame::encode(header, payload), slot)
    }

    fn mount(&self, hw: &HwFrame, slot: u8) -> Result<(), TwaiError> {
        self.ensure_can_transmit()?;
        self.check_slot(slot)?;

        for (word, value) in hw.used_words().iter().enumerate() {
            self.regs.write(Reg::txt_buffer(slot, word), *value);
        }
        self.tx_command(fields::TX_COMMAND_TXCR, slot);

        #[cfg(feature = "defmt")]
        defmt::trace!("TXT buffer {} ready, {} words", slot, hw.word_count());
        Ok(())
    }

    pub fn tx_buffer_state(&self, slot: u8) -> Result<TxBufferState, TwaiError> {
        self.check_slot(slot)?;
        Ok(TxBufferState::from_bits(
            self.regs.read_field(Reg::TX_STATUS, fields::tx_status(slot)),
        ))
    }

    /// Request the abort of a pending transmission in `slot`.
    pub fn abort_transmit(&self, slot: u8) -> Result<(), TwaiError> {
        self.check_slot(slot)?;
        self.tx_command(fields::TX_COMMAND_TXCA, slot);

        #[cfg(feature = "defmt")]
        defmt::debug!("TXT buffer {} abort requested", slot);
        Ok(())
    }

    /// Priority of `slot` among ready buffers, 0..=7, higher goes first.
    pub fn set_tx_priority(&self, slot: u8, priority: u8) -> Result<(), TwaiError> {
        self.check_slot(slot)?;
        let field = fields::tx_priority(slot);
        if !field.fits(priority as u32) {
            return Err(TwaiError::TxPriorityOutOfRange {
                priority,
                max: field.max() as u8,
            });
        }
        self.regs.write_field(Reg::TX_PRIORITY, field, priority as u32);
        Ok(())
    }

    /// First buffer a new frame may be mounted into.
    pub fn free_tx_buffer(&self) -> Option<u8> {
        (0..self.tx_buffer_count()).find(|slot| {
            TxBufferState::from_bits(self.regs.read_field(Reg::TX_STATUS, fields::tx_status(*slot)))
                .is_free()
        })
    }

    //==============================================================================RX
    /// Frames waiting in the RX FIFO.
    pub fn rx_pending_count(&self) -> u32 {
        self.regs.read_field(Reg::RX_STATUS, fields::RX_FRAME_COUNT)
    }

    /// Pop the FIFO head into `dest`; `None` when the FIFO is empty.
    ///
    /// RBNEI is cleared once the whole frame has been read, never before, so
    /// a frame arriving meanwhile raises it again.
    pub fn pop_rx_frame(&self, dest: &mut [u8]) -> Option<(FrameHeader, usize)> {
        let hw = self.read_rx_frame()?;
        let (mut header, len) = frame::decode(&hw, dest);
        header.timestamp = self.snapshot().timestamp(hw.timestamp_low());
        Some((header, len))
    }

    /// Pop the FIFO head as an owned frame.
    pub fn pop_frame(&self) -> Option<TwaiFrame> {
        let hw = self.read_rx_frame()?;
        let mut frame = TwaiFrame::decode(&hw);
        frame.set_timestamp(self.snapshot().timestamp(hw.timestamp_low()));
        Some(frame)
    }

    fn read_rx_frame(&self) -> Option<HwFrame> {
        if self.rx_pending_count() == 0 {
            return None;
        }

        let mut hw = HwFrame::new();
        hw.words[0] = self.regs.read(Reg::RX_DATA);
        let following = fields::FRAME_RWCNT.extract(hw.words[0]) as usize;
        for index in 1..=following {
            let word = self.regs.read(Reg::RX_DATA);
            // Words past the image are drained to keep the FIFO aligned.
            if index < HW_FRAME_WORDS {
                hw.words[index] = word;
            }
        }
        self.regs.write(Reg::INT_STAT, int::RBNEI);

        Some(hw)
    }

    /// Drop every frame in the RX FIFO.
    pub fn flush_rx(&self) {
        self.regs.write(Reg::COMMAND, fields::COMMAND_RRB.place(1));
        self.regs.write(Reg::INT_STAT, int::RBNEI);

        #[cfg(feature = "defmt")]
        defmt::debug!("RX buffer released");
    }
}

//==================================================================================EMBEDDED_CAN
impl<R: RegisterBlock, M: RawMutex> embedded_can::nb::Can for Controller<R, M> {
    type Frame = TwaiFrame;
    type Error = TwaiError;

    /// Mount into the first free buffer; `WouldBlock` when all are busy.
    fn transmit(&mut self, frame: &Self::Frame) -> nb::Result<Option<Self::Frame>, Self::Error> {
        self.ensure_can_transmit().map_err(nb::Error::Other)?;
        let slot = self.free_tx_buffer().ok_or(nb::Error::WouldBlock)?;
        self.mount_and_transmit(frame, slot).map_err(nb::Error::Other)?;
        Ok(None)
    }

    fn receive(&mut self) -> nb::Result<Self::Frame, Self::Error> {
        self.pop_frame().ok_or(nb::Error::WouldBlock)
    }
}
