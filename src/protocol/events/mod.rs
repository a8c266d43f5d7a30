//! Interrupt decoding and the fault-confinement state machine.
//!
//! The decoder works in two halves: [`StatusSnapshot`] / [`FaultSnapshot`]
//! capture what the hardware reported, and [`IsrState::apply`] turns one
//! snapshot into [`Events`] while updating the state shared with task
//! context. Keeping `apply` free of register access lets the ordering rules
//! (timer overflow first, fault classification only on FSM changes) be
//! checked without hardware.
use crate::core::{ErrorState, Events, BUS_OFF_LIMIT, ERROR_PASSIVE_LIMIT};
use crate::error::BusErrorReason;
use crate::infra::registers::{fields, fields::int, Reg, RegisterBlock};

/// Interrupts the decoder turns into events; everything else stays masked.
pub const DECODED_INTERRUPTS: u32 =
    int::TXI | int::EWLI | int::DOI | int::FCSI | int::ALI | int::BEI | int::RXFI | int::RBNEI | int::TXBHCI;

//==================================================================================SNAPSHOTS
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
/// Interrupt status captured at the start of one decode call.
pub struct StatusSnapshot {
    /// INT_STAT as read.
    pub int_stat: u32,
    /// TIMER_INT_ST as read.
    pub timer_stat: u32,
    /// ERR_CAPT error type, only meaningful when BEI is set.
    pub err_type: u32,
}

impl StatusSnapshot {
    /// Read both status registers (and the error capture when a bus error fired).
    pub fn capture<R: RegisterBlock>(regs: &R) -> Self {
        let int_stat = regs.read(Reg::INT_STAT);
        let timer_stat = regs.read(Reg::TIMER_INT_ST);
        let err_type = if int_stat & int::BEI != 0 {
            regs.read_field(Reg::ERR_CAPT, fields::ERR_TYPE)
        } else {
            0
        };
        Self {
            int_stat,
            timer_stat,
            err_type,
        }
    }

    /// Clear exactly what was captured.
    pub fn clear<R: RegisterBlock>(&self, regs: &R) {
        if self.int_stat != 0 {
            regs.write(Reg::INT_STAT, self.int_stat);
        }
        if self.timer_stat != 0 {
            regs.write(Reg::TIMER_INT_CLR, self.timer_stat);
        }
    }

    #[inline]
    pub const fn has(&self, bits: u32) -> bool {
        self.int_stat & bits != 0
    }

    pub const fn timer_overflowed(&self) -> bool {
        fields::TIMER_OVERFLOW.extract(self.timer_stat) != 0
    }

    pub const fn data_overrun(&self) -> bool {
        self.has(int::DOI)
    }

    /// Whether the fault-confinement state must be re-read.
    pub const fn fault_state_changed(&self) -> bool {
        self.has(int::FCSI | int::EWLI)
    }

    /// Bus error reason, by precedence: captured error, overrun, RX full.
    pub const fn bus_error(&self) -> Option<BusErrorReason> {
        if self.has(int::BEI) {
            Some(BusErrorReason::from_capture(self.err_type))
        } else if self.has(int::DOI) {
            Some(BusErrorReason::Overrun)
        } else if self.has(int::RXFI) {
            Some(BusErrorReason::RxFull)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
/// Error counters and fault-state flags.
pub struct FaultSnapshot {
    pub tec: u16,
    pub rec: u16,
    pub warn_limit: u8,
    pub bus_off: bool,
}

impl FaultSnapshot {
    pub fn read<R: RegisterBlock>(regs: &R) -> Self {
        let counters = regs.read(Reg::REC_TEC);
        let fault = regs.read(Reg::EWL_ERP_FAULT_STATE);
        Self {
            tec: fields::TEC_VAL.extract(counters) as u16,
            rec: fields::REC_VAL.extract(counters) as u16,
            warn_limit: fields::EW_LIMIT.extract(fault) as u8,
            bus_off: fields::FAULT_BOF.extract(fault) != 0,
        }
    }

    pub const fn classify(&self) -> ErrorState {
        classify(self.tec, self.rec, self.warn_limit, self.bus_off)
    }
}

//==================================================================================CLASSIFICATION
/// Fault-confinement state implied by the counters.
pub const fn classify(tec: u16, rec: u16, warn_limit: u8, bus_off: bool) -> ErrorState {
    let warn = warn_limit as u16;
    if bus_off || tec >= BUS_OFF_LIMIT {
        ErrorState::BusOff
    } else if tec >= ERROR_PASSIVE_LIMIT || rec >= ERROR_PASSIVE_LIMIT {
        ErrorState::ErrorPassive
    } else if tec >= warn || rec >= warn {
        ErrorState::ErrorWarning
    } else {
        ErrorState::ErrorActive
    }
}

/// State transition for a freshly classified state.
///
/// `BusOff` is only left through `Recovering`. `Recovering` ends with
/// whatever the hardware reports next, bus-off included.
pub const fn next_state(current: ErrorState, classified: ErrorState) -> ErrorState {
    match (current, classified) {
        (ErrorState::BusOff, _) => ErrorState::BusOff,
        (_, classified) => classified,
    }
}

/// 64-bit timestamp from the software overflow count and the 32-bit counter.
#[inline]
pub const fn compose_timestamp(overflows: u32, counter: u32) -> u64 {
    ((overflows as u64) << 32) | counter as u64
}

//==================================================================================ISR_STATE
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
/// State written by the interrupt path and read by task context as a snapshot.
pub struct IsrState {
    /// Timer overflows seen since init; upper half of frame timestamps.
    pub timer_overflow_cnt: u32,
    /// Reason of the most recent `BUS_ERROR` event.
    pub last_error: Option<BusErrorReason>,
    pub error_state: ErrorState,
}

impl IsrState {
    /// Fold one captured interrupt batch into the state and return its events.
    ///
    /// `fault` is only consulted when the snapshot reports a fault-state change.
    pub fn apply(&mut self, status: &StatusSnapshot, fault: Option<FaultSnapshot>) -> Events {
        let mut events = Events::empty();

        // Before anything that may read a timestamp.
        if status.timer_overflowed() {
            self.timer_overflow_cnt = self.timer_overflow_cnt.wrapping_add(1);
        }

        if status.has(int::TXBHCI) {
            events |= Events::TX_BUFFER_FREE;
        }
        if status.has(int::TXI) {
            events |= Events::TX_SUCCESS;
        }
        if status.has(int::RBNEI) {
            events |= Events::RX_FRAME_AVAILABLE;
        }
        if status.has(int::ALI) {
            events |= Events::ARBITRATION_LOST;
        }
        if let Some(reason) = status.bus_error() {
            self.last_error = Some(reason);
            events |= Events::BUS_ERROR;

            #[cfg(feature = "defmt")]
            defmt::debug!("Bus error latched: {}", reason);
        }

        if status.fault_state_changed() {
            if let Some(fault) = fault {
                events |= self.transition(fault.classify());
            }
        }

        events
    }

    /// Run the state machine; returns the event of the entered state, if any.
    pub fn transition(&mut self, classified: ErrorState) -> Events {
        let next = next_state(self.error_state, classified);
        if next == self.error_state {
            return Events::empty();
        }

        #[cfg(feature = "defmt")]
        defmt::debug!("Error state {} -> {}", self.error_state, next);

        self.error_state = next;
        Events::for_state(next)
    }

    /// Timestamp of a frame whose low counter word is `counter`.
    pub const fn timestamp(&self, counter: u32) -> u64 {
        compose_timestamp(self.timer_overflow_cnt, counter)
    }
}
