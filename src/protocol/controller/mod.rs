//! Controller context and lifecycle.
//!
//! A [`Controller`] owns one register block from `init` until `deinit` hands
//! it back. Lifecycle changes take `&mut self`; everything the interrupt
//! handler needs (`decode_events`, `pop_rx_frame`, transmit) takes `&self`, so
//! a controller can be shared between task and interrupt context once it is
//! running. State written by the interrupt path lives in [`IsrState`] behind
//! a blocking mutex and is only ever read as a copy.
//!
//! ```text
//!   init ──► Init ──enable──► Enabled(Stopped) ──start──► Enabled(Running)
//!             ▲                     ▲   ◄──────stop───────────┘
//!             └──────disable────────┴──────────────────────────┘
//! ```
use core::cell::Cell;

use embassy_sync::blocking_mutex::{
    raw::{CriticalSectionRawMutex, RawMutex},
    Mutex,
};

use crate::core::{ErrorState, Events};
use crate::error::{BusErrorReason, TwaiError};
use crate::infra::registers::{fields, fields::int, Reg, RegisterBlock};
use crate::protocol::events::{FaultSnapshot, IsrState, StatusSnapshot, DECODED_INTERRUPTS};
use crate::protocol::filter::{
    self, FilterEnables, MaskFilterConfig, MaskFilterSlot, RangeFilterConfig, RangeFilterSlot,
};
use crate::protocol::timing::{self, ResolvedTiming, TimingConfig};

pub mod config;
pub mod txrx;

use config::ControllerConfig;

/// Fault-state reads spent waiting for the core to acknowledge a run-bit change.
pub const ACK_POLL_LIMIT: u32 = 1_000;

//==================================================================================LIFECYCLE
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RunState {
    Stopped,
    Running,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
/// Where a controller stands between `init` and `deinit`.
pub enum Lifecycle {
    /// Configured, clocks off.
    Init,
    /// Clocks on, core stopped or running.
    Enabled(RunState),
}

//==================================================================================CONTROLLER
/// One TWAI-FD controller.
pub struct Controller<R: RegisterBlock, M: RawMutex = CriticalSectionRawMutex> {
    regs: R,
    config: ControllerConfig,
    lifecycle: Lifecycle,
    shared: Mutex<M, Cell<IsrState>>,
}

impl<R: RegisterBlock, M: RawMutex> Controller<R, M> {
    /// Reset the core and apply `config`. The controller is left in [`Lifecycle::Init`].
    pub fn init(regs: R, config: ControllerConfig) -> Result<Self, TwaiError> {
        config.validate()?;

        regs.write(Reg::MODE_SETTINGS, fields::MODE_RST.place(1));
        regs.write(Reg::MODE_SETTINGS, config.mode_word());
        regs.write_field(Reg::EWL_ERP_FAULT_STATE, fields::EW_LIMIT, config.warn_limit as u32);

        if let Some(timer) = config.timer {
            let step = timer.step()?;
            regs.write(
                Reg::TIMER_CFG,
                fields::TIMER_STEP.place(step) | fields::TIMER_UP_DN.place(1),
            );
            regs.write(Reg::TIMER_INT_ENA, fields::TIMER_OVERFLOW.place(1));
        }

        // Only the interrupts the decoder understands reach INT_STAT.
        regs.write(Reg::INT_MASK_SET, int::ALL & !DECODED_INTERRUPTS);
        regs.write(Reg::INT_MASK_CLR, DECODED_INTERRUPTS);
        regs.write(Reg::INT_ENA_CLR, int::ALL & !DECODED_INTERRUPTS);
        regs.write(Reg::INT_ENA_SET, DECODED_INTERRUPTS);

        #[cfg(feature = "defmt")]
        defmt::debug!("Controller initialised: {}", config);

        Ok(Self {
            regs,
            config,
            lifecycle: Lifecycle::Init,
            shared: Mutex::new(Cell::new(IsrState::default())),
        })
    }

    /// Switch the controller clocks on.
    pub fn enable(&mut self) -> Result<(), TwaiError> {
        if self.lifecycle != Lifecycle::Init {
            return Err(TwaiError::InvalidState { operation: "enable" });
        }
        self.regs.write(Reg::TIMER_CLK_EN, fields::TIMER_CLK_EN.place(1));
        if self.config.timer.is_some() {
            self.regs.write_field(Reg::TIMER_CFG, fields::TIMER_CE, 1);
        }
        self.lifecycle = Lifecycle::Enabled(RunState::Stopped);

        #[cfg(feature = "defmt")]
        defmt::debug!("Controller enabled");
        Ok(())
    }

    /// Stop the core and switch the clocks off. Allowed from any state.
    pub fn disable(&mut self) {
        self.regs.write_field(Reg::MODE_SETTINGS, fields::MODE_ENA, 0);
        if self.config.timer.is_some() {
            self.regs.write_field(Reg::TIMER_CFG, fields::TIMER_CE, 0);
        }
        self.regs.write(Reg::TIMER_CLK_EN, 0);
        self.lifecycle = Lifecycle::Init;

        #[cfg(feature = "defmt")]
        defmt::debug!("Controller disabled");
    }

    /// Set the run bit and wait for the core to join the bus.
    ///
    /// The error state restarts from error-active.
    pub fn start(&mut self) -> Result<(), TwaiError> {
        if self.lifecycle != Lifecycle::Enabled(RunState::Stopped) {
            return Err(TwaiError::InvalidState { operation: "start" });
        }
        self.regs.write_field(Reg::MODE_SETTINGS, fields::MODE_ENA, 1);
        self.wait_fault_state(true)?;

        self.shared.lock(|cell| {
            let mut state = cell.get();
            state.error_state = ErrorState::ErrorActive;
            cell.set(state);
        });
        self.lifecycle = Lifecycle::Enabled(RunState::Running);

        #[cfg(feature = "defmt")]
        defmt::debug!("Controller started");
        Ok(())
    }

    /// Clear the run bit and wait for the core to leave the bus.
    pub fn stop(&mut self) -> Result<(), TwaiError> {
        if self.lifecycle != Lifecycle::Enabled(RunState::Running) {
            return Err(TwaiError::InvalidState { operation: "stop" });
        }
        self.regs.write_field(Reg::MODE_SETTINGS, fields::MODE_ENA, 0);
        self.wait_fault_state(false)?;
        self.lifecycle = Lifecycle::Enabled(RunState::Stopped);

        #[cfg(feature = "defmt")]
        defmt::debug!("Controller stopped");
        Ok(())
    }

    /// Start leaving bus-off: reset the error counters and enter `Recovering`.
    ///
    /// Recovery ends on the next fault-state interrupt, with the event of the
    /// state the hardware reports (`ERROR_ACTIVE` on a clean reintegration).
    pub fn start_bus_recovery(&self) -> Result<(), TwaiError> {
        self.shared.lock(|cell| {
            let mut state = cell.get();
            if state.error_state != ErrorState::BusOff {
                return Err(TwaiError::NotBusOff {
                    state: state.error_state,
                });
            }
            self.regs.write(Reg::COMMAND, fields::COMMAND_ERCRST.place(1));
            state.error_state = ErrorState::Recovering;
            cell.set(state);

            #[cfg(feature = "defmt")]
            defmt::debug!("Bus-off recovery requested");
            Ok(())
        })
    }

    /// Clear the traffic counters, switch the core off and hand the registers back.
    pub fn deinit(mut self) -> R {
        self.regs.write(
            Reg::COMMAND,
            fields::COMMAND_RXFCRST.place(1) | fields::COMMAND_TXFCRST.place(1),
        );
        self.disable();

        #[cfg(feature = "defmt")]
        defmt::debug!("Controller released");
        self.regs
    }

    fn wait_fault_state(&self, running: bool) -> Result<(), TwaiError> {
        let flags = fields::FAULT_ERA.mask() | fields::FAULT_ERP.mask() | fields::FAULT_BOF.mask();
        for _ in 0..ACK_POLL_LIMIT {
            let joined = self.regs.read(Reg::EWL_ERP_FAULT_STATE) & flags != 0;
            if joined == running {
                return Ok(());
            }
            core::hint::spin_loop();
        }

        #[cfg(feature = "defmt")]
        defmt::warn!("Run-state change not acknowledged");
        Err(TwaiError::NoAcknowledge)
    }

    //==============================================================================EVENTS
    /// Read and clear pending interrupts and turn them into events.
    ///
    /// Called from the interrupt handler. The timer overflow of the batch is
    /// accounted before anything else, and the fault-confinement state is only
    /// re-read when an FSM-change interrupt fired.
    pub fn decode_events(&self) -> Events {
        let status = StatusSnapshot::capture(&self.regs);
        if status.data_overrun() {
            self.regs.write(Reg::COMMAND, fields::COMMAND_CDO.place(1));
        }
        status.clear(&self.regs);

        let fault = if status.fault_state_changed() {
            Some(FaultSnapshot::read(&self.regs))
        } else {
            None
        };

        self.shared.lock(|cell| {
            let mut state = cell.get();
            let events = state.apply(&status, fault);
            cell.set(state);
            events
        })
    }

    /// Copy of the interrupt-shared state.
    pub fn snapshot(&self) -> IsrState {
        self.shared.lock(Cell::get)
    }

    pub fn error_state(&self) -> ErrorState {
        self.snapshot().error_state
    }

    /// Reason of the most recent `BUS_ERROR` event.
    pub fn latched_error(&self) -> Option<BusErrorReason> {
        self.snapshot().last_error
    }

    //==============================================================================COUNTERS
    /// Transmit error counter.
    pub fn tec(&self) -> u16 {
        self.regs.read_field(Reg::REC_TEC, fields::TEC_VAL) as u16
    }

    /// Receive error counter.
    pub fn rec(&self) -> u16 {
        self.regs.read_field(Reg::REC_TEC, fields::REC_VAL) as u16
    }

    /// Frames received since the last counter reset.
    pub fn rx_frame_count(&self) -> u32 {
        self.regs.read(Reg::RX_FR_CTR)
    }

    /// Frames transmitted since the last counter reset.
    pub fn tx_frame_count(&self) -> u32 {
        self.regs.read(Reg::TX_FR_CTR)
    }

    pub fn set_error_warning_limit(&mut self, limit: u8) {
        self.regs.write_field(Reg::EWL_ERP_FAULT_STATE, fields::EW_LIMIT, limit as u32);
        self.config.warn_limit = limit;
    }

    //==============================================================================CONFIGURATION
    /// Validate and program the nominal bit timing. Refused while running.
    pub fn validate_and_apply(&mut self, cfg: &TimingConfig) -> Result<ResolvedTiming, TwaiError> {
        self.ensure_not_running("validate_and_apply")?;
        Ok(timing::apply_nominal(&self.regs, cfg)?)
    }

    /// Validate and program the FD data-phase timing. Refused while running.
    pub fn validate_and_apply_fd(&mut self, cfg: &TimingConfig) -> Result<ResolvedTiming, TwaiError> {
        self.ensure_not_running("validate_and_apply_fd")?;
        Ok(timing::apply_data(&self.regs, cfg)?)
    }

    pub fn apply_mask_filter(&mut self, slot: MaskFilterSlot, cfg: &MaskFilterConfig) -> FilterEnables {
        filter::apply_mask_filter(&self.regs, slot, cfg)
    }

    pub fn apply_range_filter(&mut self, slot: RangeFilterSlot, cfg: &RangeFilterConfig) -> FilterEnables {
        filter::apply_range_filter(&self.regs, slot, cfg)
    }

    fn ensure_not_running(&self, operation: &'static str) -> Result<(), TwaiError> {
        if self.lifecycle == Lifecycle::Enabled(RunState::Running) {
            return Err(TwaiError::InvalidState { operation });
        }
        Ok(())
    }

    //==============================================================================ACCESSORS
    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    /// Underlying register block.
    pub fn registers(&self) -> &R {
        &self.regs
    }
}
