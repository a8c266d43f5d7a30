//! Static controller configuration consumed by [`Controller::init`](super::Controller::init).
use crate::core::DEFAULT_WARN_LIMIT;
use crate::error::TwaiError;
use crate::infra::registers::fields;

/// Periodic timestamp timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TimerConfig {
    /// Source clock cycles per timer tick, at least 1.
    pub divisor: u32,
}

impl TimerConfig {
    pub const fn new(divisor: u32) -> Self {
        Self { divisor }
    }

    /// Step value programmed into the timer (divisor - 1).
    pub fn step(&self) -> Result<u32, TwaiError> {
        let max = fields::TIMER_STEP.max() + 1;
        if self.divisor == 0 || self.divisor > max {
            return Err(TwaiError::TimerDivisorOutOfRange {
                divisor: self.divisor,
                max,
            });
        }
        Ok(self.divisor - 1)
    }
}

//==================================================================================CONTROLLER_CONFIG
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
/// Mode flags and limits applied once at init.
pub struct ControllerConfig {
    /// Bus monitoring: receive only, never drive the bus.
    pub listen_only: bool,
    /// Transmissions succeed without an acknowledge.
    pub self_test: bool,
    /// Transmitted frames are received back.
    pub loopback: bool,
    /// Remote frames are dropped by the acceptance filters.
    pub drop_rtr: bool,
    /// Retransmissions after a failed attempt; `None` retries forever.
    pub retransmit_limit: Option<u8>,
    /// Recognise CAN-FD frames.
    pub enable_fd: bool,
    /// Error-warning limit for TEC/REC.
    pub warn_limit: u8,
    /// Timestamp timer; `None` leaves it unconfigured.
    pub timer: Option<TimerConfig>,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            listen_only: false,
            self_test: false,
            loopback: false,
            drop_rtr: false,
            retransmit_limit: None,
            enable_fd: true,
            warn_limit: DEFAULT_WARN_LIMIT,
            timer: None,
        }
    }
}

impl ControllerConfig {
    pub fn with_listen_only(mut self, listen_only: bool) -> Self {
        self.listen_only = listen_only;
        self
    }

    pub fn with_self_test(mut self, self_test: bool) -> Self {
        self.self_test = self_test;
        self
    }

    pub fn with_loopback(mut self, loopback: bool) -> Self {
        self.loopback = loopback;
        self
    }

    pub fn with_drop_rtr(mut self, drop_rtr: bool) -> Self {
        self.drop_rtr = drop_rtr;
        self
    }

    pub fn with_retransmit_limit(mut self, limit: Option<u8>) -> Self {
        self.retransmit_limit = limit;
        self
    }

    pub fn with_fd(mut self, enable_fd: bool) -> Self {
        self.enable_fd = enable_fd;
        self
    }

    pub fn with_warn_limit(mut self, warn_limit: u8) -> Self {
        self.warn_limit = warn_limit;
        self
    }

    pub fn with_timer(mut self, timer: Option<TimerConfig>) -> Self {
        self.timer = timer;
        self
    }

    /// Check the values that do not fit their register fields.
    pub fn validate(&self) -> Result<(), TwaiError> {
        if let Some(limit) = self.retransmit_limit {
            let max = fields::MODE_RTRTH.max() as u8;
            if limit > max {
                return Err(TwaiError::RetransmitLimitOutOfRange { limit, max });
            }
        }
        if let Some(timer) = self.timer {
            timer.step()?;
        }
        Ok(())
    }

    /// MODE_SETTINGS word for this configuration, core disabled.
    pub fn mode_word(&self) -> u32 {
        let mut mode = fields::MODE_AFM.place(1);
        mode = fields::MODE_RXBAM.insert(mode, 1);
        mode = fields::MODE_BMM.insert(mode, self.listen_only as u32);
        mode = fields::MODE_STM.insert(mode, self.self_test as u32);
        mode = fields::MODE_ILBP.insert(mode, self.loopback as u32);
        mode = fields::MODE_FDRF.insert(mode, self.drop_rtr as u32);
        mode = fields::MODE_FDE.insert(mode, self.enable_fd as u32);
        if let Some(limit) = self.retransmit_limit {
            mode = fields::MODE_RTRLE.insert(mode, 1);
            mode = fields::MODE_RTRTH.insert(mode, limit as u32);
        }
        mode
    }
}
