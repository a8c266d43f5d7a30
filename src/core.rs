//! Plain data types and constants shared between the register layer and
//! the controller logic.

use bitflags::bitflags;

/// Maximum payload of a classic CAN frame.
pub const MAX_CLASSIC_LEN: usize = 8;
/// Maximum payload of a CAN-FD frame.
pub const MAX_FD_LEN: usize = 64;
/// Words in one hardware frame image: format, identifier, two timestamp words, 16 data words.
pub const HW_FRAME_WORDS: usize = 20;
/// Words preceding the data region of a hardware frame image.
pub const HW_HEADER_WORDS: usize = 4;
/// Largest 11-bit identifier.
pub const MAX_STANDARD_ID: u32 = 0x7FF;
/// Largest 29-bit identifier.
pub const MAX_EXTENDED_ID: u32 = 0x1FFF_FFFF;
/// Counter value at which the controller becomes error-passive.
pub const ERROR_PASSIVE_LIMIT: u16 = 128;
/// Counter value at which the controller becomes bus-off.
pub const BUS_OFF_LIMIT: u16 = 256;
/// Default error-warning limit after reset.
pub const DEFAULT_WARN_LIMIT: u8 = 96;

//==================================================================================CLOCK
/// Clock feeding the controller's bit-timing logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ClockSource {
    /// Main crystal oscillator (40 MHz).
    Xtal,
    /// Internal fast RC oscillator (17.5 MHz nominal).
    RcFast,
    /// Board-provided clock at the given frequency in Hz.
    External(u32),
}

impl ClockSource {
    /// Frequency of the source in Hz.
    pub const fn freq_hz(self) -> u32 {
        match self {
            Self::Xtal => 40_000_000,
            Self::RcFast => 17_500_000,
            Self::External(hz) => hz,
        }
    }
}

//==================================================================================ERROR_STATE
/// Fault-confinement state tracked by the event decoder.
///
/// `ErrorActive → ErrorWarning → ErrorPassive → BusOff`, driven by TEC/REC.
/// `BusOff` only leaves through an explicit recovery, which passes through
/// `Recovering` until the next fault-state change reported by the hardware.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ErrorState {
    #[default]
    ErrorActive,
    ErrorWarning,
    ErrorPassive,
    BusOff,
    Recovering,
}

//==================================================================================EVENTS
bitflags! {
    /// Semantic events derived from one interrupt invocation.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Events: u16 {
        const TX_BUFFER_FREE = 1 << 0;
        const TX_SUCCESS = 1 << 1;
        const RX_FRAME_AVAILABLE = 1 << 2;
        const BUS_ERROR = 1 << 3;
        const ARBITRATION_LOST = 1 << 4;
        const ERROR_WARNING = 1 << 5;
        const ERROR_ACTIVE = 1 << 6;
        const ERROR_PASSIVE = 1 << 7;
        const BUS_OFF = 1 << 8;
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Events {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "Events({=u16:#x})", self.bits())
    }
}

impl Events {
    /// Event announcing entry into `state`, if the state has one.
    pub const fn for_state(state: ErrorState) -> Self {
        match state {
            ErrorState::ErrorActive => Self::ERROR_ACTIVE,
            ErrorState::ErrorWarning => Self::ERROR_WARNING,
            ErrorState::ErrorPassive => Self::ERROR_PASSIVE,
            ErrorState::BusOff => Self::BUS_OFF,
            ErrorState::Recovering => Self::empty(),
        }
    }
}
