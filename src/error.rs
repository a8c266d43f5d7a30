//! Error definitions shared across library modules.
//! Configuration problems are returned synchronously; bus conditions are
//! never errors, they are latched as a [`BusErrorReason`] by the event decoder.
use embedded_can::ErrorKind;
use thiserror_no_std::Error;

use crate::core::ErrorState;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
/// Bit-timing parameters that cannot be represented by the hardware.
pub enum TimingError {
    /// Effective prescaler is zero or wider than the BRP field.
    #[error("Prescaler {brp} cannot be represented (allowed 1..={max})")]
    PrescalerOutOfRange { brp: u32, max: u32 },
    /// A quanta count does not fit its register field.
    #[error("Segment {segment} = {value} outside 1..={max}")]
    SegmentOutOfRange {
        segment: &'static str,
        value: u32,
        max: u32,
    },
    /// `ssp_offset * brp` does not fit the SSP offset field.
    #[error("Secondary sample point at {cycles} clock cycles exceeds {max}")]
    SspOffsetOutOfRange { cycles: u32, max: u32 },
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
/// Errors returned by controller operations.
pub enum TwaiError {
    /// Bit-timing configuration rejected before touching the hardware.
    #[error("Invalid timing: {0}")]
    InvalidTiming(#[from] TimingError),
    /// Operation not allowed in the current lifecycle state.
    #[error("Operation {operation} not allowed in the current lifecycle state")]
    InvalidState { operation: &'static str },
    /// Recovery requested while the controller is not bus-off.
    #[error("Bus recovery requires bus-off, controller is {state:?}")]
    NotBusOff { state: ErrorState },
    /// Transmission refused: controller is bus-off or recovering.
    #[error("Controller is bus-off")]
    BusOff,
    /// Hardware did not report the expected fault-confinement state in time.
    #[error("Hardware did not acknowledge the run-state change")]
    NoAcknowledge,
    /// TX buffer index beyond the buffer count reported by the hardware.
    #[error("TX buffer {slot} does not exist ({available} available)")]
    NoSuchTxBuffer { slot: u8, available: u8 },
    /// Retransmit limit wider than the hardware threshold field.
    #[error("Retransmit limit {limit} exceeds {max}")]
    RetransmitLimitOutOfRange { limit: u8, max: u8 },
    /// TX buffer priority wider than its 3-bit field.
    #[error("TX priority {priority} exceeds {max}")]
    TxPriorityOutOfRange { priority: u8, max: u8 },
    /// Timer divisor outside the step field range.
    #[error("Timer divisor {divisor} outside 1..={max}")]
    TimerDivisorOutOfRange { divisor: u32, max: u32 },
}

impl embedded_can::Error for TwaiError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Other
    }
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
/// Reason latched by the event decoder when a `BUS_ERROR` event fires.
pub enum BusErrorReason {
    /// Transmitted bit differs from the monitored bus level.
    #[error("Bit error")]
    Bit,
    /// CRC mismatch on a received frame.
    #[error("CRC error")]
    Crc,
    /// Fixed-form bit field holds an illegal value.
    #[error("Form error")]
    Form,
    /// Transmitted frame was not acknowledged.
    #[error("Acknowledge error")]
    Ack,
    /// Six consecutive bits of the same level.
    #[error("Stuff error")]
    Stuff,
    /// A received frame was dropped because the RX buffer had no room.
    #[error("RX buffer overrun")]
    Overrun,
    /// RX buffer became full.
    #[error("RX buffer full")]
    RxFull,
    /// Error capture reported a code outside the documented set.
    #[error("Unclassified bus error")]
    Other,
}

impl BusErrorReason {
    /// Map the 3-bit error-capture type code.
    pub const fn from_capture(err_type: u32) -> Self {
        match err_type {
            0b000 => Self::Bit,
            0b001 => Self::Crc,
            0b010 => Self::Form,
            0b011 => Self::Ack,
            0b100 => Self::Stuff,
            _ => Self::Other,
        }
    }
}

impl embedded_can::Error for BusErrorReason {
    fn kind(&self) -> ErrorKind {
        match self {
            Self::Bit => ErrorKind::Bit,
            Self::Crc => ErrorKind::Crc,
            Self::Form => ErrorKind::Form,
            Self::Ack => ErrorKind::Acknowledge,
            Self::Stuff => ErrorKind::Stuff,
            Self::Overrun | Self::RxFull => ErrorKind::Overrun,
            Self::Other => ErrorKind::Other,
        }
    }
}
