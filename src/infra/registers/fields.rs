//! Bit positions of the TWAI-FD register fields used by the driver.
//! Grouped by register; field names follow the register map.
use super::Field;

//==================================================================================MODE_SETTINGS
/// Soft reset, self-clearing.
pub const MODE_RST: Field = Field::bit(0);
/// Bus monitoring (listen-only).
pub const MODE_BMM: Field = Field::bit(1);
/// Self-test: transmission succeeds without a dominant acknowledge.
pub const MODE_STM: Field = Field::bit(2);
/// Acceptance filters gate the RX buffer.
pub const MODE_AFM: Field = Field::bit(3);
/// CAN-FD frames recognised.
pub const MODE_FDE: Field = Field::bit(4);
/// RX buffer automatic mode: every RX_DATA read advances the read pointer.
pub const MODE_RXBAM: Field = Field::bit(9);
/// Retransmit limit enable.
pub const MODE_RTRLE: Field = Field::bit(16);
/// Retransmit limit threshold.
pub const MODE_RTRTH: Field = Field::new(17, 4);
/// Internal loopback.
pub const MODE_ILBP: Field = Field::bit(21);
/// Core enable (run bit).
pub const MODE_ENA: Field = Field::bit(22);
/// Filters drop remote frames.
pub const MODE_FDRF: Field = Field::bit(26);

//==================================================================================STATUS
pub const STATUS_RXNE: Field = Field::bit(0);
pub const STATUS_DOR: Field = Field::bit(1);
pub const STATUS_TXNF: Field = Field::bit(2);
pub const STATUS_EWL: Field = Field::bit(6);
pub const STATUS_IDLE: Field = Field::bit(7);

//==================================================================================COMMAND
/// Release RX buffer (flush).
pub const COMMAND_RRB: Field = Field::bit(2);
/// Clear data overrun.
pub const COMMAND_CDO: Field = Field::bit(3);
/// Error counters reset, completes bus-off recovery.
pub const COMMAND_ERCRST: Field = Field::bit(4);
/// Clear RX traffic counter.
pub const COMMAND_RXFCRST: Field = Field::bit(5);
/// Clear TX traffic counter.
pub const COMMAND_TXFCRST: Field = Field::bit(6);

//==================================================================================INTERRUPTS
/// Interrupt bit positions, shared by INT_STAT, INT_ENA_* and INT_MASK_*.
pub mod int {
    /// Frame received.
    pub const RXI: u32 = 1 << 0;
    /// Frame transmitted.
    pub const TXI: u32 = 1 << 1;
    /// Error warning limit crossed.
    pub const EWLI: u32 = 1 << 2;
    /// Data overrun.
    pub const DOI: u32 = 1 << 3;
    /// Fault confinement state changed.
    pub const FCSI: u32 = 1 << 4;
    /// Arbitration lost.
    pub const ALI: u32 = 1 << 5;
    /// Bus error.
    pub const BEI: u32 = 1 << 6;
    /// Overload frame.
    pub const OFI: u32 = 1 << 7;
    /// RX buffer full.
    pub const RXFI: u32 = 1 << 8;
    /// Bit rate shifted.
    pub const BSI: u32 = 1 << 9;
    /// RX buffer not empty.
    pub const RBNEI: u32 = 1 << 10;
    /// TXT buffer hardware command (TX OK, failed or aborted).
    pub const TXBHCI: u32 = 1 << 11;
    /// Every interrupt source of the block.
    pub const ALL: u32 = (1 << 12) - 1;
}

//==================================================================================BIT_TIMING
pub const BTR_PROP: Field = Field::new(0, 7);
pub const BTR_PH1: Field = Field::new(7, 6);
pub const BTR_PH2: Field = Field::new(13, 6);
pub const BTR_BRP: Field = Field::new(19, 8);
pub const BTR_SJW: Field = Field::new(27, 5);

pub const BTR_FD_PROP: Field = Field::new(0, 6);
pub const BTR_FD_PH1: Field = Field::new(7, 5);
pub const BTR_FD_PH2: Field = Field::new(13, 5);
pub const BTR_FD_BRP: Field = Field::new(19, 8);
pub const BTR_FD_SJW: Field = Field::new(27, 5);

/// Measured transmitter delay (read-only).
pub const TRV_DELAY_VALUE: Field = Field::new(0, 7);
/// Secondary sample point offset in clock cycles.
pub const SSP_OFFSET: Field = Field::new(16, 8);
/// Secondary sample point source.
pub const SSP_SRC: Field = Field::new(24, 2);
/// SSP = measured transmitter delay + offset.
pub const SSP_SRC_MEAS_N_OFFSET: u32 = 0b00;
/// No secondary sample point.
pub const SSP_SRC_NO_SSP: u32 = 0b01;
/// SSP = offset only.
pub const SSP_SRC_OFFSET: u32 = 0b10;

//==================================================================================FAULT_CONFINEMENT
pub const EW_LIMIT: Field = Field::new(0, 8);
pub const ERP_LIMIT: Field = Field::new(8, 8);
pub const FAULT_ERA: Field = Field::bit(16);
pub const FAULT_ERP: Field = Field::bit(17);
pub const FAULT_BOF: Field = Field::bit(18);

pub const REC_VAL: Field = Field::new(0, 9);
pub const TEC_VAL: Field = Field::new(16, 9);

//==================================================================================ERROR_CAPTURE
pub const ERR_POS: Field = Field::new(0, 5);
pub const ERR_TYPE: Field = Field::new(5, 3);
pub const RETR_CTR: Field = Field::new(8, 4);
pub const ALC_BIT: Field = Field::new(16, 5);
pub const ALC_ID_FIELD: Field = Field::new(21, 3);

//==================================================================================FILTERS
/// Identifier bits compared by the mask filters and range filter.
pub const FILTER_BITS: Field = Field::new(0, 29);
/// Per-filter enables in FILTER_CONTROL: classic/base, classic/ext, FD/base, FD/ext.
pub const FILTER_A_ENABLES: Field = Field::new(0, 4);
pub const FILTER_B_ENABLES: Field = Field::new(4, 4);
pub const FILTER_C_ENABLES: Field = Field::new(8, 4);
pub const FILTER_RANGE_ENABLES: Field = Field::new(12, 4);

//==================================================================================RX
pub const RX_EMPTY: Field = Field::bit(0);
pub const RX_FULL: Field = Field::bit(1);
pub const RX_MIDDLE_OF_FRAME: Field = Field::bit(2);
pub const RX_FRAME_COUNT: Field = Field::new(4, 11);

//==================================================================================TX
/// Set TXT buffer empty.
pub const TX_COMMAND_TXCE: Field = Field::bit(0);
/// Set TXT buffer ready.
pub const TX_COMMAND_TXCR: Field = Field::bit(1);
/// Abort transmission.
pub const TX_COMMAND_TXCA: Field = Field::bit(2);
/// Number of TXT buffers present in the core.
pub const TXT_BUFFER_COUNT: Field = Field::new(16, 4);

/// Buffer selector bit of `slot` in TX_COMMAND.
pub const fn tx_command_buffer(slot: u8) -> Field {
    Field::bit(8 + slot)
}

/// State nibble of `slot` in TX_STATUS.
pub const fn tx_status(slot: u8) -> Field {
    Field::new(4 * slot, 4)
}

/// Priority of `slot` in TX_PRIORITY.
pub const fn tx_priority(slot: u8) -> Field {
    Field::new(4 * slot, 3)
}

//==================================================================================TIMER
pub const TIMER_CLK_EN: Field = Field::bit(0);
pub const TIMER_OVERFLOW: Field = Field::bit(0);
pub const TIMER_CE: Field = Field::bit(0);
pub const TIMER_CLR: Field = Field::bit(1);
pub const TIMER_SET: Field = Field::bit(2);
pub const TIMER_UP_DN: Field = Field::bit(8);
/// Count step minus one.
pub const TIMER_STEP: Field = Field::new(16, 16);

//==================================================================================FRAME_IMAGE
// Fields of the frame image words (TXT buffers and RX_DATA stream).
pub const FRAME_DLC: Field = Field::new(0, 4);
pub const FRAME_RTR: Field = Field::bit(5);
pub const FRAME_IDE: Field = Field::bit(6);
pub const FRAME_FDF: Field = Field::bit(7);
pub const FRAME_BRS: Field = Field::bit(9);
pub const FRAME_ESI: Field = Field::bit(10);
/// Words following the format word.
pub const FRAME_RWCNT: Field = Field::new(11, 5);

pub const IDENTIFIER_EXT: Field = Field::new(0, 18);
pub const IDENTIFIER_BASE: Field = Field::new(18, 11);
