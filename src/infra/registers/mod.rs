//! Typed access to the TWAI-FD register block.
//!
//! Registers are addressed by their byte offset ([`Reg`]) and bit fields are
//! described by [`Field`] (shift + width), so every access names the field it
//! touches instead of casting a packed struct onto raw memory. The controller
//! logic only depends on the [`RegisterBlock`] trait; [`MmioRegisters`] is the
//! volatile implementation used on the target.
use core::ptr;

pub mod fields;

//==================================================================================REG
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
/// Byte offset of a 32-bit register inside the controller block.
pub struct Reg(pub u32);

/// Offset of the first TXT buffer window; buffer `n` lives at `(n + 1) * TXT_BUFFER_STRIDE`.
pub const TXT_BUFFER_STRIDE: u32 = 0x100;

impl Reg {
    pub const DEVICE_ID_VERSION: Reg = Reg(0x00);
    pub const MODE_SETTINGS: Reg = Reg(0x04);
    pub const STATUS: Reg = Reg(0x08);
    pub const COMMAND: Reg = Reg(0x0C);
    pub const INT_STAT: Reg = Reg(0x10);
    pub const INT_ENA_SET: Reg = Reg(0x14);
    pub const INT_ENA_CLR: Reg = Reg(0x18);
    pub const INT_MASK_SET: Reg = Reg(0x1C);
    pub const INT_MASK_CLR: Reg = Reg(0x20);
    pub const BTR: Reg = Reg(0x24);
    pub const BTR_FD: Reg = Reg(0x28);
    pub const EWL_ERP_FAULT_STATE: Reg = Reg(0x2C);
    pub const REC_TEC: Reg = Reg(0x30);
    pub const FILTER_A_MASK: Reg = Reg(0x3C);
    pub const FILTER_A_VAL: Reg = Reg(0x40);
    pub const FILTER_B_MASK: Reg = Reg(0x44);
    pub const FILTER_B_VAL: Reg = Reg(0x48);
    pub const FILTER_C_MASK: Reg = Reg(0x4C);
    pub const FILTER_C_VAL: Reg = Reg(0x50);
    pub const FILTER_RAN_LOW: Reg = Reg(0x54);
    pub const FILTER_RAN_HIGH: Reg = Reg(0x58);
    pub const FILTER_CONTROL: Reg = Reg(0x5C);
    pub const RX_MEM_INFO: Reg = Reg(0x60);
    pub const RX_POINTERS: Reg = Reg(0x64);
    pub const RX_STATUS: Reg = Reg(0x68);
    pub const RX_DATA: Reg = Reg(0x6C);
    pub const TX_STATUS: Reg = Reg(0x70);
    pub const TX_COMMAND: Reg = Reg(0x74);
    pub const TX_PRIORITY: Reg = Reg(0x78);
    pub const ERR_CAPT: Reg = Reg(0x7C);
    pub const TRV_DELAY_SSP_CFG: Reg = Reg(0x80);
    pub const RX_FR_CTR: Reg = Reg(0x84);
    pub const TX_FR_CTR: Reg = Reg(0x88);
    pub const TIMESTAMP_LOW: Reg = Reg(0x94);
    pub const TIMESTAMP_HIGH: Reg = Reg(0x98);
    pub const TIMER_CLK_EN: Reg = Reg(0xFD4);
    pub const TIMER_INT_RAW: Reg = Reg(0xFD8);
    pub const TIMER_INT_ST: Reg = Reg(0xFDC);
    pub const TIMER_INT_ENA: Reg = Reg(0xFE0);
    pub const TIMER_INT_CLR: Reg = Reg(0xFE4);
    pub const TIMER_CFG: Reg = Reg(0xFE8);
    pub const TIMER_LD_VAL_L: Reg = Reg(0xFEC);
    pub const TIMER_LD_VAL_H: Reg = Reg(0xFF0);
    pub const TIMER_CT_VAL_L: Reg = Reg(0xFF4);
    pub const TIMER_CT_VAL_H: Reg = Reg(0xFF8);

    /// Word `word` of TXT buffer `slot`.
    pub const fn txt_buffer(slot: u8, word: usize) -> Reg {
        Reg((slot as u32 + 1) * TXT_BUFFER_STRIDE + 4 * word as u32)
    }

    /// Byte offset from the block base.
    #[inline]
    pub const fn offset(self) -> u32 {
        self.0
    }
}

//==================================================================================FIELD
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
/// Bit field inside a 32-bit word, `width` bits starting at `shift`.
pub struct Field {
    pub shift: u8,
    pub width: u8,
}

impl Field {
    pub const fn new(shift: u8, width: u8) -> Self {
        Self { shift, width }
    }

    /// Single-bit field at `shift`.
    pub const fn bit(shift: u8) -> Self {
        Self { shift, width: 1 }
    }

    /// Largest value the field can hold.
    #[inline]
    pub const fn max(self) -> u32 {
        if self.width >= 32 {
            u32::MAX
        } else {
            (1u32 << self.width) - 1
        }
    }

    /// Field bits in place.
    #[inline]
    pub const fn mask(self) -> u32 {
        self.max() << self.shift
    }

    /// Read the field out of `word`.
    #[inline]
    pub const fn extract(self, word: u32) -> u32 {
        (word & self.mask()) >> self.shift
    }

    /// Replace the field in `word`; bits of `value` beyond the width are dropped.
    #[inline]
    pub const fn insert(self, word: u32, value: u32) -> u32 {
        (word & !self.mask()) | ((value & self.max()) << self.shift)
    }

    /// `value` placed at the field position in an otherwise zero word.
    #[inline]
    pub const fn place(self, value: u32) -> u32 {
        self.insert(0, value)
    }

    /// Whether `value` fits without truncation.
    #[inline]
    pub const fn fits(self, value: u32) -> bool {
        value <= self.max()
    }
}

//==================================================================================REGISTER_BLOCK
/// Access to one controller's registers.
///
/// Implementations perform a single 32-bit access per call. Reads may have
/// side effects (the RX data window advances on every read), so callers never
/// read a register speculatively.
pub trait RegisterBlock {
    /// Read the full register.
    fn read(&self, reg: Reg) -> u32;

    /// Write the full register.
    fn write(&self, reg: Reg, value: u32);

    /// Read-modify-write. Never use on write-1-to-clear or command registers.
    #[inline]
    fn modify<F: FnOnce(u32) -> u32>(&self, reg: Reg, f: F) {
        let current = self.read(reg);
        self.write(reg, f(current));
    }

    /// Read a single field.
    #[inline]
    fn read_field(&self, reg: Reg, field: Field) -> u32 {
        field.extract(self.read(reg))
    }

    /// Update a single field, preserving the rest of the register.
    #[inline]
    fn write_field(&self, reg: Reg, field: Field, value: u32) {
        self.modify(reg, |word| field.insert(word, value));
    }

    /// Whether a single-bit field is set.
    #[inline]
    fn is_set(&self, reg: Reg, field: Field) -> bool {
        self.read_field(reg, field) != 0
    }
}

impl<T: RegisterBlock + ?Sized> RegisterBlock for &T {
    #[inline]
    fn read(&self, reg: Reg) -> u32 {
        (**self).read(reg)
    }

    #[inline]
    fn write(&self, reg: Reg, value: u32) {
        (**self).write(reg, value)
    }
}

//==================================================================================MMIO
/// Volatile access to a register block mapped at a fixed address.
#[derive(Debug)]
pub struct MmioRegisters {
    base: usize,
}

// The block is owned by exactly one `MmioRegisters`, see `new`.
unsafe impl Send for MmioRegisters {}
unsafe impl Sync for MmioRegisters {}

impl MmioRegisters {
    /// Wrap the register block starting at `base`.
    ///
    /// # Safety
    ///
    /// `base` must be the address of a TWAI-FD register block, valid for
    /// 32-bit volatile reads and writes over its whole window, and no other
    /// `MmioRegisters` (or other code) may access the same block while this
    /// value exists.
    pub const unsafe fn new(base: usize) -> Self {
        Self { base }
    }

    /// Base address of the block.
    pub const fn base(&self) -> usize {
        self.base
    }

    #[inline(always)]
    fn ptr(&self, reg: Reg) -> *mut u32 {
        (self.base + reg.offset() as usize) as *mut u32
    }
}

impl RegisterBlock for MmioRegisters {
    #[inline(always)]
    fn read(&self, reg: Reg) -> u32 {
        // SAFETY: `new` guarantees the whole window is a valid register block.
        unsafe { ptr::read_volatile(self.ptr(reg)) }
    }

    #[inline(always)]
    fn write(&self, reg: Reg, value: u32) {
        // SAFETY: see `read`.
        unsafe { ptr::write_volatile(self.ptr(reg), value) }
    }
}
