//! Acceptance filter engine.
//!
//! The controller has three mask filters (A, B, C) and one range filter. Each
//! filter owns four enable bits gating classic/FD and standard/extended
//! traffic independently, so a single filter can accept both formats or be
//! restricted to one. A frame is stored when any enabled filter matches.
use crate::infra::registers::{fields, Field, Reg, RegisterBlock};

/// Mask/ID value meaning "accept nothing" for a mask filter.
pub const ALL_ONES: u32 = u32::MAX;

//==================================================================================CONFIG
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
/// Mask filter: a frame matches when `(frame_id ^ id) & mask == 0`.
///
/// `id == 0 && mask == 0` accepts everything and `id == mask == ALL_ONES`
/// accepts nothing, whatever the other flags say.
pub struct MaskFilterConfig {
    pub id: u32,
    pub mask: u32,
    /// Filter applies to extended (29-bit) identifiers.
    pub is_ext: bool,
    /// Do not accept classic frames.
    pub no_classic: bool,
    /// Do not accept FD frames.
    pub no_fd: bool,
}

impl MaskFilterConfig {
    /// Filter accepting every frame.
    pub const fn accept_all() -> Self {
        Self {
            id: 0,
            mask: 0,
            is_ext: false,
            no_classic: false,
            no_fd: false,
        }
    }

    /// Filter accepting no frame.
    pub const fn accept_none() -> Self {
        Self {
            id: ALL_ONES,
            mask: ALL_ONES,
            is_ext: false,
            no_classic: false,
            no_fd: false,
        }
    }

    pub const fn is_full_open(&self) -> bool {
        self.id == 0 && self.mask == 0
    }

    pub const fn is_full_close(&self) -> bool {
        self.id == ALL_ONES && self.mask == ALL_ONES
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
/// Range filter: a frame matches when `range_low <= frame_id <= range_high`.
pub struct RangeFilterConfig {
    pub range_low: u32,
    pub range_high: u32,
    pub is_ext: bool,
    pub no_classic: bool,
    pub no_fd: bool,
}

//==================================================================================SLOTS
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
/// Hardware mask filter.
pub enum MaskFilterSlot {
    A,
    B,
    C,
}

impl MaskFilterSlot {
    pub const ALL: [MaskFilterSlot; 3] = [Self::A, Self::B, Self::C];

    const fn registers(self) -> (Reg, Reg, Field) {
        match self {
            Self::A => (Reg::FILTER_A_MASK, Reg::FILTER_A_VAL, fields::FILTER_A_ENABLES),
            Self::B => (Reg::FILTER_B_MASK, Reg::FILTER_B_VAL, fields::FILTER_B_ENABLES),
            Self::C => (Reg::FILTER_C_MASK, Reg::FILTER_C_VAL, fields::FILTER_C_ENABLES),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
/// Hardware range filter; the controller has one.
pub enum RangeFilterSlot {
    R0,
}

//==================================================================================ENABLES
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
/// The four acceptance enables of one filter.
pub struct FilterEnables {
    pub classic_std: bool,
    pub classic_ext: bool,
    pub fd_std: bool,
    pub fd_ext: bool,
}

impl FilterEnables {
    /// Enables of a mask filter, special cases first.
    pub const fn for_mask(cfg: &MaskFilterConfig) -> Self {
        let open = cfg.is_full_open();
        let gate = !cfg.is_full_close();
        Self {
            classic_std: open || (gate && !cfg.is_ext && !cfg.no_classic),
            classic_ext: open || (gate && cfg.is_ext && !cfg.no_classic),
            fd_std: open || (gate && !cfg.is_ext && !cfg.no_fd),
            fd_ext: open || (gate && cfg.is_ext && !cfg.no_fd),
        }
    }

    /// Enables of a range filter; no special cases.
    pub const fn for_range(cfg: &RangeFilterConfig) -> Self {
        Self {
            classic_std: !cfg.is_ext && !cfg.no_classic,
            classic_ext: cfg.is_ext && !cfg.no_classic,
            fd_std: !cfg.is_ext && !cfg.no_fd,
            fd_ext: cfg.is_ext && !cfg.no_fd,
        }
    }

    /// Nibble order in FILTER_CONTROL: classic/base, classic/ext, FD/base, FD/ext.
    pub const fn bits(&self) -> u32 {
        (self.classic_std as u32)
            | (self.classic_ext as u32) << 1
            | (self.fd_std as u32) << 2
            | (self.fd_ext as u32) << 3
    }

    pub const fn from_bits(bits: u32) -> Self {
        Self {
            classic_std: bits & 0b0001 != 0,
            classic_ext: bits & 0b0010 != 0,
            fd_std: bits & 0b0100 != 0,
            fd_ext: bits & 0b1000 != 0,
        }
    }

    /// Whether any traffic can pass.
    pub const fn any(&self) -> bool {
        self.bits() != 0
    }
}

/// Identifier or mask in the IDENTIFIER word layout used by the filter registers.
pub const fn filter_word(value: u32, is_ext: bool) -> u32 {
    if is_ext {
        fields::FILTER_BITS.place(value)
    } else {
        fields::IDENTIFIER_BASE.place(value)
    }
}

//==================================================================================APPLY
/// Program mask filter `slot`.
pub fn apply_mask_filter<R: RegisterBlock>(regs: &R, slot: MaskFilterSlot, cfg: &MaskFilterConfig) -> FilterEnables {
    let enables = FilterEnables::for_mask(cfg);
    let (mask_reg, val_reg, enable_field) = slot.registers();

    regs.write(mask_reg, filter_word(cfg.mask, cfg.is_ext));
    regs.write(val_reg, filter_word(cfg.id, cfg.is_ext));
    regs.write_field(Reg::FILTER_CONTROL, enable_field, enables.bits());

    #[cfg(feature = "defmt")]
    defmt::debug!("Mask filter {} programmed: {}", slot, enables);

    enables
}

/// Program range filter `slot`.
pub fn apply_range_filter<R: RegisterBlock>(
    regs: &R,
    slot: RangeFilterSlot,
    cfg: &RangeFilterConfig,
) -> FilterEnables {
    let RangeFilterSlot::R0 = slot;
    let enables = FilterEnables::for_range(cfg);

    regs.write(Reg::FILTER_RAN_LOW, filter_word(cfg.range_low, cfg.is_ext));
    regs.write(Reg::FILTER_RAN_HIGH, filter_word(cfg.range_high, cfg.is_ext));
    regs.write_field(Reg::FILTER_CONTROL, fields::FILTER_RANGE_ENABLES, enables.bits());

    #[cfg(feature = "defmt")]
    defmt::debug!("Range filter {} programmed: {}", slot, enables);

    enables
}

/// Enables currently programmed for mask filter `slot`.
pub fn mask_filter_enables<R: RegisterBlock>(regs: &R, slot: MaskFilterSlot) -> FilterEnables {
    let (_, _, enable_field) = slot.registers();
    FilterEnables::from_bits(regs.read_field(Reg::FILTER_CONTROL, enable_field))
}
