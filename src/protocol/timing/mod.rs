//! Bit-timing configuration for the nominal and FD data phases.
//!
//! A [`TimingConfig`] is first resolved against the hardware limits of the
//! targeted phase into a [`ResolvedTiming`], then written in one go into the
//! phase's timing register. Nothing is written when resolution fails.
use crate::core::ClockSource;
use crate::error::TimingError;
use crate::infra::registers::{fields, Field, Reg, RegisterBlock};

//==================================================================================TIMING_CONFIG
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
/// Bit-timing parameters for one phase, expressed in time quanta.
pub struct TimingConfig {
    /// Clock driving the prescaler.
    pub clk_src: ClockSource,
    /// Explicit prescaler, used when `quanta_resolution_hz` is zero.
    pub brp: u32,
    /// Desired quantum frequency; takes precedence over `brp` when non-zero.
    pub quanta_resolution_hz: u32,
    pub prop_seg: u8,
    pub tseg_1: u8,
    pub tseg_2: u8,
    pub sjw: u8,
    /// Secondary sample point offset in quanta, 0 disables it.
    pub ssp_offset: u8,
}

impl TimingConfig {
    /// Empty configuration on `clk_src`; segments must be set before use.
    pub const fn new(clk_src: ClockSource) -> Self {
        Self {
            clk_src,
            brp: 0,
            quanta_resolution_hz: 0,
            prop_seg: 0,
            tseg_1: 0,
            tseg_2: 0,
            sjw: 0,
            ssp_offset: 0,
        }
    }

    /// Use an explicit prescaler.
    pub const fn with_brp(mut self, brp: u32) -> Self {
        self.brp = brp;
        self
    }

    /// Derive the prescaler from the desired quantum frequency.
    pub const fn with_quanta_resolution(mut self, hz: u32) -> Self {
        self.quanta_resolution_hz = hz;
        self
    }

    /// Set PROP_SEG, TSEG1, TSEG2 and SJW.
    pub const fn with_segments(mut self, prop_seg: u8, tseg_1: u8, tseg_2: u8, sjw: u8) -> Self {
        self.prop_seg = prop_seg;
        self.tseg_1 = tseg_1;
        self.tseg_2 = tseg_2;
        self.sjw = sjw;
        self
    }

    /// Set the secondary sample point offset, in quanta.
    pub const fn with_ssp_offset(mut self, ssp_offset: u8) -> Self {
        self.ssp_offset = ssp_offset;
        self
    }

    /// Prescaler actually programmed: resolution wins when non-zero.
    pub const fn effective_brp(&self) -> u32 {
        if self.quanta_resolution_hz != 0 {
            self.clk_src.freq_hz() / self.quanta_resolution_hz
        } else {
            self.brp
        }
    }

    /// Check every parameter against `limits` and compute register values.
    pub fn resolve(&self, limits: &TimingLimits) -> Result<ResolvedTiming, TimingError> {
        let brp = self.effective_brp();
        if brp == 0 || !limits.brp.fits(brp) {
            return Err(TimingError::PrescalerOutOfRange {
                brp,
                max: limits.brp.max(),
            });
        }

        check_segment("prop_seg", self.prop_seg, 0, limits.prop)?;
        check_segment("tseg_1", self.tseg_1, 1, limits.tseg_1)?;
        check_segment("tseg_2", self.tseg_2, 1, limits.tseg_2)?;
        check_segment("sjw", self.sjw, 0, limits.sjw)?;

        // Hardware counts the SSP in clock cycles, not quanta.
        let ssp_cycles = if self.ssp_offset != 0 {
            let cycles = self.ssp_offset as u32 * brp;
            if !fields::SSP_OFFSET.fits(cycles) {
                return Err(TimingError::SspOffsetOutOfRange {
                    cycles,
                    max: fields::SSP_OFFSET.max(),
                });
            }
            Some(cycles)
        } else {
            None
        };

        Ok(ResolvedTiming {
            brp,
            prop_seg: self.prop_seg as u32,
            tseg_1: self.tseg_1 as u32,
            tseg_2: self.tseg_2 as u32,
            sjw: self.sjw as u32,
            ssp_cycles,
        })
    }
}

fn check_segment(segment: &'static str, value: u8, min: u32, field: Field) -> Result<(), TimingError> {
    let value = value as u32;
    if value < min || !field.fits(value) {
        return Err(TimingError::SegmentOutOfRange {
            segment,
            value,
            max: field.max(),
        });
    }
    Ok(())
}

//==================================================================================LIMITS
/// Register fields bounding one phase's parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimingLimits {
    pub brp: Field,
    pub prop: Field,
    pub tseg_1: Field,
    pub tseg_2: Field,
    pub sjw: Field,
}

/// Nominal (arbitration) phase fields of BTR.
pub const NOMINAL_LIMITS: TimingLimits = TimingLimits {
    brp: fields::BTR_BRP,
    prop: fields::BTR_PROP,
    tseg_1: fields::BTR_PH1,
    tseg_2: fields::BTR_PH2,
    sjw: fields::BTR_SJW,
};

/// FD data phase fields of BTR_FD.
pub const DATA_LIMITS: TimingLimits = TimingLimits {
    brp: fields::BTR_FD_BRP,
    prop: fields::BTR_FD_PROP,
    tseg_1: fields::BTR_FD_PH1,
    tseg_2: fields::BTR_FD_PH2,
    sjw: fields::BTR_FD_SJW,
};

//==================================================================================RESOLVED
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
/// Validated timing, ready for the registers.
pub struct ResolvedTiming {
    pub brp: u32,
    pub prop_seg: u32,
    pub tseg_1: u32,
    pub tseg_2: u32,
    pub sjw: u32,
    /// Secondary sample point in clock cycles, `None` when disabled.
    pub ssp_cycles: Option<u32>,
}

impl ResolvedTiming {
    /// Timing register word laid out according to `limits`.
    pub const fn register_word(&self, limits: &TimingLimits) -> u32 {
        limits.brp.place(self.brp)
            | limits.prop.place(self.prop_seg)
            | limits.tseg_1.place(self.tseg_1)
            | limits.tseg_2.place(self.tseg_2)
            | limits.sjw.place(self.sjw)
    }

    /// Quanta per bit, sync segment included.
    pub const fn quanta_per_bit(&self) -> u32 {
        1 + self.prop_seg + self.tseg_1 + self.tseg_2
    }

    /// Resulting bit rate for a given source clock.
    pub const fn bitrate(&self, clock_hz: u32) -> u32 {
        clock_hz / (self.brp * self.quanta_per_bit())
    }
}

//==================================================================================APPLY
/// Validate `cfg` and rewrite the nominal timing register (BTR only).
pub fn apply_nominal<R: RegisterBlock>(regs: &R, cfg: &TimingConfig) -> Result<ResolvedTiming, TimingError> {
    let resolved = cfg.resolve(&NOMINAL_LIMITS)?;
    regs.write(Reg::BTR, resolved.register_word(&NOMINAL_LIMITS));

    #[cfg(feature = "defmt")]
    defmt::debug!("Nominal timing applied: {}", resolved);

    Ok(resolved)
}

/// Validate `cfg` and rewrite the FD data-phase timing and secondary sample point.
pub fn apply_data<R: RegisterBlock>(regs: &R, cfg: &TimingConfig) -> Result<ResolvedTiming, TimingError> {
    let resolved = cfg.resolve(&DATA_LIMITS)?;
    regs.write(Reg::BTR_FD, resolved.register_word(&DATA_LIMITS));

    regs.modify(Reg::TRV_DELAY_SSP_CFG, |word| match resolved.ssp_cycles {
        Some(cycles) => {
            let word = fields::SSP_OFFSET.insert(word, cycles);
            fields::SSP_SRC.insert(word, fields::SSP_SRC_MEAS_N_OFFSET)
        }
        None => fields::SSP_SRC.insert(word, fields::SSP_SRC_NO_SSP),
    });

    #[cfg(feature = "defmt")]
    defmt::debug!("Data-phase timing applied: {}", resolved);

    Ok(resolved)
}
