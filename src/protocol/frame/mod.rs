//! Frame codec: conversion between the logical frame ([`FrameHeader`] plus a
//! payload) and the controller's frame image ([`HwFrame`]), as stored in TXT
//! buffers and streamed out of the RX buffer.
//!
//! Word layout of the image:
//!
//! | word   | content                                                   |
//! |--------|-----------------------------------------------------------|
//! | 0      | FRAME_FORMAT: DLC, RTR, IDE, FDF, BRS, ESI, RWCNT          |
//! | 1      | IDENTIFIER: extension bits 17:0, base bits 28:18           |
//! | 2, 3   | timestamp low / high                                      |
//! | 4..20  | payload, four bytes per word, little endian               |
//!
//! The codec is total: out-of-range lengths and DLCs are clamped, never
//! rejected, and no reference is kept once a call returns.
use embedded_can::{ExtendedId, Id, StandardId};

use crate::core::{HW_FRAME_WORDS, HW_HEADER_WORDS, MAX_CLASSIC_LEN, MAX_EXTENDED_ID, MAX_FD_LEN};
use crate::infra::registers::fields;

//==================================================================================DLC
const DLC_TO_LEN: [u8; 16] = [0, 1, 2, 3, 4, 5, 6, 7, 8, 12, 16, 20, 24, 32, 48, 64];

/// Payload length announced by a DLC (FD table; classic frames clamp to 8).
#[inline]
pub const fn dlc_to_len(dlc: u8) -> usize {
    DLC_TO_LEN[(dlc & 0x0F) as usize] as usize
}

/// Smallest DLC able to carry `len` bytes. Lengths above 64 map to 15.
pub const fn len_to_dlc(len: usize) -> u8 {
    match len {
        0..=8 => len as u8,
        9..=12 => 9,
        13..=16 => 10,
        17..=20 => 11,
        21..=24 => 12,
        25..=32 => 13,
        33..=48 => 14,
        _ => 15,
    }
}

/// Largest payload a frame of the given format can carry.
#[inline]
pub const fn max_payload(fdf: bool) -> usize {
    if fdf {
        MAX_FD_LEN
    } else {
        MAX_CLASSIC_LEN
    }
}

//==================================================================================HEADER
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Logical frame header.
pub struct FrameHeader {
    /// Standard (11-bit) or extended (29-bit) identifier.
    pub id: Id,
    /// Remote transmission request.
    pub rtr: bool,
    /// FD frame format.
    pub fdf: bool,
    /// Bit rate switch for the FD data phase.
    pub brs: bool,
    /// Error state indicator (received frames only).
    pub esi: bool,
    /// Data length code; 0 on transmit means "derive from payload length".
    pub dlc: u8,
    /// Reception timestamp, overflow-compensated to 64 bits.
    pub timestamp: u64,
}

impl FrameHeader {
    /// Classic data frame header.
    pub fn new(id: impl Into<Id>) -> Self {
        Self {
            id: id.into(),
            rtr: false,
            fdf: false,
            brs: false,
            esi: false,
            dlc: 0,
            timestamp: 0,
        }
    }

    /// Switch to FD format, optionally with bit rate switching.
    pub fn fd(mut self, brs: bool) -> Self {
        self.fdf = true;
        self.brs = brs;
        self
    }

    /// Turn into a remote frame announcing `dlc`.
    pub fn remote(mut self, dlc: u8) -> Self {
        self.rtr = true;
        self.dlc = dlc;
        self
    }

    /// Force an explicit DLC.
    pub fn with_dlc(mut self, dlc: u8) -> Self {
        self.dlc = dlc;
        self
    }

    /// Whether the identifier is 29 bits.
    pub fn is_extended(&self) -> bool {
        matches!(self.id, Id::Extended(_))
    }

    /// Raw identifier value.
    pub fn raw_id(&self) -> u32 {
        raw_id(self.id)
    }
}

/// Numeric value of an identifier.
pub fn raw_id(id: Id) -> u32 {
    match id {
        Id::Standard(id) => id.as_raw() as u32,
        Id::Extended(id) => id.as_raw(),
    }
}

/// Identifier in the IDENTIFIER word layout: standard IDs sit in the base
/// field, extended IDs span base and extension.
pub fn identifier_word(id: Id) -> u32 {
    match id {
        Id::Standard(id) => fields::IDENTIFIER_BASE.place(id.as_raw() as u32),
        Id::Extended(id) => id.as_raw() & MAX_EXTENDED_ID,
    }
}

//==================================================================================HW_FRAME
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Frame image as laid out in controller memory.
pub struct HwFrame {
    pub words: [u32; HW_FRAME_WORDS],
}

impl Default for HwFrame {
    fn default() -> Self {
        Self::new()
    }
}

impl HwFrame {
    pub const fn new() -> Self {
        Self {
            words: [0; HW_FRAME_WORDS],
        }
    }

    /// FRAME_FORMAT word.
    #[inline]
    pub const fn format(&self) -> u32 {
        self.words[0]
    }

    /// Words occupied by the image, format word included (RWCNT + 1).
    pub const fn word_count(&self) -> usize {
        let count = fields::FRAME_RWCNT.extract(self.words[0]) as usize + 1;
        if count > HW_FRAME_WORDS {
            HW_FRAME_WORDS
        } else {
            count
        }
    }

    /// Occupied words, the part worth copying to a TXT buffer.
    pub fn used_words(&self) -> &[u32] {
        &self.words[..self.word_count()]
    }

    /// Low 32 bits of the hardware timestamp.
    #[inline]
    pub const fn timestamp_low(&self) -> u32 {
        self.words[2]
    }

    /// Full hardware timestamp as stored in the image.
    #[inline]
    pub const fn timestamp(&self) -> u64 {
        ((self.words[3] as u64) << 32) | self.words[2] as u64
    }
}

//==================================================================================CODEC
/// Build the frame image for `header` and `payload`.
///
/// The DLC is taken from the header when non-zero, otherwise derived from the
/// payload length. At most 8 (classic) or 64 (FD) bytes are packed; remote
/// frames carry no data region.
pub fn encode(header: &FrameHeader, payload: &[u8]) -> HwFrame {
    let max = max_payload(header.fdf);
    let requested = payload.len().min(max);
    let dlc = if header.dlc != 0 {
        header.dlc & 0x0F
    } else {
        len_to_dlc(requested)
    };

    let packed = if header.rtr { 0 } else { requested };
    let region = if header.rtr {
        0
    } else {
        packed.max(dlc_to_len(dlc).min(max))
    };
    let data_words = region.div_ceil(4);

    let mut hw = HwFrame::new();
    let mut format = fields::FRAME_DLC.place(dlc as u32);
    format = fields::FRAME_RTR.insert(format, header.rtr as u32);
    format = fields::FRAME_IDE.insert(format, header.is_extended() as u32);
    format = fields::FRAME_FDF.insert(format, header.fdf as u32);
    format = fields::FRAME_BRS.insert(format, header.brs as u32);
    format = fields::FRAME_ESI.insert(format, header.esi as u32);
    format = fields::FRAME_RWCNT.insert(format, (HW_HEADER_WORDS - 1 + data_words) as u32);

    hw.words[0] = format;
    hw.words[1] = identifier_word(header.id);
    hw.words[2] = header.timestamp as u32;
    hw.words[3] = (header.timestamp >> 32) as u32;

    for (chunk, word) in payload[..packed]
        .chunks(4)
        .zip(hw.words[HW_HEADER_WORDS..].iter_mut())
    {
        let mut bytes = [0u8; 4];
        bytes[..chunk.len()].copy_from_slice(chunk);
        *word = u32::from_le_bytes(bytes);
    }

    hw
}

/// Decode a frame image, copying the payload into `dest`.
///
/// Returns the header and the number of bytes written. The length announced
/// by the DLC is clamped to the frame format and then to `dest.len()`;
/// truncation is silent.
pub fn decode(hw: &HwFrame, dest: &mut [u8]) -> (FrameHeader, usize) {
    let format = hw.format();
    let dlc = fields::FRAME_DLC.extract(format) as u8;
    let rtr = fields::FRAME_RTR.extract(format) != 0;
    let ide = fields::FRAME_IDE.extract(format) != 0;
    let fdf = fields::FRAME_FDF.extract(format) != 0;

    let ident = hw.words[1];
    let id = if ide {
        Id::Extended(ExtendedId::new(ident & MAX_EXTENDED_ID).unwrap_or(ExtendedId::ZERO))
    } else {
        let base = fields::IDENTIFIER_BASE.extract(ident) as u16;
        Id::Standard(StandardId::new(base).unwrap_or(StandardId::ZERO))
    };

    let header = FrameHeader {
        id,
        rtr,
        fdf,
        brs: fields::FRAME_BRS.extract(format) != 0,
        esi: fields::FRAME_ESI.extract(format) != 0,
        dlc,
        timestamp: hw.timestamp(),
    };

    let len = if rtr {
        0
    } else {
        dlc_to_len(dlc).min(max_payload(fdf)).min(dest.len())
    };

    for (index, byte) in dest[..len].iter_mut().enumerate() {
        let word = hw.words[HW_HEADER_WORDS + index / 4];
        *byte = word.to_le_bytes()[index % 4];
    }

    (header, len)
}

//==================================================================================TWAI_FRAME
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Owned frame with an inline 64-byte buffer.
pub struct TwaiFrame {
    header: FrameHeader,
    data: [u8; MAX_FD_LEN],
    len: usize,
}

impl TwaiFrame {
    /// Classic data frame; `None` when `data` exceeds 8 bytes.
    pub fn new_classic(id: impl Into<Id>, data: &[u8]) -> Option<Self> {
        if data.len() > MAX_CLASSIC_LEN {
            return None;
        }
        let header = FrameHeader::new(id).with_dlc(len_to_dlc(data.len()));
        Some(Self::with_payload(header, data))
    }

    /// FD data frame; `None` when `data` exceeds 64 bytes.
    ///
    /// The payload is zero-padded up to the next length a DLC can express.
    pub fn new_fd(id: impl Into<Id>, data: &[u8], brs: bool) -> Option<Self> {
        if data.len() > MAX_FD_LEN {
            return None;
        }
        let dlc = len_to_dlc(data.len());
        let header = FrameHeader::new(id).fd(brs).with_dlc(dlc);
        let mut frame = Self::with_payload(header, data);
        frame.len = dlc_to_len(dlc);
        Some(frame)
    }

    /// Remote frame; `None` when `dlc` exceeds 8.
    pub fn new_remote_frame(id: impl Into<Id>, dlc: u8) -> Option<Self> {
        if dlc as usize > MAX_CLASSIC_LEN {
            return None;
        }
        Some(Self {
            header: FrameHeader::new(id).remote(dlc),
            data: [0; MAX_FD_LEN],
            len: 0,
        })
    }

    fn with_payload(header: FrameHeader, payload: &[u8]) -> Self {
        let mut data = [0; MAX_FD_LEN];
        data[..payload.len()].copy_from_slice(payload);
        Self {
            header,
            data,
            len: payload.len(),
        }
    }

    pub fn header(&self) -> &FrameHeader {
        &self.header
    }

    pub fn payload(&self) -> &[u8] {
        &self.data[..self.len]
    }

    pub fn timestamp(&self) -> u64 {
        self.header.timestamp
    }

    pub(crate) fn set_timestamp(&mut self, timestamp: u64) {
        self.header.timestamp = timestamp;
    }

    /// Frame image for a TXT buffer.
    pub fn encode(&self) -> HwFrame {
        encode(&self.header, self.payload())
    }

    /// Frame read back from the controller.
    pub fn decode(hw: &HwFrame) -> Self {
        let mut data = [0; MAX_FD_LEN];
        let (header, len) = decode(hw, &mut data);
        Self { header, data, len }
    }
}

impl embedded_can::Frame for TwaiFrame {
    fn new(id: impl Into<Id>, data: &[u8]) -> Option<Self> {
        if data.len() <= MAX_CLASSIC_LEN {
            Self::new_classic(id, data)
        } else {
            Self::new_fd(id, data, false)
        }
    }

    fn new_remote(id: impl Into<Id>, dlc: usize) -> Option<Self> {
        u8::try_from(dlc)
            .ok()
            .and_then(|dlc| Self::new_remote_frame(id, dlc))
    }

    fn is_extended(&self) -> bool {
        self.header.is_extended()
    }

    fn is_remote_frame(&self) -> bool {
        self.header.rtr
    }

    fn id(&self) -> Id {
        self.header.id
    }

    fn dlc(&self) -> usize {
        // Remote frames announce a length without carrying data.
        if self.header.rtr {
            dlc_to_len(self.header.dlc).min(MAX_CLASSIC_LEN)
        } else {
            self.len
        }
    }

    fn data(&self) -> &[u8] {
        self.payload()
    }
}
