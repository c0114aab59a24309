//! FX.25 forward-error-correction envelope.
//!
//! An FX.25 transmission carries a 64-bit correlation tag identifying one
//! of the published Reed-Solomon block formats, followed by the codeword:
//! a fixed-size data field holding the HDLC bit image of the AX.25 frame
//! (flags, stuffing and FCS intact, padded with flag bytes) and the parity
//! symbols. A receiver that does not recognize the tag still sees a
//! normal-looking byte run, which is what makes the scheme backward
//! compatible: anything without a recognized tag passes through this layer
//! untouched and is treated as plain AX.25.

use crate::config::Fx25Mode;
use crate::error::{ModemError, Result};
use crate::hdlc::{self, Deframer};
use crate::rs::ReedSolomon;

/// Correlation tag length on the wire.
pub const TAG_LEN: usize = 8;

/// Flipped bits tolerated when matching a tag; the tag is outside the
/// codeword, so the RS parity cannot repair it.
const TAG_MAX_DISTANCE: u32 = 2;

/// One published FX.25 block format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TagSpec {
    pub tag: u64,
    /// Transmitted codeword length (data + parity).
    pub codeword_len: usize,
    /// Data field length.
    pub data_len: usize,
}

impl TagSpec {
    pub fn parity(&self) -> usize {
        self.codeword_len - self.data_len
    }
}

/// The published correlation tag set: the RS(255,239), RS(255,223) and
/// RS(255,191) families and their shortened forms.
pub static TAGS: [TagSpec; 11] = [
    TagSpec { tag: 0xB74DB7DF8A532F3E, codeword_len: 255, data_len: 239 },
    TagSpec { tag: 0x26FF60A600CC8FDE, codeword_len: 144, data_len: 128 },
    TagSpec { tag: 0xC7DC0508F3D9B09E, codeword_len: 80, data_len: 64 },
    TagSpec { tag: 0x8F056EB4369660EE, codeword_len: 48, data_len: 32 },
    TagSpec { tag: 0x6E260B1AC5835FAE, codeword_len: 255, data_len: 223 },
    TagSpec { tag: 0xFF94DC634F1CFF4E, codeword_len: 160, data_len: 128 },
    TagSpec { tag: 0x1EB7B9CDBC09C00E, codeword_len: 96, data_len: 64 },
    TagSpec { tag: 0xDBF869BD2DBB1776, codeword_len: 64, data_len: 32 },
    TagSpec { tag: 0x3ADB0C13DEAE2836, codeword_len: 255, data_len: 191 },
    TagSpec { tag: 0xAB69DB6A543188D6, codeword_len: 192, data_len: 128 },
    TagSpec { tag: 0x4A4ABEC4A724B796, codeword_len: 128, data_len: 64 },
];

/// Result of pushing a capture through the FX.25 layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Unwrapped {
    /// No recognized tag: the capture is a plain AX.25 frame, unmodified.
    Plain(Vec<u8>),
    /// Tag recognized and the block corrected; `capture` is the recovered
    /// frame with FCS attached, ready for validation.
    Corrected { capture: Vec<u8>, symbols_fixed: usize },
}

#[derive(Debug, Clone)]
pub struct Fx25Codec {
    rs16: ReedSolomon,
    rs32: ReedSolomon,
    rs64: ReedSolomon,
}

impl Fx25Codec {
    pub fn new() -> Self {
        Self {
            rs16: ReedSolomon::new(16),
            rs32: ReedSolomon::new(32),
            rs64: ReedSolomon::new(64),
        }
    }

    fn codec(&self, parity: usize) -> &ReedSolomon {
        match parity {
            16 => &self.rs16,
            32 => &self.rs32,
            _ => &self.rs64,
        }
    }

    /// Wrap a frame (FCS attached) for transmission at the given mode.
    /// Picks the smallest block of the requested parity family that fits
    /// the frame's HDLC bit image.
    pub fn wrap(&self, frame_with_fcs: &[u8], mode: Fx25Mode) -> Result<Vec<u8>> {
        let parity = mode
            .parity()
            .ok_or_else(|| ModemError::InvalidConfig("FX.25 wrap with mode off".into()))?;

        let mut bits = hdlc::frame_bits(frame_with_fcs, 1, 1);
        let spec = TAGS
            .iter()
            .filter(|t| t.parity() == parity)
            .filter(|t| t.data_len * 8 >= bits.len())
            .min_by_key(|t| t.data_len)
            .ok_or(ModemError::FrameTooLong)?;

        // Fill the rest of the data field with flag bytes; the inner
        // deframer skips them on the way back out.
        while bits.len() < spec.data_len * 8 {
            hdlc::push_flag_bits(&mut bits);
        }
        bits.truncate(spec.data_len * 8);
        let data_field = pack_lsb(&bits);

        let mut out = Vec::with_capacity(TAG_LEN + spec.codeword_len);
        out.extend_from_slice(&spec.tag.to_le_bytes());
        out.extend(self.codec(parity).encode(&data_field));
        Ok(out)
    }

    /// Inspect a capture for a correlation tag. Without one the bytes
    /// pass through unchanged; with one, the block is corrected and the
    /// inner frame recovered, or the whole capture is dropped; a
    /// recognized tag is never delivered uncorrected.
    pub fn unwrap(&self, capture: &[u8]) -> Result<Unwrapped> {
        let Some(spec) = match_tag(capture) else {
            return Ok(Unwrapped::Plain(capture.to_vec()));
        };
        if capture.len() < TAG_LEN + spec.codeword_len {
            return Err(ModemError::FecDecodeFailure);
        }

        let mut codeword = capture[TAG_LEN..TAG_LEN + spec.codeword_len].to_vec();
        let symbols_fixed = self.codec(spec.parity()).correct(&mut codeword)?;
        if symbols_fixed > 0 {
            log::debug!("FX.25 block repaired, {} symbol(s)", symbols_fixed);
        }

        let inner = recover_frame(&codeword[..spec.data_len]).ok_or(ModemError::FecNoFrame)?;
        Ok(Unwrapped::Corrected { capture: inner, symbols_fixed })
    }
}

impl Default for Fx25Codec {
    fn default() -> Self {
        Self::new()
    }
}

/// Match the leading 8 bytes against the tag table, tolerating a couple
/// of flipped bits.
fn match_tag(capture: &[u8]) -> Option<&'static TagSpec> {
    if capture.len() < TAG_LEN {
        return None;
    }
    let mut raw = [0u8; TAG_LEN];
    raw.copy_from_slice(&capture[..TAG_LEN]);
    let word = u64::from_le_bytes(raw);
    TAGS.iter()
        .find(|spec| (spec.tag ^ word).count_ones() <= TAG_MAX_DISTANCE)
}

/// Run the corrected data field back through HDLC capture to pull out the
/// framed bytes (with FCS).
fn recover_frame(data_field: &[u8]) -> Option<Vec<u8>> {
    let mut deframer = Deframer::new();
    for bit in unpack_lsb(data_field) {
        if let Some(capture) = deframer.push_bit(bit) {
            return Some(capture);
        }
    }
    None
}

fn pack_lsb(bits: &[bool]) -> Vec<u8> {
    debug_assert_eq!(bits.len() % 8, 0);
    bits.chunks(8)
        .map(|chunk| {
            let mut byte = 0u8;
            for (i, &bit) in chunk.iter().enumerate() {
                if bit {
                    byte |= 1 << i;
                }
            }
            byte
        })
        .collect()
}

fn unpack_lsb(bytes: &[u8]) -> Vec<bool> {
    let mut bits = Vec::with_capacity(bytes.len() * 8);
    for &byte in bytes {
        for i in 0..8 {
            bits.push((byte >> i) & 1 != 0);
        }
    }
    bits
}
