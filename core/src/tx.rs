//! Transmit-side encoding and channel access.
//!
//! An outgoing frame becomes a preamble of flags, the stuffed body, and a
//! tail of flags; the whole bit image is NRZI-encoded (and scrambled
//! first on the G3RUH profile) into line levels for the tone synthesizer.
//! Before the transmitter keys up, the standard AX.25 CSMA discipline
//! applies: the channel must be clear for a full slot time, then the
//! frame goes out with probability p, otherwise the wait starts over on
//! the next slot. Full-duplex ports skip carrier sensing entirely.

use crate::config::{ModemConfig, ModemProfile};
use crate::dds::DdsOscillator;
use crate::demod::Scrambler;
use crate::hdlc;

/// DAC amplitude of the synthesized tones.
const TX_AMPLITUDE: i16 = 16_000;

/// Flags needed to cover a duration given in 10 ms units at a baud rate.
fn flags_for(units_10ms: u32, baud: u32) -> usize {
    // One flag is 8 bit times; round up so the interval is covered.
    let bits = units_10ms * baud / 100;
    ((bits + 7) / 8).max(2) as usize
}

/// NRZI line coding: 0 toggles the level, 1 holds it.
pub fn nrzi_encode(bits: &[bool]) -> Vec<bool> {
    let mut level = true;
    bits.iter()
        .map(|&bit| {
            if !bit {
                level = !level;
            }
            level
        })
        .collect()
}

/// Build the complete line-level sequence for one transmission.
///
/// `body` is everything between the flags: a frame with FCS attached, or
/// an FX.25 envelope.
pub fn build_line_bits(body: &[u8], config: &ModemConfig) -> Vec<bool> {
    let baud = config.profile.baud();
    let mut bits = hdlc::frame_bits(
        body,
        flags_for(config.tx_delay, baud),
        flags_for(config.tx_tail, baud),
    );
    if config.profile.tones().is_none() {
        let mut scrambler = Scrambler::new();
        for bit in bits.iter_mut() {
            *bit = scrambler.feed(*bit);
        }
    }
    nrzi_encode(&bits)
}

/// Pseudo-random byte source for the persistence dice. A 32-bit Galois
/// LFSR is plenty here and keeps `rand` out of the non-test build.
#[derive(Debug, Clone)]
pub struct PersistenceDice {
    lfsr: u32,
}

impl PersistenceDice {
    const TAPS: u32 = 0xB400_0001;

    pub fn new(seed: u32) -> Self {
        Self {
            lfsr: if seed == 0 { 0xACE1_BEEF } else { seed },
        }
    }

    pub fn next_byte(&mut self) -> u8 {
        let mut out = 0u8;
        for _ in 0..8 {
            out = (out << 1) | (self.lfsr & 1) as u8;
            let feedback = self.lfsr & 1;
            self.lfsr >>= 1;
            if feedback != 0 {
                self.lfsr ^= Self::TAPS;
            }
        }
        out
    }
}

/// p-persistence / slot-time channel access state.
#[derive(Debug, Clone)]
pub struct ChannelAccess {
    slot_ms: f32,
    persist: u8,
    full_duplex: bool,
    clear_ms: f32,
    dice: PersistenceDice,
}

impl ChannelAccess {
    pub fn new(config: &ModemConfig) -> Self {
        Self {
            slot_ms: config.slot_time as f32 * 10.0,
            persist: config.persist,
            full_duplex: config.full_duplex,
            clear_ms: 0.0,
            dice: PersistenceDice::new(0x5EED_7A6),
        }
    }

    /// Advance by one poll interval. Returns true when a pending frame
    /// may key the transmitter now.
    pub fn update(&mut self, carrier_busy: bool, elapsed_ms: f32) -> bool {
        if self.full_duplex {
            return true;
        }
        if carrier_busy {
            self.clear_ms = 0.0;
            return false;
        }
        self.clear_ms += elapsed_ms;
        if self.clear_ms < self.slot_ms {
            return false;
        }
        self.clear_ms -= self.slot_ms;
        if self.dice.next_byte() <= self.persist {
            self.clear_ms = 0.0;
            true
        } else {
            log::trace!("persistence backoff, waiting another slot");
            false
        }
    }

    pub fn reset(&mut self) {
        self.clear_ms = 0.0;
    }
}

/// Turns a line-level sequence into output samples, one per timer tick.
pub struct FrameRenderer {
    line_bits: Vec<bool>,
    spb: usize,
    pos: usize,
    dds: DdsOscillator,
    tones: Option<(u32, u32)>,
}

impl FrameRenderer {
    pub fn new(line_bits: Vec<bool>, profile: ModemProfile) -> Self {
        let rate = profile.sample_rate();
        let dds = DdsOscillator::new(rate, TX_AMPLITUDE);
        let tones = profile
            .tones()
            .map(|(mark, space)| (dds.increment_for(mark), dds.increment_for(space)));
        Self {
            line_bits,
            spb: (rate / profile.baud()) as usize,
            pos: 0,
            dds,
            tones,
        }
    }

    /// Next output sample, or `None` once the frame has fully played out.
    pub fn next_sample(&mut self) -> Option<i16> {
        let bit_index = self.pos / self.spb;
        let level = *self.line_bits.get(bit_index)?;
        self.pos += 1;
        Some(match self.tones {
            Some((mark_inc, space_inc)) => {
                self.dds
                    .set_increment(if level { mark_inc } else { space_inc });
                self.dds.tick()
            }
            None => self.dds.level(level),
        })
    }

    /// Total samples this transmission occupies.
    pub fn total_samples(&self) -> usize {
        self.line_bits.len() * self.spb
    }

    /// Render the whole transmission at once (host-side use).
    pub fn render_all(mut self) -> Vec<i16> {
        let mut samples = Vec::with_capacity(self.total_samples());
        while let Some(s) = self.next_sample() {
            samples.push(s);
        }
        samples
    }
}
