//! Per-profile symbol recovery and bit synchronization.
//!
//! A demodulator consumes one conditioned sample at a time and emits an
//! NRZI-decoded data bit whenever a full symbol resolves; unresolved
//! symbols are simply not emitted. Two strategies cover the supported
//! profiles:
//!
//! - AFSK (300 baud, 1200 Bell 202, 1200 V.23): quadrature correlators
//!   for the mark and space tones over a one-symbol window; the sign of
//!   the energy difference is the line bit.
//! - G3RUH direct FSK (9600): the conditioned sample's sign is the line
//!   level; the stream is descrambled after NRZI decoding.
//!
//! Bit-clock recovery is the same in both: a phase counter fires a
//! decision once per symbol period, and every observed line transition
//! nudges the counter one sample toward the point that keeps decisions in
//! the middle of a symbol (early/late correction).

use std::f32::consts::PI;

use crate::config::ModemProfile;

/// Below this RMS the input is numeric silence and decisions are
/// suppressed rather than decoded into garbage.
const SILENCE_RMS: f32 = 1e-4;

pub trait Demodulator: Send {
    /// Feed one conditioned sample plus the block's RMS estimate.
    /// Returns a decoded (NRZI-resolved, descrambled) data bit when a
    /// symbol boundary is reached.
    fn process(&mut self, sample: f32, rms: f32) -> Option<bool>;

    fn samples_per_bit(&self) -> usize;

    fn reset(&mut self);
}

/// Build the strategy matching a profile.
pub fn demodulator_for(profile: ModemProfile) -> Box<dyn Demodulator> {
    match profile.tones() {
        Some((mark, space)) => Box::new(AfskDemodulator::new(
            mark,
            space,
            profile.working_rate(),
            profile.samples_per_bit(),
        )),
        None => Box::new(FskDemodulator::new(profile.samples_per_bit())),
    }
}

/// Shared bit-clock: a counter that fires once per symbol and is pulled
/// toward mid-symbol by observed transitions.
#[derive(Debug, Clone)]
struct BitClock {
    spb: usize,
    counter: usize,
}

impl BitClock {
    fn new(spb: usize) -> Self {
        Self { spb, counter: 0 }
    }

    /// Advance one sample; true when a decision is due.
    fn tick(&mut self) -> bool {
        self.counter += 1;
        if self.counter >= self.spb {
            self.counter = 0;
            true
        } else {
            false
        }
    }

    /// A line transition was observed; pull the phase so decisions land
    /// half a symbol after transitions.
    fn nudge(&mut self) {
        let mid = self.spb / 2;
        if self.counter > mid {
            self.counter -= 1;
        } else if self.counter < mid {
            self.counter += 1;
        }
    }

    fn reset(&mut self) {
        self.counter = 0;
    }
}

/// NRZI: a transition encodes 0, its absence encodes 1.
#[derive(Debug, Clone, Default)]
struct NrziDecoder {
    last: bool,
}

impl NrziDecoder {
    fn decode(&mut self, line: bool) -> bool {
        let bit = line == self.last;
        self.last = line;
        bit
    }
}

pub struct AfskDemodulator {
    window: Vec<f32>,
    pos: usize,
    mark_cos: Vec<f32>,
    mark_sin: Vec<f32>,
    space_cos: Vec<f32>,
    space_sin: Vec<f32>,
    clock: BitClock,
    nrzi: NrziDecoder,
    last_line: bool,
    primed: usize,
}

impl AfskDemodulator {
    pub fn new(mark_hz: f32, space_hz: f32, working_rate: u32, spb: usize) -> Self {
        let reference = |freq: f32| -> (Vec<f32>, Vec<f32>) {
            let mut cos_ref = Vec::with_capacity(spb);
            let mut sin_ref = Vec::with_capacity(spb);
            for i in 0..spb {
                let phase = 2.0 * PI * freq * i as f32 / working_rate as f32;
                cos_ref.push(phase.cos());
                sin_ref.push(phase.sin());
            }
            (cos_ref, sin_ref)
        };
        let (mark_cos, mark_sin) = reference(mark_hz);
        let (space_cos, space_sin) = reference(space_hz);
        Self {
            window: vec![0.0; spb],
            pos: 0,
            mark_cos,
            mark_sin,
            space_cos,
            space_sin,
            clock: BitClock::new(spb),
            nrzi: NrziDecoder::default(),
            last_line: false,
            primed: 0,
        }
    }

    /// Mark-minus-space energy over the trailing window.
    fn discriminate(&self) -> f32 {
        let n = self.window.len();
        let mut mi = 0.0f32;
        let mut mq = 0.0f32;
        let mut si = 0.0f32;
        let mut sq = 0.0f32;
        for k in 0..n {
            let s = self.window[(self.pos + k) % n];
            mi += s * self.mark_cos[k];
            mq += s * self.mark_sin[k];
            si += s * self.space_cos[k];
            sq += s * self.space_sin[k];
        }
        (mi * mi + mq * mq) - (si * si + sq * sq)
    }
}

impl Demodulator for AfskDemodulator {
    fn process(&mut self, sample: f32, rms: f32) -> Option<bool> {
        let n = self.window.len();
        self.window[self.pos] = sample;
        self.pos = (self.pos + 1) % n;
        if self.primed < n {
            self.primed += 1;
        }

        let line = self.discriminate() > 0.0;
        if line != self.last_line {
            self.last_line = line;
            self.clock.nudge();
        }

        if self.clock.tick() && self.primed >= n && rms > SILENCE_RMS {
            return Some(self.nrzi.decode(line));
        }
        None
    }

    fn samples_per_bit(&self) -> usize {
        self.window.len()
    }

    fn reset(&mut self) {
        self.window.fill(0.0);
        self.pos = 0;
        self.primed = 0;
        self.clock.reset();
        self.nrzi = NrziDecoder::default();
        self.last_line = false;
    }
}

pub struct FskDemodulator {
    clock: BitClock,
    nrzi: NrziDecoder,
    descrambler: Descrambler,
    last_line: bool,
    spb: usize,
}

impl FskDemodulator {
    pub fn new(spb: usize) -> Self {
        Self {
            clock: BitClock::new(spb),
            nrzi: NrziDecoder::default(),
            descrambler: Descrambler::new(),
            last_line: false,
            spb,
        }
    }
}

impl Demodulator for FskDemodulator {
    fn process(&mut self, sample: f32, rms: f32) -> Option<bool> {
        let line = sample > 0.0;
        if line != self.last_line {
            self.last_line = line;
            self.clock.nudge();
        }
        if self.clock.tick() && rms > SILENCE_RMS {
            let bit = self.nrzi.decode(line);
            return Some(self.descrambler.feed(bit));
        }
        None
    }

    fn samples_per_bit(&self) -> usize {
        self.spb
    }

    fn reset(&mut self) {
        self.clock.reset();
        self.nrzi = NrziDecoder::default();
        self.descrambler = Descrambler::new();
        self.last_line = false;
    }
}

const SCRAMBLER_TAP_A: u32 = 12;
const SCRAMBLER_TAP_B: u32 = 17;

/// G3RUH multiplicative scrambler (1 + x^12 + x^17), transmit side.
#[derive(Debug, Clone, Default)]
pub struct Scrambler {
    state: u32,
}

impl Scrambler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn feed(&mut self, bit: bool) -> bool {
        let out = bit
            ^ ((self.state >> (SCRAMBLER_TAP_A - 1)) & 1 != 0)
            ^ ((self.state >> (SCRAMBLER_TAP_B - 1)) & 1 != 0);
        self.state = (self.state << 1) | out as u32;
        out
    }
}

/// G3RUH self-synchronizing descrambler; recovers after 17 bits of any
/// starting state.
#[derive(Debug, Clone, Default)]
pub struct Descrambler {
    state: u32,
}

impl Descrambler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn feed(&mut self, bit: bool) -> bool {
        let out = bit
            ^ ((self.state >> (SCRAMBLER_TAP_A - 1)) & 1 != 0)
            ^ ((self.state >> (SCRAMBLER_TAP_B - 1)) & 1 != 0);
        self.state = (self.state << 1) | bit as u32;
        out
    }
}
