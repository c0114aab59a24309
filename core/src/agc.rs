//! Automatic gain control.
//!
//! Normalizes each processed audio block toward a target RMS before the
//! demodulator sees it. The attack rate (gain reduction) is much faster
//! than the release rate so a strong transient cannot pump the gain, while
//! recovery after signal loss still happens within a few blocks.

use crate::config::AgcConfig;

#[derive(Debug, Clone)]
pub struct Agc {
    config: AgcConfig,
    gain: f32,
}

impl Agc {
    pub fn new(config: AgcConfig) -> Self {
        let gain = 1.0f32.clamp(config.min_gain, config.max_gain);
        Self { config, gain }
    }

    pub fn gain(&self) -> f32 {
        self.gain
    }

    pub fn reset(&mut self) {
        self.gain = 1.0f32.clamp(self.config.min_gain, self.config.max_gain);
    }

    /// Update the gain from the block's RMS and scale the block in place.
    pub fn process(&mut self, block: &mut [f32]) {
        if block.is_empty() {
            return;
        }
        // Error is measured against the block as it would leave this
        // stage: > 1 means the output is below target and the gain should
        // rise (release); < 1 means it is hot (attack).
        let rms = block_rms(block) * self.gain;
        let error = self.config.target_rms / (rms + f32::EPSILON);
        let rate = if error < 1.0 {
            self.config.attack
        } else {
            self.config.release
        };
        self.gain = self.gain * (1.0 - rate) + self.gain * error * rate;
        self.gain = self.gain.clamp(self.config.min_gain, self.config.max_gain);

        for sample in block.iter_mut() {
            *sample *= self.gain;
        }
    }
}

pub fn block_rms(block: &[f32]) -> f32 {
    if block.is_empty() {
        return 0.0;
    }
    (block.iter().map(|&s| s * s).sum::<f32>() / block.len() as f32).sqrt()
}
