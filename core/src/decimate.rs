//! Anti-alias FIR filter and integer decimator.
//!
//! Reduces the oversampled acquisition stream to the profile's working
//! rate. The low-pass is a short windowed-sinc design with its cutoff at
//! half the post-decimation Nyquist, computed when the profile is selected.
//! Profiles whose acquisition rate already equals the working rate bypass
//! this stage entirely.

use std::f32::consts::PI;

/// Tap count of the anti-alias filter.
pub const DECIMATOR_TAPS: usize = 8;

#[derive(Debug, Clone)]
pub struct FirDecimator {
    taps: [f32; DECIMATOR_TAPS],
    ratio: usize,
    history: [f32; DECIMATOR_TAPS],
    phase: usize,
}

impl FirDecimator {
    /// Build a decimator for the given integer ratio. The cutoff lands at
    /// half the decimated Nyquist, i.e. `0.5 / ratio` of the input Nyquist.
    pub fn new(ratio: usize) -> Self {
        let ratio = ratio.max(1);
        Self {
            taps: design_lowpass(0.5 / ratio as f32),
            ratio,
            history: [0.0; DECIMATOR_TAPS],
            phase: 0,
        }
    }

    pub fn ratio(&self) -> usize {
        self.ratio
    }

    pub fn taps(&self) -> &[f32] {
        &self.taps
    }

    /// Filter and decimate one block. Output length = input length / ratio
    /// for block lengths that are a multiple of the ratio; history carries
    /// across calls for streaming use.
    pub fn process(&mut self, input: &[f32]) -> Vec<f32> {
        if self.ratio == 1 {
            return input.to_vec();
        }
        let mut output = Vec::with_capacity(input.len() / self.ratio + 1);
        for &sample in input {
            self.history.rotate_right(1);
            self.history[0] = sample;

            self.phase += 1;
            if self.phase >= self.ratio {
                self.phase = 0;
                let sum: f32 = self
                    .taps
                    .iter()
                    .zip(self.history.iter())
                    .map(|(&t, &h)| t * h)
                    .sum();
                output.push(sum);
            }
        }
        output
    }

    pub fn reset(&mut self) {
        self.history = [0.0; DECIMATOR_TAPS];
        self.phase = 0;
    }
}

/// Windowed-sinc low-pass design, Hamming window, unity DC gain.
/// `cutoff` is a fraction of the input Nyquist (0..1).
fn design_lowpass(cutoff: f32) -> [f32; DECIMATOR_TAPS] {
    let n = DECIMATOR_TAPS;
    let m = (n - 1) as f32 / 2.0;
    let mut taps = [0.0f32; DECIMATOR_TAPS];

    for (i, tap) in taps.iter_mut().enumerate() {
        let x = i as f32 - m;
        let sinc = if x.abs() < 1e-9 {
            cutoff
        } else {
            (PI * cutoff * x).sin() / (PI * x)
        };
        let window = 0.54 - 0.46 * (2.0 * PI * i as f32 / (n - 1) as f32).cos();
        *tap = sinc * window;
    }

    let sum: f32 = taps.iter().sum();
    if sum.abs() > 1e-9 {
        for t in taps.iter_mut() {
            *t /= sum;
        }
    }
    taps
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_length() {
        let mut d = FirDecimator::new(4);
        let input = vec![0.5f32; 3072];
        let output = d.process(&input);
        assert_eq!(output.len(), 768);
    }

    #[test]
    fn test_ratio_one_passthrough() {
        let mut d = FirDecimator::new(1);
        let input: Vec<f32> = (0..64).map(|i| i as f32 * 0.01).collect();
        assert_eq!(d.process(&input), input);
    }

    #[test]
    fn test_dc_gain_unity() {
        let mut d = FirDecimator::new(4);
        let input = vec![1.0f32; 256];
        let output = d.process(&input);
        // After the filter settles, a constant input passes at unity gain
        for &s in &output[4..] {
            assert!((s - 1.0).abs() < 0.01, "expected ~1.0, got {}", s);
        }
    }

    #[test]
    fn test_attenuates_alias_band() {
        let mut d = FirDecimator::new(4);
        // In-band tone: 1/32 of the input rate (well under cutoff 1/8)
        let low: Vec<f32> = (0..1024)
            .map(|i| (2.0 * PI * i as f32 / 32.0).sin())
            .collect();
        let out_low = d.process(&low);

        d.reset();

        // Alias-band tone near the input Nyquist
        let high: Vec<f32> = (0..1024)
            .map(|i| (2.0 * PI * 0.45 * i as f32).sin())
            .collect();
        let out_high = d.process(&high);

        let p = |v: &[f32]| v[16..].iter().map(|s| s * s).sum::<f32>() / (v.len() - 16) as f32;
        assert!(
            p(&out_low) > p(&out_high) * 10.0,
            "passband {} should dominate alias band {}",
            p(&out_low),
            p(&out_high)
        );
    }

    #[test]
    fn test_streaming_matches_batch() {
        let input: Vec<f32> = (0..512).map(|i| (i as f32 * 0.37).sin()).collect();

        let mut batch = FirDecimator::new(4);
        let whole = batch.process(&input);

        let mut streaming = FirDecimator::new(4);
        let mut pieces = Vec::new();
        for chunk in input.chunks(128) {
            pieces.extend(streaming.process(chunk));
        }
        assert_eq!(whole.len(), pieces.len());
        for (a, b) in whole.iter().zip(pieces.iter()) {
            assert!((a - b).abs() < 1e-6);
        }
    }

    #[test]
    fn test_reset_clears_history() {
        let mut d = FirDecimator::new(4);
        d.process(&vec![5.0f32; 64]);
        d.reset();
        let out = d.process(&vec![0.0f32; 16]);
        for &s in &out {
            assert!(s.abs() < 1e-6);
        }
    }
}
