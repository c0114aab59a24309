//! Carrier detect (squelch) estimator.
//!
//! Decides per processed block whether a signal is present, gating the
//! demodulator. The block RMS is converted to calibrated millivolts and
//! compared against assert/deassert thresholds driving a bounded
//! hysteresis counter, which keeps the detector from chattering at the
//! threshold boundary. Profiles with no analog squelch information
//! (direct FSK) report the carrier as always present.

/// Upper bound of the hysteresis counter.
const COUNTER_MAX: i32 = 100;

/// Counter value the carrier must climb past before asserting.
const TRIP_POINT: i32 = 3;

/// Sub-sample step used for the RMS estimate at high working rates.
const HIGH_RATE_STRIDE: usize = 4;

/// Working rates above this use the strided RMS estimate.
const STRIDE_THRESHOLD_HZ: u32 = 19_200;

#[derive(Debug, Clone)]
pub struct CarrierDetect {
    assert_mv: f32,
    deassert_mv: f32,
    vref_mv: f32,
    stride: usize,
    always_open: bool,
    counter: i32,
    active: bool,
    level_mv: f32,
}

impl CarrierDetect {
    pub fn new(
        assert_mv: f32,
        deassert_mv: f32,
        vref_mv: f32,
        working_rate: u32,
        always_open: bool,
    ) -> Self {
        let stride = if working_rate > STRIDE_THRESHOLD_HZ {
            HIGH_RATE_STRIDE
        } else {
            1
        };
        Self {
            assert_mv,
            deassert_mv,
            vref_mv,
            stride,
            always_open,
            counter: 0,
            active: always_open,
            level_mv: 0.0,
        }
    }

    /// Update from one processed block of average-removed samples in the
    /// normalized [-1, 1] range. Returns the new carrier state.
    pub fn process(&mut self, block: &[f32]) -> bool {
        if self.always_open {
            self.active = true;
            self.level_mv = self.rms_mv(block);
            return true;
        }
        if block.is_empty() {
            return self.active;
        }

        self.level_mv = self.rms_mv(block);

        if self.level_mv > self.assert_mv {
            self.counter = (self.counter + 1).min(COUNTER_MAX);
        } else if self.level_mv < self.deassert_mv {
            self.counter = (self.counter - 1).max(0);
        }

        if !self.active && self.counter > TRIP_POINT {
            self.active = true;
            log::debug!("carrier detect asserted at {:.1} mV", self.level_mv);
        } else if self.active && self.counter == 0 {
            self.active = false;
            log::debug!("carrier detect dropped");
        }
        self.active
    }

    fn rms_mv(&self, block: &[f32]) -> f32 {
        let mut sum = 0.0f32;
        let mut count = 0usize;
        let mut i = 0;
        while i < block.len() {
            sum += block[i] * block[i];
            count += 1;
            i += self.stride;
        }
        if count == 0 {
            return 0.0;
        }
        (sum / count as f32).sqrt() * self.vref_mv
    }

    pub fn active(&self) -> bool {
        self.active
    }

    /// Most recent RMS estimate in millivolts.
    pub fn level_mv(&self) -> f32 {
        self.level_mv
    }

    pub fn counter(&self) -> i32 {
        self.counter
    }

    pub fn reset(&mut self) {
        self.counter = 0;
        self.active = self.always_open;
        self.level_mv = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detector() -> CarrierDetect {
        CarrierDetect::new(20.0, 10.0, 3300.0, 9600, false)
    }

    fn loud_block() -> Vec<f32> {
        vec![0.1f32; 256] // 330 mV
    }

    fn quiet_block() -> Vec<f32> {
        vec![0.001f32; 256] // 3.3 mV
    }

    #[test]
    fn test_asserts_after_trip_point() {
        let mut cd = detector();
        assert!(!cd.process(&loud_block()));
        assert!(!cd.process(&loud_block()));
        assert!(!cd.process(&loud_block()));
        // Counter crosses the trip point on the fourth loud block
        assert!(cd.process(&loud_block()));
    }

    #[test]
    fn test_deasserts_only_at_zero() {
        let mut cd = detector();
        for _ in 0..10 {
            cd.process(&loud_block());
        }
        assert!(cd.active());
        let climbed = cd.counter();
        // Stays active through the full decay
        for _ in 0..(climbed - 1) {
            assert!(cd.process(&quiet_block()));
        }
        assert!(!cd.process(&quiet_block()));
        assert!(!cd.active());
    }

    #[test]
    fn test_counter_bounds() {
        let mut cd = detector();
        for _ in 0..500 {
            cd.process(&loud_block());
            assert!(cd.counter() <= 100);
        }
        assert_eq!(cd.counter(), 100);
        for _ in 0..500 {
            cd.process(&quiet_block());
            assert!(cd.counter() >= 0);
        }
        assert_eq!(cd.counter(), 0);
    }

    #[test]
    fn test_dead_band_holds_state() {
        let mut cd = detector();
        for _ in 0..10 {
            cd.process(&loud_block());
        }
        let counter = cd.counter();
        // Level between deassert and assert thresholds: no movement
        let mid = vec![0.0045f32; 256]; // ~14.8 mV
        cd.process(&mid);
        assert_eq!(cd.counter(), counter);
        assert!(cd.active());
    }

    #[test]
    fn test_always_open_for_fsk() {
        let mut cd = CarrierDetect::new(20.0, 10.0, 3300.0, 38_400, true);
        assert!(cd.active());
        assert!(cd.process(&quiet_block()));
        assert!(cd.process(&[]));
    }

    #[test]
    fn test_level_reports_millivolts() {
        let mut cd = detector();
        cd.process(&loud_block());
        assert!((cd.level_mv() - 330.0).abs() < 1.0);
    }

    #[test]
    fn test_strided_estimate_close_to_full() {
        let block: Vec<f32> = (0..768)
            .map(|i| 0.1 * (2.0 * std::f32::consts::PI * i as f32 / 32.0).sin())
            .collect();
        let mut full = CarrierDetect::new(20.0, 10.0, 3300.0, 9600, false);
        let mut strided = CarrierDetect::new(20.0, 10.0, 3300.0, 38_400, false);
        full.process(&block);
        strided.process(&block);
        let ratio = strided.level_mv() / full.level_mv();
        assert!((ratio - 1.0).abs() < 0.05, "stride estimate off by {}", ratio);
    }
}
