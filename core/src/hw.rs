//! Capability traits for the hardware seams.
//!
//! The modem core never touches a peripheral directly; each hardware
//! target implements these once and the core stays chip-agnostic.

/// Active level of a GPIO line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Polarity {
    #[default]
    ActiveHigh,
    ActiveLow,
}

impl Polarity {
    /// Physical pin level for a logical assertion.
    pub fn level(&self, asserted: bool) -> bool {
        match self {
            Polarity::ActiveHigh => asserted,
            Polarity::ActiveLow => !asserted,
        }
    }
}

/// Continuous sample producer: an ADC in free-running or DMA mode.
/// Implementations push into the modem's `SampleProducer` from their
/// interrupt; this pull form exists for host-side sources (files, test
/// vectors).
pub trait SampleSource: Send {
    /// Next acquired sample, or `None` when the source is exhausted.
    fn next_sample(&mut self) -> Option<i16>;
}

/// Analog output peripheral: DAC or sigma-delta modulator. Fed one
/// sample per output-timer tick while transmitting.
pub trait WaveformSink: Send {
    fn write_sample(&mut self, sample: i16);
}

/// Push-to-talk line driver.
pub trait PttLine: Send {
    /// Drive the physical pin; `level` is already polarity-resolved.
    fn set_level(&mut self, level: bool);
}

/// Pin/polarity bindings consumed once at init.
#[derive(Debug, Clone)]
pub struct GpioRoles {
    pub squelch_pin: Option<u8>,
    pub ptt_pin: Option<u8>,
    pub power_pin: Option<u8>,
    pub led_pins: [Option<u8>; 3],
    pub ptt_polarity: Polarity,
    pub squelch_polarity: Polarity,
}

impl Default for GpioRoles {
    fn default() -> Self {
        Self {
            squelch_pin: None,
            ptt_pin: None,
            power_pin: None,
            led_pins: [None; 3],
            ptt_polarity: Polarity::ActiveHigh,
            squelch_polarity: Polarity::ActiveHigh,
        }
    }
}
