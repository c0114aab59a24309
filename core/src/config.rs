use crate::error::{ModemError, Result};

/// Baud-rate profiles supported by the modem.
///
/// Each profile fixes the acquisition rate, the working rate after
/// decimation, and the tone/line-code convention. Selecting a profile
/// replaces the modem's buffers and filter state wholesale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModemProfile {
    /// 300 baud AFSK for HF (1600/1800 Hz tones).
    Baud300,
    /// 1200 baud Bell 202 AFSK (1200/2200 Hz tones). The VHF default.
    Baud1200Bell202,
    /// 1200 baud with V.23 tone pair (1300/2100 Hz).
    Baud1200V23,
    /// 9600 baud G3RUH direct FSK (scrambled NRZI, flat audio required).
    Baud9600G3ruh,
}

impl ModemProfile {
    /// ADC acquisition rate in Hz.
    pub fn sample_rate(&self) -> u32 {
        38_400
    }

    /// Integer decimation ratio from acquisition rate to working rate.
    pub fn resample_ratio(&self) -> usize {
        match self {
            ModemProfile::Baud300 => 4,
            _ => 1,
        }
    }

    /// Working rate the demodulator runs at.
    pub fn working_rate(&self) -> u32 {
        self.sample_rate() / self.resample_ratio() as u32
    }

    /// Symbol rate in baud.
    pub fn baud(&self) -> u32 {
        match self {
            ModemProfile::Baud300 => 300,
            ModemProfile::Baud1200Bell202 | ModemProfile::Baud1200V23 => 1200,
            ModemProfile::Baud9600G3ruh => 9600,
        }
    }

    /// Acquisition samples consumed per poll cycle. Always a multiple of
    /// the resample ratio so decimated blocks stay whole, and always
    /// smaller than the ring capacity so a block can actually accumulate.
    pub fn block_size(&self) -> usize {
        match self {
            ModemProfile::Baud300 => 1152,
            _ => 768,
        }
    }

    /// Working samples per symbol period.
    pub fn samples_per_bit(&self) -> usize {
        (self.working_rate() / self.baud()) as usize
    }

    /// Mark/space tone pair in Hz, or `None` for direct FSK.
    pub fn tones(&self) -> Option<(f32, f32)> {
        match self {
            ModemProfile::Baud300 => Some((1600.0, 1800.0)),
            ModemProfile::Baud1200Bell202 => Some((1200.0, 2200.0)),
            ModemProfile::Baud1200V23 => Some((1300.0, 2100.0)),
            ModemProfile::Baud9600G3ruh => None,
        }
    }

    /// Whether the profile needs an unfiltered (flat) audio path.
    pub fn flat_audio(&self) -> bool {
        matches!(self, ModemProfile::Baud9600G3ruh)
    }

    /// Direct-FSK profiles carry no analog squelch information, so the
    /// carrier detector treats them as always open.
    pub fn squelchless(&self) -> bool {
        matches!(self, ModemProfile::Baud9600G3ruh)
    }
}

/// FX.25 transmit-side mode. Reception always recognizes FX.25.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Fx25Mode {
    /// Transmit plain AX.25.
    #[default]
    Off,
    /// Wrap with 16 parity bytes.
    Parity16,
    /// Wrap with 32 parity bytes.
    Parity32,
    /// Wrap with 64 parity bytes.
    Parity64,
}

impl Fx25Mode {
    pub fn parity(&self) -> Option<usize> {
        match self {
            Fx25Mode::Off => None,
            Fx25Mode::Parity16 => Some(16),
            Fx25Mode::Parity32 => Some(32),
            Fx25Mode::Parity64 => Some(64),
        }
    }
}

/// AGC tuning constants. See `agc::Agc` for the update law.
#[derive(Debug, Clone)]
pub struct AgcConfig {
    /// Target block RMS after scaling.
    pub target_rms: f32,
    /// Rate applied when gain must come down (signal too hot).
    pub attack: f32,
    /// Rate applied when gain may creep up (signal too quiet).
    pub release: f32,
    pub min_gain: f32,
    pub max_gain: f32,
}

impl Default for AgcConfig {
    fn default() -> Self {
        Self {
            target_rms: 0.2,
            attack: 0.02,
            release: 0.001,
            min_gain: 0.1,
            max_gain: 10.0,
        }
    }
}

/// Complete modem configuration. Owned by the `Modem` instance; a
/// reconfiguration replaces the instance's working state atomically
/// rather than mutating anything a producer context can observe.
#[derive(Debug, Clone)]
pub struct ModemConfig {
    pub profile: ModemProfile,
    pub fx25: Fx25Mode,
    /// Preamble duration in 10 ms units (AX.25 TXDELAY).
    pub tx_delay: u32,
    /// Tail duration in 10 ms units (AX.25 TXTAIL).
    pub tx_tail: u32,
    /// Slot time in 10 ms units.
    pub slot_time: u32,
    /// p-persistence parameter: transmit when an 8-bit dice roll is <= this.
    pub persist: u8,
    /// Full-duplex channels transmit without sensing the channel.
    pub full_duplex: bool,
    /// Carrier-detect assert threshold in millivolts RMS.
    pub cd_assert_mv: f32,
    /// Carrier-detect deassert threshold in millivolts RMS.
    pub cd_deassert_mv: f32,
    /// ADC full-scale reference in millivolts (counts -> mV calibration).
    pub adc_vref_mv: f32,
    pub agc: AgcConfig,
    /// Bound on queued outgoing frames.
    pub tx_queue_depth: usize,
}

impl Default for ModemConfig {
    fn default() -> Self {
        Self {
            profile: ModemProfile::Baud1200Bell202,
            fx25: Fx25Mode::Off,
            tx_delay: 30,
            tx_tail: 5,
            slot_time: 10,
            persist: 63,
            full_duplex: false,
            cd_assert_mv: 20.0,
            cd_deassert_mv: 10.0,
            adc_vref_mv: 3300.0,
            agc: AgcConfig::default(),
            tx_queue_depth: 8,
        }
    }
}

impl ModemConfig {
    /// Reject invalid parameter combinations before any state is touched.
    pub fn validate(&self) -> Result<()> {
        if self.tx_delay == 0 || self.tx_delay > 255 {
            return Err(ModemError::InvalidConfig(format!(
                "tx_delay {} out of range 1..=255",
                self.tx_delay
            )));
        }
        if self.tx_tail > 255 {
            return Err(ModemError::InvalidConfig(format!(
                "tx_tail {} out of range 0..=255",
                self.tx_tail
            )));
        }
        if self.slot_time == 0 || self.slot_time > 255 {
            return Err(ModemError::InvalidConfig(format!(
                "slot_time {} out of range 1..=255",
                self.slot_time
            )));
        }
        if self.cd_deassert_mv > self.cd_assert_mv {
            return Err(ModemError::InvalidConfig(
                "deassert threshold above assert threshold".into(),
            ));
        }
        if self.adc_vref_mv <= 0.0 {
            return Err(ModemError::InvalidConfig("adc_vref_mv must be positive".into()));
        }
        let agc = &self.agc;
        if agc.min_gain <= 0.0 || agc.max_gain < agc.min_gain {
            return Err(ModemError::InvalidConfig("bad AGC gain bounds".into()));
        }
        if agc.target_rms <= 0.0 {
            return Err(ModemError::InvalidConfig("AGC target RMS must be positive".into()));
        }
        if !(0.0..=1.0).contains(&agc.attack) || !(0.0..=1.0).contains(&agc.release) {
            return Err(ModemError::InvalidConfig("AGC rates must be in [0, 1]".into()));
        }
        if self.tx_queue_depth == 0 {
            return Err(ModemError::InvalidConfig("tx_queue_depth must be nonzero".into()));
        }
        Ok(())
    }
}
