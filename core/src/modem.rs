//! The modem facade: owns the full receive pipeline, the transmit
//! scheduler, and the per-port state.
//!
//! The embedding calls `poll()` periodically from its task context; the
//! acquisition interrupt pushes into the handle from `producer()`, and
//! the output-timer interrupt pulls samples with `tx_tick()` while a
//! transmission is keyed.

use std::collections::VecDeque;

use crate::agc::{block_rms, Agc};
use crate::carrier::CarrierDetect;
use crate::channel::{ChannelControlBlock, PortCounters};
use crate::config::ModemConfig;
use crate::decimate::FirDecimator;
use crate::demod::{demodulator_for, Demodulator};
use crate::error::{ModemError, Result};
use crate::fx25::{Fx25Codec, Unwrapped};
use crate::hdlc::{append_fcs, check_fcs, Ax25Frame, Deframer};
use crate::hw::{GpioRoles, PttLine};
use crate::ptt::{LedState, PttControl, StatusLed};
use crate::ring::{SampleProducer, SampleRing};
use crate::tx::{build_line_bits, ChannelAccess, FrameRenderer};

/// Poll ticks (one per block) the LED holds a state.
const LED_HOLD_TICKS: u32 = 5;

/// Snapshot of the modem's observable state for the telemetry layer.
#[derive(Debug, Clone)]
pub struct ModemStatus {
    pub carrier_detect: bool,
    pub agc_gain: f32,
    /// DC offset of the ADC stream, in counts.
    pub dc_offset: f32,
    /// Last squelch RMS estimate in millivolts.
    pub cd_level_mv: f32,
    pub transmitting: bool,
    pub led: LedState,
    pub counters: PortCounters,
    pub dropped_samples: u64,
    pub ring_len: usize,
}

/// PTT line for targets without one (or before GPIO binding).
struct NullPttLine;

impl PttLine for NullPttLine {
    fn set_level(&mut self, _level: bool) {}
}

pub struct Modem {
    config: ModemConfig,
    ring: SampleRing,
    tcb: ChannelControlBlock,
    agc: Agc,
    decimator: Option<FirDecimator>,
    carrier: CarrierDetect,
    demod: Box<dyn Demodulator>,
    deframer: Deframer,
    fx25: Fx25Codec,
    access: ChannelAccess,
    tx_queue: VecDeque<Vec<u8>>,
    renderer: Option<FrameRenderer>,
    ptt: PttControl,
    ptt_line: Box<dyn PttLine>,
    led: StatusLed,
}

impl Modem {
    pub fn new(config: ModemConfig) -> Result<Self> {
        config.validate()?;
        let profile = config.profile;
        let decimator = match profile.resample_ratio() {
            1 => None,
            ratio => Some(FirDecimator::new(ratio)),
        };
        let carrier = CarrierDetect::new(
            config.cd_assert_mv,
            config.cd_deassert_mv,
            config.adc_vref_mv,
            profile.working_rate(),
            profile.squelchless(),
        );
        Ok(Self {
            ring: SampleRing::new(),
            tcb: ChannelControlBlock::new(
                config.full_duplex,
                config.slot_time,
                config.tx_delay,
                config.persist,
            ),
            agc: Agc::new(config.agc.clone()),
            decimator,
            carrier,
            demod: demodulator_for(profile),
            deframer: Deframer::new(),
            fx25: Fx25Codec::new(),
            access: ChannelAccess::new(&config),
            tx_queue: VecDeque::new(),
            renderer: None,
            ptt: PttControl::new(Default::default()),
            ptt_line: Box::new(NullPttLine),
            led: StatusLed::new(LED_HOLD_TICKS),
            config,
        })
    }

    /// Bind the GPIO roles and PTT driver. Consumed once at init.
    pub fn bind_gpio(&mut self, roles: GpioRoles, ptt_line: Box<dyn PttLine>) {
        self.ptt = PttControl::new(roles.ptt_polarity);
        self.ptt_line = ptt_line;
    }

    /// Handle for the acquisition interrupt context.
    pub fn producer(&self) -> SampleProducer {
        self.ring.producer()
    }

    pub fn config(&self) -> &ModemConfig {
        &self.config
    }

    /// Replace the configuration. Validation happens before any state is
    /// touched; on error the modem is unchanged. The ring buffer (and
    /// the producer handles pointing at it) survives, but all filter,
    /// demodulator and framing state is rebuilt and counters are kept.
    pub fn configure(&mut self, config: ModemConfig) -> Result<()> {
        config.validate()?;
        let profile = config.profile;

        self.decimator = match profile.resample_ratio() {
            1 => None,
            ratio => Some(FirDecimator::new(ratio)),
        };
        self.carrier = CarrierDetect::new(
            config.cd_assert_mv,
            config.cd_deassert_mv,
            config.adc_vref_mv,
            profile.working_rate(),
            profile.squelchless(),
        );
        self.agc = Agc::new(config.agc.clone());
        self.demod = demodulator_for(profile);
        self.deframer = Deframer::new();
        self.access = ChannelAccess::new(&config);
        let counters = self.tcb.counters;
        self.tcb = ChannelControlBlock::new(
            config.full_duplex,
            config.slot_time,
            config.tx_delay,
            config.persist,
        );
        self.tcb.counters = counters;
        self.ring.drain();
        self.renderer = None;
        self.ptt.unkey(self.ptt_line.as_mut());
        self.config = config;
        Ok(())
    }

    /// Queue a frame (link-layer bytes, no FCS) for transmission. The
    /// FCS is appended here and the FX.25 envelope applied when the
    /// configured mode asks for it.
    pub fn transmit(&mut self, frame: &[u8]) -> Result<()> {
        let wire = append_fcs(frame);
        let body = match self.config.fx25.parity() {
            Some(_) => self.fx25.wrap(&wire, self.config.fx25)?,
            None => wire,
        };
        self.enqueue(body)
    }

    /// Queue a frame without FX.25 wrapping regardless of mode, for
    /// repeated traffic whose envelope must pass through untouched.
    pub fn transmit_plain(&mut self, frame: &[u8]) -> Result<()> {
        self.enqueue(append_fcs(frame))
    }

    fn enqueue(&mut self, body: Vec<u8>) -> Result<()> {
        if self.tx_queue.len() >= self.config.tx_queue_depth {
            return Err(ModemError::TxQueueFull);
        }
        self.tx_queue.push_back(body);
        Ok(())
    }

    /// Drain and process buffered samples; returns the frames decoded
    /// during this poll. Also advances transmit scheduling.
    pub fn poll(&mut self) -> Vec<Ax25Frame> {
        let block_size = self.config.profile.block_size();
        let block_ms =
            block_size as f32 * 1000.0 / self.config.profile.sample_rate() as f32;
        let mut frames = Vec::new();
        let mut elapsed_ms = 0.0f32;

        while self.ring.len() >= block_size {
            let mut raw = Vec::with_capacity(block_size);
            while raw.len() < block_size {
                match self.ring.pop() {
                    Some(s) => raw.push(s),
                    None => break,
                }
            }
            elapsed_ms += block_ms;
            // While keyed, a half-duplex port would only hear its own
            // carrier; full duplex keeps receiving.
            if self.ptt.receive_inhibited() && !self.config.full_duplex {
                continue;
            }
            self.process_block(&raw, &mut frames);
        }

        self.schedule_tx(elapsed_ms);
        self.update_led();
        frames
    }

    fn process_block(&mut self, raw: &[i16], frames: &mut Vec<Ax25Frame>) {
        let mut block = self.tcb.center_block(raw);
        self.agc.process(&mut block);
        let working = match self.decimator.as_mut() {
            Some(d) => d.process(&block),
            None => block,
        };

        self.carrier.process(&working);
        self.tcb.cd_level_mv = self.carrier.level_mv();
        self.tcb.cd_counter = self.carrier.counter();
        if !self.carrier.active() {
            return;
        }

        let rms = block_rms(&working);
        for &sample in &working {
            let Some(bit) = self.demod.process(sample, rms) else {
                continue;
            };
            let Some(capture) = self.deframer.push_bit(bit) else {
                continue;
            };
            if let Some(frame) = self.handle_capture(capture) {
                frames.push(frame);
            }
        }
    }

    fn handle_capture(&mut self, capture: Vec<u8>) -> Option<Ax25Frame> {
        let counters = &mut self.tcb.counters;
        match self.fx25.unwrap(&capture) {
            Ok(Unwrapped::Plain(bytes)) => match check_fcs(&bytes) {
                Ok(frame) => {
                    counters.rx_frames += 1;
                    log::debug!("frame received, {} bytes", frame.len());
                    Some(frame)
                }
                Err(_) => {
                    counters.crc_errors += 1;
                    None
                }
            },
            Ok(Unwrapped::Corrected { capture, symbols_fixed }) => match check_fcs(&capture) {
                Ok(frame) => {
                    counters.rx_frames += 1;
                    counters.rx_fx25 += 1;
                    log::debug!(
                        "FX.25 frame received, {} bytes, {} symbol(s) repaired",
                        frame.len(),
                        symbols_fixed
                    );
                    Some(frame)
                }
                Err(_) => {
                    counters.crc_errors += 1;
                    None
                }
            },
            Err(_) => {
                counters.fec_failures += 1;
                None
            }
        }
    }

    fn schedule_tx(&mut self, elapsed_ms: f32) {
        if self.renderer.is_some() || self.tx_queue.is_empty() {
            return;
        }
        let busy = self.carrier.active();
        if self.access.update(busy, elapsed_ms) {
            let Some(body) = self.tx_queue.pop_front() else {
                return;
            };
            let line = build_line_bits(&body, &self.config);
            self.renderer = Some(FrameRenderer::new(line, self.config.profile));
            self.ptt.key(self.ptt_line.as_mut());
            if !self.config.full_duplex {
                self.ring.drain();
            }
            self.tcb.counters.tx_frames += 1;
        }
    }

    /// Output-timer entry: the next DAC sample while transmitting, or
    /// `None` when idle (the embedding stops the timer).
    pub fn tx_tick(&mut self) -> Option<i16> {
        let renderer = self.renderer.as_mut()?;
        match renderer.next_sample() {
            Some(sample) => Some(sample),
            None => {
                self.renderer = None;
                self.ptt.unkey(self.ptt_line.as_mut());
                self.access.reset();
                None
            }
        }
    }

    pub fn transmitting(&self) -> bool {
        self.renderer.is_some()
    }

    fn update_led(&mut self) {
        let state = if self.ptt.keyed() {
            LedState::Transmitting
        } else if self.carrier.active() && !self.config.profile.squelchless() {
            LedState::Receiving
        } else {
            LedState::Idle
        };
        self.led.request(state);
        self.led.tick();
    }

    pub fn status(&self) -> ModemStatus {
        ModemStatus {
            carrier_detect: self.carrier.active(),
            agc_gain: self.agc.gain(),
            dc_offset: self.tcb.dc_offset(),
            cd_level_mv: self.tcb.cd_level_mv,
            transmitting: self.renderer.is_some(),
            led: self.led.state(),
            counters: self.tcb.counters,
            dropped_samples: self.ring.dropped(),
            ring_len: self.ring.len(),
        }
    }
}
