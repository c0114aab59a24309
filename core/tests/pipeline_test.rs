//! End-to-end pipeline tests: synthesized audio through the full
//! acquisition -> AGC -> carrier detect -> demodulation -> framing ->
//! FX.25 chain, for every profile.

use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};

use softtnc_core::hdlc::Ax25Frame;
use softtnc_core::{Fx25Mode, Modem, ModemConfig, ModemProfile};

/// Minimal UI frame: dest APRS-0, src N0CALL-0, control 0x03, PID 0xF0.
fn ui_frame(payload: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(&[0x82, 0xA0, 0xA4, 0xA6, 0x40, 0x40, 0x60]);
    body.extend_from_slice(&[0x9C, 0x60, 0x86, 0x82, 0x98, 0x98, 0xE1]);
    body.push(0x03);
    body.push(0xF0);
    body.extend_from_slice(payload);
    body
}

fn config_for(profile: ModemProfile) -> ModemConfig {
    ModemConfig {
        profile,
        ..ModemConfig::default()
    }
}

/// Render one transmission to audio using a full-duplex transmit modem.
fn render_transmission(mut config: ModemConfig, frame: &[u8]) -> Vec<i16> {
    config.full_duplex = true;
    let mut modem = Modem::new(config).unwrap();
    modem.transmit(frame).unwrap();
    modem.poll();
    assert!(modem.transmitting());
    let mut samples = Vec::new();
    while let Some(s) = modem.tx_tick() {
        samples.push(s);
    }
    samples
}

/// Feed audio into a receive modem in interrupt-sized chunks, polling
/// between them the way the embedding task would.
fn receive_audio(modem: &mut Modem, samples: &[i16]) -> Vec<Ax25Frame> {
    let producer = modem.producer();
    let mut frames = Vec::new();
    for chunk in samples.chunks(512) {
        for &s in chunk {
            producer.push(s);
        }
        frames.extend(modem.poll());
    }
    // A few blocks of silence flush the squelch decay paths
    for _ in 0..5 {
        for _ in 0..768 {
            producer.push(0);
        }
        frames.extend(modem.poll());
    }
    frames
}

#[test]
fn test_bell202_end_to_end() {
    let frame = ui_frame(b"TEST");
    let audio = render_transmission(config_for(ModemProfile::Baud1200Bell202), &frame);

    let mut rx = Modem::new(config_for(ModemProfile::Baud1200Bell202)).unwrap();
    let frames = receive_audio(&mut rx, &audio);
    assert_eq!(frames.len(), 1, "expected exactly one decoded frame");
    assert_eq!(frames[0].bytes(), &frame[..]);

    let status = rx.status();
    assert_eq!(status.counters.rx_frames, 1);
    assert_eq!(status.counters.rx_fx25, 0);
    assert_eq!(status.counters.crc_errors, 0);
    assert_eq!(status.dropped_samples, 0);
}

#[test]
fn test_v23_end_to_end() {
    let frame = ui_frame(b">V.23 tone pair check");
    let audio = render_transmission(config_for(ModemProfile::Baud1200V23), &frame);
    let mut rx = Modem::new(config_for(ModemProfile::Baud1200V23)).unwrap();
    let frames = receive_audio(&mut rx, &audio);
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].bytes(), &frame[..]);
}

#[test]
fn test_baud300_end_to_end_exercises_decimator() {
    let frame = ui_frame(b">HF path");
    let audio = render_transmission(config_for(ModemProfile::Baud300), &frame);
    let mut rx = Modem::new(config_for(ModemProfile::Baud300)).unwrap();
    let frames = receive_audio(&mut rx, &audio);
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].bytes(), &frame[..]);
}

#[test]
fn test_g3ruh_end_to_end() {
    let frame = ui_frame(b">9600 scrambled NRZI");
    let audio = render_transmission(config_for(ModemProfile::Baud9600G3ruh), &frame);
    let mut rx = Modem::new(config_for(ModemProfile::Baud9600G3ruh)).unwrap();
    let frames = receive_audio(&mut rx, &audio);
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].bytes(), &frame[..]);
}

#[test]
fn test_fx25_end_to_end() {
    let frame = ui_frame(b"!4903.50N/07201.75W-FEC path");
    let mut tx_config = config_for(ModemProfile::Baud1200Bell202);
    tx_config.fx25 = Fx25Mode::Parity32;
    let audio = render_transmission(tx_config, &frame);

    // Receiver has FX.25 transmit mode off; reception is always tag-aware
    let mut rx = Modem::new(config_for(ModemProfile::Baud1200Bell202)).unwrap();
    let frames = receive_audio(&mut rx, &audio);
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].bytes(), &frame[..]);
    let status = rx.status();
    assert_eq!(status.counters.rx_frames, 1);
    assert_eq!(status.counters.rx_fx25, 1);
}

#[test]
fn test_bell202_survives_noise_and_level_changes() {
    let frame = ui_frame(b"noise robustness");
    let audio = render_transmission(config_for(ModemProfile::Baud1200Bell202), &frame);

    let mut rng = StdRng::seed_from_u64(0xD1A1);
    let noise = Normal::new(0.0f32, 800.0).unwrap();
    for scale in [1.0f32, 0.4, 0.15] {
        let noisy: Vec<i16> = audio
            .iter()
            .map(|&s| {
                let v = s as f32 * scale + noise.sample(&mut rng);
                v.clamp(i16::MIN as f32, i16::MAX as f32) as i16
            })
            .collect();
        let mut rx = Modem::new(config_for(ModemProfile::Baud1200Bell202)).unwrap();
        let frames = receive_audio(&mut rx, &noisy);
        assert_eq!(frames.len(), 1, "lost frame at scale {}", scale);
        assert_eq!(frames[0].bytes(), &frame[..]);
    }
}

#[test]
fn test_corrupted_audio_yields_no_frame() {
    let frame = ui_frame(b"about to be mangled");
    let mut audio = render_transmission(config_for(ModemProfile::Baud1200Bell202), &frame);
    // Blank out a stretch in the middle of the body
    let start = audio.len() * 2 / 3;
    for s in audio[start..start + 2000].iter_mut() {
        *s = 0;
    }
    let mut rx = Modem::new(config_for(ModemProfile::Baud1200Bell202)).unwrap();
    let frames = receive_audio(&mut rx, &audio);
    assert!(frames.is_empty(), "mangled audio must not decode");
}

#[test]
fn test_dc_offset_rejected() {
    let frame = ui_frame(b"offset input");
    let audio = render_transmission(config_for(ModemProfile::Baud1200Bell202), &frame);
    let offset: Vec<i16> = audio.iter().map(|&s| s.saturating_add(2500)).collect();
    let mut rx = Modem::new(config_for(ModemProfile::Baud1200Bell202)).unwrap();
    let frames = receive_audio(&mut rx, &offset);
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].bytes(), &frame[..]);
    // The tracker converged on the injected offset
    assert!((rx.status().dc_offset - 2500.0).abs() < 300.0);
}

#[test]
fn test_back_to_back_transmissions() {
    let first = ui_frame(b"frame one");
    let second = ui_frame(b"frame two, different length");
    let mut audio = render_transmission(config_for(ModemProfile::Baud1200Bell202), &first);
    audio.extend(render_transmission(
        config_for(ModemProfile::Baud1200Bell202),
        &second,
    ));

    let mut rx = Modem::new(config_for(ModemProfile::Baud1200Bell202)).unwrap();
    let frames = receive_audio(&mut rx, &audio);
    assert_eq!(frames.len(), 2);
    assert_eq!(frames[0].bytes(), &first[..]);
    assert_eq!(frames[1].bytes(), &second[..]);
    assert_eq!(rx.status().counters.rx_frames, 2);
}

#[test]
fn test_carrier_detect_follows_signal() {
    let frame = ui_frame(b"dcd check");
    let audio = render_transmission(config_for(ModemProfile::Baud1200Bell202), &frame);
    let mut rx = Modem::new(config_for(ModemProfile::Baud1200Bell202)).unwrap();
    let producer = rx.producer();

    // Silence first: no carrier
    for _ in 0..4 {
        for _ in 0..768 {
            producer.push(0);
        }
        rx.poll();
    }
    assert!(!rx.status().carrier_detect);

    // Signal asserts it
    for chunk in audio.chunks(512) {
        for &s in chunk {
            producer.push(s);
        }
        rx.poll();
    }
    assert!(rx.status().carrier_detect);
    assert!(rx.status().cd_level_mv > 100.0);

    // Long silence decays it back down
    for _ in 0..120 {
        for _ in 0..768 {
            producer.push(0);
        }
        rx.poll();
    }
    assert!(!rx.status().carrier_detect);
}
