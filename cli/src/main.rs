use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use thiserror::Error;

use softtnc_core::hw::{SampleSource, WaveformSink};
use softtnc_core::{Fx25Mode, Modem, ModemConfig, ModemProfile};

#[derive(Debug, Error)]
enum CliError {
    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),

    #[error("modem error: {0}")]
    Modem(#[from] softtnc_core::ModemError),

    #[error("callsign '{0}' is invalid (1-6 characters, SSID 0-15)")]
    BadCallsign(String),

    #[error("WAV sample rate {got} does not match the profile's {want}")]
    SampleRateMismatch { got: u32, want: u32 },

    #[error("only mono WAV input is supported, got {0} channels")]
    NotMono(u16),
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ProfileArg {
    /// 300 baud AFSK (HF)
    Hf300,
    /// 1200 baud Bell 202 (VHF default)
    Bell202,
    /// 1200 baud V.23 tones
    V23,
    /// 9600 baud G3RUH
    G3ruh,
}

impl From<ProfileArg> for ModemProfile {
    fn from(arg: ProfileArg) -> Self {
        match arg {
            ProfileArg::Hf300 => ModemProfile::Baud300,
            ProfileArg::Bell202 => ModemProfile::Baud1200Bell202,
            ProfileArg::V23 => ModemProfile::Baud1200V23,
            ProfileArg::G3ruh => ModemProfile::Baud9600G3ruh,
        }
    }
}

#[derive(Parser)]
#[command(name = "softtnc")]
#[command(about = "Packet-radio TNC modem: AX.25/FX.25 over audio")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Encode an AX.25 UI frame to a WAV audio file
    Encode {
        /// Output WAV file
        #[arg(value_name = "OUTPUT.WAV")]
        output: PathBuf,

        /// Destination callsign (e.g. APRS)
        #[arg(long, default_value = "APRS")]
        dest: String,

        /// Source callsign (e.g. N0CALL-1)
        #[arg(long, default_value = "N0CALL")]
        source: String,

        /// Information field text
        #[arg(long, default_value = ">softtnc test transmission")]
        info: String,

        /// Modem profile
        #[arg(long, value_enum, default_value = "bell202")]
        profile: ProfileArg,

        /// FX.25 parity bytes (16, 32 or 64); plain AX.25 when omitted
        #[arg(long)]
        fx25: Option<u8>,
    },

    /// Decode AX.25 frames from a WAV audio file
    Decode {
        /// Input WAV file
        #[arg(value_name = "INPUT.WAV")]
        input: PathBuf,

        /// Modem profile
        #[arg(long, value_enum, default_value = "bell202")]
        profile: ProfileArg,
    },
}

/// Encode a callsign with optional -SSID into the shifted 7-byte AX.25
/// address field.
fn encode_address(text: &str, last: bool) -> Result<[u8; 7], CliError> {
    let (call, ssid) = match text.split_once('-') {
        Some((call, ssid)) => {
            let ssid: u8 = ssid
                .parse()
                .map_err(|_| CliError::BadCallsign(text.into()))?;
            (call, ssid)
        }
        None => (text, 0),
    };
    if call.is_empty() || call.len() > 6 || ssid > 15 {
        return Err(CliError::BadCallsign(text.into()));
    }
    let mut field = [b' ' << 1; 7];
    for (i, c) in call.bytes().enumerate() {
        field[i] = c.to_ascii_uppercase() << 1;
    }
    field[6] = 0x60 | (ssid << 1) | last as u8;
    Ok(field)
}

fn build_ui_frame(dest: &str, source: &str, info: &str) -> Result<Vec<u8>, CliError> {
    let mut frame = Vec::with_capacity(16 + info.len());
    frame.extend_from_slice(&encode_address(dest, false)?);
    frame.extend_from_slice(&encode_address(source, true)?);
    frame.push(0x03); // UI
    frame.push(0xF0); // no layer 3
    frame.extend_from_slice(info.as_bytes());
    Ok(frame)
}

/// WAV file standing in for the ADC peripheral.
struct WavSource {
    reader: WavReader<BufReader<File>>,
}

impl SampleSource for WavSource {
    fn next_sample(&mut self) -> Option<i16> {
        self.reader.samples::<i16>().next().and_then(|s| s.ok())
    }
}

/// WAV file standing in for the DAC peripheral.
struct WavSink {
    writer: WavWriter<BufWriter<File>>,
    written: usize,
    failed: bool,
}

impl WaveformSink for WavSink {
    fn write_sample(&mut self, sample: i16) {
        if self.writer.write_sample(sample).is_err() {
            self.failed = true;
        } else {
            self.written += 1;
        }
    }
}

fn fx25_mode(parity: Option<u8>) -> Result<Fx25Mode, CliError> {
    match parity {
        None => Ok(Fx25Mode::Off),
        Some(16) => Ok(Fx25Mode::Parity16),
        Some(32) => Ok(Fx25Mode::Parity32),
        Some(64) => Ok(Fx25Mode::Parity64),
        Some(other) => Err(CliError::Modem(softtnc_core::ModemError::InvalidConfig(
            format!("FX.25 parity must be 16, 32 or 64, not {}", other),
        ))),
    }
}

fn encode(
    output: &PathBuf,
    dest: &str,
    source: &str,
    info: &str,
    profile: ModemProfile,
    fx25: Fx25Mode,
) -> Result<(), CliError> {
    let config = ModemConfig {
        profile,
        fx25,
        full_duplex: true, // nothing to sense on a file
        ..ModemConfig::default()
    };
    let mut modem = Modem::new(config)?;
    let frame = build_ui_frame(dest, source, info)?;
    modem.transmit(&frame)?;
    modem.poll();

    let spec = WavSpec {
        channels: 1,
        sample_rate: profile.sample_rate(),
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    let mut sink = WavSink {
        writer: WavWriter::create(output, spec)?,
        written: 0,
        failed: false,
    };
    while let Some(sample) = modem.tx_tick() {
        sink.write_sample(sample);
    }
    if sink.failed {
        return Err(CliError::Wav(hound::Error::IoError(std::io::Error::other(
            "short write",
        ))));
    }
    let written = sink.written;
    sink.writer.finalize()?;
    log::info!("wrote {} samples to {}", written, output.display());
    println!(
        "{} -> {}: {} samples ({:.2} s)",
        source,
        dest,
        written,
        written as f32 / profile.sample_rate() as f32
    );
    Ok(())
}

fn decode(input: &PathBuf, profile: ModemProfile) -> Result<(), CliError> {
    let reader = WavReader::open(input)?;
    let spec = reader.spec();
    if spec.sample_rate != profile.sample_rate() {
        return Err(CliError::SampleRateMismatch {
            got: spec.sample_rate,
            want: profile.sample_rate(),
        });
    }
    if spec.channels != 1 {
        return Err(CliError::NotMono(spec.channels));
    }

    let config = ModemConfig {
        profile,
        ..ModemConfig::default()
    };
    let mut modem = Modem::new(config)?;
    let producer = modem.producer();
    let mut source = WavSource { reader };

    let mut frames = Vec::new();
    let mut pending = 0usize;
    while let Some(sample) = source.next_sample() {
        producer.push(sample);
        pending += 1;
        if pending >= 512 {
            frames.extend(modem.poll());
            pending = 0;
        }
    }
    for _ in 0..4096 {
        producer.push(0);
    }
    frames.extend(modem.poll());

    let status = modem.status();
    for (i, frame) in frames.iter().enumerate() {
        println!("frame {}: {} bytes", i + 1, frame.len());
        println!("  hex: {}", to_hex(frame.bytes()));
        println!("  txt: {}", printable(frame.bytes()));
    }
    println!(
        "{} frame(s), {} via FX.25, {} CRC reject(s), {} FEC failure(s)",
        status.counters.rx_frames,
        status.counters.rx_fx25,
        status.counters.crc_errors,
        status.counters.fec_failures
    );
    Ok(())
}

fn to_hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

fn printable(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|&b| {
            if (0x20..0x7F).contains(&b) {
                b as char
            } else {
                '.'
            }
        })
        .collect()
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Encode {
            output,
            dest,
            source,
            info,
            profile,
            fx25,
        } => fx25_mode(fx25)
            .and_then(|mode| encode(&output, &dest, &source, &info, profile.into(), mode)),
        Commands::Decode { input, profile } => decode(&input, profile.into()),
    };
    if let Err(err) = result {
        eprintln!("error: {}", err);
        std::process::exit(1);
    }
}
