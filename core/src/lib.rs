//! Software TNC modem and link-framing engine
//!
//! Demodulates received audio into AX.25 packets and modulates outgoing
//! packets back into audio, optionally wrapped in FX.25 forward error
//! correction. The receive chain is: sample ring buffer -> DC removal ->
//! AGC -> decimation -> carrier detect -> demodulator -> HDLC capture ->
//! FX.25 unwrap. The transmit chain runs the other way: FX.25 wrap ->
//! bit stuffing -> NRZI -> tone synthesis, gated by p-persistence
//! channel access.

pub mod agc;
pub mod carrier;
pub mod channel;
pub mod config;
pub mod dds;
pub mod decimate;
pub mod demod;
pub mod error;
pub mod fx25;
pub mod hdlc;
pub mod hw;
pub mod modem;
pub mod ptt;
pub mod ring;
pub mod rs;
pub mod tx;

pub use config::{AgcConfig, Fx25Mode, ModemConfig, ModemProfile};
pub use error::{ModemError, Result};
pub use hdlc::Ax25Frame;
pub use modem::{Modem, ModemStatus};
pub use ring::SampleProducer;
