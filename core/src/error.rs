use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModemError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Frame too short")]
    FrameTooShort,

    #[error("Frame too long for FEC block")]
    FrameTooLong,

    #[error("FCS mismatch")]
    FcsMismatch,

    #[error("Reed-Solomon decode failure")]
    FecDecodeFailure,

    #[error("No frame recovered from FEC block")]
    FecNoFrame,

    #[error("Transmit queue full")]
    TxQueueFull,

    #[error("Invalid input size")]
    InvalidInputSize,
}

pub type Result<T> = std::result::Result<T, ModemError>;
