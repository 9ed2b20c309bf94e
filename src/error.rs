use thiserror::Error;

/// Errors raised while acquiring, encoding or forwarding receiver data.
#[derive(Debug, Error)]
pub enum Error {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serial port error: {0}")]
    SerialPort(#[from] serialport::Error),

    /// Payload of a known message is shorter than its layout requires.
    #[error("malformed {name} (0x{id:04X}): {actual} bytes, {expected} required")]
    Malformed {
        name: &'static str,
        id: u16,
        expected: usize,
        actual: usize,
    },

    #[error("unknown configuration name \"{0}\"")]
    UnknownConfigName(String),

    #[error("'{0}' is not a valid layer, must be 'ram', 'bbr', 'flash' or 'default'")]
    InvalidLayer(String),

    #[error("invalid value \"{value}\" for {name}")]
    InvalidConfigValue { name: String, value: String },

    #[error("configuration file error: {0}")]
    ConfigFile(#[from] ini::Error),

    #[error("no [{0}] section in configuration file")]
    MissingSection(String),

    #[error("receiver rejected message 0x{0:04X}")]
    Nak(u16),

    #[error("no acknowledgment for message 0x{0:04X}")]
    NoAck(u16),

    #[error("empty batch")]
    EmptyBatch,

    /// Payload too large for its length field.
    #[error("{size} bytes payload exceeds the {max} bytes limit")]
    Oversized { size: usize, max: usize },

    #[error("GPS week out of range")]
    WeekOutOfRange,

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("collector replied {0}, expecting 201 Created")]
    UnexpectedStatus(reqwest::StatusCode),

    #[error("token signature error: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),

    #[error("system time error: {0}")]
    Time(#[from] hifitime::HifitimeError),

    #[error("{0} queue lock poisoned")]
    Poisoned(&'static str),
}

pub type Result<T> = std::result::Result<T, Error>;
