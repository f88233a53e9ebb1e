//! Error types for pada-io

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// pada-io error types
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No device selected, or the link could not be opened
    #[error("Link unavailable: {0}")]
    LinkUnavailable(String),

    /// Operation attempted while the session is closed
    #[error("Not connected")]
    NotConnected,

    /// The link has no usable write path
    #[error("Link is not writable")]
    NotWritable,

    /// `OK: GET` never arrived; the records received were still applied
    #[error("Load incomplete: completion token missing ({records} records applied)")]
    LoadIncomplete {
        /// Number of button records applied before the window closed
        records: usize,
    },

    /// A `SET` or `SAVE` send was rejected mid-sequence
    #[error("Partial write failure after slot {}: {reason}", display_index(.last_succeeded))]
    PartialWriteFailure {
        /// Highest slot index whose `SET` was sent, `None` if none were
        last_succeeded: Option<usize>,
        /// Underlying send failure
        reason: String,
    },

    /// Invalid parameter
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Serial port error
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

fn display_index(index: &Option<usize>) -> String {
    match index {
        Some(i) => i.to_string(),
        None => "none".to_string(),
    }
}

impl From<toml::de::Error> for Error {
    fn from(e: toml::de::Error) -> Self {
        Error::Config(e.to_string())
    }
}

impl From<toml::ser::Error> for Error {
    fn from(e: toml::ser::Error) -> Self {
        Error::Config(e.to_string())
    }
}
