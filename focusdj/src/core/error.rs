//! Error taxonomy shared by every component.

use thiserror::Error;

pub type Result<T, E = FocusError> = std::result::Result<T, E>;

#[derive(Clone, Debug, Error, PartialEq)]
pub enum FocusError {
    /// A prompt id that was never part of the session.
    #[error("unknown channel: {0}")]
    UnknownChannel(String),

    /// A weight that is not a finite number, or (for structured input such as
    /// an inference response) one outside `[0.0, 2.0]`.
    #[error("invalid weight for {channel}: {value}")]
    InvalidWeight { channel: String, value: f64 },

    /// The platform denied MIDI access, has no MIDI support, or the requested
    /// input does not exist.
    #[error("MIDI unavailable: {0}")]
    MidiUnavailable(String),

    #[error("an intent sync is already in flight")]
    SyncAlreadyInFlight,

    /// The inference response did not have the shape `{ text: number }`.
    #[error("inference response schema violation: {0}")]
    SchemaViolation(String),

    #[error("inference request failed: {0}")]
    NetworkFailure(String),

    #[error("configuration error: {0}")]
    Config(String),

    /// A console line that could not be understood.
    #[error("{0}")]
    Usage(String),

    #[error("io error: {0}")]
    Io(String),
}

impl From<std::io::Error> for FocusError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}
