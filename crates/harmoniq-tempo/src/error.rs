use thiserror::Error;

/// Errors raised while building or editing a tempo map.
///
/// Conversion queries never return these; they extrapolate instead.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum TempoMapError {
    #[error("illegal musical position {bar}|{beat}|{tick}")]
    IllegalPosition { bar: u32, beat: u32, tick: u32 },
    #[error("an entry already exists at {0}")]
    DuplicateAnchor(String),
    #[error("invalid anchor: {0}")]
    InvalidAnchor(&'static str),
    #[error("no entry at {0}")]
    NoSuchAnchor(String),
    #[error("invalid tempo: {0} bpm")]
    InvalidTempo(f64),
    #[error("invalid meter {beats_per_bar}/{note_value}")]
    InvalidMeter { beats_per_bar: u32, note_value: u32 },
    #[error("invalid sample rate {0}")]
    InvalidSampleRate(u32),
    #[error("invalid tempo map configuration: {0}")]
    Config(String),
}

impl TempoMapError {
    pub(crate) fn duplicate(at: impl std::fmt::Display) -> Self {
        TempoMapError::DuplicateAnchor(at.to_string())
    }

    pub(crate) fn missing(at: impl std::fmt::Display) -> Self {
        TempoMapError::NoSuchAnchor(at.to_string())
    }

    pub(crate) fn illegal(bar: u32, beat: u32, tick: u32) -> Self {
        TempoMapError::IllegalPosition { bar, beat, tick }
    }
}

pub type Result<T, E = TempoMapError> = std::result::Result<T, E>;
