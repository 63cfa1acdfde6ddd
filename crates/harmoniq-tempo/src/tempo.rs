use serde::{Deserialize, Serialize};

use crate::bbt::TICKS_PER_BEAT;
use crate::error::{Result, TempoMapError};

pub const MIN_BPM: f64 = 1.0;
pub const MAX_BPM: f64 = 1000.0;

/// Fastest tempo at which one tick still spans at least one sample.
#[inline]
pub fn max_bpm_at(sample_rate: u32) -> f64 {
    f64::from(sample_rate) * 60.0 / f64::from(TICKS_PER_BEAT)
}

/// Speed of musical time in beats per minute. A beat is one division of the
/// meter in force.
///
/// A ramped tempo moves linearly from `start_bpm` to `end_bpm` as a function
/// of elapsed beats, reaching `end_bpm` where the next tempo entry starts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Tempo {
    Constant { bpm: f64 },
    Ramped { start_bpm: f64, end_bpm: f64 },
}

impl Tempo {
    pub fn constant(bpm: f64) -> Self {
        Tempo::Constant { bpm }
    }

    pub fn ramped(start_bpm: f64, end_bpm: f64) -> Self {
        Tempo::Ramped { start_bpm, end_bpm }
    }

    #[inline]
    pub fn start_bpm(&self) -> f64 {
        match *self {
            Tempo::Constant { bpm } => bpm,
            Tempo::Ramped { start_bpm, .. } => start_bpm,
        }
    }

    #[inline]
    pub fn end_bpm(&self) -> f64 {
        match *self {
            Tempo::Constant { bpm } => bpm,
            Tempo::Ramped { end_bpm, .. } => end_bpm,
        }
    }

    /// True when the tempo actually changes over its section.
    #[inline]
    pub fn is_ramped(&self) -> bool {
        matches!(*self, Tempo::Ramped { start_bpm, end_bpm } if start_bpm != end_bpm)
    }

    #[inline]
    pub fn samples_per_beat(&self, sample_rate: u32) -> f64 {
        f64::from(sample_rate) * 60.0 / self.start_bpm()
    }

    pub(crate) fn validate(&self) -> Result<()> {
        for bpm in [self.start_bpm(), self.end_bpm()] {
            if !bpm.is_finite() || !(MIN_BPM..=MAX_BPM).contains(&bpm) {
                return Err(TempoMapError::InvalidTempo(bpm));
            }
        }
        Ok(())
    }

    /// Like `validate`, and also rejects tempos whose ticks would be shorter
    /// than a sample at `sample_rate`.
    pub(crate) fn validate_at(&self, sample_rate: u32) -> Result<()> {
        self.validate()?;
        let fastest = self.start_bpm().max(self.end_bpm());
        if fastest > max_bpm_at(sample_rate) {
            return Err(TempoMapError::InvalidTempo(fastest));
        }
        Ok(())
    }
}

impl Default for Tempo {
    fn default() -> Self {
        Tempo::constant(120.0)
    }
}

/// Time signature: how many beats make a bar and which note value is a beat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Meter {
    pub beats_per_bar: u32,
    pub note_value: u32,
}

impl Meter {
    pub const fn new(beats_per_bar: u32, note_value: u32) -> Self {
        Self {
            beats_per_bar,
            note_value,
        }
    }

    pub const fn four_four() -> Self {
        Self::new(4, 4)
    }

    #[inline]
    pub fn ticks_per_bar(&self) -> i64 {
        i64::from(self.beats_per_bar) * i64::from(TICKS_PER_BEAT)
    }

    /// Compound meters (6/8, 9/8, 12/8) group beats in threes.
    pub fn is_compound(&self) -> bool {
        self.note_value == 8 && self.beats_per_bar % 3 == 0 && self.beats_per_bar > 3
    }

    pub(crate) fn validate(&self) -> Result<()> {
        let valid_count = (1..=128).contains(&self.beats_per_bar);
        let valid_value = self.note_value.is_power_of_two() && self.note_value <= 128;
        if valid_count && valid_value {
            Ok(())
        } else {
            Err(TempoMapError::InvalidMeter {
                beats_per_bar: self.beats_per_bar,
                note_value: self.note_value,
            })
        }
    }
}

impl Default for Meter {
    fn default() -> Self {
        Self::four_four()
    }
}

impl std::fmt::Display for Meter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.beats_per_bar, self.note_value)
    }
}
