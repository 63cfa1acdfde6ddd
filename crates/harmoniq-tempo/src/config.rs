use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{Result, TempoMapError};
use crate::map::{TempoMap, DEFAULT_SAMPLE_RATE};
use crate::tempo::{Meter, Tempo};

/// Initial state of a new tempo map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TempoMapConfig {
    pub sample_rate: u32,
    pub bpm: f64,
    /// When set, the initial tempo ramps toward this value up to the next
    /// tempo entry.
    pub ramp_to_bpm: Option<f64>,
    pub beats_per_bar: u32,
    pub note_value: u32,
}

impl Default for TempoMapConfig {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            bpm: 120.0,
            ramp_to_bpm: None,
            beats_per_bar: 4,
            note_value: 4,
        }
    }
}

impl TempoMapConfig {
    pub fn with_sample_rate(mut self, sample_rate: u32) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    pub fn with_tempo(mut self, bpm: f64) -> Self {
        self.bpm = bpm;
        self
    }

    pub fn with_ramp_to(mut self, bpm: f64) -> Self {
        self.ramp_to_bpm = Some(bpm);
        self
    }

    pub fn with_meter(mut self, beats_per_bar: u32, note_value: u32) -> Self {
        self.beats_per_bar = beats_per_bar;
        self.note_value = note_value;
        self
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|err| TempoMapError::Config(err.to_string()))
    }

    pub fn initial_tempo(&self) -> Tempo {
        match self.ramp_to_bpm {
            Some(end_bpm) => Tempo::ramped(self.bpm, end_bpm),
            None => Tempo::constant(self.bpm),
        }
    }

    pub fn initial_meter(&self) -> Meter {
        Meter::new(self.beats_per_bar, self.note_value)
    }
}

impl TempoMap {
    pub fn from_config(config: &TempoMapConfig) -> Result<Self> {
        TempoMap::new(
            config.sample_rate,
            config.initial_tempo(),
            config.initial_meter(),
        )
        .map_err(|err| {
            warn!(?config, %err, "rejected tempo map configuration");
            err
        })
    }
}
