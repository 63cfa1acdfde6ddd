use std::fmt;

use serde::{Deserialize, Serialize};

use crate::bbt::Bbt;
use crate::tempo::{Meter, Tempo};

/// Where an entry is pinned on the timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Anchor {
    /// Follows musical time: stays on its bar|beat|tick when earlier tempos
    /// change.
    Musical(Bbt),
    /// Follows audio time: stays on its sample when earlier tempos change.
    Sample(i64),
}

impl Anchor {
    pub const ORIGIN: Anchor = Anchor::Musical(Bbt::ORIGIN);

    pub fn is_origin(&self) -> bool {
        matches!(*self, Anchor::Musical(bbt) if bbt == Bbt::ORIGIN)
            || matches!(*self, Anchor::Sample(0))
    }
}

impl From<Bbt> for Anchor {
    fn from(bbt: Bbt) -> Self {
        Anchor::Musical(bbt)
    }
}

impl fmt::Display for Anchor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Anchor::Musical(bbt) => write!(f, "{bbt}"),
            Anchor::Sample(sample) => write!(f, "sample {sample}"),
        }
    }
}

/// Identifies one entry of the map for removal or moving.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Section {
    Tempo(Anchor),
    /// Meters live on bar starts; any position inside the bar selects it.
    Meter(Bbt),
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Section::Tempo(anchor) => write!(f, "tempo at {anchor}"),
            Section::Meter(bbt) => write!(f, "meter at bar {}", bbt.bar()),
        }
    }
}

/// A tempo entry together with its resolved position on both timelines.
///
/// `beats` counts beats from `1|1|0`; `sample` is the exact, unrounded sample
/// position. Both are recomputed by the map on every edit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TempoSection {
    tempo: Tempo,
    anchor: Anchor,
    beats: f64,
    sample: f64,
    bbt: Bbt,
    length_beats: f64,
    slope: f64,
}

impl TempoSection {
    pub(crate) fn new(tempo: Tempo, anchor: Anchor) -> Self {
        Self {
            tempo,
            anchor,
            beats: 0.0,
            sample: 0.0,
            bbt: Bbt::ORIGIN,
            length_beats: f64::INFINITY,
            slope: 0.0,
        }
    }

    #[inline]
    pub fn tempo(&self) -> Tempo {
        self.tempo
    }

    #[inline]
    pub fn anchor(&self) -> Anchor {
        self.anchor
    }

    #[inline]
    pub fn beats(&self) -> f64 {
        self.beats
    }

    #[inline]
    pub fn bbt(&self) -> Bbt {
        self.bbt
    }

    /// Resolved start, rounded to the nearest sample.
    #[inline]
    pub fn sample(&self) -> i64 {
        self.sample.round() as i64
    }

    /// Beats until the next tempo entry, infinite for the last one.
    #[inline]
    pub fn length_beats(&self) -> f64 {
        self.length_beats
    }

    /// Tempo `beats_in` beats after the section start. Held constant outside
    /// the section.
    pub fn bpm_at(&self, beats_in: f64) -> f64 {
        let x = beats_in.clamp(0.0, self.length_beats);
        if x.is_finite() {
            self.tempo.start_bpm() + self.slope * x
        } else {
            self.tempo.start_bpm()
        }
    }

    #[inline]
    pub(crate) fn exact_sample(&self) -> f64 {
        self.sample
    }

    pub(crate) fn set_tempo(&mut self, tempo: Tempo) {
        self.tempo = tempo;
    }

    pub(crate) fn set_anchor(&mut self, anchor: Anchor) {
        self.anchor = anchor;
    }

    pub(crate) fn place(&mut self, beats: f64, sample: f64) {
        self.beats = beats;
        self.sample = sample;
    }

    pub(crate) fn set_bbt(&mut self, bbt: Bbt) {
        self.bbt = bbt;
    }

    /// Fixes the section length; a ramp is only honoured with a finite,
    /// non-empty length.
    pub(crate) fn set_length(&mut self, length_beats: f64) {
        self.length_beats = length_beats;
        self.slope = if self.tempo.is_ramped() && length_beats.is_finite() && length_beats > 0.0
        {
            (self.tempo.end_bpm() - self.tempo.start_bpm()) / length_beats
        } else {
            0.0
        };
    }

    /// Samples elapsed over the first `beats_in` beats of the section.
    ///
    /// Linear ramp in bpm per beat, `bpm(x) = b0 + k·x`, integrates to
    /// `samples = sr·60/k · ln(1 + k·x/b0)`.
    pub(crate) fn samples_for(&self, sample_rate: u32, beats_in: f64) -> f64 {
        let per_minute = f64::from(sample_rate) * 60.0;
        let b0 = self.tempo.start_bpm();
        if beats_in <= 0.0 || self.slope == 0.0 {
            return beats_in * per_minute / b0;
        }
        let ramped = beats_in.min(self.length_beats);
        let mut samples = per_minute / self.slope * (self.slope * ramped / b0).ln_1p();
        if beats_in > ramped {
            samples += (beats_in - ramped) * per_minute / self.tempo.end_bpm();
        }
        samples
    }

    /// Beats elapsed over the first `samples_in` samples of the section;
    /// inverse of [`TempoSection::samples_for`].
    pub(crate) fn beats_for(&self, sample_rate: u32, samples_in: f64) -> f64 {
        let per_minute = f64::from(sample_rate) * 60.0;
        let b0 = self.tempo.start_bpm();
        if samples_in <= 0.0 || self.slope == 0.0 {
            return samples_in * b0 / per_minute;
        }
        let ramp_samples = self.samples_for(sample_rate, self.length_beats);
        if samples_in > ramp_samples {
            return self.length_beats
                + (samples_in - ramp_samples) * self.tempo.end_bpm() / per_minute;
        }
        b0 / self.slope * (self.slope * samples_in / per_minute).exp_m1()
    }

    /// Beats spanned by `samples` when `tempo` runs over exactly that
    /// distance, with a ramp ending where the distance does.
    pub(crate) fn length_for_samples(tempo: &Tempo, sample_rate: u32, samples: f64) -> f64 {
        let per_minute = f64::from(sample_rate) * 60.0;
        let (b0, b1) = (tempo.start_bpm(), tempo.end_bpm());
        if !tempo.is_ramped() || samples <= 0.0 {
            return samples.max(0.0) * b0 / per_minute;
        }
        samples * (b1 - b0) / (per_minute * (b1 / b0).ln())
    }

    /// Samples spanned by `length_beats` beats of `tempo` with the ramp
    /// ending after exactly that many beats.
    pub(crate) fn samples_for_length(tempo: &Tempo, sample_rate: u32, length_beats: f64) -> f64 {
        let per_minute = f64::from(sample_rate) * 60.0;
        let (b0, b1) = (tempo.start_bpm(), tempo.end_bpm());
        if !tempo.is_ramped() || length_beats <= 0.0 {
            return length_beats.max(0.0) * per_minute / b0;
        }
        per_minute * length_beats * (b1 / b0).ln() / (b1 - b0)
    }
}

/// A meter entry. Always starts on a bar; `ticks` is its distance from
/// `1|1|0`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MeterSection {
    meter: Meter,
    bbt: Bbt,
    ticks: i64,
}

impl MeterSection {
    pub(crate) fn new(meter: Meter, bar: u32) -> Self {
        Self {
            meter,
            bbt: Bbt::from_parts_unchecked(bar.max(1), 1, 0),
            ticks: 0,
        }
    }

    #[inline]
    pub fn meter(&self) -> Meter {
        self.meter
    }

    #[inline]
    pub fn bbt(&self) -> Bbt {
        self.bbt
    }

    #[inline]
    pub fn bar(&self) -> u32 {
        self.bbt.bar()
    }

    #[inline]
    pub fn beats_per_bar(&self) -> u32 {
        self.meter.beats_per_bar
    }

    /// Beats from `1|1|0` to the start of this meter.
    pub fn beats(&self) -> f64 {
        self.ticks as f64 / f64::from(crate::bbt::TICKS_PER_BEAT)
    }

    #[inline]
    pub(crate) fn ticks(&self) -> i64 {
        self.ticks
    }

    pub(crate) fn set_ticks(&mut self, ticks: i64) {
        self.ticks = ticks;
    }

    pub(crate) fn set_meter(&mut self, meter: Meter) {
        self.meter = meter;
    }
}
