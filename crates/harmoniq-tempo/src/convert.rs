//! Conversions between sample positions, beat counts and `bar|beat|tick`.
//!
//! All queries are total: positions before `1|1|0` or past the last entry are
//! extrapolated with the boundary tempo and meter held constant.

use crate::bbt::{Bbt, BbtOffset, TICKS_PER_BEAT};
use crate::map::{section_ticks, TempoMap};
use crate::section::{MeterSection, TempoSection};

const TICKS: i64 = TICKS_PER_BEAT as i64;

/// Tempo and meter in force at one position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TempoMetric<'a> {
    pub tempo: &'a TempoSection,
    pub meter: &'a MeterSection,
    /// Instantaneous tempo, ramp included.
    pub bpm: f64,
}

impl<'a> TempoMetric<'a> {
    pub fn samples_per_beat(&self, sample_rate: u32) -> f64 {
        f64::from(sample_rate) * 60.0 / self.bpm
    }
}

impl TempoMap {
    pub fn sample_to_musical(&self, sample: i64) -> Bbt {
        // Evaluate half a sample late so a sample rounded from a tick
        // boundary maps back onto that tick.
        let beats = self.beats_at(sample as f64 + 0.5);
        self.ticks_to_bbt(section_ticks(beats))
    }

    pub fn musical_to_sample(&self, bbt: Bbt) -> i64 {
        self.sample_at(self.bbt_to_beats(bbt)).round() as i64
    }

    /// Beats from `1|1|0` to `sample`, fractional and possibly negative.
    pub fn beats_at_sample(&self, sample: i64) -> f64 {
        self.beats_at(sample as f64)
    }

    pub fn sample_at_beats(&self, beats: f64) -> i64 {
        self.sample_at(beats).round() as i64
    }

    pub fn bbt_to_beats(&self, bbt: Bbt) -> f64 {
        self.bbt_to_ticks(bbt) as f64 / f64::from(TICKS_PER_BEAT)
    }

    /// Position `beats` beats after `1|1|0`; negative counts clamp to the
    /// origin.
    pub fn beats_to_bbt(&self, beats: f64) -> Bbt {
        self.ticks_to_bbt(section_ticks(beats))
    }

    /// Adds a (possibly fractional) number of beats to a sample position,
    /// accumulating segment by segment across tempo changes.
    pub fn sample_plus_beats(&self, sample: i64, beats: f64) -> i64 {
        if beats < 0.0 {
            return self.sample_minus_beats(sample, -beats);
        }
        let sample_rate = self.sample_rate();
        let tempos = self.tempos();
        let mut index = self.tempo_index_at_sample(sample as f64);
        let mut position = sample as f64;
        let mut remaining = beats;

        loop {
            let section = &tempos[index];
            let into = section.beats_for(sample_rate, position - section.exact_sample());
            let available = section.length_beats() - into;
            if index + 1 == tempos.len() || remaining <= available {
                position =
                    section.exact_sample() + section.samples_for(sample_rate, into + remaining);
                break;
            }
            remaining -= available;
            index += 1;
            position = tempos[index].exact_sample();
        }
        position.round() as i64
    }

    pub fn sample_minus_beats(&self, sample: i64, beats: f64) -> i64 {
        if beats < 0.0 {
            return self.sample_plus_beats(sample, -beats);
        }
        let sample_rate = self.sample_rate();
        let tempos = self.tempos();
        let mut index = self.tempo_index_at_sample(sample as f64);
        let mut position = sample as f64;
        let mut remaining = beats;

        loop {
            let section = &tempos[index];
            let into = section.beats_for(sample_rate, position - section.exact_sample());
            if index == 0 || remaining <= into {
                position =
                    section.exact_sample() + section.samples_for(sample_rate, into - remaining);
                break;
            }
            remaining -= into;
            position = section.exact_sample();
            index -= 1;
        }
        position.round() as i64
    }

    /// Beats covered by `distance` samples starting at `sample`.
    pub fn sample_walk_to_beats(&self, sample: i64, distance: i64) -> f64 {
        self.beats_at(sample as f64 + distance as f64) - self.beats_at(sample as f64)
    }

    /// Sample reached by walking a musical offset from `sample`.
    ///
    /// The walk starts from the tick [`TempoMap::sample_to_musical`] reports
    /// for `sample`, and the distance between that tick and the exact
    /// position is carried over to the result.
    pub fn sample_plus_bbt(&self, sample: i64, offset: BbtOffset) -> i64 {
        let exact = self.beats_at(sample as f64) * f64::from(TICKS_PER_BEAT);
        let tick = section_ticks(self.beats_at(sample as f64 + 0.5));
        let walked = self.walk_ticks(tick, offset);
        let beats = (walked as f64 + (exact - tick as f64)) / f64::from(TICKS_PER_BEAT);
        self.sample_at(beats).round() as i64
    }

    /// Samples spanned by a musical offset starting at `sample`.
    pub fn bbt_duration_at(&self, sample: i64, offset: BbtOffset) -> i64 {
        self.sample_plus_bbt(sample, offset) - sample
    }

    pub fn tempo_section_at(&self, sample: i64) -> &TempoSection {
        &self.tempos()[self.tempo_index_at_sample(sample as f64)]
    }

    /// Instantaneous tempo in bpm.
    pub fn tempo_at_sample(&self, sample: i64) -> f64 {
        let section = self.tempo_section_at(sample);
        let into = section.beats_for(self.sample_rate(), sample as f64 - section.exact_sample());
        section.bpm_at(into)
    }

    pub fn meter_at_bar(&self, bar: u32) -> &MeterSection {
        &self.meters()[self.meter_index_at_bar(i64::from(bar))]
    }

    pub fn meter_at_sample(&self, sample: i64) -> &MeterSection {
        let ticks = section_ticks(self.beats_at(sample as f64));
        &self.meters()[self.meter_index_at_ticks(ticks)]
    }

    pub fn metric_at(&self, sample: i64) -> TempoMetric<'_> {
        TempoMetric {
            tempo: self.tempo_section_at(sample),
            meter: self.meter_at_sample(sample),
            bpm: self.tempo_at_sample(sample),
        }
    }

    pub(crate) fn tempo_index_at_sample(&self, sample: f64) -> usize {
        self.tempos()
            .partition_point(|section| section.exact_sample() <= sample)
            .saturating_sub(1)
    }

    fn tempo_index_at_beats(&self, beats: f64) -> usize {
        self.tempos()
            .partition_point(|section| section.beats() <= beats)
            .saturating_sub(1)
    }

    fn meter_index_at_bar(&self, bar: i64) -> usize {
        self.meters()
            .partition_point(|section| i64::from(section.bar()) <= bar)
            .saturating_sub(1)
    }

    fn meter_index_at_ticks(&self, ticks: i64) -> usize {
        self.meters()
            .partition_point(|section| section.ticks() <= ticks)
            .saturating_sub(1)
    }

    pub(crate) fn beats_at(&self, sample: f64) -> f64 {
        let section = &self.tempos()[self.tempo_index_at_sample(sample)];
        section.beats() + section.beats_for(self.sample_rate(), sample - section.exact_sample())
    }

    pub(crate) fn sample_at(&self, beats: f64) -> f64 {
        let section = &self.tempos()[self.tempo_index_at_beats(beats)];
        section.exact_sample() + section.samples_for(self.sample_rate(), beats - section.beats())
    }

    pub(crate) fn bbt_to_ticks(&self, bbt: Bbt) -> i64 {
        self.join_ticks(
            i64::from(bbt.bar()),
            i64::from(bbt.beat()),
            i64::from(bbt.tick()),
        )
    }

    /// Canonical position of an absolute tick count; anything before the
    /// origin clamps to it.
    pub(crate) fn ticks_to_bbt(&self, ticks: i64) -> Bbt {
        if ticks < 0 {
            return Bbt::ORIGIN;
        }
        let (bar, beat, tick) = self.split_ticks(ticks);
        Bbt::from_parts_unchecked(
            u32::try_from(bar).unwrap_or(u32::MAX),
            u32::try_from(beat).unwrap_or(1),
            u32::try_from(tick).unwrap_or(0),
        )
    }

    /// Splits an absolute tick count into bar, beat and tick. Counts before
    /// the origin extrapolate with the first meter and give bars below 1.
    pub(crate) fn split_ticks(&self, ticks: i64) -> (i64, i64, i64) {
        let (first_bar, start, ticks_per_bar) = if ticks < 0 {
            let first = &self.meters()[0];
            (1, 0, first.meter().ticks_per_bar())
        } else {
            let section = &self.meters()[self.meter_index_at_ticks(ticks)];
            (
                i64::from(section.bar()),
                section.ticks(),
                section.meter().ticks_per_bar(),
            )
        };
        let relative = ticks - start;
        let bars = relative.div_euclid(ticks_per_bar);
        let in_bar = relative.rem_euclid(ticks_per_bar);
        (first_bar + bars, in_bar / TICKS + 1, in_bar % TICKS)
    }

    /// Inverse of [`TempoMap::split_ticks`]. Beats and ticks may exceed their
    /// ranges; the excess carries linearly.
    pub(crate) fn join_ticks(&self, bar: i64, beat: i64, tick: i64) -> i64 {
        let section = &self.meters()[self.meter_index_at_bar(bar)];
        let (first_bar, start) = if bar < 1 {
            (1, 0)
        } else {
            (i64::from(section.bar()), section.ticks())
        };
        start + (bar - first_bar) * section.meter().ticks_per_bar() + (beat - 1) * TICKS + tick
    }
}
