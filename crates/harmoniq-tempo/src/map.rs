use serde::Serialize;
use tracing::{debug, trace};

use crate::bbt::{Bbt, TICKS_PER_BEAT};
use crate::error::{Result, TempoMapError};
use crate::section::{Anchor, MeterSection, Section, TempoSection};
use crate::tempo::{Meter, Tempo};

pub const DEFAULT_SAMPLE_RATE: u32 = 48_000;

/// One version of the tempo and meter map.
///
/// Tempo entries are kept strictly ordered by resolved position and meter
/// entries by bar. The first entry of each list sits at `1|1|0` and can be
/// replaced but never removed or moved. Every edit re-resolves the whole map
/// on a copy and only keeps the result when no two tempo entries land on the
/// same position, so queries only ever see consistent positions.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TempoMap {
    sample_rate: u32,
    tempos: Vec<TempoSection>,
    meters: Vec<MeterSection>,
}

/// An entry lifted out of the map by a time edit, waiting to be put back.
enum Shifted {
    Tempo(Tempo, Anchor),
    Meter(Meter),
}

impl TempoMap {
    pub fn new(sample_rate: u32, tempo: Tempo, meter: Meter) -> Result<Self> {
        if sample_rate == 0 {
            return Err(TempoMapError::InvalidSampleRate(sample_rate));
        }
        tempo.validate_at(sample_rate)?;
        meter.validate()?;
        let mut map = Self {
            sample_rate,
            tempos: vec![TempoSection::new(tempo, Anchor::ORIGIN)],
            meters: vec![MeterSection::new(meter, 1)],
        };
        map.rebuild()?;
        Ok(map)
    }

    /// Rebuilds a map from entries read off another version, replaying them
    /// the way an editor would. Entries at the origin replace the initial
    /// ones.
    pub fn from_sections(
        sample_rate: u32,
        tempos: impl IntoIterator<Item = (Tempo, Anchor)>,
        meters: impl IntoIterator<Item = (Meter, Bbt)>,
    ) -> Result<Self> {
        let mut map = Self::new(sample_rate, Tempo::default(), Meter::default())?;
        for (meter, at) in meters {
            if at.bar() == 1 {
                map.replace_meter(Bbt::ORIGIN, meter)?;
            } else {
                map.add_meter(meter, at)?;
            }
        }
        for (tempo, at) in tempos {
            if at.is_origin() {
                map.replace_tempo(Anchor::ORIGIN, tempo)?;
            } else {
                map.add_tempo(tempo, at)?;
            }
        }
        Ok(map)
    }

    #[inline]
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Tempo entries in timeline order.
    #[inline]
    pub fn tempos(&self) -> &[TempoSection] {
        &self.tempos
    }

    /// Meter entries in bar order.
    #[inline]
    pub fn meters(&self) -> &[MeterSection] {
        &self.meters
    }

    pub fn add_tempo(&mut self, tempo: Tempo, at: Anchor) -> Result<()> {
        tempo.validate_at(self.sample_rate)?;
        let sample = match at {
            Anchor::Sample(sample) if sample < 0 => {
                return Err(TempoMapError::InvalidAnchor(
                    "tempo anchored before the start of the timeline",
                ));
            }
            Anchor::Sample(sample) => sample,
            Anchor::Musical(bbt) => self.musical_to_sample(bbt),
        };
        if self
            .tempos
            .iter()
            .any(|section| section.anchor() == at || section.sample() == sample)
        {
            return Err(TempoMapError::duplicate(at));
        }

        self.commit(|map| {
            map.tempos.push(TempoSection::new(tempo, at));
            Ok(())
        })?;
        debug!(%at, bpm = tempo.start_bpm(), end_bpm = tempo.end_bpm(), "added tempo");
        Ok(())
    }

    /// Adds a meter at the bar containing `at`.
    pub fn add_meter(&mut self, meter: Meter, at: Bbt) -> Result<()> {
        meter.validate()?;
        if self.meter_index(at.bar()).is_some() {
            return Err(TempoMapError::duplicate(Bbt::from_parts_unchecked(at.bar(), 1, 0)));
        }

        self.commit(|map| {
            map.meters.push(MeterSection::new(meter, at.bar()));
            Ok(())
        })?;
        debug!(bar = at.bar(), %meter, "added meter");
        Ok(())
    }

    pub fn remove(&mut self, section: Section) -> Result<()> {
        self.commit(|map| match section {
            Section::Tempo(at) => {
                let index = map.tempo_index(at).ok_or_else(|| TempoMapError::missing(section))?;
                if index == 0 {
                    return Err(TempoMapError::InvalidAnchor("the initial tempo cannot be removed"));
                }
                map.tempos.remove(index);
                Ok(())
            }
            Section::Meter(at) => {
                let index = map
                    .meter_index(at.bar())
                    .ok_or_else(|| TempoMapError::missing(section))?;
                if index == 0 {
                    return Err(TempoMapError::InvalidAnchor("the initial meter cannot be removed"));
                }
                map.meters.remove(index);
                Ok(())
            }
        })?;
        debug!(%section, "removed section");
        Ok(())
    }

    /// Moves an entry to a new anchor. On failure the map is left as it was.
    ///
    /// A meter moved to a sample anchor lands on the bar containing that
    /// sample, measured without the moved meter.
    pub fn move_section(&mut self, section: Section, to: Anchor) -> Result<()> {
        let mut moved = self.clone();
        match section {
            Section::Tempo(at) => {
                let index = moved.tempo_index(at).ok_or_else(|| TempoMapError::missing(section))?;
                if index == 0 {
                    return Err(TempoMapError::InvalidAnchor("the initial tempo cannot be moved"));
                }
                let tempo = moved.tempos.remove(index).tempo();
                moved.resolve_positions();
                moved.add_tempo(tempo, to)?;
            }
            Section::Meter(at) => {
                let index = moved
                    .meter_index(at.bar())
                    .ok_or_else(|| TempoMapError::missing(section))?;
                if index == 0 {
                    return Err(TempoMapError::InvalidAnchor("the initial meter cannot be moved"));
                }
                let meter = moved.meters.remove(index).meter();
                moved.resolve_positions();
                let target = match to {
                    Anchor::Musical(bbt) => bbt,
                    Anchor::Sample(sample) if sample < 0 => {
                        return Err(TempoMapError::InvalidAnchor(
                            "meter moved before the start of the timeline",
                        ));
                    }
                    Anchor::Sample(sample) => moved.sample_to_musical(sample),
                };
                moved.add_meter(meter, target)?;
            }
        }
        *self = moved;
        debug!(%section, %to, "moved section");
        Ok(())
    }

    /// Changes the tempo of an existing entry, the initial one included.
    pub fn replace_tempo(&mut self, at: Anchor, tempo: Tempo) -> Result<()> {
        tempo.validate_at(self.sample_rate)?;
        let index = self
            .tempo_index(at)
            .ok_or_else(|| TempoMapError::missing(Section::Tempo(at)))?;
        self.commit(|map| {
            map.tempos[index].set_tempo(tempo);
            Ok(())
        })?;
        debug!(%at, bpm = tempo.start_bpm(), end_bpm = tempo.end_bpm(), "replaced tempo");
        Ok(())
    }

    /// Changes the meter in force from the bar containing `at`.
    pub fn replace_meter(&mut self, at: Bbt, meter: Meter) -> Result<()> {
        meter.validate()?;
        let index = self
            .meter_index(at.bar())
            .ok_or_else(|| TempoMapError::missing(Section::Meter(at)))?;
        self.commit(|map| {
            map.meters[index].set_meter(meter);
            Ok(())
        })?;
        debug!(bar = at.bar(), %meter, "replaced meter");
        Ok(())
    }

    pub fn is_initial(&self, section: Section) -> bool {
        match section {
            Section::Tempo(at) => self.tempo_index(at) == Some(0),
            Section::Meter(at) => self.meter_index(at.bar()) == Some(0),
        }
    }

    pub fn can_remove(&self, section: Section) -> bool {
        match section {
            Section::Tempo(at) => matches!(self.tempo_index(at), Some(index) if index > 0),
            Section::Meter(at) => matches!(self.meter_index(at.bar()), Some(index) if index > 0),
        }
    }

    /// The tempo entry after the one at `at`.
    pub fn next_tempo(&self, at: Anchor) -> Option<&TempoSection> {
        self.tempos.get(self.tempo_index(at)? + 1)
    }

    /// The tempo entry before the one at `at`. `None` for the initial entry.
    pub fn previous_tempo(&self, at: Anchor) -> Option<&TempoSection> {
        let index = self.tempo_index(at)?;
        self.tempos.get(index.checked_sub(1)?)
    }

    /// Switches to a new sample rate. Sample-anchored tempos keep their
    /// position in seconds; musical anchors keep their position in beats.
    ///
    /// Fails when a tempo in the map is too fast for ticks to stay at least
    /// one sample long at the new rate.
    pub fn set_sample_rate(&mut self, sample_rate: u32) -> Result<()> {
        if sample_rate == 0
            || self
                .tempos
                .iter()
                .any(|section| section.tempo().validate_at(sample_rate).is_err())
        {
            return Err(TempoMapError::InvalidSampleRate(sample_rate));
        }
        if sample_rate == self.sample_rate {
            return Ok(());
        }
        let from = self.sample_rate;
        let ratio = f64::from(sample_rate) / f64::from(from);
        self.commit(|map| {
            for section in &mut map.tempos {
                if let Anchor::Sample(sample) = section.anchor() {
                    section.set_anchor(Anchor::Sample((sample as f64 * ratio).round() as i64));
                }
            }
            map.sample_rate = sample_rate;
            Ok(())
        })?;
        debug!(from, to = sample_rate, "sample rate changed");
        Ok(())
    }

    /// Opens `duration` samples of empty time at `at`.
    ///
    /// Entries at or after `at` move later by `duration`. Sample-anchored
    /// tempos move exactly; musical tempos land on the nearest beat and
    /// meters on the nearest bar. The initial entries stay in place. Fails
    /// without changing the map when two shifted entries would collide.
    pub fn insert_time(&mut self, at: i64, duration: i64) -> Result<()> {
        if at < 0 {
            return Err(TempoMapError::InvalidAnchor("time edit before the start of the timeline"));
        }
        if duration < 0 {
            return Err(TempoMapError::InvalidAnchor("negative time span"));
        }
        if self.shift_time(at, 0, duration)? {
            debug!(at, duration, "inserted time");
        }
        Ok(())
    }

    /// Cuts `duration` samples of time starting at `at`.
    ///
    /// Entries inside the cut are removed and later ones move earlier by
    /// `duration`, placed the way [`TempoMap::insert_time`] places them.
    /// Returns whether any entry was removed or moved.
    pub fn remove_time(&mut self, at: i64, duration: i64) -> Result<bool> {
        if at < 0 {
            return Err(TempoMapError::InvalidAnchor("time edit before the start of the timeline"));
        }
        if duration < 0 {
            return Err(TempoMapError::InvalidAnchor("negative time span"));
        }
        let changed = self.shift_time(at, duration, -duration)?;
        if changed {
            debug!(at, duration, "removed time");
        }
        Ok(changed)
    }

    /// Drops the non-initial entries in `[from, from + cut)` and puts the
    /// ones after that range back `delta` samples away, in timeline order.
    fn shift_time(&mut self, from: i64, cut: i64, delta: i64) -> Result<bool> {
        if cut == 0 && delta == 0 {
            return Ok(false);
        }
        let kept_from = from.saturating_add(cut);
        let mut dropped = false;
        let mut shifted: Vec<(i64, Shifted)> = Vec::new();
        for section in &self.tempos[1..] {
            let sample = match section.anchor() {
                Anchor::Sample(sample) => sample,
                Anchor::Musical(_) => section.sample(),
            };
            if sample >= kept_from {
                shifted.push((sample, Shifted::Tempo(section.tempo(), section.anchor())));
            } else if sample >= from {
                dropped = true;
            }
        }
        for section in &self.meters[1..] {
            let sample = self.musical_to_sample(section.bbt());
            if sample >= kept_from {
                shifted.push((sample, Shifted::Meter(section.meter())));
            } else if sample >= from {
                dropped = true;
            }
        }
        if shifted.is_empty() && !dropped {
            return Ok(false);
        }
        // Meters first at a shared position, so a tempo on a bar line is
        // placed against the meter that starts there.
        shifted.sort_by_key(|(sample, entry)| (*sample, matches!(entry, Shifted::Tempo(..))));

        let mut edited = self.clone();
        edited
            .tempos
            .retain(|section| section.anchor().is_origin() || section.sample() < from);
        edited
            .meters
            .retain(|section| section.bar() == 1 || self.musical_to_sample(section.bbt()) < from);
        edited.resolve_positions();

        for (sample, entry) in shifted {
            let target = sample + delta;
            match entry {
                Shifted::Tempo(tempo, Anchor::Sample(_)) => {
                    edited.add_tempo(tempo, Anchor::Sample(target))?;
                }
                Shifted::Tempo(tempo, Anchor::Musical(_)) => {
                    let beat = edited.round_to_beat(edited.sample_to_musical(target));
                    edited.add_tempo(tempo, beat.into())?;
                }
                Shifted::Meter(meter) => {
                    let bar = edited.round_to_bar(edited.sample_to_musical(target));
                    edited.add_meter(meter, bar)?;
                }
            }
        }
        *self = edited;
        Ok(true)
    }

    fn tempo_index(&self, at: Anchor) -> Option<usize> {
        if at.is_origin() {
            return Some(0);
        }
        self.tempos.iter().position(|section| section.anchor() == at)
    }

    fn meter_index(&self, bar: u32) -> Option<usize> {
        self.meters.iter().position(|section| section.bar() == bar.max(1))
    }

    /// Applies `edit` to a copy, rebuilds it and keeps it only if both
    /// succeed.
    fn commit(&mut self, edit: impl FnOnce(&mut Self) -> Result<()>) -> Result<()> {
        let mut edited = self.clone();
        edit(&mut edited)?;
        edited.rebuild()?;
        *self = edited;
        Ok(())
    }

    /// Re-resolves every position and rejects layouts where a tempo entry
    /// does not start strictly after the one before it.
    fn rebuild(&mut self) -> Result<()> {
        self.resolve_positions();
        match self.tempos.windows(2).find(|pair| {
            pair[1].sample() <= pair[0].sample() || pair[1].beats() <= pair[0].beats()
        }) {
            Some(pair) => Err(TempoMapError::duplicate(pair[1].anchor())),
            None => Ok(()),
        }
    }

    /// Recomputes every resolved position.
    ///
    /// Meters first, since musical tempo anchors depend on them. Tempos are
    /// then merged from two queues: musical anchors ordered by beats and
    /// sample anchors ordered by sample. At each step the musical candidate
    /// wins when its sample, computed through the current section, is not
    /// after the next sample anchor.
    fn resolve_positions(&mut self) {
        self.meters.sort_by_key(MeterSection::bar);
        let mut ticks = 0i64;
        for index in 0..self.meters.len() {
            if index > 0 {
                let previous = &self.meters[index - 1];
                let bars = i64::from(self.meters[index].bar() - previous.bar());
                ticks += bars * previous.meter().ticks_per_bar();
            }
            self.meters[index].set_ticks(ticks);
        }

        let sample_rate = self.sample_rate;
        let mut sections = std::mem::take(&mut self.tempos).into_iter();
        let Some(mut current) = sections.next() else {
            return;
        };
        current.place(0.0, 0.0);

        let mut musical: Vec<(f64, TempoSection)> = Vec::new();
        let mut linear: Vec<(f64, TempoSection)> = Vec::new();
        for section in sections {
            match section.anchor() {
                Anchor::Musical(bbt) => {
                    let beats = self.bbt_to_ticks(bbt) as f64 / f64::from(TICKS_PER_BEAT);
                    musical.push((beats, section));
                }
                Anchor::Sample(sample) => linear.push((sample as f64, section)),
            }
        }
        // Popped from the back, so sort descending.
        musical.sort_by(|a, b| b.0.total_cmp(&a.0));
        linear.sort_by(|a, b| b.0.total_cmp(&a.0));

        let mut resolved = Vec::with_capacity(musical.len() + linear.len() + 1);
        loop {
            let take_musical = match (musical.last(), linear.last()) {
                (None, None) => break,
                (Some(_), None) => true,
                (None, Some(_)) => false,
                (Some((beats, _)), Some((sample, _))) => {
                    let length = (beats - current.beats()).max(0.0);
                    let at = current.exact_sample()
                        + TempoSection::samples_for_length(&current.tempo(), sample_rate, length);
                    at <= *sample
                }
            };

            let (mut next, beats, sample) = if take_musical {
                let Some((beats, next)) = musical.pop() else { break };
                let length = (beats - current.beats()).max(0.0);
                current.set_length(length);
                let sample = current.exact_sample() + current.samples_for(sample_rate, length);
                (next, current.beats() + length, sample)
            } else {
                let Some((sample, next)) = linear.pop() else { break };
                let distance = (sample - current.exact_sample()).max(0.0);
                let length = TempoSection::length_for_samples(&current.tempo(), sample_rate, distance);
                current.set_length(length);
                (next, current.beats() + length, sample)
            };
            next.place(beats, sample);
            resolved.push(current);
            current = next;
        }
        current.set_length(f64::INFINITY);
        resolved.push(current);

        for section in &mut resolved {
            let bbt = self.ticks_to_bbt(section_ticks(section.beats()));
            section.set_bbt(bbt);
        }
        self.tempos = resolved;
        trace!(
            tempos = self.tempos.len(),
            meters = self.meters.len(),
            "resolved tempo map"
        );
    }
}

/// Tick containing a beat position, tolerant of float noise just below a
/// tick boundary.
pub(crate) fn section_ticks(beats: f64) -> i64 {
    (beats * f64::from(TICKS_PER_BEAT) + 1e-6).floor() as i64
}

impl Default for TempoMap {
    fn default() -> Self {
        let meter = MeterSection::new(Meter::default(), 1);
        let mut map = Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            tempos: vec![TempoSection::new(Tempo::default(), Anchor::ORIGIN)],
            meters: vec![meter],
        };
        map.resolve_positions();
        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bbt(bar: u32, beat: u32, tick: u32) -> Bbt {
        Bbt::new(bar, beat, tick).unwrap()
    }

    fn map() -> TempoMap {
        TempoMap::default()
    }

    #[test]
    fn default_map_has_initial_entries() {
        let map = map();
        assert_eq!(map.sample_rate(), 48_000);
        assert_eq!(map.tempos().len(), 1);
        assert_eq!(map.meters().len(), 1);
        assert_eq!(map.tempos()[0].bbt(), Bbt::ORIGIN);
        assert_eq!(map.meters()[0].meter(), Meter::four_four());
    }

    #[test]
    fn rejects_invalid_construction() {
        assert_eq!(
            TempoMap::new(0, Tempo::default(), Meter::default()),
            Err(TempoMapError::InvalidSampleRate(0))
        );
        assert!(TempoMap::new(48_000, Tempo::constant(-1.0), Meter::default()).is_err());
        assert!(TempoMap::new(48_000, Tempo::default(), Meter::new(4, 5)).is_err());
    }

    #[test]
    fn musical_tempo_resolves_to_sample() {
        let mut map = map();
        map.add_tempo(Tempo::constant(240.0), bbt(4, 1, 0).into()).unwrap();
        let section = &map.tempos()[1];
        assert_eq!(section.beats(), 12.0);
        assert_eq!(section.sample(), 288_000);
        assert_eq!(section.bbt(), bbt(4, 1, 0));
    }

    #[test]
    fn sample_tempo_resolves_to_beats() {
        let mut map = map();
        map.add_tempo(Tempo::constant(60.0), Anchor::Sample(60_000)).unwrap();
        let section = &map.tempos()[1];
        assert_eq!(section.beats(), 2.5);
        assert_eq!(section.bbt(), bbt(1, 3, 960));
    }

    #[test]
    fn mixed_anchors_stay_ordered() {
        let mut map = map();
        map.add_tempo(Tempo::constant(60.0), bbt(3, 1, 0).into()).unwrap();
        map.add_tempo(Tempo::constant(90.0), Anchor::Sample(24_000)).unwrap();
        map.add_tempo(Tempo::constant(150.0), Anchor::Sample(1_000_000)).unwrap();

        let samples: Vec<i64> = map.tempos().iter().map(TempoSection::sample).collect();
        assert!(samples.windows(2).all(|pair| pair[0] < pair[1]), "{samples:?}");
        // 1 beat at 120, then 7 beats at 90 up to bar 3.
        assert_eq!(map.tempos()[2].sample(), 24_000 + 7 * 32_000);
    }

    #[test]
    fn sample_anchor_holds_when_earlier_tempo_changes() {
        let mut map = map();
        map.add_tempo(Tempo::constant(100.0), Anchor::Sample(96_000)).unwrap();
        map.add_tempo(Tempo::constant(80.0), bbt(3, 1, 0).into()).unwrap();
        map.replace_tempo(Anchor::ORIGIN, Tempo::constant(60.0)).unwrap();

        let linear = map
            .tempos()
            .iter()
            .find(|section| section.anchor() == Anchor::Sample(96_000))
            .unwrap();
        assert_eq!(linear.sample(), 96_000);
        assert_eq!(linear.beats(), 2.0);
        let musical = map
            .tempos()
            .iter()
            .find(|section| section.anchor() == Anchor::Musical(bbt(3, 1, 0)))
            .unwrap();
        assert_eq!(musical.beats(), 8.0);
        assert_eq!(musical.sample(), 96_000 + 6 * 28_800);
    }

    #[test]
    fn duplicates_are_rejected() {
        let mut map = map();
        map.add_tempo(Tempo::constant(90.0), bbt(2, 1, 0).into()).unwrap();
        assert!(matches!(
            map.add_tempo(Tempo::constant(100.0), bbt(2, 1, 0).into()),
            Err(TempoMapError::DuplicateAnchor(_))
        ));
        // Same position expressed in samples.
        assert!(matches!(
            map.add_tempo(Tempo::constant(100.0), Anchor::Sample(96_000)),
            Err(TempoMapError::DuplicateAnchor(_))
        ));
        assert!(matches!(
            map.add_tempo(Tempo::constant(100.0), Anchor::Sample(0)),
            Err(TempoMapError::DuplicateAnchor(_))
        ));
        map.add_meter(Meter::new(3, 4), bbt(5, 2, 0)).unwrap();
        assert!(matches!(
            map.add_meter(Meter::new(7, 8), bbt(5, 1, 0)),
            Err(TempoMapError::DuplicateAnchor(_))
        ));
        assert!(matches!(
            map.add_meter(Meter::new(7, 8), Bbt::ORIGIN),
            Err(TempoMapError::DuplicateAnchor(_))
        ));
    }

    #[test]
    fn negative_sample_anchor_is_invalid() {
        let mut map = map();
        assert!(matches!(
            map.add_tempo(Tempo::constant(100.0), Anchor::Sample(-1)),
            Err(TempoMapError::InvalidAnchor(_))
        ));
        assert_eq!(map, TempoMap::default());
    }

    #[test]
    fn meter_snaps_to_bar_start() {
        let mut map = map();
        map.add_meter(Meter::new(3, 4), bbt(3, 2, 100)).unwrap();
        assert_eq!(map.meters()[1].bbt(), bbt(3, 1, 0));
        assert_eq!(map.meters()[1].beats(), 8.0);
    }

    #[test]
    fn meter_change_moves_musical_tempos() {
        let mut map = map();
        map.add_tempo(Tempo::constant(60.0), bbt(3, 1, 0).into()).unwrap();
        map.add_meter(Meter::new(2, 4), bbt(2, 1, 0)).unwrap();
        assert_eq!(map.tempos()[1].beats(), 6.0);
        assert_eq!(map.tempos()[1].sample(), 6 * 24_000);
    }

    #[test]
    fn initial_entries_are_protected() {
        let mut map = map();
        assert!(map.is_initial(Section::Tempo(Anchor::ORIGIN)));
        assert!(map.is_initial(Section::Tempo(Anchor::Sample(0))));
        assert!(!map.can_remove(Section::Tempo(Anchor::ORIGIN)));
        assert!(matches!(
            map.remove(Section::Tempo(Anchor::ORIGIN)),
            Err(TempoMapError::InvalidAnchor(_))
        ));
        assert!(matches!(
            map.remove(Section::Meter(Bbt::ORIGIN)),
            Err(TempoMapError::InvalidAnchor(_))
        ));
        assert!(matches!(
            map.move_section(Section::Tempo(Anchor::ORIGIN), bbt(2, 1, 0).into()),
            Err(TempoMapError::InvalidAnchor(_))
        ));
    }

    #[test]
    fn remove_missing_entry() {
        let mut map = map();
        assert!(matches!(
            map.remove(Section::Tempo(bbt(9, 1, 0).into())),
            Err(TempoMapError::NoSuchAnchor(_))
        ));
        assert!(matches!(
            map.remove(Section::Meter(bbt(9, 1, 0))),
            Err(TempoMapError::NoSuchAnchor(_))
        ));
    }

    #[test]
    fn remove_restores_previous_layout() {
        let mut map = map();
        let before = map.clone();
        map.add_tempo(Tempo::ramped(120.0, 60.0), bbt(2, 1, 0).into()).unwrap();
        map.add_meter(Meter::new(5, 8), bbt(3, 1, 0)).unwrap();
        assert!(map.can_remove(Section::Meter(bbt(3, 4, 0))));
        map.remove(Section::Meter(bbt(3, 1, 0))).unwrap();
        map.remove(Section::Tempo(bbt(2, 1, 0).into())).unwrap();
        assert_eq!(map, before);
    }

    #[test]
    fn move_tempo_between_domains() {
        let mut map = map();
        map.add_tempo(Tempo::constant(60.0), bbt(2, 1, 0).into()).unwrap();
        map.move_section(Section::Tempo(bbt(2, 1, 0).into()), Anchor::Sample(48_000))
            .unwrap();
        assert_eq!(map.tempos().len(), 2);
        assert_eq!(map.tempos()[1].anchor(), Anchor::Sample(48_000));
        assert_eq!(map.tempos()[1].bbt(), bbt(1, 3, 0));
    }

    #[test]
    fn failed_move_leaves_map_untouched() {
        let mut map = map();
        map.add_tempo(Tempo::constant(60.0), bbt(2, 1, 0).into()).unwrap();
        map.add_tempo(Tempo::constant(90.0), bbt(3, 1, 0).into()).unwrap();
        let before = map.clone();
        assert!(matches!(
            map.move_section(Section::Tempo(bbt(2, 1, 0).into()), bbt(3, 1, 0).into()),
            Err(TempoMapError::DuplicateAnchor(_))
        ));
        assert_eq!(map, before);
    }

    #[test]
    fn move_meter_to_sample_lands_on_containing_bar() {
        let mut map = map();
        map.add_meter(Meter::new(3, 4), bbt(2, 1, 0)).unwrap();
        // 9.5 beats in 4/4 is bar 3.
        map.move_section(Section::Meter(bbt(2, 1, 0)), Anchor::Sample(228_000))
            .unwrap();
        assert_eq!(map.meters()[1].bar(), 3);
    }

    #[test]
    fn ramp_toward_sample_anchor_ends_there() {
        let mut map = map();
        map.replace_tempo(Anchor::ORIGIN, Tempo::ramped(60.0, 120.0)).unwrap();
        map.add_tempo(Tempo::constant(120.0), Anchor::Sample(480_000)).unwrap();
        let first = &map.tempos()[0];
        let expected = 10.0 * 60.0 / (60.0 * 2f64.ln());
        assert!((first.length_beats() - expected).abs() < 1e-9);
        assert!((first.bpm_at(first.length_beats()) - 120.0).abs() < 1e-9);
    }

    #[test]
    fn sample_rate_change_rescales_sample_anchors() {
        let mut map = map();
        map.add_tempo(Tempo::constant(60.0), Anchor::Sample(48_000)).unwrap();
        map.add_tempo(Tempo::constant(90.0), bbt(4, 1, 0).into()).unwrap();
        let beats: Vec<f64> = map.tempos().iter().map(TempoSection::beats).collect();

        map.set_sample_rate(96_000).unwrap();
        assert_eq!(map.tempos()[1].anchor(), Anchor::Sample(96_000));
        let rescaled: Vec<f64> = map.tempos().iter().map(TempoSection::beats).collect();
        assert_eq!(beats, rescaled);
        assert_eq!(map.set_sample_rate(0), Err(TempoMapError::InvalidSampleRate(0)));
    }

    #[test]
    fn replay_from_sections() {
        let mut map = map();
        map.replace_tempo(Anchor::ORIGIN, Tempo::constant(100.0)).unwrap();
        map.add_meter(Meter::new(6, 8), bbt(5, 1, 0)).unwrap();
        map.add_tempo(Tempo::ramped(100.0, 140.0), bbt(3, 1, 0).into()).unwrap();
        map.add_tempo(Tempo::constant(140.0), Anchor::Sample(1_000_000)).unwrap();

        let rebuilt = TempoMap::from_sections(
            map.sample_rate(),
            map.tempos().iter().map(|s| (s.tempo(), s.anchor())),
            map.meters().iter().map(|m| (m.meter(), m.bbt())),
        )
        .unwrap();
        assert_eq!(rebuilt, map);
    }

    #[test]
    fn edit_that_stacks_two_tempos_is_rejected() {
        let mut map = map();
        map.add_tempo(Tempo::constant(60.0), Anchor::Sample(96_000)).unwrap();
        map.add_tempo(Tempo::constant(80.0), bbt(3, 1, 0).into()).unwrap();
        let before = map.clone();

        // At 240 bpm bar 3 starts exactly on the sample-anchored entry.
        assert!(matches!(
            map.replace_tempo(Anchor::ORIGIN, Tempo::constant(240.0)),
            Err(TempoMapError::DuplicateAnchor(_))
        ));
        assert_eq!(map, before);
        assert_eq!(map.tempo_at_sample(map.musical_to_sample(bbt(3, 1, 0))), 80.0);

        let rebuilt = TempoMap::from_sections(
            map.sample_rate(),
            map.tempos().iter().map(|s| (s.tempo(), s.anchor())),
            map.meters().iter().map(|m| (m.meter(), m.bbt())),
        );
        assert_eq!(rebuilt, Ok(map));
    }

    #[test]
    fn meter_that_stacks_two_tempos_is_rejected() {
        let mut map = map();
        map.add_tempo(Tempo::constant(60.0), Anchor::Sample(144_000)).unwrap();
        map.add_tempo(Tempo::constant(80.0), bbt(3, 1, 0).into()).unwrap();
        let before = map.clone();
        // A 2/4 bar 2 puts bar 3 on beat 6, which is the sample anchor.
        assert!(matches!(
            map.add_meter(Meter::new(2, 4), bbt(2, 1, 0)),
            Err(TempoMapError::DuplicateAnchor(_))
        ));
        assert_eq!(map, before);
    }

    #[test]
    fn sample_rate_change_that_merges_anchors_is_rejected() {
        let mut map = map();
        map.add_tempo(Tempo::constant(90.0), Anchor::Sample(48_001)).unwrap();
        map.add_tempo(Tempo::constant(100.0), Anchor::Sample(48_002)).unwrap();
        let before = map.clone();
        assert!(matches!(
            map.set_sample_rate(24_000),
            Err(TempoMapError::DuplicateAnchor(_))
        ));
        assert_eq!(map, before);
    }

    #[test]
    fn tempos_too_fast_for_the_sample_rate_are_rejected() {
        assert_eq!(
            TempoMap::new(8_000, Tempo::constant(1000.0), Meter::default()),
            Err(TempoMapError::InvalidTempo(1000.0))
        );
        let mut map = TempoMap::new(8_000, Tempo::constant(250.0), Meter::default()).unwrap();
        assert_eq!(
            map.add_tempo(Tempo::ramped(200.0, 400.0), bbt(2, 1, 0).into()),
            Err(TempoMapError::InvalidTempo(400.0))
        );
        assert_eq!(
            map.replace_tempo(Anchor::ORIGIN, Tempo::constant(251.0)),
            Err(TempoMapError::InvalidTempo(251.0))
        );
        assert_eq!(map.set_sample_rate(4_000), Err(TempoMapError::InvalidSampleRate(4_000)));
        assert_eq!(map.sample_rate(), 8_000);

        // One tick is exactly one sample here, and every tick survives.
        for tick in 0..TICKS_PER_BEAT {
            let position = bbt(1, 1, tick);
            assert_eq!(map.sample_to_musical(map.musical_to_sample(position)), position);
        }
    }

    /// 4/4 at 120, 60 bpm from bar 3, 90 bpm from sample 300 000 and 3/4
    /// from bar 5.
    fn arranged() -> TempoMap {
        let mut map = map();
        map.add_tempo(Tempo::constant(60.0), bbt(3, 1, 0).into()).unwrap();
        map.add_tempo(Tempo::constant(90.0), Anchor::Sample(300_000)).unwrap();
        map.add_meter(Meter::new(3, 4), bbt(5, 1, 0)).unwrap();
        map
    }

    #[test]
    fn inserted_time_pushes_later_entries() {
        let mut map = arranged();
        // One 4/4 bar at 120 bpm.
        map.insert_time(96_000, 96_000).unwrap();
        assert_eq!(map.tempos()[0].anchor(), Anchor::ORIGIN);
        assert_eq!(map.tempos()[1].anchor(), Anchor::Musical(bbt(4, 1, 0)));
        assert_eq!(map.tempos()[1].sample(), 288_000);
        assert_eq!(map.tempos()[2].anchor(), Anchor::Sample(396_000));
        assert_eq!(map.meters()[1].bar(), 6);

        assert_eq!(map.remove_time(96_000, 96_000), Ok(true));
        assert_eq!(map, arranged());
    }

    #[test]
    fn removed_time_drops_entries_inside_the_cut() {
        let mut map = arranged();
        assert_eq!(map.remove_time(150_000, 100_000), Ok(true));
        assert_eq!(map.tempos().len(), 2);
        assert_eq!(map.tempos()[1].anchor(), Anchor::Sample(200_000));
        assert_eq!(map.meters()[1].bar(), 5);

        let before = map.clone();
        assert_eq!(map.remove_time(10_000_000, 1_000), Ok(false));
        map.insert_time(10_000_000, 1_000).unwrap();
        assert_eq!(map, before);
        assert!(matches!(map.insert_time(0, -1), Err(TempoMapError::InvalidAnchor(_))));
        assert!(matches!(map.remove_time(-5, 10), Err(TempoMapError::InvalidAnchor(_))));
    }

    #[test]
    fn neighbouring_tempos() {
        let map = arranged();
        let second = map.tempos()[1].anchor();
        assert_eq!(map.next_tempo(Anchor::ORIGIN).map(TempoSection::anchor), Some(second));
        assert_eq!(
            map.next_tempo(second).map(TempoSection::anchor),
            Some(Anchor::Sample(300_000))
        );
        assert!(map.next_tempo(Anchor::Sample(300_000)).is_none());
        assert_eq!(map.previous_tempo(second).map(TempoSection::anchor), Some(Anchor::ORIGIN));
        assert!(map.previous_tempo(Anchor::ORIGIN).is_none());
        assert!(map.previous_tempo(bbt(9, 1, 0).into()).is_none());
    }
}
