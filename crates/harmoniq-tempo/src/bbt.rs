//! Musical positions (`bar|beat|tick`) and signed musical offsets.

use std::cmp::Ordering;
use std::fmt;
use std::ops::Neg;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TempoMapError};

/// Ticks per beat, constant across the whole map.
pub const TICKS_PER_BEAT: u32 = 1920;

/// Absolute musical position. Bars and beats count from 1, ticks from 0.
///
/// The value knows nothing about meters, so it cannot carry or normalize on
/// its own; anything beyond comparison goes through a [`crate::TempoMap`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawBbt", into = "RawBbt")]
pub struct Bbt {
    bar: u32,
    beat: u32,
    tick: u32,
}

impl Bbt {
    pub const ORIGIN: Bbt = Bbt {
        bar: 1,
        beat: 1,
        tick: 0,
    };

    pub fn new(bar: u32, beat: u32, tick: u32) -> Result<Self> {
        if bar == 0 || beat == 0 || tick >= TICKS_PER_BEAT {
            return Err(TempoMapError::illegal(bar, beat, tick));
        }
        Ok(Self { bar, beat, tick })
    }

    /// First tick of `bar`.
    pub fn bar_start(bar: u32) -> Result<Self> {
        Self::new(bar, 1, 0)
    }

    /// Builds a position from a zero-based beat count, assuming the caller
    /// already knows a fixed `beats_per_bar`. Not meter aware.
    pub fn from_beats(beats: f64, beats_per_bar: u32) -> Result<Self> {
        if !beats.is_finite() || beats < 0.0 || beats_per_bar == 0 {
            return Err(TempoMapError::illegal(0, 0, 0));
        }
        let total_ticks = (beats * f64::from(TICKS_PER_BEAT)).floor() as u64;
        let ticks_per_bar = u64::from(beats_per_bar) * u64::from(TICKS_PER_BEAT);
        let bar = total_ticks / ticks_per_bar + 1;
        let in_bar = total_ticks % ticks_per_bar;
        let bar = u32::try_from(bar).map_err(|_| TempoMapError::illegal(u32::MAX, 1, 0))?;
        Self::new(
            bar,
            (in_bar / u64::from(TICKS_PER_BEAT)) as u32 + 1,
            (in_bar % u64::from(TICKS_PER_BEAT)) as u32,
        )
    }

    #[inline]
    pub fn bar(&self) -> u32 {
        self.bar
    }

    #[inline]
    pub fn beat(&self) -> u32 {
        self.beat
    }

    #[inline]
    pub fn tick(&self) -> u32 {
        self.tick
    }

    #[inline]
    pub fn is_bar_start(&self) -> bool {
        self.beat == 1 && self.tick == 0
    }

    /// Nearest beat. The beat may exceed the bar length; the map decides how
    /// that carries.
    pub fn round_to_beat(&self) -> Self {
        if self.tick >= TICKS_PER_BEAT / 2 {
            self.next_beat()
        } else {
            self.round_down_to_beat()
        }
    }

    pub fn round_up_to_beat(&self) -> Self {
        if self.tick == 0 {
            *self
        } else {
            self.next_beat()
        }
    }

    pub fn round_down_to_beat(&self) -> Self {
        Self { tick: 0, ..*self }
    }

    fn next_beat(&self) -> Self {
        Self {
            bar: self.bar,
            beat: self.beat.saturating_add(1),
            tick: 0,
        }
    }

    pub(crate) fn from_parts_unchecked(bar: u32, beat: u32, tick: u32) -> Self {
        debug_assert!(bar > 0 && beat > 0 && tick < TICKS_PER_BEAT);
        Self { bar, beat, tick }
    }
}

impl Default for Bbt {
    fn default() -> Self {
        Self::ORIGIN
    }
}

impl Ord for Bbt {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.bar, self.beat, self.tick).cmp(&(other.bar, other.beat, other.tick))
    }
}

impl PartialOrd for Bbt {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Bbt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}|{}", self.bar, self.beat, self.tick)
    }
}

impl FromStr for Bbt {
    type Err = TempoMapError;

    fn from_str(s: &str) -> Result<Self> {
        let mut parts = s.trim().split('|').map(str::parse::<u32>);
        match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some(Ok(bar)), Some(Ok(beat)), Some(Ok(tick)), None) => Bbt::new(bar, beat, tick),
            _ => Err(TempoMapError::illegal(0, 0, 0)),
        }
    }
}

#[derive(Serialize, Deserialize)]
struct RawBbt {
    bar: u32,
    beat: u32,
    tick: u32,
}

impl TryFrom<RawBbt> for Bbt {
    type Error = TempoMapError;

    fn try_from(raw: RawBbt) -> Result<Self> {
        Bbt::new(raw.bar, raw.beat, raw.tick)
    }
}

impl From<Bbt> for RawBbt {
    fn from(bbt: Bbt) -> Self {
        RawBbt {
            bar: bbt.bar,
            beat: bbt.beat,
            tick: bbt.tick,
        }
    }
}

/// Signed relative musical motion. Only a map can normalize it, because the
/// number of beats in a bar depends on where the walk goes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BbtOffset {
    pub bars: i32,
    pub beats: i32,
    pub ticks: i32,
}

impl BbtOffset {
    pub const ZERO: BbtOffset = BbtOffset {
        bars: 0,
        beats: 0,
        ticks: 0,
    };

    pub const fn new(bars: i32, beats: i32, ticks: i32) -> Self {
        Self { bars, beats, ticks }
    }

    pub const fn bars(bars: i32) -> Self {
        Self::new(bars, 0, 0)
    }

    pub const fn beats(beats: i32) -> Self {
        Self::new(0, beats, 0)
    }

    pub const fn ticks(ticks: i32) -> Self {
        Self::new(0, 0, ticks)
    }

    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }

    /// Beats and ticks folded into ticks. Bars are excluded since their
    /// length depends on the meter.
    pub(crate) fn sub_bar_ticks(&self) -> i64 {
        i64::from(self.beats) * i64::from(TICKS_PER_BEAT) + i64::from(self.ticks)
    }
}

impl Neg for BbtOffset {
    type Output = BbtOffset;

    fn neg(self) -> Self::Output {
        BbtOffset::new(
            self.bars.saturating_neg(),
            self.beats.saturating_neg(),
            self.ticks.saturating_neg(),
        )
    }
}

impl fmt::Display for BbtOffset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}|{}", self.bars, self.beats, self.ticks)
    }
}
