//! Meter-aware musical arithmetic and rounding.

use crate::bbt::{Bbt, BbtOffset};
use crate::map::TempoMap;

impl TempoMap {
    /// Walks `offset` from `start` and returns the canonical result.
    ///
    /// Bars are stepped on the bar index, keeping beat and tick, then the
    /// beats and ticks are added linearly. For a negative bar count the order
    /// is reversed, so walking `-offset` undoes `offset` as long as no bar
    /// step lands in a bar too short for the starting beat. Results before
    /// `1|1|0` clamp to it.
    pub fn bbt_walk(&self, start: Bbt, offset: BbtOffset) -> Bbt {
        self.ticks_to_bbt(self.walk_ticks(self.bbt_to_ticks(start), offset))
    }

    pub(crate) fn walk_ticks(&self, ticks: i64, offset: BbtOffset) -> i64 {
        let linear = offset.sub_bar_ticks();
        if offset.bars >= 0 {
            self.step_bars(ticks, offset.bars) + linear
        } else {
            self.step_bars(ticks + linear, offset.bars)
        }
    }

    fn step_bars(&self, ticks: i64, bars: i32) -> i64 {
        if bars == 0 {
            return ticks;
        }
        let (bar, beat, tick) = self.split_ticks(ticks);
        self.join_ticks(bar + i64::from(bars), beat, tick)
    }

    /// Nearest beat, carrying into the next bar.
    pub fn round_to_beat(&self, bbt: Bbt) -> Bbt {
        self.normalize(bbt.round_to_beat())
    }

    pub fn round_up_to_beat(&self, bbt: Bbt) -> Bbt {
        self.normalize(bbt.round_up_to_beat())
    }

    /// Nearest bar start. The second half of a bar rounds up.
    pub fn round_to_bar(&self, bbt: Bbt) -> Bbt {
        let rounded = self.round_to_beat(bbt);
        let beats_per_bar = self.meter_at_bar(rounded.bar()).beats_per_bar();
        if f64::from(rounded.beat() - 1) >= f64::from(beats_per_bar) / 2.0 {
            next_bar(rounded)
        } else {
            self.round_down_to_bar(rounded)
        }
    }

    pub fn round_up_to_bar(&self, bbt: Bbt) -> Bbt {
        if bbt.is_bar_start() {
            bbt
        } else {
            next_bar(bbt)
        }
    }

    pub fn round_down_to_bar(&self, bbt: Bbt) -> Bbt {
        Bbt::from_parts_unchecked(bbt.bar(), 1, 0)
    }

    fn normalize(&self, bbt: Bbt) -> Bbt {
        self.ticks_to_bbt(self.bbt_to_ticks(bbt))
    }
}

fn next_bar(bbt: Bbt) -> Bbt {
    Bbt::from_parts_unchecked(bbt.bar().saturating_add(1), 1, 0)
}
