use serde::Serialize;

use crate::bbt::{Bbt, BbtOffset};
use crate::map::TempoMap;

/// One line of a beat or bar grid.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GridPoint {
    pub sample: i64,
    pub bbt: Bbt,
    pub bpm: f64,
}

impl TempoMap {
    /// Fills `points` with grid lines in `[start, end)`.
    ///
    /// With `bar_modulo == 0` there is one point per beat. Otherwise only bar
    /// starts are emitted, every `bar_modulo`-th bar counted from bar 1. The
    /// buffer is cleared first and its allocation reused.
    pub fn fill_grid(&self, points: &mut Vec<GridPoint>, start: i64, end: i64, bar_modulo: u32) {
        points.clear();
        if end <= start {
            return;
        }
        let first = self.sample_to_musical(start.max(0));

        if bar_modulo == 0 {
            let mut bbt = self.round_up_to_beat(first);
            if self.musical_to_sample(bbt) < start {
                bbt = self.round_up_to_beat(self.bbt_walk(bbt, BbtOffset::ticks(1)));
            }
            loop {
                let sample = self.musical_to_sample(bbt);
                if sample >= end {
                    break;
                }
                points.push(self.grid_point(sample, bbt));
                let next = self.bbt_walk(bbt, BbtOffset::beats(1));
                // Stops advancing once the bar number saturates.
                if next <= bbt {
                    break;
                }
                bbt = next;
            }
            return;
        }

        let mut bar = self.round_up_to_bar(first).bar();
        let skip = (bar - 1) % bar_modulo;
        if skip != 0 {
            bar = bar.saturating_add(bar_modulo - skip);
        }
        loop {
            let bbt = Bbt::from_parts_unchecked(bar, 1, 0);
            let sample = self.musical_to_sample(bbt);
            if sample >= end {
                break;
            }
            if sample >= start {
                points.push(self.grid_point(sample, bbt));
            }
            if bar == u32::MAX {
                break;
            }
            bar = bar.saturating_add(bar_modulo);
        }
    }

    fn grid_point(&self, sample: i64, bbt: Bbt) -> GridPoint {
        GridPoint {
            sample,
            bbt,
            bpm: self.tempo_at_sample(sample),
        }
    }
}
