//! Byte-driven edit sequences for the libFuzzer target.

use crate::bbt::{Bbt, BbtOffset, TICKS_PER_BEAT};
use crate::map::TempoMap;
use crate::section::{Anchor, Section};
use crate::tempo::{Meter, Tempo};

const NOTE_VALUES: [u32; 4] = [2, 4, 8, 16];

/// Decodes `data` into map edits four bytes at a time, applies them and
/// panics as soon as the map breaks one of its invariants. Rejected edits
/// are expected and ignored.
pub fn fuzz_apply_edits(data: &[u8]) {
    let mut map = TempoMap::default();
    for chunk in data.chunks_exact(4) {
        let &[op, a, b, c] = chunk else {
            continue;
        };
        let Ok(at) = Bbt::new(
            u32::from(a % 32) + 1,
            u32::from(b % 7) + 1,
            u32::from(c) * 7 % TICKS_PER_BEAT,
        ) else {
            continue;
        };
        let bpm = 40.0 + f64::from(a) * 1.5;
        let before = map.clone();

        let result = match op % 9 {
            0 => map.add_tempo(Tempo::constant(bpm), at.into()),
            1 => {
                let sample = i64::from(u16::from_le_bytes([b, c])) * 64;
                map.add_tempo(Tempo::ramped(bpm, 60.0 + f64::from(c)), Anchor::Sample(sample))
            }
            2 => map.add_meter(
                Meter::new(u32::from(b % 12) + 1, NOTE_VALUES[usize::from(c % 4)]),
                at,
            ),
            3 => {
                let anchor = map.tempos()[usize::from(a) % map.tempos().len()].anchor();
                map.remove(Section::Tempo(anchor))
            }
            4 => {
                let bar = map.meters()[usize::from(a) % map.meters().len()].bbt();
                map.remove(Section::Meter(bar))
            }
            5 => {
                let anchor = map.tempos()[usize::from(b) % map.tempos().len()].anchor();
                map.move_section(Section::Tempo(anchor), at.into())
            }
            6 => {
                let anchor = map.tempos()[usize::from(b) % map.tempos().len()].anchor();
                map.replace_tempo(anchor, Tempo::ramped(bpm, 30.0 + f64::from(c) * 2.0))
            }
            7 => map.insert_time(map.musical_to_sample(at), i64::from(c) * 1_000),
            _ => map
                .remove_time(map.musical_to_sample(at), i64::from(c) * 1_000)
                .map(|_| ()),
        };

        if result.is_err() {
            assert_eq!(map, before, "rejected edit changed the map");
        }
        check_invariants(&map);
    }
}

fn check_invariants(map: &TempoMap) {
    let tempos = map.tempos();
    let meters = map.meters();
    assert_eq!(tempos[0].sample(), 0);
    assert_eq!(meters[0].bar(), 1);
    for pair in tempos.windows(2) {
        assert!(pair[0].sample() < pair[1].sample(), "tempos out of order");
        assert!(pair[0].beats() < pair[1].beats(), "tempo beats out of order");
    }
    for (index, section) in tempos.iter().enumerate() {
        assert!(
            tempos[index + 1..].iter().all(|other| other.anchor() != section.anchor()),
            "duplicate tempo anchor {}",
            section.anchor()
        );
    }
    for pair in meters.windows(2) {
        assert!(pair[0].bar() < pair[1].bar(), "meters out of order");
    }
    for section in tempos {
        let bbt = section.bbt();
        assert_eq!(map.sample_to_musical(map.musical_to_sample(bbt)), bbt);
        let there = map.bbt_walk(bbt, BbtOffset::new(0, 3, 17));
        assert_eq!(map.bbt_walk(there, BbtOffset::new(0, -3, -17)), bbt);
    }
}
