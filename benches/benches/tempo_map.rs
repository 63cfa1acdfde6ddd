use std::hint::black_box;
use std::time::Duration;

use criterion::{criterion_group, criterion_main, Criterion};
use harmoniq_rcu::Versioned;
use harmoniq_tempo::{
    Anchor, Bbt, BbtOffset, GridPoint, Meter, Tempo, TempoMap, TempoMapHandle,
};

/// A long arrangement: a tempo change every 8 bars, alternating ramps and
/// sample anchors, and a meter change every 24 bars.
fn arrangement() -> TempoMap {
    let mut map = TempoMap::default();
    for section in 1..64u32 {
        let bpm = 80.0 + f64::from(section % 9) * 10.0;
        let bar = section * 8 + 1;
        let tempo = if section % 2 == 0 {
            Tempo::ramped(bpm, bpm + 20.0)
        } else {
            Tempo::constant(bpm)
        };
        let at = match Bbt::new(bar, 1, 0) {
            Ok(bbt) if section % 3 != 0 => Anchor::Musical(bbt),
            Ok(bbt) => Anchor::Sample(map.musical_to_sample(bbt) + 7),
            Err(err) => panic!("{err}"),
        };
        map.add_tempo(tempo, at).expect("tempo");
        if section % 3 == 0 {
            let meter = Meter::new(3 + section % 5, 4);
            map.add_meter(meter, Bbt::new(section * 24 + 1, 1, 0).expect("bar"))
                .expect("meter");
        }
    }
    map
}

fn conversions(c: &mut Criterion) {
    let map = arrangement();
    let mut group = c.benchmark_group("tempo_map");
    group.measurement_time(Duration::from_secs(5));

    group.bench_function("sample_to_musical", |b| {
        let mut sample = 0i64;
        b.iter(|| {
            sample = (sample + 4_801) % 50_000_000;
            black_box(map.sample_to_musical(black_box(sample)))
        });
    });

    group.bench_function("musical_to_sample", |b| {
        let mut bar = 1u32;
        b.iter(|| {
            bar = bar % 500 + 1;
            let position = Bbt::new(bar, 2, 480).expect("position");
            black_box(map.musical_to_sample(black_box(position)))
        });
    });

    group.bench_function("sample_plus_beats_block", |b| {
        b.iter(|| black_box(map.sample_plus_beats(black_box(9_600_000), black_box(37.25))));
    });

    group.bench_function("bbt_walk_across_meters", |b| {
        let start = Bbt::new(20, 2, 100).expect("position");
        b.iter(|| black_box(map.bbt_walk(black_box(start), BbtOffset::new(40, -3, 77))));
    });

    group.bench_function("fill_grid_beats", |b| {
        let mut points: Vec<GridPoint> = Vec::with_capacity(1024);
        b.iter(|| {
            map.fill_grid(&mut points, 1_000_000, 5_000_000, 0);
            black_box(points.len())
        });
    });

    group.finish();
}

fn snapshots(c: &mut Criterion) {
    let mut group = c.benchmark_group("snapshots");

    group.bench_function("reader_per_block", |b| {
        let handle = TempoMapHandle::new(arrangement());
        b.iter(|| {
            let map = handle.reader();
            black_box(map.tempos().len())
        });
    });

    group.bench_function("edit_and_publish", |b| {
        let versioned = Versioned::new(arrangement());
        b.iter(|| {
            versioned
                .update(|map| map.replace_tempo(Anchor::ORIGIN, Tempo::constant(121.0)))
                .expect("edit");
            black_box(versioned.flush())
        });
    });

    group.finish();
}

criterion_group!(benches, conversions, snapshots);
criterion_main!(benches);
