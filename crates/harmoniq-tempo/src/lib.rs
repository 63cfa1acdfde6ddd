//! Harmoniq Tempo
//! ==============
//! Tempo and meter map for Harmoniq Studio. Converts between sample positions
//! and `bar|beat|tick` across constant and ramped tempos and meter changes,
//! and publishes edited maps to realtime readers through `harmoniq-rcu`.

#![cfg_attr(not(test), warn(clippy::pedantic))]

pub mod bbt;
pub mod config;
pub mod convert;
pub mod domain;
pub mod error;
#[cfg(any(test, feature = "fuzzing"))]
pub mod fuzz;
pub mod grid;
pub mod map;
pub mod section;
pub mod shared;
pub mod tempo;
mod walk;

pub use bbt::{Bbt, BbtOffset, TICKS_PER_BEAT};
pub use config::TempoMapConfig;
pub use convert::TempoMetric;
pub use domain::{
    DomainProvider, SharedDomainProvider, TimeDomain, TimeDomainProvider, TimePosition,
};
pub use error::{Result, TempoMapError};
#[cfg(any(test, feature = "fuzzing"))]
pub use fuzz::fuzz_apply_edits;
pub use grid::GridPoint;
pub use map::{TempoMap, DEFAULT_SAMPLE_RATE};
pub use section::{Anchor, MeterSection, Section, TempoSection};
pub use shared::{SharedTempoMap, TempoMapHandle, TempoMapSnapshot};
pub use tempo::{max_bpm_at, Meter, Tempo, MAX_BPM, MIN_BPM};
