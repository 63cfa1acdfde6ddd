//! Harmoniq RCU
//! ============
//! Snapshot publication between a non-realtime editor and realtime readers.
//! An editor builds a complete private copy and swaps it in atomically;
//! readers take reference counted snapshots without locking and keep them
//! consistent for as long as they hold them.

#![cfg_attr(not(test), warn(clippy::pedantic))]

mod versioned;

pub use versioned::{SharedSnapshot, Versioned, Writer};
