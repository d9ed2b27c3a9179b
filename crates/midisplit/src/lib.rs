//! midisplit - partition one MIDI song into performer parts
//!
//! Takes a Standard MIDI File and a performer count N, and produces N
//! complete, independently playable MIDI files. Source tracks are dealt
//! round-robin across the parts (track `i` lands in part `i mod N`), and
//! every part carries the full tempo map and the source's ticks-per-beat in
//! a synthesized conductor track, so all N parts stay locked to the same
//! virtual timeline while playing different subsets of the music.
//!
//! Splitting is a pure function of `(source bytes, N)`: identical inputs
//! always produce byte-identical parts, which makes re-runs after a partial
//! delivery failure safe.
//!
//! Parts with no assigned tracks (N greater than the track count) are still
//! valid MIDI files containing only the conductor track - silent parts, not
//! errors.

pub mod split;
pub mod timeline;

pub use split::{split, split_file, Part};
pub use timeline::{song_duration, SongDuration};

use thiserror::Error;

/// Errors from parsing or partitioning a source song.
#[derive(Debug, Error)]
pub enum SplitError {
    #[error("Invalid performer count: {0} (need at least 1)")]
    NoPerformers(usize),
    #[error("Failed to parse MIDI file: {0}")]
    Malformed(#[from] midly::Error),
    #[error("Unsupported MIDI timing: {0}")]
    Unsupported(&'static str),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
