// Note index map - bounded integer categories for detected pitches
//
// The pitch detector upstream reports note names such as "A4" or "C#5".
// The classifier consumes them as a single categorical feature, so every
// pitch-name × octave is mapped once, at startup, onto a small integer range:
//
//   0            unknown / unmapped / absent note
//   1            every note below the low boundary
//   2..=K        low boundary up to the high boundary, one index per semitone
//   K            every note above the high boundary (saturates)
//
// The map is immutable after construction.

use std::collections::HashMap;
use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;

use once_cell::sync::Lazy;

use crate::config::NoteMapConfig;

mod pitch;

pub use pitch::{NoteName, PitchClass, ALL_PITCH_CLASSES};

/// Integer category for a detected note
pub type NoteIndex = u32;

/// Index returned for unknown, malformed or absent notes
pub const UNKNOWN_NOTE: NoteIndex = 0;

/// Index shared by every note below the low boundary
pub const BELOW_RANGE_NOTE: NoteIndex = 1;

/// First index assigned inside the boundary range
const FIRST_IN_RANGE_NOTE: NoteIndex = 2;

static DEFAULT_MAP: Lazy<NoteIndexMap> =
    Lazy::new(|| NoteIndexMap::from_config(&NoteMapConfig::default()));

/// Process-wide map built from the default C4..C6 boundaries.
pub fn default_map() -> &'static NoteIndexMap {
    &DEFAULT_MAP
}

/// Immutable lookup table from note names to [`NoteIndex`] values
#[derive(Debug, Clone)]
pub struct NoteIndexMap {
    indices: HashMap<NoteName, NoteIndex>,
    low: NoteName,
    high: NoteName,
    max_index: NoteIndex,
}

impl NoteIndexMap {
    /// Build the map for every pitch class in `octaves`.
    ///
    /// Notes are visited in ascending pitch order (C0, C#0, ... B0, C1, ...).
    /// If `low` is above `high` the boundaries are swapped.
    pub fn build(low: NoteName, high: NoteName, octaves: RangeInclusive<i32>) -> Self {
        let (low, high) = if low.semitones() <= high.semitones() {
            (low, high)
        } else {
            (high, low)
        };

        let mut indices = HashMap::new();
        let mut next = FIRST_IN_RANGE_NOTE;
        let mut last_assigned = BELOW_RANGE_NOTE;

        for octave in octaves {
            for pitch in ALL_PITCH_CLASSES {
                let note = NoteName::new(pitch, octave);
                let index = if note.semitones() < low.semitones() {
                    BELOW_RANGE_NOTE
                } else if note.semitones() <= high.semitones() {
                    last_assigned = next;
                    next += 1;
                    last_assigned
                } else {
                    last_assigned
                };
                indices.insert(note, index);
            }
        }

        log::debug!(
            "[NoteIndexMap] Built {} entries, {}..={} → max index {}",
            indices.len(),
            low,
            high,
            last_assigned
        );

        Self {
            indices,
            low,
            high,
            max_index: last_assigned,
        }
    }

    /// Build from configuration, falling back to the default boundaries
    /// when a configured boundary does not parse.
    pub fn from_config(config: &NoteMapConfig) -> Self {
        let defaults = NoteMapConfig::default();
        let low = parse_boundary(&config.low_boundary, &defaults.low_boundary);
        let high = parse_boundary(&config.high_boundary, &defaults.high_boundary);
        Self::build(low, high, config.lowest_octave..=config.highest_octave)
    }

    /// Look up a note name ("A4", "C#5", "Db5").
    ///
    /// Returns [`UNKNOWN_NOTE`] for malformed names and for octaves outside
    /// the enumerated range.
    pub fn index_of(&self, note: &str) -> NoteIndex {
        match NoteName::from_str(note.trim()) {
            Ok(parsed) => self.index_of_note(&parsed),
            Err(_) => UNKNOWN_NOTE,
        }
    }

    /// Look up an optional detection; no detection maps to [`UNKNOWN_NOTE`].
    pub fn lookup(&self, note: Option<&str>) -> NoteIndex {
        note.map_or(UNKNOWN_NOTE, |n| self.index_of(n))
    }

    pub fn index_of_note(&self, note: &NoteName) -> NoteIndex {
        self.indices.get(note).copied().unwrap_or(UNKNOWN_NOTE)
    }

    /// Largest index the map can return (K)
    pub fn max_index(&self) -> NoteIndex {
        self.max_index
    }

    /// Number of distinct values an index can take (0..=K)
    pub fn vocabulary_size(&self) -> usize {
        self.max_index as usize + 1
    }

    pub fn boundaries(&self) -> (NoteName, NoteName) {
        (self.low, self.high)
    }

    /// All entries in ascending pitch order
    pub fn entries(&self) -> Vec<(NoteName, NoteIndex)> {
        let mut entries: Vec<_> = self.indices.iter().map(|(n, i)| (*n, *i)).collect();
        entries.sort_by_key(|(note, _)| note.semitones());
        entries
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

impl fmt::Display for NoteIndexMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "NoteIndexMap({}..={}, {} notes, max index {})",
            self.low,
            self.high,
            self.indices.len(),
            self.max_index
        )
    }
}

fn parse_boundary(configured: &str, fallback: &str) -> NoteName {
    match NoteName::from_str(configured) {
        Ok(note) => note,
        Err(err) => {
            log::warn!(
                "[NoteIndexMap] Invalid boundary {:?} ({}). Using {}.",
                configured,
                err,
                fallback
            );
            // Defaults are compile-time literals and always parse
            NoteName::from_str(fallback).unwrap_or(NoteName::new(PitchClass::C, 4))
        }
    }
}
