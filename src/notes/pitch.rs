// Pitch classes and octave-qualified note names

use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PitchClass {
    C,
    Cs,
    D,
    Ds,
    E,
    F,
    Fs,
    G,
    Gs,
    A,
    As,
    B,
}

/// Chromatic order, starting at C
pub const ALL_PITCH_CLASSES: [PitchClass; 12] = [
    PitchClass::C,
    PitchClass::Cs,
    PitchClass::D,
    PitchClass::Ds,
    PitchClass::E,
    PitchClass::F,
    PitchClass::Fs,
    PitchClass::G,
    PitchClass::Gs,
    PitchClass::A,
    PitchClass::As,
    PitchClass::B,
];

impl PitchClass {
    /// Semitones above C
    pub fn semitone(&self) -> i32 {
        *self as i32
    }

    pub fn from_semitone(semitone: i32) -> Self {
        ALL_PITCH_CLASSES[semitone.rem_euclid(12) as usize]
    }

    /// Sharp spelling used for display
    pub fn name(&self) -> &'static str {
        match self {
            PitchClass::C => "C",
            PitchClass::Cs => "C#",
            PitchClass::D => "D",
            PitchClass::Ds => "D#",
            PitchClass::E => "E",
            PitchClass::F => "F",
            PitchClass::Fs => "F#",
            PitchClass::G => "G",
            PitchClass::Gs => "G#",
            PitchClass::A => "A",
            PitchClass::As => "A#",
            PitchClass::B => "B",
        }
    }

    /// Parse a letter with an optional `#` or `b` accidental.
    ///
    /// Spellings that would cross the octave (Cb, B#) are rejected so the
    /// octave number in the note name stays unambiguous.
    pub fn parse(spelling: &str) -> Option<Self> {
        let mut chars = spelling.chars();
        let letter = chars.next()?.to_ascii_uppercase();
        let natural = match letter {
            'C' => 0,
            'D' => 2,
            'E' => 4,
            'F' => 5,
            'G' => 7,
            'A' => 9,
            'B' => 11,
            _ => return None,
        };
        let offset = match chars.as_str() {
            "" => 0,
            "#" | "♯" => 1,
            "b" | "♭" => -1,
            _ => return None,
        };
        let semitone = natural + offset;
        if !(0..12).contains(&semitone) {
            return None;
        }
        Some(Self::from_semitone(semitone))
    }
}

/// Error produced when a note name does not parse
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteParseError {
    input: String,
}

impl fmt::Display for NoteParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid note name {:?}", self.input)
    }
}

impl std::error::Error for NoteParseError {}

/// A pitch class in a specific octave, e.g. `A4`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NoteName {
    pub pitch: PitchClass,
    pub octave: i32,
}

impl NoteName {
    pub const fn new(pitch: PitchClass, octave: i32) -> Self {
        Self { pitch, octave }
    }

    /// Absolute position in semitones (C0 = 0)
    pub fn semitones(&self) -> i32 {
        self.octave * 12 + self.pitch.semitone()
    }
}

impl fmt::Display for NoteName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.pitch.name(), self.octave)
    }
}

impl FromStr for NoteName {
    type Err = NoteParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || NoteParseError {
            input: s.to_string(),
        };
        let split = s
            .char_indices()
            .find(|(_, c)| c.is_ascii_digit() || *c == '-')
            .map(|(i, _)| i)
            .ok_or_else(err)?;
        let (spelling, octave) = s.split_at(split);
        let pitch = PitchClass::parse(spelling).ok_or_else(err)?;
        let octave = octave.parse::<i32>().map_err(|_| err())?;
        Ok(Self::new(pitch, octave))
    }
}
