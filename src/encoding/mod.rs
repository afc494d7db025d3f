// Feature encoding - sensor readings + note index → classifier input
//
// Two configurations exist, chosen when the classifier is initialized and
// fixed for its lifetime:
//
//   NoteOnly        [note_index]
//   CaptorsAndNote  [s0, s1, ..., s8, note_index]   with every s = 1 if > 0 else 0
//
// Every value in an encoded vector is a small non-negative integer so the
// embedding stage can use it directly as a token id.

use serde::{Deserialize, Serialize};

use crate::error::ModelError;
use crate::notes::NoteIndex;

/// Number of proximity sensors the robot reports
pub const SENSOR_COUNT: usize = 9;

/// Encoded classifier input
pub type FeatureVector = Vec<f32>;

/// Feature layout selected at classifier initialization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FeatureMode {
    /// Only the detected note
    NoteOnly,
    /// Nine binarized proximity sensors followed by the note
    CaptorsAndNote,
}

impl FeatureMode {
    /// Length of every feature vector in this mode
    pub fn feature_len(&self) -> usize {
        match self {
            FeatureMode::NoteOnly => 1,
            FeatureMode::CaptorsAndNote => SENSOR_COUNT + 1,
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            FeatureMode::NoteOnly => "NOTE_ONLY",
            FeatureMode::CaptorsAndNote => "CAPTORS_AND_NOTE",
        }
    }
}

/// Pure encoder for one [`FeatureMode`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureEncoder {
    mode: FeatureMode,
}

impl FeatureEncoder {
    pub fn new(mode: FeatureMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> FeatureMode {
        self.mode
    }

    /// Encode a raw sensor reading and a note index.
    ///
    /// # Errors
    /// `FeatureShapeMismatch` when the mode reads sensors and `sensors` does
    /// not hold exactly [`SENSOR_COUNT`] values. Readings are never
    /// truncated or padded. `NoteOnly` ignores the sensors.
    pub fn encode(&self, sensors: &[f32], note: NoteIndex) -> Result<FeatureVector, ModelError> {
        match self.mode {
            FeatureMode::NoteOnly => Ok(vec![note as f32]),
            FeatureMode::CaptorsAndNote => {
                if sensors.len() != SENSOR_COUNT {
                    return Err(ModelError::FeatureShapeMismatch {
                        expected: SENSOR_COUNT,
                        actual: sensors.len(),
                    });
                }
                let mut features = Vec::with_capacity(SENSOR_COUNT + 1);
                features.extend(sensors.iter().map(|&s| binarize(s)));
                features.push(note as f32);
                Ok(features)
            }
        }
    }

    /// Check an already-encoded vector (e.g. an imported demonstration)
    /// against this mode.
    pub fn conform(&self, features: &[f32]) -> Result<(), ModelError> {
        let expected = self.mode.feature_len();
        if features.len() != expected {
            return Err(ModelError::FeatureShapeMismatch {
                expected,
                actual: features.len(),
            });
        }
        Ok(())
    }
}

/// Sensor binarization: any positive proximity reading counts as "seen"
pub fn binarize(value: f32) -> f32 {
    if value > 0.0 {
        1.0
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_note_only_encodes_single_value() {
        let encoder = FeatureEncoder::new(FeatureMode::NoteOnly);
        assert_eq!(encoder.encode(&[], 7).unwrap(), vec![7.0]);
        // sensors are not read in this mode, whatever their shape
        assert_eq!(encoder.encode(&[1.0, 2.0], 3).unwrap(), vec![3.0]);
    }

    #[test]
    fn test_captors_and_note_binarizes_sensors() {
        let encoder = FeatureEncoder::new(FeatureMode::CaptorsAndNote);
        let sensors = [0.0, 1200.0, -3.0, 0.5, 0.0, 0.0, 4000.0, 0.0, 1.0];
        let encoded = encoder.encode(&sensors, 12).unwrap();

        assert_eq!(encoded.len(), 10);
        assert_eq!(
            encoded,
            vec![0.0, 1.0, 0.0, 1.0, 0.0, 0.0, 1.0, 0.0, 1.0, 12.0]
        );
    }

    #[test]
    fn test_wrong_sensor_count_is_rejected() {
        let encoder = FeatureEncoder::new(FeatureMode::CaptorsAndNote);
        for len in [0, 7, 8, 10] {
            let sensors = vec![1.0; len];
            assert_eq!(
                encoder.encode(&sensors, 2),
                Err(ModelError::FeatureShapeMismatch {
                    expected: SENSOR_COUNT,
                    actual: len
                })
            );
        }
    }

    #[test]
    fn test_conform_checks_length_for_mode() {
        let note_only = FeatureEncoder::new(FeatureMode::NoteOnly);
        assert!(note_only.conform(&[4.0]).is_ok());
        assert_eq!(
            note_only.conform(&[0.0; 10]),
            Err(ModelError::FeatureShapeMismatch {
                expected: 1,
                actual: 10
            })
        );

        let captors = FeatureEncoder::new(FeatureMode::CaptorsAndNote);
        assert!(captors.conform(&[0.0; 10]).is_ok());
        assert!(captors.conform(&[4.0]).is_err());
    }

    #[test]
    fn test_mode_serializes_screaming_case() {
        let json = serde_json::to_string(&FeatureMode::CaptorsAndNote).unwrap();
        assert_eq!(json, "\"CAPTORS_AND_NOTE\"");
        assert_eq!(FeatureMode::NoteOnly.feature_len(), 1);
    }
}
