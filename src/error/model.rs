// Classifier, training and prediction error types and constants

use crate::error::ErrorCode;
use log::error;
use std::fmt;

/// Model error code constants
///
/// Single source of truth for the numeric codes reported to callers of the
/// session API and printed by the CLI.
///
/// Error code range: 3001-3009
pub struct ModelErrorCodes {}

impl ModelErrorCodes {
    /// Predict/train-adjacent call against a missing or disposed model
    pub const MODEL_NOT_INITIALIZED: i32 = 3001;

    /// Training requested with zero demonstrations
    pub const INSUFFICIENT_DATA: i32 = 3002;

    /// Encoded feature vector length disagrees with the active mode
    pub const FEATURE_SHAPE_MISMATCH: i32 = 3003;

    /// Predicted index has no action mapping
    pub const INVALID_ACTION: i32 = 3004;

    /// Feature value cannot be looked up in the embedding table
    pub const FEATURE_OUT_OF_VOCABULARY: i32 = 3005;

    /// Loss became NaN or infinite during an epoch
    pub const NUMERIC_DIVERGENCE: i32 = 3006;

    /// A training run is already active on this session
    pub const TRAINING_IN_PROGRESS: i32 = 3007;

    /// Model slot RwLock was poisoned
    pub const STATE_POISONED: i32 = 3008;

    /// Demonstration interchange payload could not be read or written
    pub const INTERCHANGE: i32 = 3009;
}

/// Log a model error with structured context
///
/// Code, component and message go on one line so log scrapers can key on
/// `code=`.
pub fn log_model_error(err: &ModelError, context: &str) {
    error!(
        "Model error in {}: code={}, component=Classifier, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Errors raised by the demonstration-to-classifier pipeline
///
/// None of these are retried automatically. The caller decides whether to
/// recapture demonstrations or select another feature mode.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelError {
    /// No live classifier (never initialized, or disposed by reinitialization)
    ModelNotInitialized,

    /// Training requested with an empty demonstration set
    InsufficientData,

    /// Feature vector length does not match the classifier's mode
    FeatureShapeMismatch { expected: usize, actual: usize },

    /// Output index without a label in the action table
    InvalidAction { index: usize },

    /// Feature value is negative, fractional, non-finite or beyond the vocabulary
    FeatureOutOfVocabulary {
        position: usize,
        value: f32,
        vocabulary: usize,
    },

    /// Optimization produced a non-finite loss
    NumericDivergence { epoch: usize, loss: f32 },

    /// Another training run holds the classifier
    TrainingInProgress,

    /// Model slot lock poisoned
    StatePoisoned,

    /// Interchange (JSON) encoding or decoding failed
    Interchange { reason: String },
}

impl ErrorCode for ModelError {
    fn code(&self) -> i32 {
        match self {
            ModelError::ModelNotInitialized => ModelErrorCodes::MODEL_NOT_INITIALIZED,
            ModelError::InsufficientData => ModelErrorCodes::INSUFFICIENT_DATA,
            ModelError::FeatureShapeMismatch { .. } => ModelErrorCodes::FEATURE_SHAPE_MISMATCH,
            ModelError::InvalidAction { .. } => ModelErrorCodes::INVALID_ACTION,
            ModelError::FeatureOutOfVocabulary { .. } => {
                ModelErrorCodes::FEATURE_OUT_OF_VOCABULARY
            }
            ModelError::NumericDivergence { .. } => ModelErrorCodes::NUMERIC_DIVERGENCE,
            ModelError::TrainingInProgress => ModelErrorCodes::TRAINING_IN_PROGRESS,
            ModelError::StatePoisoned => ModelErrorCodes::STATE_POISONED,
            ModelError::Interchange { .. } => ModelErrorCodes::INTERCHANGE,
        }
    }

    fn message(&self) -> String {
        match self {
            ModelError::ModelNotInitialized => {
                "Classifier not initialized. Call initialize() or train() first.".to_string()
            }
            ModelError::InsufficientData => {
                "Cannot train without at least one demonstration".to_string()
            }
            ModelError::FeatureShapeMismatch { expected, actual } => {
                format!(
                    "Feature vector has {} values, classifier expects {}",
                    actual, expected
                )
            }
            ModelError::InvalidAction { index } => {
                format!("No action mapped to output index {}", index)
            }
            ModelError::FeatureOutOfVocabulary {
                position,
                value,
                vocabulary,
            } => {
                format!(
                    "Feature {} has value {} outside embedding vocabulary 0..{}",
                    position, value, vocabulary
                )
            }
            ModelError::NumericDivergence { epoch, loss } => {
                format!("Training diverged at epoch {} (loss {})", epoch, loss)
            }
            ModelError::TrainingInProgress => "Training already in progress".to_string(),
            ModelError::StatePoisoned => "Classifier state lock poisoned".to_string(),
            ModelError::Interchange { reason } => {
                format!("Demonstration interchange failed: {}", reason)
            }
        }
    }
}

impl fmt::Display for ModelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ModelError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for ModelError {}

impl From<serde_json::Error> for ModelError {
    fn from(err: serde_json::Error) -> Self {
        ModelError::Interchange {
            reason: err.to_string(),
        }
    }
}

impl From<std::io::Error> for ModelError {
    fn from(err: std::io::Error) -> Self {
        ModelError::Interchange {
            reason: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_error_codes() {
        assert_eq!(ModelError::ModelNotInitialized.code(), 3001);
        assert_eq!(ModelError::InsufficientData.code(), 3002);
        assert_eq!(
            ModelError::FeatureShapeMismatch {
                expected: 10,
                actual: 1
            }
            .code(),
            3003
        );
        assert_eq!(ModelError::InvalidAction { index: 7 }.code(), 3004);
        assert_eq!(
            ModelError::NumericDivergence {
                epoch: 3,
                loss: f32::NAN
            }
            .code(),
            ModelErrorCodes::NUMERIC_DIVERGENCE
        );
        assert_eq!(
            ModelError::TrainingInProgress.code(),
            ModelErrorCodes::TRAINING_IN_PROGRESS
        );
        assert_eq!(ModelError::StatePoisoned.code(), 3008);
    }

    #[test]
    fn test_model_error_messages() {
        let err = ModelError::FeatureShapeMismatch {
            expected: 10,
            actual: 9,
        };
        assert_eq!(
            err.message(),
            "Feature vector has 9 values, classifier expects 10"
        );

        let err = ModelError::InsufficientData;
        assert!(err.message().contains("at least one demonstration"));

        let err = ModelError::InvalidAction { index: 5 };
        assert!(err.message().contains("index 5"));
    }

    #[test]
    fn test_model_error_display() {
        let err = ModelError::ModelNotInitialized;
        let display = format!("{}", err);
        assert!(display.contains("ModelError"));
        assert!(display.contains("3001"));
    }

    #[test]
    fn test_json_error_conversion() {
        let json_err = serde_json::from_str::<Vec<f32>>("not json").unwrap_err();
        let err: ModelError = json_err.into();
        assert_eq!(err.code(), ModelErrorCodes::INTERCHANGE);
    }
}
