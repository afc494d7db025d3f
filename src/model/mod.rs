//! Classifier interface and the built-in feed-forward backend.
//!
//! The session never touches numeric buffers directly. It talks to a
//! [`ClassifierBackend`] through five operations (`initialize`, `fit`,
//! `forward`, `snapshot_parameters`, `dispose`) so another numeric backend
//! can be slotted in, and tests can substitute a scripted one.
//!
//! Architecture (fixed):
//!
//! ```text
//! tokens [L] → embedding [L, E] → flatten [L·E] → dense relu [H] → dense softmax [5]
//! ```

use serde::{Deserialize, Serialize};

use crate::config::ModelConfig;
use crate::demonstration::ACTION_COUNT;
use crate::encoding::{FeatureMode, FeatureVector};
use crate::error::ModelError;

pub mod network;
pub mod optimizer;
pub mod tensor;

pub use network::FeedForwardNetwork;
pub use optimizer::Adam;
pub use tensor::{LayerParameters, Tensor};

/// Layer names, in forward order
pub const EMBEDDING_LAYER: &str = "embedding";
pub const FLATTEN_LAYER: &str = "flatten";
pub const HIDDEN_LAYER: &str = "dense_hidden";
pub const OUTPUT_LAYER: &str = "dense_output";

/// Lifecycle of a classifier instance
///
/// `Uninitialized → Initialized(mode) → Trained(mode) → Disposed`, with
/// `Initialized → Disposed` when replaced before training.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClassifierState {
    Uninitialized,
    Initialized(FeatureMode),
    Trained(FeatureMode),
    Disposed,
}

impl ClassifierState {
    /// Mode of a live classifier, `None` when uninitialized or disposed
    pub fn mode(&self) -> Option<FeatureMode> {
        match self {
            ClassifierState::Initialized(mode) | ClassifierState::Trained(mode) => Some(*mode),
            _ => None,
        }
    }

    pub fn is_live(&self) -> bool {
        self.mode().is_some()
    }
}

/// Shape of the network for one feature mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Architecture {
    pub mode: FeatureMode,
    /// Embedding input vocabulary (note index range 0..=K)
    pub vocabulary: usize,
    pub embedding_dim: usize,
    pub hidden_units: usize,
    pub outputs: usize,
}

impl Architecture {
    pub fn new(mode: FeatureMode, vocabulary: usize, config: &ModelConfig) -> Self {
        Self {
            mode,
            vocabulary,
            embedding_dim: config.embedding_dim,
            hidden_units: config.hidden_units,
            outputs: ACTION_COUNT,
        }
    }

    pub fn input_len(&self) -> usize {
        self.mode.feature_len()
    }

    pub fn flatten_len(&self) -> usize {
        self.input_len() * self.embedding_dim
    }

    /// Expected `(layer, weight shape, bias shape)` for every trainable layer
    pub fn parameter_shapes(&self) -> Vec<(&'static str, Vec<usize>, Option<Vec<usize>>)> {
        vec![
            (
                EMBEDDING_LAYER,
                vec![self.vocabulary, self.embedding_dim],
                None,
            ),
            (
                HIDDEN_LAYER,
                vec![self.flatten_len(), self.hidden_units],
                Some(vec![self.hidden_units]),
            ),
            (
                OUTPUT_LAYER,
                vec![self.hidden_units, self.outputs],
                Some(vec![self.outputs]),
            ),
        ]
    }
}

/// Everything a backend needs to build a fresh model
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelSpec {
    pub architecture: Architecture,
    pub learning_rate: f32,
    pub batch_size: usize,
    pub seed: u64,
}

impl ModelSpec {
    pub fn new(mode: FeatureMode, vocabulary: usize, config: &ModelConfig) -> Self {
        Self {
            architecture: Architecture::new(mode, vocabulary, config),
            learning_rate: config.learning_rate,
            batch_size: config.batch_size.max(1),
            seed: config.seed,
        }
    }
}

/// Output of one layer during a forward pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerActivation {
    pub layer: String,
    pub shape: Vec<usize>,
    pub values: Vec<f32>,
}

/// Result of a single-sample forward pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForwardPass {
    /// Softmax output, one entry per action
    pub probabilities: Vec<f32>,
    /// Intermediate output of every layer, in forward order
    pub activations: Vec<LayerActivation>,
}

/// Narrow interface over a numeric classifier implementation
pub trait ClassifierBackend: Send + Sync {
    /// Build fresh parameters, discarding any previous ones.
    fn initialize(&mut self, spec: &ModelSpec) -> Result<(), ModelError>;

    /// Run one full pass over `inputs` and return the mean loss.
    ///
    /// `targets[i]` is the one-hot row for `inputs[i]`.
    fn fit(
        &mut self,
        inputs: &[FeatureVector],
        targets: &[[f32; ACTION_COUNT]],
    ) -> Result<f32, ModelError>;

    fn forward(&self, input: &[f32]) -> Result<ForwardPass, ModelError>;

    /// Independent copy of every trainable layer's parameters.
    fn snapshot_parameters(&self) -> Result<Vec<LayerParameters>, ModelError>;

    /// Release parameter buffers. Later calls fail with `ModelNotInitialized`.
    fn dispose(&mut self);

    fn state(&self) -> ClassifierState;
}

/// Default backend factory
pub fn default_backend() -> Box<dyn ClassifierBackend> {
    Box::new(FeedForwardNetwork::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parameter_shapes_per_mode() {
        let config = ModelConfig::default();
        let note_only = Architecture::new(FeatureMode::NoteOnly, 27, &config);
        let shapes = note_only.parameter_shapes();
        assert_eq!(shapes[0].1, vec![27, 4]);
        assert_eq!(shapes[1].1, vec![4, 8]);
        assert_eq!(shapes[2].1, vec![8, 5]);
        assert_eq!(shapes[2].2, Some(vec![5]));

        let captors = Architecture::new(FeatureMode::CaptorsAndNote, 27, &config);
        assert_eq!(captors.flatten_len(), 40);
        assert_eq!(captors.parameter_shapes()[1].1, vec![40, 8]);
    }

    #[test]
    fn test_state_mode() {
        assert_eq!(ClassifierState::Uninitialized.mode(), None);
        assert_eq!(ClassifierState::Disposed.mode(), None);
        assert_eq!(
            ClassifierState::Trained(FeatureMode::NoteOnly).mode(),
            Some(FeatureMode::NoteOnly)
        );
        assert!(ClassifierState::Initialized(FeatureMode::CaptorsAndNote).is_live());
    }
}
