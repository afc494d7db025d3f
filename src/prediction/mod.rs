// Predictor - forward pass plus a decision policy
//
// The predictor never dispatches anything itself. It returns the full
// probability vector, every layer's activations and the selected action;
// the caller decides whether to hand the action to an ActionDispatcher.

use std::sync::Mutex;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::demonstration::ActionLabel;
use crate::error::ModelError;
use crate::model::{ClassifierBackend, LayerActivation};

/// How a probability vector becomes a single action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DecisionPolicy {
    /// Highest probability, first index on ties
    #[default]
    WinnerTakeAll,
    /// Draw from the predicted distribution
    Sampling,
}

impl DecisionPolicy {
    pub fn display_name(&self) -> &'static str {
        match self {
            DecisionPolicy::WinnerTakeAll => "winner-take-all",
            DecisionPolicy::Sampling => "sampling",
        }
    }
}

impl std::str::FromStr for DecisionPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('_', "-").as_str() {
            "winner-take-all" | "wta" | "argmax" => Ok(DecisionPolicy::WinnerTakeAll),
            "sampling" | "sample" | "probabilistic" => Ok(DecisionPolicy::Sampling),
            other => Err(format!("unknown decision policy '{}'", other)),
        }
    }
}

/// Outcome of one prediction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub probabilities: Vec<f32>,
    pub activations: Vec<LayerActivation>,
    pub action: ActionLabel,
    pub policy: DecisionPolicy,
}

/// Broadcast summary of a prediction, without activations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionEvent {
    pub action: ActionLabel,
    pub probabilities: Vec<f32>,
    pub policy: DecisionPolicy,
    /// Generation of the model that produced it
    pub generation: u64,
}

impl PredictionEvent {
    pub fn from_result(result: &PredictionResult, generation: u64) -> Self {
        Self {
            action: result.action,
            probabilities: result.probabilities.clone(),
            policy: result.policy,
            generation,
        }
    }

    /// Probability of the selected action
    pub fn confidence(&self) -> f32 {
        self.probabilities
            .get(self.action.index())
            .copied()
            .unwrap_or(0.0)
    }
}

/// Index of the maximum value; the first one wins on ties.
///
/// `None` for an empty slice.
pub fn winner_take_all(probabilities: &[f32]) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for (i, &p) in probabilities.iter().enumerate() {
        match best {
            Some((_, top)) if p <= top => {}
            _ => best = Some((i, p)),
        }
    }
    best.map(|(i, _)| i)
}

/// First index whose cumulative probability reaches `r`.
///
/// Falls back to the last index when rounding keeps every cumulative sum
/// below `r`. `None` only for an empty slice.
pub fn sample_index(probabilities: &[f32], r: f32) -> Option<usize> {
    let mut cumulative = 0.0;
    for (i, &p) in probabilities.iter().enumerate() {
        cumulative += p;
        if cumulative >= r {
            return Some(i);
        }
    }
    probabilities.len().checked_sub(1)
}

/// Selects actions from classifier output
pub struct Predictor {
    rng: Mutex<StdRng>,
}

impl Predictor {
    /// Seeded predictor; `None` draws the seed from OS entropy.
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            rng: Mutex::new(rng),
        }
    }

    /// Apply `policy` to a probability vector and map the index to a label.
    pub fn decide(
        &self,
        probabilities: &[f32],
        policy: DecisionPolicy,
    ) -> Result<ActionLabel, ModelError> {
        let index = match policy {
            DecisionPolicy::WinnerTakeAll => winner_take_all(probabilities),
            DecisionPolicy::Sampling => {
                let r: f32 = self
                    .rng
                    .lock()
                    .map_err(|_| ModelError::StatePoisoned)?
                    .gen();
                sample_index(probabilities, r)
            }
        };

        let index = index.ok_or(ModelError::InvalidAction {
            index: probabilities.len(),
        })?;
        ActionLabel::from_index(index).ok_or(ModelError::InvalidAction { index })
    }

    /// Run `features` through `backend` and pick an action.
    pub fn predict(
        &self,
        backend: &dyn ClassifierBackend,
        features: &[f32],
        policy: DecisionPolicy,
    ) -> Result<PredictionResult, ModelError> {
        if !backend.state().is_live() {
            return Err(ModelError::ModelNotInitialized);
        }
        let pass = backend.forward(features)?;
        let action = self.decide(&pass.probabilities, policy)?;
        log::debug!(
            "[Predictor] {} -> {} ({:?})",
            policy.display_name(),
            action,
            pass.probabilities
        );
        Ok(PredictionResult {
            probabilities: pass.probabilities,
            activations: pass.activations,
            action,
            policy,
        })
    }
}

impl Default for Predictor {
    fn default() -> Self {
        Self::new(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ModelConfig;
    use crate::demonstration::ACTION_COUNT;
    use crate::encoding::FeatureMode;
    use crate::model::{FeedForwardNetwork, ModelSpec};

    #[test]
    fn test_winner_take_all_prefers_first_on_ties() {
        assert_eq!(winner_take_all(&[0.1, 0.4, 0.4, 0.1, 0.0]), Some(1));
        assert_eq!(winner_take_all(&[0.2; 5]), Some(0));
        assert_eq!(winner_take_all(&[0.0, 0.0, 0.0, 0.0, 1.0]), Some(4));
        assert_eq!(winner_take_all(&[]), None);
    }

    #[test]
    fn test_sample_index_walks_cumulative_sum() {
        let probs = [0.1, 0.2, 0.3, 0.4, 0.0];
        assert_eq!(sample_index(&probs, 0.0), Some(0));
        assert_eq!(sample_index(&probs, 0.1), Some(0));
        assert_eq!(sample_index(&probs, 0.15), Some(1));
        assert_eq!(sample_index(&probs, 0.55), Some(2));
        assert_eq!(sample_index(&probs, 0.99), Some(3));
    }

    #[test]
    fn test_sample_index_falls_back_to_last() {
        // cumulative sum never reaches r
        assert_eq!(sample_index(&[0.1, 0.1, 0.1, 0.1, 0.1], 0.9), Some(4));
        assert_eq!(sample_index(&[], 0.5), None);
    }

    #[test]
    fn test_decide_maps_indices_to_labels() {
        let predictor = Predictor::new(Some(1));
        let label = predictor
            .decide(&[0.0, 0.0, 0.0, 0.9, 0.1], DecisionPolicy::WinnerTakeAll)
            .unwrap();
        assert_eq!(label, ActionLabel::Left);
    }

    #[test]
    fn test_decide_reports_unmapped_index() {
        let predictor = Predictor::new(Some(1));
        let result = predictor.decide(
            &[0.0, 0.0, 0.0, 0.0, 0.0, 1.0],
            DecisionPolicy::WinnerTakeAll,
        );
        assert_eq!(result, Err(ModelError::InvalidAction { index: 5 }));
        assert!(matches!(
            predictor.decide(&[], DecisionPolicy::Sampling),
            Err(ModelError::InvalidAction { .. })
        ));
    }

    #[test]
    fn test_sampling_frequencies_follow_distribution() {
        let predictor = Predictor::new(Some(7));
        let probs = [0.1, 0.2, 0.4, 0.2, 0.1];
        let draws = 5000;
        let mut counts = [0usize; ACTION_COUNT];
        for _ in 0..draws {
            let label = predictor.decide(&probs, DecisionPolicy::Sampling).unwrap();
            counts[label.index()] += 1;
        }

        for (i, &p) in probs.iter().enumerate() {
            let observed = counts[i] as f32 / draws as f32;
            assert!(
                (observed - p).abs() < 0.03,
                "index {}: observed {} expected {}",
                i,
                observed,
                p
            );
        }
    }

    #[test]
    fn test_sampling_is_reproducible_with_seed() {
        let probs = [0.3, 0.1, 0.2, 0.25, 0.15];
        let draw = |seed| {
            let predictor = Predictor::new(Some(seed));
            (0..50)
                .map(|_| predictor.decide(&probs, DecisionPolicy::Sampling).unwrap())
                .collect::<Vec<_>>()
        };
        assert_eq!(draw(11), draw(11));
    }

    #[test]
    fn test_predict_requires_live_model() {
        let predictor = Predictor::new(Some(0));
        let backend = FeedForwardNetwork::new();
        assert_eq!(
            predictor.predict(&backend, &[2.0], DecisionPolicy::WinnerTakeAll),
            Err(ModelError::ModelNotInitialized)
        );
    }

    #[test]
    fn test_predict_is_deterministic_under_winner_take_all() {
        let predictor = Predictor::new(None);
        let mut backend = FeedForwardNetwork::new();
        backend
            .initialize(&ModelSpec::new(
                FeatureMode::NoteOnly,
                27,
                &ModelConfig::default(),
            ))
            .unwrap();

        let a = predictor
            .predict(&backend, &[7.0], DecisionPolicy::WinnerTakeAll)
            .unwrap();
        let b = predictor
            .predict(&backend, &[7.0], DecisionPolicy::WinnerTakeAll)
            .unwrap();
        assert_eq!(a, b);
        let sum: f32 = a.probabilities.iter().sum();
        assert!((sum - 1.0).abs() < 1e-3);
        assert_eq!(a.activations.len(), 4);
    }

    #[test]
    fn test_policy_from_str() {
        assert_eq!(
            "winner_take_all".parse::<DecisionPolicy>(),
            Ok(DecisionPolicy::WinnerTakeAll)
        );
        assert_eq!("Sampling".parse::<DecisionPolicy>(), Ok(DecisionPolicy::Sampling));
        assert!("random".parse::<DecisionPolicy>().is_err());
    }
}
