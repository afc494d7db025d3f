// Trainer - fits a fresh classifier on a demonstration set
//
// Every run starts from a newly initialized model (no warm start), runs the
// whole epoch budget and records an independent parameter snapshot after
// each epoch. The resulting TrainingTrace is the only thing downstream
// inspection/animation tools receive.
//
// There is no partial-failure recovery: an epoch that fails (e.g. non-finite
// loss) fails the whole run and no trace is returned.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::config::ModelConfig;
use crate::demonstration::{DemonstrationSet, ACTION_COUNT};
use crate::encoding::{FeatureEncoder, FeatureMode, FeatureVector};
use crate::error::ModelError;
use crate::model::{ClassifierBackend, LayerParameters, ModelSpec};

/// Parameters of every trainable layer after one epoch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochSnapshot {
    epoch: usize,
    loss: f32,
    layers: Vec<LayerParameters>,
}

impl EpochSnapshot {
    /// 1-based epoch number
    pub fn epoch(&self) -> usize {
        self.epoch
    }

    /// Mean categorical cross-entropy over the epoch
    pub fn loss(&self) -> f32 {
        self.loss
    }

    pub fn layers(&self) -> &[LayerParameters] {
        &self.layers
    }

    pub fn layer(&self, name: &str) -> Option<&LayerParameters> {
        self.layers.iter().find(|l| l.layer == name)
    }
}

/// Ordered, read-only sequence of epoch snapshots
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingTrace {
    mode: FeatureMode,
    epochs: Vec<EpochSnapshot>,
}

impl TrainingTrace {
    pub fn mode(&self) -> FeatureMode {
        self.mode
    }

    pub fn epochs(&self) -> &[EpochSnapshot] {
        &self.epochs
    }

    pub fn len(&self) -> usize {
        self.epochs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.epochs.is_empty()
    }

    pub fn last(&self) -> Option<&EpochSnapshot> {
        self.epochs.last()
    }

    pub fn final_loss(&self) -> Option<f32> {
        self.last().map(|s| s.loss)
    }

    pub fn to_json(&self) -> Result<String, ModelError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Progress update published after each epoch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingProgress {
    pub epoch: usize,
    pub total_epochs: usize,
    pub loss: f32,
}

impl TrainingProgress {
    pub fn is_complete(&self) -> bool {
        self.epoch >= self.total_epochs
    }
}

/// Encoded training matrices
pub struct TrainingBatch {
    pub inputs: Vec<FeatureVector>,
    pub targets: Vec<[f32; ACTION_COUNT]>,
}

impl TrainingBatch {
    /// Validate every demonstration against `mode` and build the feature
    /// and one-hot target matrices, in stored order.
    pub fn encode(demonstrations: &DemonstrationSet, mode: FeatureMode) -> Result<Self, ModelError> {
        let encoder = FeatureEncoder::new(mode);
        let mut inputs = Vec::with_capacity(demonstrations.len());
        let mut targets = Vec::with_capacity(demonstrations.len());
        for record in demonstrations {
            encoder.conform(record.features())?;
            inputs.push(record.features().to_vec());
            targets.push(record.action().one_hot());
        }
        Ok(Self { inputs, targets })
    }
}

/// Runs the fixed epoch budget against a classifier backend
pub struct Trainer {
    epochs: usize,
}

impl Trainer {
    pub fn new(epochs: usize) -> Self {
        Self { epochs }
    }

    pub fn from_config(config: &ModelConfig) -> Self {
        Self::new(config.epochs)
    }

    pub fn epochs(&self) -> usize {
        self.epochs
    }

    /// Train `backend` from scratch on `demonstrations`.
    ///
    /// # Errors
    /// - `InsufficientData` when `demonstrations` is empty (backend untouched)
    /// - `FeatureShapeMismatch` / `FeatureOutOfVocabulary` for records that
    ///   do not fit the mode
    /// - `NumericDivergence` when an epoch produces a non-finite loss
    pub fn train(
        &self,
        backend: &mut dyn ClassifierBackend,
        spec: &ModelSpec,
        demonstrations: &DemonstrationSet,
        progress: Option<&broadcast::Sender<TrainingProgress>>,
    ) -> Result<TrainingTrace, ModelError> {
        if demonstrations.is_empty() {
            return Err(ModelError::InsufficientData);
        }

        let mode = spec.architecture.mode;
        let batch = TrainingBatch::encode(demonstrations, mode)?;
        backend.initialize(spec)?;

        let span = tracing::info_span!(
            "train",
            mode = mode.display_name(),
            demonstrations = demonstrations.len(),
            epochs = self.epochs
        );
        let _guard = span.enter();

        let mut snapshots = Vec::with_capacity(self.epochs);
        for epoch in 1..=self.epochs {
            let loss = backend.fit(&batch.inputs, &batch.targets)?;
            let layers = backend.snapshot_parameters()?;
            snapshots.push(EpochSnapshot {
                epoch,
                loss,
                layers,
            });

            tracing::debug!(epoch, loss, "epoch complete");
            if let Some(tx) = progress {
                // no receivers is fine
                let _ = tx.send(TrainingProgress {
                    epoch,
                    total_epochs: self.epochs,
                    loss,
                });
            }
        }

        let trace = TrainingTrace {
            mode,
            epochs: snapshots,
        };
        tracing::info!(
            final_loss = trace.final_loss().unwrap_or(f32::NAN),
            "[Trainer] Training complete"
        );
        Ok(trace)
    }
}
