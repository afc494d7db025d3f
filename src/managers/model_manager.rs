// ModelManager: Focused manager for the live classifier
//
// Single Responsibility: classifier lifecycle, training serialization and
// safe access for predictions.
//
// The live model sits behind an RwLock. Predictions hold the read lock for
// the whole forward pass; disposal needs the write lock, so a model is never
// released while a prediction is still reading it. Every installed model gets
// a new generation number so callers can pin a prediction to the model they
// observed.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tokio::sync::broadcast;

use crate::config::ModelConfig;
use crate::demonstration::DemonstrationSet;
use crate::encoding::FeatureMode;
use crate::error::{log_model_error, ModelError};
use crate::model::{default_backend, ClassifierBackend, ClassifierState, ModelSpec};
use crate::prediction::{DecisionPolicy, PredictionResult, Predictor};
use crate::training::{Trainer, TrainingProgress, TrainingTrace};

/// Builds a fresh, uninitialized backend
pub type BackendFactory = Arc<dyn Fn() -> Box<dyn ClassifierBackend> + Send + Sync>;

struct LiveModel {
    backend: Box<dyn ClassifierBackend>,
    generation: u64,
}

/// Marks a training run or model build as active; clears the flag on drop,
/// including on error
struct TrainingGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> TrainingGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Result<Self, ModelError> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| ModelError::TrainingInProgress)?;
        Ok(Self { flag })
    }
}

impl Drop for TrainingGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Owns the session's live classifier
pub struct ModelManager {
    slot: RwLock<Option<LiveModel>>,
    next_generation: AtomicU64,
    training: AtomicBool,
    factory: BackendFactory,
    config: ModelConfig,
    vocabulary: usize,
}

impl ModelManager {
    /// Manager using the built-in feed-forward backend
    pub fn new(config: ModelConfig, vocabulary: usize) -> Self {
        Self::with_factory(config, vocabulary, Arc::new(default_backend))
    }

    pub fn with_factory(config: ModelConfig, vocabulary: usize, factory: BackendFactory) -> Self {
        Self {
            slot: RwLock::new(None),
            next_generation: AtomicU64::new(1),
            training: AtomicBool::new(false),
            factory,
            config,
            vocabulary,
        }
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    /// Embedding vocabulary used for every model this manager builds
    pub fn vocabulary(&self) -> usize {
        self.vocabulary
    }

    pub fn spec_for(&self, mode: FeatureMode) -> ModelSpec {
        ModelSpec::new(mode, self.vocabulary, &self.config)
    }

    pub fn is_training(&self) -> bool {
        self.training.load(Ordering::Acquire)
    }

    /// Build a fresh model for `mode`, replacing (and disposing) any live one.
    ///
    /// # Errors
    /// - `TrainingInProgress` while a training run or another initialize is
    ///   active
    /// - `StatePoisoned` on lock poisoning
    pub fn initialize(&self, mode: FeatureMode) -> Result<u64, ModelError> {
        // held until the model is installed so a run cannot start in between
        let _guard = TrainingGuard::acquire(&self.training).inspect_err(|err| {
            log_model_error(err, "initialize");
        })?;

        let mut backend = (self.factory)();
        backend.initialize(&self.spec_for(mode))?;
        let generation = self.install(backend)?;
        log::info!(
            "[ModelManager] Initialized {} model (generation {})",
            mode.display_name(),
            generation
        );
        Ok(generation)
    }

    /// Dispose the live model and build a fresh one for `mode`.
    pub fn reinitialize(&self, mode: FeatureMode) -> Result<u64, ModelError> {
        log::info!("[ModelManager] Reinitializing for {}", mode.display_name());
        self.initialize(mode)
    }

    /// Train a fresh model on `demonstrations` and make it the live one.
    ///
    /// The previous model is disposed before the run starts, so predictions
    /// made while training fail with `ModelNotInitialized`. After a failed
    /// run no model is live.
    pub fn train(
        &self,
        demonstrations: &DemonstrationSet,
        mode: FeatureMode,
        progress: Option<&broadcast::Sender<TrainingProgress>>,
    ) -> Result<TrainingTrace, ModelError> {
        let _guard = TrainingGuard::acquire(&self.training).inspect_err(|err| {
            log_model_error(err, "train");
        })?;

        if demonstrations.is_empty() {
            let err = ModelError::InsufficientData;
            log_model_error(&err, "train");
            return Err(err);
        }

        self.dispose()?;

        let trainer = Trainer::from_config(&self.config);
        let mut backend = (self.factory)();
        let trace = trainer
            .train(
                backend.as_mut(),
                &self.spec_for(mode),
                demonstrations,
                progress,
            )
            .inspect_err(|err| log_model_error(err, "train"))?;

        let generation = self.install(backend)?;
        log::info!(
            "[ModelManager] Trained {} model on {} demonstrations (generation {})",
            mode.display_name(),
            demonstrations.len(),
            generation
        );
        Ok(trace)
    }

    /// Predict against whatever model is live at call time.
    ///
    /// Returns the result and the generation of the model that produced it.
    pub fn predict(
        &self,
        predictor: &Predictor,
        features: &[f32],
        policy: DecisionPolicy,
    ) -> Result<(PredictionResult, u64), ModelError> {
        let slot = self.read_slot()?;
        let live = slot.as_ref().ok_or(ModelError::ModelNotInitialized)?;
        let result = predictor.predict(live.backend.as_ref(), features, policy)?;
        Ok((result, live.generation))
    }

    /// Predict only if `generation` is still the live model.
    pub fn predict_pinned(
        &self,
        generation: u64,
        predictor: &Predictor,
        features: &[f32],
        policy: DecisionPolicy,
    ) -> Result<PredictionResult, ModelError> {
        let slot = self.read_slot()?;
        let live = slot
            .as_ref()
            .filter(|live| live.generation == generation)
            .ok_or(ModelError::ModelNotInitialized)?;
        predictor.predict(live.backend.as_ref(), features, policy)
    }

    /// Generation of the live model, if any
    pub fn generation(&self) -> Result<Option<u64>, ModelError> {
        Ok(self.read_slot()?.as_ref().map(|live| live.generation))
    }

    pub fn state(&self) -> Result<ClassifierState, ModelError> {
        Ok(self
            .read_slot()?
            .as_ref()
            .map(|live| live.backend.state())
            .unwrap_or(ClassifierState::Uninitialized))
    }

    /// Mode of the live model
    pub fn mode(&self) -> Result<Option<FeatureMode>, ModelError> {
        Ok(self.state()?.mode())
    }

    /// Release the live model. Does nothing when none is live.
    pub fn dispose(&self) -> Result<(), ModelError> {
        let mut slot = self.write_slot()?;
        if let Some(mut live) = slot.take() {
            live.backend.dispose();
            log::debug!("[ModelManager] Disposed generation {}", live.generation);
        }
        Ok(())
    }

    // ========================================================================
    // HELPER METHODS - Lock management
    // ========================================================================

    fn install(&self, backend: Box<dyn ClassifierBackend>) -> Result<u64, ModelError> {
        let generation = self.next_generation.fetch_add(1, Ordering::AcqRel);
        let mut slot = self.write_slot()?;
        if let Some(mut old) = slot.replace(LiveModel {
            backend,
            generation,
        }) {
            old.backend.dispose();
            log::debug!("[ModelManager] Replaced generation {}", old.generation);
        }
        Ok(generation)
    }

    fn read_slot(&self) -> Result<RwLockReadGuard<'_, Option<LiveModel>>, ModelError> {
        self.slot.read().map_err(|_| ModelError::StatePoisoned)
    }

    fn write_slot(&self) -> Result<RwLockWriteGuard<'_, Option<LiveModel>>, ModelError> {
        self.slot.write().map_err(|_| ModelError::StatePoisoned)
    }
}

impl Drop for ModelManager {
    fn drop(&mut self) {
        if let Ok(slot) = self.slot.get_mut() {
            if let Some(mut live) = slot.take() {
                live.backend.dispose();
            }
        }
    }
}
