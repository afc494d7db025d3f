// RobotSession - the control object the surrounding application talks to
//
// One session owns everything with a lifetime: the sensor hub (latest reading
// per device), the live classifier, the demonstration set, broadcast channels
// and telemetry. Nothing here is process-wide except the read-only note map
// a caller may choose to share.

use std::path::Path;
use std::sync::{Arc, RwLock};

use tokio::sync::broadcast::error::TryRecvError;
use tokio::sync::{broadcast, mpsc};

use crate::config::AppConfig;
use crate::demonstration::{ActionLabel, DemonstrationSet, ACTION_COUNT};
use crate::device::sensors::ingest_channel;
use crate::device::{
    spawn_background, ActionDispatcher, RecordingDispatcher, SensorEvent, SensorHub,
    SensorReading, SensorSubscription, SubscriptionHandle,
};
use crate::encoding::{FeatureEncoder, FeatureMode, FeatureVector};
use crate::error::{log_device_error, DeviceError, ModelError, SessionError};
use crate::managers::{
    BackendFactory, BroadcastChannelManager, DemonstrationManager, ModelManager,
};
use crate::model::{default_backend, ClassifierState};
use crate::notes::{NoteIndex, NoteIndexMap};
use crate::prediction::{DecisionPolicy, PredictionEvent, PredictionResult, Predictor};
use crate::telemetry::{MetricEvent, TelemetryCollector, TelemetrySnapshot};
use crate::training::{TrainingProgress, TrainingTrace};

/// One operator session driving one or more robots
pub struct RobotSession {
    config: AppConfig,
    notes: NoteIndexMap,
    sensors: Arc<SensorHub>,
    models: Arc<ModelManager>,
    demonstrations: DemonstrationManager,
    broadcasts: BroadcastChannelManager,
    telemetry: Arc<TelemetryCollector>,
    predictor: Predictor,
    dispatcher: Arc<dyn ActionDispatcher>,
    last_trace: RwLock<Option<Arc<TrainingTrace>>>,
}

impl RobotSession {
    /// Session with the built-in classifier and a recording dispatcher
    pub fn new(config: AppConfig) -> Self {
        let dispatcher = Arc::new(RecordingDispatcher::new(config.devices.motor_speed));
        Self::with_dispatcher(config, dispatcher)
    }

    pub fn with_dispatcher(config: AppConfig, dispatcher: Arc<dyn ActionDispatcher>) -> Self {
        Self::with_parts(config, dispatcher, Arc::new(default_backend))
    }

    /// Session with a custom classifier backend
    pub fn with_parts(
        config: AppConfig,
        dispatcher: Arc<dyn ActionDispatcher>,
        backend_factory: BackendFactory,
    ) -> Self {
        let notes = NoteIndexMap::from_config(&config.notes);
        let models = ModelManager::with_factory(
            config.model.clone(),
            notes.vocabulary_size(),
            backend_factory,
        );
        let broadcasts = BroadcastChannelManager::new(config.telemetry.broadcast_buffer);
        broadcasts.init_training_progress();
        broadcasts.init_predictions();

        log::info!(
            "[RobotSession] Created (notes {}..={}, {} epochs)",
            notes.boundaries().0,
            notes.boundaries().1,
            config.model.epochs
        );

        Self {
            telemetry: Arc::new(TelemetryCollector::from_config(&config.telemetry)),
            predictor: Predictor::new(config.prediction.sampling_seed),
            sensors: Arc::new(SensorHub::new()),
            models: Arc::new(models),
            demonstrations: DemonstrationManager::new(),
            last_trace: RwLock::new(None),
            notes,
            broadcasts,
            dispatcher,
            config,
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn notes(&self) -> &NoteIndexMap {
        &self.notes
    }

    /// Note index of a pitch name; 0 for absent or unknown notes
    pub fn note_index(&self, note: Option<&str>) -> NoteIndex {
        self.notes.lookup(note)
    }

    // ========================================================================
    // DEVICES
    // ========================================================================

    pub fn sensors(&self) -> &SensorHub {
        &self.sensors
    }

    pub fn list_devices(&self) -> Result<Vec<String>, DeviceError> {
        self.sensors.list_devices()
    }

    /// Call `on_change` with every new reading of `device_id` until the
    /// returned handle is dropped or the device disconnects.
    pub fn subscribe_sensors<F>(
        &self,
        device_id: &str,
        on_change: F,
    ) -> Result<SubscriptionHandle, DeviceError>
    where
        F: FnMut(Result<SensorReading, DeviceError>) + Send + 'static,
    {
        self.sensors
            .subscribe_with(device_id, on_change)
            .inspect_err(|err| self.record_device_error(err, "subscribe_sensors"))
    }

    /// Pull-style subscription for async callers
    pub fn sensor_subscription(&self, device_id: &str) -> Result<SensorSubscription, DeviceError> {
        self.sensors.subscribe(device_id)
    }

    /// Start draining a device adapter's event channel into the hub.
    ///
    /// The returned sender is the adapter's end; ingestion stops once every
    /// clone of it is dropped.
    pub fn spawn_sensor_ingest(&self) -> Result<mpsc::Sender<SensorEvent>, DeviceError> {
        let (tx, rx) = ingest_channel(self.config.devices.ingest_channel_capacity);
        let hub = Arc::clone(&self.sensors);
        spawn_background("sensor-ingest", async move { hub.run_ingest(rx).await }).map_err(
            |err| {
                log::error!("[RobotSession] Failed to start sensor ingest: {}", err);
                DeviceError::ChannelClosed
            },
        )?;
        Ok(tx)
    }

    /// Hand `action` to the dispatcher for a connected device.
    pub fn dispatch(&self, device_id: &str, action: ActionLabel) -> Result<(), DeviceError> {
        if !self.sensors.is_connected(device_id)? {
            let err = DeviceError::UnknownDevice {
                device_id: device_id.to_string(),
            };
            self.record_device_error(&err, "dispatch");
            return Err(err);
        }
        self.dispatcher
            .dispatch(device_id, action)
            .inspect_err(|err| self.record_device_error(err, "dispatch"))?;
        self.telemetry.record_dispatch(device_id, action);
        Ok(())
    }

    // ========================================================================
    // CLASSIFIER LIFECYCLE
    // ========================================================================

    pub fn initialize(&self, mode: FeatureMode) -> Result<(), ModelError> {
        self.models
            .initialize(mode)
            .map(|_| ())
            .inspect_err(|err| self.telemetry.record_error(err, "initialize"))
    }

    pub fn reinitialize(&self, mode: FeatureMode) -> Result<(), ModelError> {
        self.models
            .reinitialize(mode)
            .map(|_| ())
            .inspect_err(|err| self.telemetry.record_error(err, "reinitialize"))
    }

    pub fn classifier_state(&self) -> Result<ClassifierState, ModelError> {
        self.models.state()
    }

    /// Generation of the live model, `None` when no model is live
    pub fn model_generation(&self) -> Result<Option<u64>, ModelError> {
        self.models.generation()
    }

    pub fn dispose(&self) -> Result<(), ModelError> {
        self.models.dispose()
    }

    // ========================================================================
    // TRAINING
    // ========================================================================

    /// Train a fresh classifier without blocking the async runtime.
    pub async fn train(
        &self,
        demonstrations: &DemonstrationSet,
        mode: FeatureMode,
    ) -> Result<Arc<TrainingTrace>, ModelError> {
        let models = Arc::clone(&self.models);
        let count = demonstrations.len();
        let demonstrations = demonstrations.clone();
        let progress = self.broadcasts.init_training_progress();
        let epochs = self.broadcasts.subscribe_training_progress();

        let result = tokio::task::spawn_blocking(move || {
            models.train(&demonstrations, mode, progress.as_ref())
        })
        .await
        .map_err(|err| {
            log::error!("[RobotSession] Training task failed: {}", err);
            ModelError::StatePoisoned
        })
        .and_then(|result| result);

        self.finish_training(result, epochs, count)
    }

    /// Synchronous training for callers outside an async runtime.
    pub fn train_blocking(
        &self,
        demonstrations: &DemonstrationSet,
        mode: FeatureMode,
    ) -> Result<Arc<TrainingTrace>, ModelError> {
        let progress = self.broadcasts.init_training_progress();
        let epochs = self.broadcasts.subscribe_training_progress();
        let result = self.models.train(demonstrations, mode, progress.as_ref());
        self.finish_training(result, epochs, demonstrations.len())
    }

    /// Train on the session's own recorded demonstrations.
    pub async fn train_recorded(&self, mode: FeatureMode) -> Result<Arc<TrainingTrace>, ModelError> {
        let demonstrations = self.demonstrations.snapshot()?;
        self.train(&demonstrations, mode).await
    }

    /// Trace of the last successful training run
    pub fn last_trace(&self) -> Option<Arc<TrainingTrace>> {
        self.last_trace.read().ok().and_then(|trace| trace.clone())
    }

    /// Write the last trace as JSON.
    pub fn export_trace<P: AsRef<Path>>(&self, path: P) -> Result<(), ModelError> {
        let trace = self.last_trace().ok_or(ModelError::ModelNotInitialized)?;
        std::fs::write(path, trace.to_json()?)?;
        Ok(())
    }

    pub fn subscribe_training_progress(&self) -> Option<broadcast::Receiver<TrainingProgress>> {
        self.broadcasts.subscribe_training_progress()
    }

    fn finish_training(
        &self,
        result: Result<TrainingTrace, ModelError>,
        epochs: Option<broadcast::Receiver<TrainingProgress>>,
        demonstrations: usize,
    ) -> Result<Arc<TrainingTrace>, ModelError> {
        if let Some(mut rx) = epochs {
            loop {
                match rx.try_recv() {
                    Ok(progress) => self.telemetry.record_epoch(&progress),
                    Err(TryRecvError::Lagged(skipped)) => {
                        log::warn!(
                            "[RobotSession] Progress buffer overflowed, {} epoch events skipped",
                            skipped
                        );
                    }
                    Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
                }
            }
        }

        match result {
            Ok(trace) => {
                self.telemetry.record_training(&trace, demonstrations);
                let trace = Arc::new(trace);
                if let Ok(mut last) = self.last_trace.write() {
                    *last = Some(Arc::clone(&trace));
                }
                Ok(trace)
            }
            Err(err) => {
                self.telemetry.record_error(&err, "train");
                Err(err)
            }
        }
    }

    // ========================================================================
    // PREDICTION
    // ========================================================================

    /// Predict an action for an already encoded feature vector.
    pub fn predict(
        &self,
        features: &[f32],
        policy: DecisionPolicy,
    ) -> Result<PredictionResult, ModelError> {
        let (result, generation) = self
            .models
            .predict(&self.predictor, features, policy)
            .inspect_err(|err| self.telemetry.record_error(err, "predict"))?;
        self.publish_prediction(&result, generation);
        Ok(result)
    }

    /// Predict only against model `generation`; fails with
    /// `ModelNotInitialized` if it has been replaced since.
    pub fn predict_pinned(
        &self,
        generation: u64,
        features: &[f32],
        policy: DecisionPolicy,
    ) -> Result<PredictionResult, ModelError> {
        let result = self
            .models
            .predict_pinned(generation, &self.predictor, features, policy)
            .inspect_err(|err| self.telemetry.record_error(err, "predict_pinned"))?;
        self.publish_prediction(&result, generation);
        Ok(result)
    }

    /// Encode the latest reading of `device_id` plus `note` in the live
    /// model's mode and predict.
    pub fn predict_live(
        &self,
        device_id: &str,
        note: Option<&str>,
        policy: DecisionPolicy,
    ) -> Result<PredictionResult, SessionError> {
        let mode = self.models.mode()?.ok_or(ModelError::ModelNotInitialized)?;
        let features = self.encode_live(device_id, note, mode)?;
        Ok(self.predict(&features, policy)?)
    }

    pub fn subscribe_predictions(&self) -> Option<broadcast::Receiver<PredictionEvent>> {
        self.broadcasts.subscribe_predictions()
    }

    fn publish_prediction(&self, result: &PredictionResult, generation: u64) {
        let event = PredictionEvent::from_result(result, generation);
        self.telemetry.record_prediction(&event);
        self.broadcasts.publish_prediction(event);
    }

    // ========================================================================
    // DEMONSTRATIONS
    // ========================================================================

    /// Capture the latest reading of `device_id` plus `note`, encoded for
    /// `mode`, as a demonstration of `action`. Returns the new set size.
    pub fn record_demonstration(
        &self,
        device_id: &str,
        note: Option<&str>,
        action: ActionLabel,
        mode: FeatureMode,
    ) -> Result<usize, SessionError> {
        let features = self.encode_live(device_id, note, mode)?;
        Ok(self.demonstrations.record(features, action)?)
    }

    /// Append an already encoded demonstration
    pub fn add_demonstration(
        &self,
        features: FeatureVector,
        action: ActionLabel,
    ) -> Result<usize, ModelError> {
        self.demonstrations.record(features, action)
    }

    pub fn clear_demonstrations(&self) -> Result<(), ModelError> {
        self.demonstrations.clear()
    }

    /// Copy of the recorded demonstrations
    pub fn demonstrations(&self) -> Result<DemonstrationSet, ModelError> {
        self.demonstrations.snapshot()
    }

    /// Recorded demonstrations per action, in output-index order
    pub fn demonstration_counts(&self) -> Result<[usize; ACTION_COUNT], ModelError> {
        self.demonstrations.counts_by_action()
    }

    pub fn export_demonstrations(&self) -> Result<String, ModelError> {
        self.demonstrations.export_json()
    }

    /// Replace the recorded set with interchange JSON
    pub fn import_demonstrations(&self, json: &str) -> Result<usize, ModelError> {
        self.demonstrations.import_json(json)
    }

    pub fn save_demonstrations<P: AsRef<Path>>(&self, path: P) -> Result<(), ModelError> {
        self.demonstrations.save(path)
    }

    pub fn load_demonstrations<P: AsRef<Path>>(&self, path: P) -> Result<usize, ModelError> {
        self.demonstrations.load(path)
    }

    // ========================================================================
    // TELEMETRY
    // ========================================================================

    pub fn telemetry(&self) -> TelemetrySnapshot {
        self.telemetry.snapshot()
    }

    pub fn subscribe_telemetry(&self) -> broadcast::Receiver<MetricEvent> {
        self.telemetry.subscribe()
    }

    // ========================================================================
    // HELPERS
    // ========================================================================

    fn encode_live(
        &self,
        device_id: &str,
        note: Option<&str>,
        mode: FeatureMode,
    ) -> Result<FeatureVector, SessionError> {
        let reading = self
            .sensors
            .latest(device_id)?
            .ok_or_else(|| DeviceError::SensorStreamUnavailable {
                device_id: device_id.to_string(),
            })
            .inspect_err(|err| self.record_device_error(err, "encode_live"))?;
        let note = self.notes.lookup(note);
        Ok(FeatureEncoder::new(mode).encode(&reading.values, note)?)
    }

    fn record_device_error(&self, err: &DeviceError, context: &str) {
        log_device_error(err, context);
        self.telemetry.record_error(err, context);
    }
}

impl Default for RobotSession {
    fn default() -> Self {
        Self::new(AppConfig::default())
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
