// BroadcastChannelManager: Centralized tokio broadcast channel management
// Single Responsibility: Broadcast channel lifecycle and subscription

use std::sync::Mutex;
use tokio::sync::broadcast;

use crate::prediction::PredictionEvent;
use crate::training::TrainingProgress;

/// Manages the session's tokio broadcast channels
///
/// # Channel Types
/// - Training progress: one update per completed epoch
/// - Predictions: every prediction made through the session
///
/// Channels are created lazily by `init_*`. Subscribing before a channel
/// exists returns `None`.
pub struct BroadcastChannelManager {
    buffer: usize,
    training: Mutex<Option<broadcast::Sender<TrainingProgress>>>,
    predictions: Mutex<Option<broadcast::Sender<PredictionEvent>>>,
}

impl BroadcastChannelManager {
    /// Create a manager whose channels hold `buffer` messages each
    pub fn new(buffer: usize) -> Self {
        Self {
            buffer: buffer.max(1),
            training: Mutex::new(None),
            predictions: Mutex::new(None),
        }
    }

    // ========================================================================
    // TRAINING PROGRESS CHANNEL
    // ========================================================================

    /// Initialize (or fetch) the training progress channel
    ///
    /// Returns the sender the trainer publishes epoch updates on. Lagging
    /// subscribers lose the oldest updates.
    pub fn init_training_progress(&self) -> Option<broadcast::Sender<TrainingProgress>> {
        let mut guard = self.training.lock().ok()?;
        let tx = guard
            .get_or_insert_with(|| broadcast::channel(self.buffer).0)
            .clone();
        Some(tx)
    }

    /// Subscribe to training progress
    pub fn subscribe_training_progress(&self) -> Option<broadcast::Receiver<TrainingProgress>> {
        self.training
            .lock()
            .ok()?
            .as_ref()
            .map(|tx| tx.subscribe())
    }

    // ========================================================================
    // PREDICTION CHANNEL
    // ========================================================================

    pub fn init_predictions(&self) -> Option<broadcast::Sender<PredictionEvent>> {
        let mut guard = self.predictions.lock().ok()?;
        let tx = guard
            .get_or_insert_with(|| broadcast::channel(self.buffer).0)
            .clone();
        Some(tx)
    }

    pub fn subscribe_predictions(&self) -> Option<broadcast::Receiver<PredictionEvent>> {
        self.predictions
            .lock()
            .ok()?
            .as_ref()
            .map(|tx| tx.subscribe())
    }

    /// Publish a prediction if the channel exists. Missing subscribers are fine.
    pub fn publish_prediction(&self, event: PredictionEvent) {
        if let Ok(guard) = self.predictions.lock() {
            if let Some(tx) = guard.as_ref() {
                let _ = tx.send(event);
            }
        }
    }
}

impl Default for BroadcastChannelManager {
    fn default() -> Self {
        Self::new(100)
    }
}
