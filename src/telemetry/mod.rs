//! Session telemetry collector.
//!
//! The collector keeps a bounded history of training, prediction, dispatch
//! and error events plus a broadcast stream for live consumers. Each session
//! owns its own collector.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use tokio::sync::broadcast;

use crate::config::TelemetryConfig;
use crate::demonstration::ActionLabel;
use crate::error::ErrorCode;
use crate::prediction::PredictionEvent;
use crate::training::{TrainingProgress, TrainingTrace};

pub mod events;

pub use events::MetricEvent;

/// Snapshot of collector state for CLI reporting.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct TelemetrySnapshot {
    pub recent: Vec<MetricEvent>,
    pub total_events: u64,
    pub dropped_events: u64,
}

/// Broadcast-based collector retaining a bounded history of metrics.
pub struct TelemetryCollector {
    tx: broadcast::Sender<MetricEvent>,
    history: Mutex<VecDeque<MetricEvent>>,
    history_capacity: usize,
    total_events: AtomicU64,
    dropped_history: AtomicU64,
}

impl TelemetryCollector {
    pub fn new(buffer: usize, history_capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(buffer.max(1));
        Self {
            tx,
            history: Mutex::new(VecDeque::with_capacity(history_capacity)),
            history_capacity,
            total_events: AtomicU64::new(0),
            dropped_history: AtomicU64::new(0),
        }
    }

    pub fn from_config(config: &TelemetryConfig) -> Self {
        Self::new(config.broadcast_buffer, config.history_capacity)
    }

    pub fn publish(&self, event: MetricEvent) {
        self.total_events.fetch_add(1, Ordering::Relaxed);
        match self.history.lock() {
            Ok(mut history) => {
                if self.history_capacity == 0 {
                    self.dropped_history.fetch_add(1, Ordering::Relaxed);
                } else {
                    if history.len() == self.history_capacity {
                        history.pop_front();
                        self.dropped_history.fetch_add(1, Ordering::Relaxed);
                    }
                    history.push_back(event.clone());
                }
            }
            Err(_) => log::warn!("[Telemetry] History lock poisoned, event kept on stream only"),
        }

        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MetricEvent> {
        self.tx.subscribe()
    }

    pub fn snapshot(&self) -> TelemetrySnapshot {
        let recent = self
            .history
            .lock()
            .map(|history| history.iter().cloned().collect())
            .unwrap_or_default();
        TelemetrySnapshot {
            recent,
            total_events: self.total_events.load(Ordering::Relaxed),
            dropped_events: self.dropped_history.load(Ordering::Relaxed),
        }
    }

    // ========================================================================
    // DOMAIN RECORDERS
    // ========================================================================

    pub fn record_epoch(&self, progress: &TrainingProgress) {
        self.publish(MetricEvent::TrainingEpoch {
            epoch: progress.epoch,
            total_epochs: progress.total_epochs,
            loss: progress.loss,
        });
    }

    pub fn record_training(&self, trace: &TrainingTrace, demonstrations: usize) {
        self.publish(MetricEvent::TrainingCompleted {
            mode: trace.mode(),
            demonstrations,
            epochs: trace.len(),
            final_loss: trace.final_loss().unwrap_or(f32::NAN),
        });
    }

    pub fn record_prediction(&self, event: &PredictionEvent) {
        self.publish(MetricEvent::Prediction {
            action: event.action,
            confidence: event.confidence(),
            policy: event.policy,
            generation: event.generation,
        });
    }

    pub fn record_dispatch(&self, device_id: &str, action: ActionLabel) {
        self.publish(MetricEvent::Dispatch {
            device_id: device_id.to_string(),
            action,
            timestamp_ms: now_timestamp_ms(),
        });
    }

    pub fn record_error<E: ErrorCode>(&self, err: &E, context: impl Into<String>) {
        self.publish(MetricEvent::Error {
            code: err.code(),
            context: context.into(),
        });
    }
}

impl Default for TelemetryCollector {
    fn default() -> Self {
        Self::from_config(&TelemetryConfig::default())
    }
}

fn now_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
