//! Telemetry event types exposed to the CLI and session subscribers.

use serde::{Deserialize, Serialize};

use crate::demonstration::ActionLabel;
use crate::encoding::FeatureMode;
use crate::prediction::DecisionPolicy;

/// Session metrics covering training, prediction and dispatch
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum MetricEvent {
    TrainingEpoch {
        epoch: usize,
        total_epochs: usize,
        loss: f32,
    },
    TrainingCompleted {
        mode: FeatureMode,
        demonstrations: usize,
        epochs: usize,
        final_loss: f32,
    },
    Prediction {
        action: ActionLabel,
        confidence: f32,
        policy: DecisionPolicy,
        generation: u64,
    },
    Dispatch {
        device_id: String,
        action: ActionLabel,
        timestamp_ms: u64,
    },
    Error {
        code: i32,
        context: String,
    },
}
