//! Configuration management for classifier and session tuning
//!
//! This module provides runtime configuration loading from JSON files,
//! so the note boundaries, network shape and training budget can be
//! adjusted without recompilation.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Complete application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub notes: NoteMapConfig,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub prediction: PredictionConfig,
    #[serde(default)]
    pub devices: DeviceConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

/// Note index map boundaries
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NoteMapConfig {
    /// Notes below this pitch all share index 1
    pub low_boundary: String,
    /// Notes above this pitch share the last assigned index
    pub high_boundary: String,
    /// First octave enumerated when the map is built
    pub lowest_octave: i32,
    /// Last octave enumerated when the map is built
    pub highest_octave: i32,
}

impl Default for NoteMapConfig {
    fn default() -> Self {
        Self {
            low_boundary: "C4".to_string(),
            high_boundary: "C6".to_string(),
            lowest_octave: 0,
            highest_octave: 8,
        }
    }
}

/// Network architecture and optimizer parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Output width of the embedding stage
    pub embedding_dim: usize,
    /// Units in the hidden dense stage
    pub hidden_units: usize,
    /// Fixed epoch budget per training run
    pub epochs: usize,
    /// Adam step size
    pub learning_rate: f32,
    /// Demonstrations per optimizer step within an epoch
    pub batch_size: usize,
    /// Seed for weight initialization
    pub seed: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            embedding_dim: 4,
            hidden_units: 8,
            epochs: 50,
            // 50 epochs over a few dozen demonstrations is only a few hundred
            // Adam steps; 0.001 with large batches leaves such sets underfit
            learning_rate: 0.01,
            batch_size: 8,
            seed: 42,
        }
    }
}

/// Decision policy parameters
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PredictionConfig {
    /// Fixed seed for probabilistic sampling; `None` seeds from entropy
    #[serde(default)]
    pub sampling_seed: Option<u64>,
}

/// Device boundary parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Capacity of the adapter → session ingestion channel
    pub ingest_channel_capacity: usize,
    /// Wheel speed magnitude used for motor commands
    pub motor_speed: i16,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            ingest_channel_capacity: 64,
            motor_speed: 100,
        }
    }
}

/// Telemetry collector sizing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    pub history_capacity: usize,
    pub broadcast_buffer: usize,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            history_capacity: 64,
            broadcast_buffer: 128,
        }
    }
}

impl AppConfig {
    /// Load configuration from JSON file
    ///
    /// # Arguments
    /// * `path` - Path to JSON config file
    ///
    /// # Returns
    /// The parsed configuration, or defaults when the file is missing or
    /// the JSON is invalid (a warning is logged in both cases).
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(config) => {
                    log::info!("[Config] Loaded configuration from {:?}", path.as_ref());
                    config
                }
                Err(err) => {
                    log::warn!(
                        "[Config] Failed to parse JSON from {:?}: {}. Using defaults.",
                        path.as_ref(),
                        err
                    );
                    Self::default()
                }
            },
            Err(err) => {
                log::warn!(
                    "[Config] Failed to read config file {:?}: {}. Using defaults.",
                    path.as_ref(),
                    err
                );
                Self::default()
            }
        }
    }

    /// Load configuration from the bundled assets directory
    pub fn load() -> Self {
        Self::load_from_file("assets/robot_config.json")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.notes.low_boundary, "C4");
        assert_eq!(config.notes.high_boundary, "C6");
        assert_eq!(config.model.hidden_units, 8);
        assert_eq!(config.model.epochs, 50);
        assert_eq!(config.model.batch_size, 8);
        assert!((config.model.learning_rate - 0.01).abs() < f32::EPSILON);
        assert_eq!(config.devices.motor_speed, 100);
        assert!(config.prediction.sampling_seed.is_none());
    }

    #[test]
    fn test_json_roundtrip() {
        let config = AppConfig::default();
        let json = serde_json::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed.model.embedding_dim, config.model.embedding_dim);
        assert_eq!(parsed.notes.high_boundary, config.notes.high_boundary);
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let parsed: AppConfig =
            serde_json::from_str(r#"{"prediction": {"sampling_seed": 7}}"#).unwrap();
        assert_eq!(parsed.prediction.sampling_seed, Some(7));
        assert_eq!(parsed.model.epochs, 50);
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = AppConfig::load_from_file("does/not/exist.json");
        assert_eq!(config.model.seed, 42);
    }
}
