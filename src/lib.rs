// Robot Trainer Core - learning motor actions from demonstrations
// Feature encoding, a small embedding classifier with per-epoch snapshots,
// and the session layer that connects it to robot sensors and motors

// Module declarations
pub mod config;
pub mod demonstration;
pub mod device;
pub mod encoding;
pub mod error;
pub mod managers;
pub mod model;
pub mod notes;
pub mod prediction;
pub mod session;
pub mod telemetry;
pub mod training;

// Re-exports for convenience
pub use config::AppConfig;
pub use demonstration::{ActionLabel, DemonstrationRecord, DemonstrationSet, InterchangeRecord};
pub use device::{ActionDispatcher, MotorCommand, SensorEvent, SensorReading};
pub use encoding::{FeatureEncoder, FeatureMode, FeatureVector};
pub use error::{DeviceError, ErrorCode, ModelError, SessionError};
pub use notes::{NoteIndex, NoteIndexMap};
pub use prediction::{DecisionPolicy, PredictionResult};
pub use session::RobotSession;
pub use training::{EpochSnapshot, TrainingProgress, TrainingTrace};
