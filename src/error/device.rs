// Device (sensor ingestion and motor dispatch) error types and constants

use crate::error::ErrorCode;
use log::error;
use std::fmt;

/// Device error code constants
///
/// Error code range: 4001-4005
pub struct DeviceErrorCodes {}

impl DeviceErrorCodes {
    /// Device disconnected while a sensor subscription was active
    pub const SENSOR_STREAM_UNAVAILABLE: i32 = 4001;

    /// Device id never announced by an adapter
    pub const UNKNOWN_DEVICE: i32 = 4002;

    /// Motor command rejected by the control layer
    pub const DISPATCH_FAILED: i32 = 4003;

    /// Ingestion channel closed
    pub const CHANNEL_CLOSED: i32 = 4004;

    /// Mutex/RwLock was poisoned
    pub const LOCK_POISONED: i32 = 4005;
}

/// Log a device error with structured context
pub fn log_device_error(err: &DeviceError, context: &str) {
    error!(
        "Device error in {}: code={}, component=SensorHub, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Errors from the device adapter boundary
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceError {
    /// Device disconnected during a subscription
    SensorStreamUnavailable { device_id: String },

    /// No such device in the session's registry
    UnknownDevice { device_id: String },

    /// Action dispatcher could not deliver the motor command
    DispatchFailed { device_id: String, reason: String },

    /// Sensor ingestion channel closed
    ChannelClosed,

    /// Registry lock poisoned
    LockPoisoned { component: String },
}

impl ErrorCode for DeviceError {
    fn code(&self) -> i32 {
        match self {
            DeviceError::SensorStreamUnavailable { .. } => {
                DeviceErrorCodes::SENSOR_STREAM_UNAVAILABLE
            }
            DeviceError::UnknownDevice { .. } => DeviceErrorCodes::UNKNOWN_DEVICE,
            DeviceError::DispatchFailed { .. } => DeviceErrorCodes::DISPATCH_FAILED,
            DeviceError::ChannelClosed => DeviceErrorCodes::CHANNEL_CLOSED,
            DeviceError::LockPoisoned { .. } => DeviceErrorCodes::LOCK_POISONED,
        }
    }

    fn message(&self) -> String {
        match self {
            DeviceError::SensorStreamUnavailable { device_id } => {
                format!("Sensor stream unavailable for device {}", device_id)
            }
            DeviceError::UnknownDevice { device_id } => {
                format!("Unknown device: {}", device_id)
            }
            DeviceError::DispatchFailed { device_id, reason } => {
                format!("Dispatch to {} failed: {}", device_id, reason)
            }
            DeviceError::ChannelClosed => "Sensor ingestion channel closed".to_string(),
            DeviceError::LockPoisoned { component } => {
                format!("Lock poisoned for component: {}", component)
            }
        }
    }
}

impl fmt::Display for DeviceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "DeviceError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for DeviceError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_error_codes() {
        assert_eq!(
            DeviceError::SensorStreamUnavailable {
                device_id: "bot".to_string()
            }
            .code(),
            4001
        );
        assert_eq!(
            DeviceError::UnknownDevice {
                device_id: "bot".to_string()
            }
            .code(),
            4002
        );
        assert_eq!(DeviceError::ChannelClosed.code(), 4004);
    }

    #[test]
    fn test_device_error_messages() {
        let err = DeviceError::DispatchFailed {
            device_id: "thymio-1".to_string(),
            reason: "link down".to_string(),
        };
        assert_eq!(err.message(), "Dispatch to thymio-1 failed: link down");

        let err = DeviceError::LockPoisoned {
            component: "sensor_registry".to_string(),
        };
        assert!(err.message().contains("sensor_registry"));
    }
}
