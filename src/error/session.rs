// Session-level error: either family, codes preserved

use crate::error::{DeviceError, ErrorCode, ModelError};
use std::fmt;

/// Failure of a session operation that touches both the model and a device
#[derive(Debug, Clone, PartialEq)]
pub enum SessionError {
    Model(ModelError),
    Device(DeviceError),
}

impl ErrorCode for SessionError {
    fn code(&self) -> i32 {
        match self {
            SessionError::Model(err) => err.code(),
            SessionError::Device(err) => err.code(),
        }
    }

    fn message(&self) -> String {
        match self {
            SessionError::Model(err) => err.message(),
            SessionError::Device(err) => err.message(),
        }
    }
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::Model(err) => fmt::Display::fmt(err, f),
            SessionError::Device(err) => fmt::Display::fmt(err, f),
        }
    }
}

impl std::error::Error for SessionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SessionError::Model(err) => Some(err),
            SessionError::Device(err) => Some(err),
        }
    }
}

impl From<ModelError> for SessionError {
    fn from(err: ModelError) -> Self {
        SessionError::Model(err)
    }
}

impl From<DeviceError> for SessionError {
    fn from(err: DeviceError) -> Self {
        SessionError::Device(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_pass_through() {
        let model: SessionError = ModelError::ModelNotInitialized.into();
        let device: SessionError = DeviceError::UnknownDevice {
            device_id: "r1".into(),
        }
        .into();
        assert_eq!(model.code(), 3001);
        assert_eq!(device.code(), 4002);
        assert!(device.to_string().contains("r1"));
    }
}
