// Error types for the robot trainer
//
// This module defines custom error types for the classifier pipeline and the
// device boundary, each carrying a stable numeric code.

mod device;
mod model;
mod session;

pub use device::{log_device_error, DeviceError, DeviceErrorCodes};
pub use model::{log_model_error, ModelError, ModelErrorCodes};
pub use session::SessionError;

/// Error codes for structured error reporting
///
/// This trait provides a standard way to get error codes and messages
/// from custom error types, enabling consistent error handling across
/// the session API and the CLI.
pub trait ErrorCode {
    /// Get the numeric error code
    fn code(&self) -> i32;

    /// Get the human-readable error message
    fn message(&self) -> String;
}
