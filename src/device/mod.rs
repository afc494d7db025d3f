//! Device-facing collaborators: sensor ingestion and motor dispatch.
//!
//! The device/transport layer pushes [`SensorEvent`]s into a [`SensorHub`]
//! owned by the session, and receives predicted actions through an
//! [`ActionDispatcher`] it implements.

pub mod dispatch;
pub mod sensors;

pub use dispatch::{ActionDispatcher, DispatchedCommand, MotorCommand, RecordingDispatcher};
pub use sensors::{SensorEvent, SensorHub, SensorReading, SensorSubscription, SubscriptionHandle};

use std::future::Future;

/// Run `task` on the current Tokio runtime, or on a dedicated
/// current-thread runtime when called from plain synchronous code.
pub(crate) fn spawn_background<F>(name: &str, task: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    if let Ok(handle) = tokio::runtime::Handle::try_current() {
        handle.spawn(task);
        return Ok(());
    }

    std::thread::Builder::new()
        .name(name.to_string())
        .spawn(move || {
            match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(rt) => rt.block_on(task),
                Err(err) => log::error!("[device] Failed to build runtime: {}", err),
            }
        })
        .map(|_| ())
}
