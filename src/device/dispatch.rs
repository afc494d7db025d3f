// Action dispatch contract
//
// The core only decides *which* action to take. Turning an action into motor
// speeds, timing and transport is the device layer's job; MotorCommand is the
// conventional paired-speed translation it can reuse.

use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::demonstration::ActionLabel;
use crate::error::DeviceError;

/// Paired left/right wheel speeds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MotorCommand {
    pub left: i16,
    pub right: i16,
}

impl MotorCommand {
    pub const STOP: MotorCommand = MotorCommand { left: 0, right: 0 };

    /// Conventional translation of an action at `speed`
    pub fn for_action(action: ActionLabel, speed: i16) -> Self {
        let s = speed.saturating_abs();
        match action {
            ActionLabel::Stop => Self::STOP,
            ActionLabel::Forward => Self { left: s, right: s },
            ActionLabel::Backward => Self {
                left: -s,
                right: -s,
            },
            ActionLabel::Left => Self { left: s, right: -s },
            ActionLabel::Right => Self { left: -s, right: s },
        }
    }
}

/// Capability that executes a predicted action on a device
pub trait ActionDispatcher: Send + Sync {
    fn dispatch(&self, device_id: &str, action: ActionLabel) -> Result<(), DeviceError>;
}

/// A dispatched action with its motor translation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchedCommand {
    pub device_id: String,
    pub action: ActionLabel,
    pub command: MotorCommand,
}

/// Dispatcher that only records what it was asked to do.
///
/// Used by the CLI and tests, and as a stand-in before a real transport is
/// attached to the session.
pub struct RecordingDispatcher {
    speed: i16,
    sent: Mutex<Vec<DispatchedCommand>>,
}

impl RecordingDispatcher {
    pub fn new(speed: i16) -> Self {
        Self {
            speed,
            sent: Mutex::new(Vec::new()),
        }
    }

    /// Everything dispatched so far, oldest first
    pub fn commands(&self) -> Vec<DispatchedCommand> {
        self.sent.lock().map(|sent| sent.clone()).unwrap_or_default()
    }

    pub fn last(&self) -> Option<DispatchedCommand> {
        self.sent.lock().ok().and_then(|sent| sent.last().cloned())
    }
}

impl Default for RecordingDispatcher {
    fn default() -> Self {
        Self::new(100)
    }
}

impl ActionDispatcher for RecordingDispatcher {
    fn dispatch(&self, device_id: &str, action: ActionLabel) -> Result<(), DeviceError> {
        let command = MotorCommand::for_action(action, self.speed);
        log::debug!(
            "[RecordingDispatcher] {} -> {} ({}, {})",
            device_id,
            action,
            command.left,
            command.right
        );
        self.sent
            .lock()
            .map_err(|_| DeviceError::LockPoisoned {
                component: "recording dispatcher".to_string(),
            })?
            .push(DispatchedCommand {
                device_id: device_id.to_string(),
                action,
                command,
            });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conventional_motor_table() {
        assert_eq!(MotorCommand::for_action(ActionLabel::Stop, 100), MotorCommand::STOP);
        assert_eq!(
            MotorCommand::for_action(ActionLabel::Forward, 100),
            MotorCommand { left: 100, right: 100 }
        );
        assert_eq!(
            MotorCommand::for_action(ActionLabel::Backward, 100),
            MotorCommand {
                left: -100,
                right: -100
            }
        );
        assert_eq!(
            MotorCommand::for_action(ActionLabel::Left, 100),
            MotorCommand {
                left: 100,
                right: -100
            }
        );
        assert_eq!(
            MotorCommand::for_action(ActionLabel::Right, 100),
            MotorCommand {
                left: -100,
                right: 100
            }
        );
    }

    #[test]
    fn test_negative_speed_is_treated_as_magnitude() {
        assert_eq!(
            MotorCommand::for_action(ActionLabel::Forward, -40),
            MotorCommand { left: 40, right: 40 }
        );
    }

    #[test]
    fn test_recording_dispatcher_keeps_order() {
        let dispatcher = RecordingDispatcher::new(50);
        dispatcher.dispatch("a", ActionLabel::Left).unwrap();
        dispatcher.dispatch("b", ActionLabel::Stop).unwrap();

        let sent = dispatcher.commands();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].device_id, "a");
        assert_eq!(sent[0].command, MotorCommand { left: 50, right: -50 });
        assert_eq!(dispatcher.last().unwrap().action, ActionLabel::Stop);
    }
}
