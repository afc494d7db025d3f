// Managers Module
//
// Focused manager classes owned by RobotSession.
//
// Each manager handles one specific concern:
// - ModelManager: live classifier slot, lifecycle and training guard
// - DemonstrationManager: the session's demonstration set
// - BroadcastChannelManager: Tokio broadcast channel management

pub mod broadcast_manager;
pub mod demonstration_manager;
pub mod model_manager;

pub use broadcast_manager::BroadcastChannelManager;
pub use demonstration_manager::DemonstrationManager;
pub use model_manager::{BackendFactory, ModelManager};
