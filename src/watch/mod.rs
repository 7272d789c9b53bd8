// ============================================================================
// Watch Notifications
// ============================================================================
//
// One-shot observer registrations keyed by (path, event kinds). Only the
// change-set of a committed batch is ever published, so a failed batch can
// never trigger a notification.
//
// ============================================================================

pub mod event;
pub mod manager;

pub use event::{EventMask, Notification, WatchHandle, WatchedEvent};
pub use manager::WatchManager;
