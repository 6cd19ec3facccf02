//! Post-commit notifications.

pub mod dispatcher;
pub mod types;

pub use dispatcher::NotificationDispatcher;
pub use types::{Notification, NotificationKind};
