//! Due-task notifications: the external notifier capability and the
//! background scheduler that scans the store for tasks coming due.

pub mod notifier;
pub mod scheduler;

pub use notifier::{DueTaskNotice, LogNotifier, Notifier, WebhookNotifier};
pub use scheduler::{NotificationScheduler, ScanOutcome};
