/// 通知機能モジュール（支払期限の通知）
pub mod center;
pub mod dispatcher;
pub mod models;

pub use center::{NotificationCenter, NotificationSink};
pub use dispatcher::NotificationDispatcher;
pub use models::{due_title, notification_key, DispatchOutcome, Notification};
