use crate::features::notifications::models::Notification;
use crate::shared::errors::{AppError, AppResult};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

/// 通知の表示先
pub trait NotificationSink: Send + Sync {
    /// 通知を表示する（同じキーの通知があれば置き換える）
    ///
    /// 通知権限がない場合は`AppError::PermissionDenied`
    fn post(&self, notification: &Notification) -> AppResult<()>;
}

/// プロセス内の通知センター
///
/// キーごとに最新の通知を1件だけ保持し、表示内容をログに出す
#[derive(Debug)]
pub struct NotificationCenter {
    entries: Mutex<BTreeMap<i32, Notification>>,
    permission_granted: AtomicBool,
}

impl NotificationCenter {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(BTreeMap::new()),
            permission_granted: AtomicBool::new(true),
        }
    }

    /// 通知権限の有無を切り替える
    pub fn set_permission(&self, granted: bool) {
        self.permission_granted.store(granted, Ordering::SeqCst);
    }

    /// 表示中の通知（キー順）
    pub fn active(&self) -> AppResult<Vec<Notification>> {
        Ok(self.entries.lock()?.values().cloned().collect())
    }

    pub fn get(&self, key: i32) -> AppResult<Option<Notification>> {
        Ok(self.entries.lock()?.get(&key).cloned())
    }

    /// 通知を消す
    pub fn dismiss(&self, key: i32) -> AppResult<bool> {
        Ok(self.entries.lock()?.remove(&key).is_some())
    }
}

impl Default for NotificationCenter {
    fn default() -> Self {
        Self::new()
    }
}

impl NotificationSink for NotificationCenter {
    fn post(&self, notification: &Notification) -> AppResult<()> {
        if !self.permission_granted.load(Ordering::SeqCst) {
            return Err(AppError::permission_denied("通知の表示が許可されていません"));
        }

        let replaced = self
            .entries
            .lock()?
            .insert(notification.key, notification.clone())
            .is_some();

        log::info!(
            "通知: [{}] {} / {}{}",
            notification.key,
            notification.title,
            notification.body,
            if replaced { "（更新）" } else { "" }
        );
        Ok(())
    }
}
