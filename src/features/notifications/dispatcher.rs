use crate::features::expenses::models::Expense;
use crate::features::notifications::center::NotificationSink;
use crate::features::notifications::models::{DispatchOutcome, Notification};
use crate::shared::errors::AppError;
use std::sync::Arc;

/// 支払期限の通知を組み立てて表示先に送る
///
/// 通知は付随的な機能のため、失敗してもエラーにせず結果として返す
#[derive(Clone)]
pub struct NotificationDispatcher {
    sink: Arc<dyn NotificationSink>,
}

impl NotificationDispatcher {
    pub fn new(sink: Arc<dyn NotificationSink>) -> Self {
        Self { sink }
    }

    /// 経費の期限通知を1件送る
    ///
    /// # 引数
    /// * `expense` - 対象の経費
    /// * `days_until_due` - 期限までの日数
    pub fn dispatch(&self, expense: &Expense, days_until_due: i64) -> DispatchOutcome {
        let notification = Notification::for_expense(expense, days_until_due);

        match self.sink.post(&notification) {
            Ok(()) => DispatchOutcome::Posted {
                key: notification.key,
            },
            Err(AppError::PermissionDenied(detail)) => {
                log::warn!("通知権限がないため通知をスキップしました: {detail}");
                DispatchOutcome::PermissionDenied
            }
            Err(e) => {
                log::error!(
                    "通知の表示に失敗しました: expense_id={}, error={e}",
                    expense.id
                );
                DispatchOutcome::Failed(e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::expenses::models::NewExpense;
    use crate::features::notifications::center::NotificationCenter;
    use crate::features::notifications::models::notification_key;
    use crate::features::storage::RecordId;
    use crate::shared::errors::AppResult;
    use rust_decimal::Decimal;

    struct BrokenSink;

    impl NotificationSink for BrokenSink {
        fn post(&self, _notification: &Notification) -> AppResult<()> {
            Err(AppError::Io(std::io::Error::other("通知サービス停止中")))
        }
    }

    fn expense() -> Expense {
        NewExpense::new(RecordId::Local(1), Decimal::from(80), "2024-03-01", "家賃")
            .with_due_date("2024-03-03", 3)
            .into_expense(RecordId::Local(5))
    }

    #[test]
    fn test_dispatch_posts_with_stable_key() {
        let center = Arc::new(NotificationCenter::new());
        let dispatcher = NotificationDispatcher::new(center.clone());

        let first = dispatcher.dispatch(&expense(), 2);
        let second = dispatcher.dispatch(&expense(), 2);
        let key = notification_key(&RecordId::Local(5));
        assert_eq!(first, DispatchOutcome::Posted { key });
        assert_eq!(second, first);

        let active = center.active().unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].title, "Due in 2 Days");
    }

    #[test]
    fn test_permission_denial_is_swallowed() {
        let center = Arc::new(NotificationCenter::new());
        center.set_permission(false);
        let dispatcher = NotificationDispatcher::new(center);
        assert_eq!(dispatcher.dispatch(&expense(), 0), DispatchOutcome::PermissionDenied);
    }

    #[test]
    fn test_other_failures_are_reported() {
        let dispatcher = NotificationDispatcher::new(Arc::new(BrokenSink));
        assert!(matches!(
            dispatcher.dispatch(&expense(), 1),
            DispatchOutcome::Failed(message) if message.contains("通知サービス停止中")
        ));
    }
}
