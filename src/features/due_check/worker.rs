use crate::features::auth::session::SessionStore;
use crate::features::expenses::models::Expense;
use crate::features::notifications::{DispatchOutcome, NotificationDispatcher};
use crate::features::repository::Repository;
use crate::shared::errors::AppResult;
use crate::shared::utils::{days_until, today_in};
use async_trait::async_trait;
use chrono::NaiveDate;
use chrono_tz::Tz;
use std::sync::Arc;

/// 1回の期限チェックの集計
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DueCheckReport {
    /// 通知が有効で期限が設定されていた経費の件数
    pub examined: usize,
    /// 通知を表示した件数
    pub dispatched: usize,
    /// 期限日を解析できずスキップした件数
    pub skipped_unparseable: usize,
    /// 期限切れ、または通知期間前だった件数
    pub not_due: usize,
    /// 通知権限がなく表示しなかった件数
    pub suppressed: usize,
    /// 表示に失敗した件数
    pub failed_dispatches: usize,
}

/// 1回の実行結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerOutcome {
    Success(DueCheckReport),
    /// スケジューラーによる再試行が必要
    Retry(String),
}

/// スケジューラーから定期実行される処理
#[async_trait]
pub trait ScheduledJob: Send + Sync {
    async fn run_once(&self) -> WorkerOutcome;
}

/// 支払期限チェックワーカー
///
/// サインイン中のユーザーの経費を読み込み、通知期間に入った経費の通知を出す
pub struct DueCheckWorker {
    repository: Arc<Repository>,
    sessions: SessionStore,
    dispatcher: NotificationDispatcher,
    timezone: Tz,
}

impl DueCheckWorker {
    pub fn new(
        repository: Arc<Repository>,
        sessions: SessionStore,
        dispatcher: NotificationDispatcher,
        timezone: Tz,
    ) -> Self {
        Self {
            repository,
            sessions,
            dispatcher,
            timezone,
        }
    }

    /// 指定日を「今日」として期限チェックを行う
    ///
    /// # 引数
    /// * `today` - 基準日
    ///
    /// # 戻り値
    /// ストアの失敗は`WorkerOutcome::Retry`として返す
    pub async fn run_once_on(&self, today: NaiveDate) -> WorkerOutcome {
        match self.check(today).await {
            Ok(report) => {
                log::info!(
                    "期限チェック完了: 対象={}, 通知={}, スキップ={}",
                    report.examined,
                    report.dispatched,
                    report.skipped_unparseable
                );
                WorkerOutcome::Success(report)
            }
            Err(e) => {
                log::warn!("期限チェックに失敗しました。再試行します: {e}");
                WorkerOutcome::Retry(e.to_string())
            }
        }
    }

    async fn check(&self, today: NaiveDate) -> AppResult<DueCheckReport> {
        let mut report = DueCheckReport::default();

        let Some(session) = self.sessions.current().await? else {
            log::debug!("サインイン中のユーザーがいないため期限チェックをスキップします");
            return Ok(report);
        };

        let expenses = self.repository.list_expenses(&session.user_id).await?;
        for expense in expenses.iter().filter(|e| e.wants_due_notification()) {
            report.examined += 1;
            self.check_expense(expense, today, &mut report);
        }

        Ok(report)
    }

    fn check_expense(&self, expense: &Expense, today: NaiveDate, report: &mut DueCheckReport) {
        let Some(due) = expense.parsed_due_date() else {
            log::warn!(
                "期限日を解析できません: expense_id={}, due_date={:?}",
                expense.id,
                expense.due_date
            );
            report.skipped_unparseable += 1;
            return;
        };

        let days = days_until(due, today);
        if days < 0 || days > expense.notification_days_before {
            report.not_due += 1;
            return;
        }

        match self.dispatcher.dispatch(expense, days) {
            DispatchOutcome::Posted { .. } => report.dispatched += 1,
            DispatchOutcome::PermissionDenied => report.suppressed += 1,
            DispatchOutcome::Failed(_) => report.failed_dispatches += 1,
        }
    }
}

#[async_trait]
impl ScheduledJob for DueCheckWorker {
    async fn run_once(&self) -> WorkerOutcome {
        self.run_once_on(today_in(self.timezone)).await
    }
}
