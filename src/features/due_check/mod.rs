/// 支払期限チェックモジュール
///
/// - 期限チェックワーカー（サインイン中ユーザーの経費を確認して通知）
/// - 定期実行スケジューラー（定期実行・手動起動・再試行・キャンセル）
pub mod scheduler;
pub mod worker;

pub use scheduler::{
    backoff_delay, AlwaysSatisfied, DueCheckScheduler, ExecutionConstraints, SchedulerHandle,
    WorkerState,
};
pub use worker::{DueCheckReport, DueCheckWorker, ScheduledJob, WorkerOutcome};
