use crate::features::due_check::worker::{DueCheckReport, ScheduledJob, WorkerOutcome};
use crate::shared::config::WorkerConfig;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// 実行前に確認する実行条件（ネットワーク接続・電池残量など）
pub trait ExecutionConstraints: Send + Sync {
    fn satisfied(&self) -> bool;
}

/// 常に実行可能
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysSatisfied;

impl ExecutionConstraints for AlwaysSatisfied {
    fn satisfied(&self) -> bool {
        true
    }
}

/// ワーカーの状態
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum WorkerState {
    #[default]
    Idle,
    /// 実行中（attemptは0始まりの再試行回数）
    Running { attempt: u32 },
    Succeeded(DueCheckReport),
    RetryScheduled {
        attempt: u32,
        delay: Duration,
        reason: String,
    },
}

/// 再試行までの待機時間（base × 2^n、capで頭打ち）
pub fn backoff_delay(base: Duration, retry: u32, cap: Duration) -> Duration {
    base.checked_mul(2u32.saturating_pow(retry))
        .unwrap_or(cap)
        .min(cap)
}

/// 定期実行スケジューラー
pub struct DueCheckScheduler;

impl DueCheckScheduler {
    /// スケジュールを登録して実行ループを開始する
    ///
    /// 最初の実行は登録直後に行われる。プロセス起動のたびに呼び出すこと
    pub fn start(
        job: Arc<dyn ScheduledJob>,
        config: WorkerConfig,
        constraints: Arc<dyn ExecutionConstraints>,
    ) -> SchedulerHandle {
        let trigger = Arc::new(Notify::new());
        let (state_tx, state_rx) = watch::channel(WorkerState::Idle);
        let cancel = CancellationToken::new();

        let runner = SchedulerLoop {
            job,
            config,
            constraints,
            trigger: trigger.clone(),
            state: state_tx,
            cancel: cancel.clone(),
        };
        let task = tokio::spawn(runner.run());

        log::info!("期限チェックのスケジュールを登録しました");
        SchedulerHandle {
            trigger,
            state: state_rx,
            cancel,
            task,
        }
    }
}

/// 登録済みスケジュールの操作ハンドル
pub struct SchedulerHandle {
    trigger: Arc<Notify>,
    state: watch::Receiver<WorkerState>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    /// 次の定期実行を待たずに実行する
    pub fn trigger_now(&self) {
        self.trigger.notify_one();
    }

    pub fn state(&self) -> WorkerState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<WorkerState> {
        self.state.clone()
    }

    /// スケジュールを解除する（実行中の処理は途中で打ち切られる）
    pub async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(e) = self.task.await {
            log::error!("スケジューラーの停止中にエラーが発生しました: {e}");
        }
        log::info!("期限チェックのスケジュールを解除しました");
    }
}

struct SchedulerLoop {
    job: Arc<dyn ScheduledJob>,
    config: WorkerConfig,
    constraints: Arc<dyn ExecutionConstraints>,
    trigger: Arc<Notify>,
    state: watch::Sender<WorkerState>,
    cancel: CancellationToken,
}

impl SchedulerLoop {
    async fn run(self) {
        let mut ticker = tokio::time::interval(self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = ticker.tick() => {}
                _ = self.trigger.notified() => {
                    log::debug!("期限チェックが手動で起動されました");
                }
            }

            if !self.run_cycle().await {
                break;
            }
        }

        self.state.send_replace(WorkerState::Idle);
    }

    /// 成功するか再試行回数を使い切るまで実行する
    ///
    /// キャンセルされた場合はfalse
    async fn run_cycle(&self) -> bool {
        let mut attempt = 0u32;

        loop {
            let outcome = if self.constraints.satisfied() {
                self.state.send_replace(WorkerState::Running { attempt });
                tokio::select! {
                    _ = self.cancel.cancelled() => return false,
                    outcome = self.job.run_once() => outcome,
                }
            } else {
                WorkerOutcome::Retry("実行条件を満たしていません".to_string())
            };

            let reason = match outcome {
                WorkerOutcome::Success(report) => {
                    self.state.send_replace(WorkerState::Succeeded(report));
                    return true;
                }
                WorkerOutcome::Retry(reason) => reason,
            };

            if attempt >= self.config.max_retries {
                log::error!("期限チェックの再試行回数が上限に達しました: {reason}");
                self.state.send_replace(WorkerState::Idle);
                return true;
            }

            let delay = backoff_delay(self.config.backoff_base, attempt, self.config.interval);
            attempt += 1;
            log::warn!("{}秒後に期限チェックを再試行します（{attempt}回目）: {reason}", delay.as_secs_f64());
            self.state.send_replace(WorkerState::RetryScheduled {
                attempt,
                delay,
                reason,
            });

            tokio::select! {
                _ = self.cancel.cancelled() => return false,
                _ = tokio::time::sleep(delay) => {}
                _ = self.trigger.notified() => {}
            }
        }
    }
}
