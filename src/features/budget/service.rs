use crate::app_state::AppState;
use crate::features::budget::metrics::calculate_metrics_for_period;
use crate::features::budget::models::{BudgetMetrics, MetricsPeriod};
use crate::features::repository::Repository;
use crate::features::storage::RecordId;
use crate::shared::errors::AppResult;
use std::sync::Arc;

/// 予算指標の計算と配信
#[derive(Clone)]
pub struct BudgetService {
    repository: Arc<Repository>,
    state: AppState,
}

impl BudgetService {
    pub fn new(repository: Arc<Repository>, state: AppState) -> Self {
        Self { repository, state }
    }

    /// ユーザーの指標を再計算してAppStateに配信する
    ///
    /// # 引数
    /// * `user_id` - 対象ユーザー
    /// * `period` - 集計期間
    ///
    /// # 戻り値
    /// 計算した指標（予算設定がなければNone）。ストアのエラーはそのまま返し、配信値は変えない
    pub async fn refresh_metrics(
        &self,
        user_id: &RecordId,
        period: MetricsPeriod,
    ) -> AppResult<Option<BudgetMetrics>> {
        let expenses = self.repository.list_expenses(user_id).await?;
        let settings = self.repository.load_budget_settings(user_id).await?;

        let metrics = calculate_metrics_for_period(&expenses, settings.as_ref(), period);
        match &metrics {
            Some(m) => log::debug!(
                "予算指標を更新しました: user_id={user_id}, savings={}%, points={}",
                m.savings_percentage.round_dp(2),
                m.reward_points
            ),
            None => log::debug!("予算設定がないため指標を計算しません: user_id={user_id}"),
        }

        self.state.publish_metrics(metrics.clone());
        Ok(metrics)
    }

    /// サインイン中のユーザーについて全期間の指標を更新する
    pub async fn refresh_for_session(&self) -> AppResult<Option<BudgetMetrics>> {
        match self.state.current_session() {
            Some(session) => {
                self.refresh_metrics(&session.user_id, MetricsPeriod::AllTime)
                    .await
            }
            None => {
                self.state.publish_metrics(None);
                Ok(None)
            }
        }
    }
}
