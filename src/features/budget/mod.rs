/// 予算機能モジュール
///
/// このモジュールは予算設定と派生指標に関連する機能を提供します：
/// - 予算設定の保存（ユーザーごとに1件）
/// - 支出合計・貯蓄率・報酬ポイントの計算
/// - 計算結果のAppStateへの配信
pub mod cloud;
pub mod metrics;
pub mod models;
pub mod repository;
pub mod service;

pub use cloud::CloudBudgetSettingsStore;
pub use metrics::{accumulated_rewards, calculate_metrics, calculate_metrics_for_period};
pub use models::{BudgetMetrics, BudgetSettings, BudgetSettingsInput, MetricsPeriod, RewardTier};
pub use repository::LocalBudgetSettingsStore;
pub use service::BudgetService;
