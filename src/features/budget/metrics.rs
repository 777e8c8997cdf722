use crate::features::budget::models::{BudgetMetrics, BudgetSettings, MetricsPeriod, RewardTier};
use crate::features::expenses::models::Expense;
use crate::shared::utils::{parse_expense_date, DateRange};
use rust_decimal::Decimal;

/// 上位目標達成時のポイント
pub const MAX_GOAL_POINTS: u32 = 100;
/// 下位目標達成時のポイント
pub const MIN_GOAL_POINTS: u32 = 50;

/// 全期間の経費から指標を計算する
///
/// # 引数
/// * `expenses` - ユーザーの経費
/// * `settings` - ユーザーの予算設定（未設定ならNone）
///
/// # 戻り値
/// 予算設定がなければNone（副作用なし）
pub fn calculate_metrics(
    expenses: &[Expense],
    settings: Option<&BudgetSettings>,
) -> Option<BudgetMetrics> {
    calculate_metrics_for_period(expenses, settings, MetricsPeriod::AllTime)
}

/// 集計期間を指定して指標を計算する
///
/// 範囲指定時は日付を解析できない経費を集計から外す
pub fn calculate_metrics_for_period(
    expenses: &[Expense],
    settings: Option<&BudgetSettings>,
    period: MetricsPeriod,
) -> Option<BudgetMetrics> {
    let settings = settings?;

    let total_spent = total_spent(expenses, period);
    let savings = settings.monthly_budget.saturating_sub(total_spent);
    let savings_percentage = savings_percentage(savings, settings.monthly_budget);
    let reward_points = reward_points(
        savings_percentage,
        settings.monthly_min_goal,
        settings.monthly_max_goal,
    );

    Some(BudgetMetrics {
        period,
        total_spent,
        savings,
        savings_percentage,
        reward_points,
        tier: RewardTier::from_points(reward_points),
    })
}

/// 期間内の支出合計
pub fn total_spent(expenses: &[Expense], period: MetricsPeriod) -> Decimal {
    expenses
        .iter()
        .filter(|expense| match period {
            MetricsPeriod::AllTime => true,
            MetricsPeriod::Range(range) => {
                parse_expense_date(&expense.date).is_some_and(|date| range.contains(date))
            }
        })
        .fold(Decimal::ZERO, |total, expense| {
            total.saturating_add(expense.amount)
        })
}

/// 貯蓄率（%）。予算が0以下なら0
pub fn savings_percentage(savings: Decimal, monthly_budget: Decimal) -> Decimal {
    if monthly_budget <= Decimal::ZERO {
        return Decimal::ZERO;
    }

    savings
        .checked_div(monthly_budget)
        .and_then(|ratio| ratio.checked_mul(Decimal::ONE_HUNDRED))
        .unwrap_or(Decimal::ZERO)
}

/// 貯蓄率を目標と比べてポイントを決める
pub fn reward_points(percentage: Decimal, min_goal: Decimal, max_goal: Decimal) -> u32 {
    if percentage >= max_goal {
        MAX_GOAL_POINTS
    } else if percentage >= min_goal {
        MIN_GOAL_POINTS
    } else {
        0
    }
}

/// 月ごとのポイントを合計する
///
/// # 引数
/// * `months` - 集計する各月の範囲
///
/// # 戻り値
/// 合計ポイントと、そこから決まるティア
pub fn accumulated_rewards(
    expenses: &[Expense],
    settings: &BudgetSettings,
    months: &[DateRange],
) -> (u32, RewardTier) {
    let points = months
        .iter()
        .filter_map(|month| {
            calculate_metrics_for_period(expenses, Some(settings), MetricsPeriod::Range(*month))
        })
        .map(|metrics| metrics.reward_points)
        .sum();
    (points, RewardTier::from_points(points))
}
