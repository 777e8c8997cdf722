use crate::features::storage::RecordId;
use crate::shared::errors::{AppError, AppResult};
use crate::shared::utils::{validate_amount, DateRange};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// ユーザーごとの予算設定（1ユーザーにつき1件）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetSettings {
    pub id: RecordId,
    pub user_id: RecordId,
    /// 月間予算
    pub monthly_budget: Decimal,
    /// 貯蓄率の上位目標（%）
    pub monthly_max_goal: Decimal,
    /// 貯蓄率の下位目標（%）
    pub monthly_min_goal: Decimal,
}

/// 予算設定の保存内容
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetSettingsInput {
    pub user_id: RecordId,
    pub monthly_budget: Decimal,
    pub monthly_max_goal: Decimal,
    pub monthly_min_goal: Decimal,
}

impl BudgetSettingsInput {
    /// 入力を検証する
    ///
    /// 予算は0以上、目標は0〜100%、下位目標は上位目標以下
    pub fn validate(&self) -> AppResult<()> {
        validate_amount(self.monthly_budget)?;

        let hundred = Decimal::ONE_HUNDRED;
        for goal in [self.monthly_min_goal, self.monthly_max_goal] {
            if goal < Decimal::ZERO || goal > hundred {
                return Err(AppError::validation("目標は0〜100%の範囲で入力してください"));
            }
        }

        if self.monthly_min_goal > self.monthly_max_goal {
            return Err(AppError::validation(
                "下位目標は上位目標以下である必要があります",
            ));
        }

        Ok(())
    }

    pub fn into_settings(self, id: RecordId) -> BudgetSettings {
        BudgetSettings {
            id,
            user_id: self.user_id,
            monthly_budget: self.monthly_budget,
            monthly_max_goal: self.monthly_max_goal,
            monthly_min_goal: self.monthly_min_goal,
        }
    }
}

/// 報酬ティア
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RewardTier {
    Bronze,
    Silver,
    Gold,
    Platinum,
}

impl RewardTier {
    /// 獲得ポイントからティアを決める
    pub fn from_points(points: u32) -> Self {
        match points {
            0..=49 => RewardTier::Bronze,
            50..=99 => RewardTier::Silver,
            100..=199 => RewardTier::Gold,
            _ => RewardTier::Platinum,
        }
    }
}

/// 指標の集計期間
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MetricsPeriod {
    /// 全期間の経費を合計する
    #[default]
    AllTime,
    /// 指定範囲の経費だけを合計する
    Range(DateRange),
}

/// 経費と予算設定から算出した指標（保存はしない）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetMetrics {
    pub period: MetricsPeriod,
    pub total_spent: Decimal,
    pub savings: Decimal,
    pub savings_percentage: Decimal,
    pub reward_points: u32,
    pub tier: RewardTier,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(budget: i64, min: i64, max: i64) -> BudgetSettingsInput {
        BudgetSettingsInput {
            user_id: RecordId::Local(1),
            monthly_budget: Decimal::from(budget),
            monthly_max_goal: Decimal::from(max),
            monthly_min_goal: Decimal::from(min),
        }
    }

    #[test]
    fn test_validate_settings() {
        assert!(input(1000, 20, 50).validate().is_ok());
        assert!(input(0, 0, 0).validate().is_ok());
        assert!(input(-1, 20, 50).validate().is_err());
        assert!(input(1000, 60, 50).validate().is_err());
        assert!(input(1000, 20, 101).validate().is_err());
        assert!(input(1000, -5, 50).validate().is_err());
    }

    #[test]
    fn test_reward_tier_thresholds() {
        assert_eq!(RewardTier::from_points(0), RewardTier::Bronze);
        assert_eq!(RewardTier::from_points(50), RewardTier::Silver);
        assert_eq!(RewardTier::from_points(100), RewardTier::Gold);
        assert_eq!(RewardTier::from_points(199), RewardTier::Gold);
        assert_eq!(RewardTier::from_points(200), RewardTier::Platinum);
    }
}
