use crate::features::auth::models::{User, UserRecord};
use crate::features::budget::models::{BudgetSettings, BudgetSettingsInput};
use crate::features::categories::models::Category;
use crate::features::expenses::models::{Expense, NewExpense};
use crate::features::storage::RecordId;
use crate::shared::errors::AppResult;
use crate::shared::utils::DateRange;
use async_trait::async_trait;
use rust_decimal::Decimal;

/// ユーザーの保存先
#[async_trait]
pub trait UserStore: Send + Sync {
    /// ユーザーを保存する（idがあれば置き換え）
    ///
    /// ユーザー名の重複は`AppError::Conflict`
    async fn save_user(&self, record: UserRecord) -> AppResult<User>;

    /// ユーザー名で検索する（見つからなければNone）
    async fn find_by_username(&self, username: &str) -> AppResult<Option<User>>;

    /// IDで検索する（見つからなければNone）
    async fn find_by_id(&self, id: &RecordId) -> AppResult<Option<User>>;

    /// ユーザーを削除する（削除した場合はtrue）
    async fn delete_user(&self, id: &RecordId) -> AppResult<bool>;
}

/// 経費の保存先
#[async_trait]
pub trait ExpenseStore: Send + Sync {
    /// 経費を追加する
    async fn insert_expense(&self, expense: NewExpense) -> AppResult<Expense>;

    /// 所有ユーザーの経費をすべて取得する
    async fn expenses_for_owner(&self, owner: &RecordId) -> AppResult<Vec<Expense>>;

    /// 所有ユーザーの経費のうち日付が範囲内のものを取得する
    async fn expenses_between(&self, owner: &RecordId, range: DateRange) -> AppResult<Vec<Expense>>;

    /// 範囲内の指定カテゴリの合計金額
    async fn category_total(
        &self,
        owner: &RecordId,
        category: &str,
        range: DateRange,
    ) -> AppResult<Decimal>;

    /// 経費を削除する（削除した場合はtrue）
    async fn delete_expense(&self, id: &RecordId) -> AppResult<bool>;
}

/// 予算設定の保存先
#[async_trait]
pub trait BudgetSettingsStore: Send + Sync {
    /// ユーザーIDをキーに保存する（既存があれば置き換え）
    async fn upsert_settings(&self, input: BudgetSettingsInput) -> AppResult<BudgetSettings>;

    /// ユーザーの予算設定を取得する
    async fn settings_for_user(&self, user_id: &RecordId) -> AppResult<Option<BudgetSettings>>;
}

/// カテゴリの保存先
#[async_trait]
pub trait CategoryStore: Send + Sync {
    /// カテゴリを追加する（既に存在すればfalse）
    async fn add_category(&self, category: Category) -> AppResult<bool>;

    /// ユーザーのカテゴリを名前順で取得する
    async fn categories_for(&self, username: &str) -> AppResult<Vec<Category>>;
}
