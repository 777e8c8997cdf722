use crate::features::budget::models::{BudgetSettings, BudgetSettingsInput};
use crate::features::storage::{BudgetSettingsStore, LocalDatabase, RecordId};
use crate::shared::database::connection::map_constraint_error;
use crate::shared::errors::AppResult;
use crate::shared::utils::money::decimal_from_column;
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};

/// 予算設定を保存する（ユーザーIDが同じ行は置き換える）
///
/// # 引数
/// * `conn` - データベース接続
/// * `input` - 保存する予算設定
///
/// # 戻り値
/// 保存された予算設定。ユーザーが存在しない場合は`AppError::Conflict`
pub fn upsert(conn: &Connection, input: BudgetSettingsInput) -> AppResult<BudgetSettings> {
    let user_id = input.user_id.as_local()?;

    let id: i64 = conn
        .query_row(
            "INSERT INTO budget_settings (user_id, monthly_budget, monthly_max_goal, monthly_min_goal)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(user_id) DO UPDATE SET
                monthly_budget = excluded.monthly_budget,
                monthly_max_goal = excluded.monthly_max_goal,
                monthly_min_goal = excluded.monthly_min_goal
             RETURNING id",
            params![
                user_id,
                input.monthly_budget.to_string(),
                input.monthly_max_goal.to_string(),
                input.monthly_min_goal.to_string()
            ],
            |row| row.get(0),
        )
        .map_err(|e| map_constraint_error(e, "ユーザーが存在しません"))?;

    log::info!("予算設定を保存しました: user_id={user_id}");
    Ok(input.into_settings(RecordId::Local(id)))
}

/// ユーザーIDで予算設定を取得する
pub fn find_by_user(conn: &Connection, user_id: i64) -> AppResult<Option<BudgetSettings>> {
    let settings = conn
        .query_row(
            "SELECT id, user_id, monthly_budget, monthly_max_goal, monthly_min_goal
             FROM budget_settings WHERE user_id = ?1",
            params![user_id],
            |row| {
                let budget: String = row.get(2)?;
                let max_goal: String = row.get(3)?;
                let min_goal: String = row.get(4)?;
                Ok(BudgetSettings {
                    id: RecordId::Local(row.get(0)?),
                    user_id: RecordId::Local(row.get(1)?),
                    monthly_budget: decimal_from_column(&budget, 2)?,
                    monthly_max_goal: decimal_from_column(&max_goal, 3)?,
                    monthly_min_goal: decimal_from_column(&min_goal, 4)?,
                })
            },
        )
        .optional()?;
    Ok(settings)
}

/// SQLiteに保存する予算設定ストア
#[derive(Clone)]
pub struct LocalBudgetSettingsStore {
    db: LocalDatabase,
}

impl LocalBudgetSettingsStore {
    pub fn new(db: LocalDatabase) -> Self {
        Self { db }
    }
}

#[async_trait]
impl BudgetSettingsStore for LocalBudgetSettingsStore {
    async fn upsert_settings(&self, input: BudgetSettingsInput) -> AppResult<BudgetSettings> {
        self.db.run(move |conn| upsert(conn, input)).await
    }

    async fn settings_for_user(&self, user_id: &RecordId) -> AppResult<Option<BudgetSettings>> {
        let user_id = user_id.as_local()?;
        self.db.run(move |conn| find_by_user(conn, user_id)).await
    }
}
