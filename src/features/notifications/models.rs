use crate::features::expenses::models::Expense;
use crate::features::storage::RecordId;
use crate::shared::utils::format_amount;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// 端末に表示する通知
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    /// 通知キー（同じ経費なら常に同じ値）
    pub key: i32,
    pub title: String,
    pub body: String,
    pub expense_id: RecordId,
    /// 期限までの日数
    pub days_until_due: i64,
}

impl Notification {
    /// 経費と残り日数から通知を組み立てる
    pub fn for_expense(expense: &Expense, days_until_due: i64) -> Self {
        Self {
            key: notification_key(&expense.id),
            title: due_title(days_until_due),
            body: due_body(expense),
            expense_id: expense.id.clone(),
            days_until_due,
        }
    }
}

/// 送信結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// 表示した（同じキーの通知は置き換え）
    Posted { key: i32 },
    /// 通知権限がないため表示しなかった
    PermissionDenied,
    /// その他の理由で表示できなかった（再試行はしない）
    Failed(String),
}

/// 経費IDから通知キーを作る
///
/// SHA-256の先頭4バイトを使うため、プロセスや実行回をまたいでも変わらない
pub fn notification_key(expense_id: &RecordId) -> i32 {
    let digest = Sha256::digest(expense_id.to_storage_key().as_bytes());
    i32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]])
}

/// 残り日数に応じたタイトル
pub fn due_title(days_until_due: i64) -> String {
    match days_until_due {
        0 => "Due Today".to_string(),
        1 => "Due Tomorrow".to_string(),
        days => format!("Due in {days} Days"),
    }
}

/// 説明・カテゴリ・金額を含む本文
pub fn due_body(expense: &Expense) -> String {
    let amount = format_amount(expense.amount);
    if expense.description.trim().is_empty() {
        format!("{} - {amount}", expense.category)
    } else {
        format!("{} ({}) - {amount}", expense.description, expense.category)
    }
}
