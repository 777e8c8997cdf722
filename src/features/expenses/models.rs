use crate::features::storage::RecordId;
use crate::shared::errors::{AppError, AppResult};
use crate::shared::utils::{parse_expense_date, parse_iso_date, validate_amount};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// 説明文の最大文字数
const DESCRIPTION_MAX_LENGTH: usize = 500;
/// カテゴリ名の最大文字数
const CATEGORY_MAX_LENGTH: usize = 50;

/// 経費
///
/// ローカル・クラウドどちらのストアでも同じ形で扱う
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expense {
    /// 経費ID
    pub id: RecordId,
    /// 金額（0以上）
    pub amount: Decimal,
    /// 日付（YYYY-MM-DD形式）
    pub date: String,
    /// 開始時刻
    pub start_time: Option<String>,
    /// 終了時刻
    pub end_time: Option<String>,
    /// 説明
    pub description: String,
    /// カテゴリ
    pub category: String,
    /// 写真のURI
    pub photo_uri: Option<String>,
    /// 所有ユーザーID
    pub owner_id: RecordId,
    /// 支払期限（YYYY-MM-DD形式）
    pub due_date: Option<String>,
    /// 期限通知の有効/無効
    pub notification_enabled: bool,
    /// 期限の何日前から通知するか
    pub notification_days_before: i64,
}

impl Expense {
    /// 支払期限を解析する（未設定・解析不能ならNone）
    pub fn parsed_due_date(&self) -> Option<NaiveDate> {
        self.due_date.as_deref().and_then(parse_expense_date)
    }

    /// 期限チェックの対象かどうか（通知が有効で期限が空でない）
    pub fn wants_due_notification(&self) -> bool {
        self.notification_enabled
            && self
                .due_date
                .as_deref()
                .is_some_and(|due| !due.trim().is_empty())
    }
}

/// 経費作成用DTO
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewExpense {
    pub amount: Decimal,
    pub date: String,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub description: String,
    pub category: String,
    pub photo_uri: Option<String>,
    pub owner_id: RecordId,
    pub due_date: Option<String>,
    pub notification_enabled: bool,
    pub notification_days_before: i64,
}

impl NewExpense {
    /// 必須項目だけを指定して作成する
    pub fn new(
        owner_id: RecordId,
        amount: Decimal,
        date: impl Into<String>,
        category: impl Into<String>,
    ) -> Self {
        Self {
            amount,
            date: date.into(),
            start_time: None,
            end_time: None,
            description: String::new(),
            category: category.into(),
            photo_uri: None,
            owner_id,
            due_date: None,
            notification_enabled: false,
            notification_days_before: 0,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_times(mut self, start_time: Option<String>, end_time: Option<String>) -> Self {
        self.start_time = start_time;
        self.end_time = end_time;
        self
    }

    pub fn with_photo(mut self, photo_uri: impl Into<String>) -> Self {
        self.photo_uri = Some(photo_uri.into());
        self
    }

    /// 支払期限と通知設定を付ける
    pub fn with_due_date(mut self, due_date: impl Into<String>, days_before: i64) -> Self {
        self.due_date = Some(due_date.into());
        self.notification_enabled = true;
        self.notification_days_before = days_before;
        self
    }

    /// 入力を検証する
    ///
    /// # 戻り値
    /// 検証成功時はOk(())、失敗時はバリデーションエラー
    pub fn validate(&self) -> AppResult<()> {
        validate_amount(self.amount)?;
        parse_iso_date(&self.date)?;

        if self.description.chars().count() > DESCRIPTION_MAX_LENGTH {
            return Err(AppError::validation(format!(
                "説明は{DESCRIPTION_MAX_LENGTH}文字以内で入力してください"
            )));
        }

        let category_length = self.category.trim().chars().count();
        if category_length == 0 {
            return Err(AppError::validation("カテゴリを選択してください"));
        }
        if category_length > CATEGORY_MAX_LENGTH {
            return Err(AppError::validation(format!(
                "カテゴリは{CATEGORY_MAX_LENGTH}文字以内で入力してください"
            )));
        }

        if self.notification_days_before < 0 {
            return Err(AppError::validation("通知日数は0以上である必要があります"));
        }

        if let Some(due) = self.due_date.as_deref().filter(|d| !d.trim().is_empty()) {
            parse_iso_date(due)?;
        }

        Ok(())
    }

    /// 採番済みIDを付けてExpenseにする
    pub fn into_expense(self, id: RecordId) -> Expense {
        Expense {
            id,
            amount: self.amount,
            date: self.date,
            start_time: self.start_time,
            end_time: self.end_time,
            description: self.description,
            category: self.category,
            photo_uri: self.photo_uri,
            owner_id: self.owner_id,
            due_date: self.due_date,
            notification_enabled: self.notification_enabled,
            notification_days_before: self.notification_days_before,
        }
    }
}
