use crate::features::expenses::models::{Expense, NewExpense};
use crate::features::storage::cloud::{
    decode_snapshot, query_by_owner, sorted_entries, string_or_number, EXPENSES,
};
use crate::features::storage::{ExpenseStore, RecordId};
use crate::shared::api_client::CloudTransport;
use crate::shared::errors::AppResult;
use crate::shared::utils::{parse_expense_date, DateRange};
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// クラウド上の経費レコード
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExpenseDocument {
    amount: Decimal,
    date: String,
    #[serde(default)]
    start_time: Option<String>,
    #[serde(default)]
    end_time: Option<String>,
    #[serde(default)]
    description: String,
    category: String,
    #[serde(default)]
    photo_uri: Option<String>,
    #[serde(deserialize_with = "string_or_number")]
    user_owner_id: String,
    #[serde(default)]
    due_date: Option<String>,
    #[serde(default)]
    notification_enabled: bool,
    #[serde(default)]
    notification_days_before: i64,
}

impl ExpenseDocument {
    fn from_new(expense: &NewExpense) -> Self {
        Self {
            amount: expense.amount,
            date: expense.date.clone(),
            start_time: expense.start_time.clone(),
            end_time: expense.end_time.clone(),
            description: expense.description.clone(),
            category: expense.category.clone(),
            photo_uri: expense.photo_uri.clone(),
            user_owner_id: expense.owner_id.to_string(),
            due_date: expense.due_date.clone(),
            notification_enabled: expense.notification_enabled,
            notification_days_before: expense.notification_days_before,
        }
    }

    /// 問い合わせに使った所有者IDをそのまま付け直してExpenseにする
    fn into_expense(self, key: String, owner: &RecordId) -> Expense {
        Expense {
            id: RecordId::Cloud(key),
            amount: self.amount,
            date: self.date,
            start_time: self.start_time,
            end_time: self.end_time,
            description: self.description,
            category: self.category,
            photo_uri: self.photo_uri,
            owner_id: owner.clone(),
            due_date: self.due_date,
            notification_enabled: self.notification_enabled,
            notification_days_before: self.notification_days_before,
        }
    }
}

/// Firebaseに保存する経費ストア
#[derive(Clone)]
pub struct CloudExpenseStore {
    transport: Arc<dyn CloudTransport>,
}

impl CloudExpenseStore {
    pub fn new(transport: Arc<dyn CloudTransport>) -> Self {
        Self { transport }
    }

    /// 日付で範囲を絞り込む（所有者での絞り込みはストア側で行う）
    async fn in_range(&self, owner: &RecordId, range: DateRange) -> AppResult<Vec<Expense>> {
        let expenses = self.expenses_for_owner(owner).await?;
        Ok(expenses
            .into_iter()
            .filter(|expense| parse_expense_date(&expense.date).is_some_and(|d| range.contains(d)))
            .collect())
    }
}

#[async_trait]
impl ExpenseStore for CloudExpenseStore {
    async fn insert_expense(&self, expense: NewExpense) -> AppResult<Expense> {
        let document = serde_json::to_value(ExpenseDocument::from_new(&expense))?;
        let key = self.transport.push(EXPENSES, &document).await?;

        log::debug!("クラウドに経費を作成しました: key={key}");
        Ok(expense.into_expense(RecordId::Cloud(key)))
    }

    async fn expenses_for_owner(&self, owner: &RecordId) -> AppResult<Vec<Expense>> {
        let matches =
            query_by_owner(self.transport.as_ref(), EXPENSES, "userOwnerId", owner).await?;

        let mut expenses = Vec::with_capacity(matches.len());
        for (key, value) in sorted_entries(matches) {
            let document: ExpenseDocument = decode_snapshot(&format!("{EXPENSES}/{key}"), value)?;
            expenses.push(document.into_expense(key, owner));
        }
        Ok(expenses)
    }

    async fn expenses_between(&self, owner: &RecordId, range: DateRange) -> AppResult<Vec<Expense>> {
        self.in_range(owner, range).await
    }

    async fn category_total(
        &self,
        owner: &RecordId,
        category: &str,
        range: DateRange,
    ) -> AppResult<Decimal> {
        let expenses = self.in_range(owner, range).await?;
        Ok(expenses
            .iter()
            .filter(|expense| expense.category == category)
            .map(|expense| expense.amount)
            .sum())
    }

    async fn delete_expense(&self, id: &RecordId) -> AppResult<bool> {
        let path = format!("{EXPENSES}/{id}");
        if self.transport.get(&path).await?.is_none() {
            return Ok(false);
        }
        self.transport.delete(&path).await?;
        Ok(true)
    }
}
