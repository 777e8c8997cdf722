use crate::features::budget::models::{BudgetSettings, BudgetSettingsInput};
use crate::features::storage::cloud::{
    decode_snapshot, first_entry, query_by_owner, string_or_number, BUDGET_SETTINGS,
};
use crate::features::storage::{BudgetSettingsStore, RecordId};
use crate::shared::api_client::CloudTransport;
use crate::shared::errors::AppResult;
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// クラウド上の予算設定レコード
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BudgetSettingsDocument {
    #[serde(deserialize_with = "string_or_number")]
    user_id: String,
    monthly_budget: Decimal,
    monthly_max_goal: Decimal,
    monthly_min_goal: Decimal,
}

/// Firebaseに保存する予算設定ストア
#[derive(Clone)]
pub struct CloudBudgetSettingsStore {
    transport: Arc<dyn CloudTransport>,
}

impl CloudBudgetSettingsStore {
    pub fn new(transport: Arc<dyn CloudTransport>) -> Self {
        Self { transport }
    }

    /// ユーザーの設定レコードのキーを探す
    async fn existing_key(&self, user_id: &RecordId) -> AppResult<Option<(String, BudgetSettingsDocument)>> {
        let matches =
            query_by_owner(self.transport.as_ref(), BUDGET_SETTINGS, "userId", user_id).await?;

        match first_entry(matches) {
            Some((key, value)) => {
                let document = decode_snapshot(&format!("{BUDGET_SETTINGS}/{key}"), value)?;
                Ok(Some((key, document)))
            }
            None => Ok(None),
        }
    }
}

#[async_trait]
impl BudgetSettingsStore for CloudBudgetSettingsStore {
    async fn upsert_settings(&self, input: BudgetSettingsInput) -> AppResult<BudgetSettings> {
        let document = serde_json::to_value(BudgetSettingsDocument {
            user_id: input.user_id.to_string(),
            monthly_budget: input.monthly_budget,
            monthly_max_goal: input.monthly_max_goal,
            monthly_min_goal: input.monthly_min_goal,
        })?;

        let key = match self.existing_key(&input.user_id).await? {
            Some((key, _)) => {
                self.transport
                    .put(&format!("{BUDGET_SETTINGS}/{key}"), &document)
                    .await?;
                key
            }
            None => self.transport.push(BUDGET_SETTINGS, &document).await?,
        };

        log::info!("クラウドに予算設定を保存しました: key={key}");
        Ok(input.into_settings(RecordId::Cloud(key)))
    }

    async fn settings_for_user(&self, user_id: &RecordId) -> AppResult<Option<BudgetSettings>> {
        Ok(self
            .existing_key(user_id)
            .await?
            .map(|(key, document)| BudgetSettings {
                id: RecordId::Cloud(key),
                user_id: user_id.clone(),
                monthly_budget: document.monthly_budget,
                monthly_max_goal: document.monthly_max_goal,
                monthly_min_goal: document.monthly_min_goal,
            }))
    }
}
