use crate::features::categories::models::Category;
use crate::features::storage::cloud::{decode_snapshot, encode_key, CATEGORIES};
use crate::features::storage::CategoryStore;
use crate::shared::api_client::CloudTransport;
use crate::shared::errors::AppResult;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Firebaseに保存するカテゴリストア
///
/// `categories/<ユーザー名キー>/<カテゴリ名キー>`に置き、同名の重複を防ぐ
#[derive(Clone)]
pub struct CloudCategoryStore {
    transport: Arc<dyn CloudTransport>,
}

impl CloudCategoryStore {
    pub fn new(transport: Arc<dyn CloudTransport>) -> Self {
        Self { transport }
    }
}

#[async_trait]
impl CategoryStore for CloudCategoryStore {
    async fn add_category(&self, category: Category) -> AppResult<bool> {
        let path = format!(
            "{CATEGORIES}/{}/{}",
            encode_key(&category.username),
            encode_key(&category.name)
        );
        let created = self
            .transport
            .create_if_absent(&path, &serde_json::to_value(&category)?)
            .await?;

        if created {
            log::debug!("クラウドにカテゴリを作成しました: path={path}");
        }
        Ok(created)
    }

    async fn categories_for(&self, username: &str) -> AppResult<Vec<Category>> {
        let path = format!("{CATEGORIES}/{}", encode_key(username));
        let Some(value) = self.transport.get(&path).await? else {
            return Ok(Vec::new());
        };

        let entries: BTreeMap<String, Value> = decode_snapshot(&path, value)?;
        let mut categories = entries
            .into_iter()
            .map(|(key, value)| decode_snapshot::<Category>(&format!("{path}/{key}"), value))
            .collect::<AppResult<Vec<_>>>()?;
        categories.sort();
        Ok(categories)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::memory_tree::MemoryDocumentTree;

    #[tokio::test]
    async fn test_add_and_list() {
        let store = CloudCategoryStore::new(Arc::new(MemoryDocumentTree::new()));

        assert!(store.add_category(Category::new("alice", "食費")).await.unwrap());
        assert!(!store.add_category(Category::new("alice", "食費")).await.unwrap());
        assert!(store.add_category(Category::new("alice", "a.b/c")).await.unwrap());
        assert!(store.add_category(Category::new("bob", "食費")).await.unwrap());

        let alice = store.categories_for("alice").await.unwrap();
        assert_eq!(
            alice,
            vec![Category::new("alice", "a.b/c"), Category::new("alice", "食費")]
        );
        assert!(store.categories_for("carol").await.unwrap().is_empty());
    }
}
