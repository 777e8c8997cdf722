//! メモリ上のドキュメントツリー
//!
//! `CloudTransport`をプロセス内で実装したもの。クラウドアダプターのテストや
//! ネットワークなしでの開発に使う

use crate::shared::api_client::{ChildQuery, CloudTransport};
use crate::shared::errors::{AppError, AppResult};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

/// 疑似的に発生させる障害
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InjectedFailure {
    /// 401/403相当
    PermissionDenied,
    /// 接続断相当
    Unavailable,
}

impl InjectedFailure {
    fn to_error(self, path: &str) -> AppError {
        match self {
            InjectedFailure::PermissionDenied => {
                AppError::PermissionDenied(format!("{path}: Permission denied"))
            }
            InjectedFailure::Unavailable => {
                AppError::ExternalService(format!("{path}: サービスに接続できません"))
            }
        }
    }
}

/// メモリ上のFirebase互換ツリー
#[derive(Debug, Default)]
pub struct MemoryDocumentTree {
    root: Mutex<Value>,
    push_counter: AtomicU64,
    failure: Mutex<Option<InjectedFailure>>,
}

impl MemoryDocumentTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// 以降の全操作を指定した障害で失敗させる（Noneで解除）
    pub fn inject_failure(&self, failure: Option<InjectedFailure>) -> AppResult<()> {
        *self.failure.lock()? = failure;
        Ok(())
    }

    /// ツリー全体のスナップショット
    pub fn snapshot(&self) -> AppResult<Value> {
        Ok(self.root.lock()?.clone())
    }

    fn check_failure(&self, path: &str) -> AppResult<()> {
        match *self.failure.lock()? {
            Some(failure) => Err(failure.to_error(path)),
            None => Ok(()),
        }
    }

    /// 時系列順に並ぶキーを生成する
    fn next_push_key(&self) -> String {
        let sequence = self.push_counter.fetch_add(1, Ordering::SeqCst);
        format!("-M{sequence:018}")
    }
}

fn segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

fn lookup<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    segments(path)
        .into_iter()
        .try_fold(root, |node, key| node.as_object()?.get(key))
}

/// 値を書き込む。nullの書き込みは削除として扱う
fn write(root: &mut Value, path: &str, value: Value) {
    let keys = segments(path);
    let Some((last, parents)) = keys.split_last() else {
        *root = value;
        return;
    };

    let mut node = root;
    for key in parents {
        if !node.is_object() {
            *node = Value::Object(Map::new());
        }
        let Value::Object(map) = node else { return };
        node = map
            .entry(key.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
    }

    if !node.is_object() {
        *node = Value::Object(Map::new());
    }
    if let Value::Object(map) = node {
        if value.is_null() {
            map.remove(*last);
        } else {
            map.insert(last.to_string(), value);
        }
    }
}

#[async_trait]
impl CloudTransport for MemoryDocumentTree {
    async fn get(&self, path: &str) -> AppResult<Option<Value>> {
        self.check_failure(path)?;
        let root = self.root.lock()?;
        Ok(lookup(&root, path).filter(|v| !v.is_null()).cloned())
    }

    async fn query(&self, path: &str, query: &ChildQuery) -> AppResult<Map<String, Value>> {
        self.check_failure(path)?;
        let root = self.root.lock()?;

        let Some(Value::Object(children)) = lookup(&root, path) else {
            return Ok(Map::new());
        };

        Ok(children
            .iter()
            .filter(|(_, child)| child.get(&query.order_by) == Some(&query.equal_to))
            .map(|(key, child)| (key.clone(), child.clone()))
            .collect())
    }

    async fn push(&self, path: &str, value: &Value) -> AppResult<String> {
        self.check_failure(path)?;
        let key = self.next_push_key();
        let mut root = self.root.lock()?;
        write(&mut root, &format!("{path}/{key}"), value.clone());
        Ok(key)
    }

    async fn put(&self, path: &str, value: &Value) -> AppResult<()> {
        self.check_failure(path)?;
        let mut root = self.root.lock()?;
        write(&mut root, path, value.clone());
        Ok(())
    }

    async fn create_if_absent(&self, path: &str, value: &Value) -> AppResult<bool> {
        self.check_failure(path)?;
        let mut root = self.root.lock()?;
        if lookup(&root, path).is_some_and(|v| !v.is_null()) {
            return Ok(false);
        }
        write(&mut root, path, value.clone());
        Ok(true)
    }

    async fn delete(&self, path: &str) -> AppResult<()> {
        self.check_failure(path)?;
        let mut root = self.root.lock()?;
        write(&mut root, path, Value::Null);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_put_get_delete() {
        let tree = MemoryDocumentTree::new();
        tree.put("users/u1", &json!({"username": "alice"})).await.unwrap();

        let user = tree.get("users/u1").await.unwrap().unwrap();
        assert_eq!(user["username"], "alice");
        assert_eq!(tree.get("users/u1/username").await.unwrap(), Some(json!("alice")));
        assert_eq!(tree.get("users/u2").await.unwrap(), None);

        tree.delete("users/u1").await.unwrap();
        assert_eq!(tree.get("users/u1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_push_keys_are_chronological() {
        let tree = MemoryDocumentTree::new();
        let first = tree.push("expenses", &json!({"n": 1})).await.unwrap();
        let second = tree.push("expenses", &json!({"n": 2})).await.unwrap();
        assert!(first < second);

        let all = tree.get("expenses").await.unwrap().unwrap();
        let keys: Vec<_> = all.as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys, vec![first, second]);
    }

    #[tokio::test]
    async fn test_query_equal() {
        let tree = MemoryDocumentTree::new();
        tree.push("expenses", &json!({"userOwnerId": "a", "amount": "1"})).await.unwrap();
        tree.push("expenses", &json!({"userOwnerId": "b", "amount": "2"})).await.unwrap();
        tree.push("expenses", &json!({"userOwnerId": "a", "amount": "3"})).await.unwrap();

        let result = tree
            .query("expenses", &ChildQuery::equal("userOwnerId", "a"))
            .await
            .unwrap();
        assert_eq!(result.len(), 2);

        let empty = tree
            .query("missing", &ChildQuery::equal("userOwnerId", "a"))
            .await
            .unwrap();
        assert!(empty.is_empty());
    }

    #[tokio::test]
    async fn test_create_if_absent() {
        let tree = MemoryDocumentTree::new();
        assert!(tree.create_if_absent("usernames/x", &json!("u1")).await.unwrap());
        assert!(!tree.create_if_absent("usernames/x", &json!("u2")).await.unwrap());
        assert_eq!(tree.get("usernames/x").await.unwrap(), Some(json!("u1")));
    }

    #[tokio::test]
    async fn test_injected_failure() {
        let tree = MemoryDocumentTree::new();
        tree.inject_failure(Some(InjectedFailure::PermissionDenied)).unwrap();
        assert!(matches!(
            tree.get("users").await,
            Err(AppError::PermissionDenied(_))
        ));

        tree.inject_failure(Some(InjectedFailure::Unavailable)).unwrap();
        assert!(matches!(
            tree.put("users/u1", &json!({})).await,
            Err(AppError::ExternalService(_))
        ));

        tree.inject_failure(None).unwrap();
        assert!(tree.get("users").await.is_ok());
    }
}
