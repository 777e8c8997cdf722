use crate::features::auth::models::{User, UserRecord};
use crate::features::storage::cloud::{decode_snapshot, encode_key, first_entry, USERNAMES, USERS};
use crate::features::storage::{RecordId, UserStore};
use crate::shared::api_client::{ChildQuery, CloudTransport};
use crate::shared::errors::{AppError, AppResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

/// クラウド上のユーザーレコード
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserDocument {
    username: String,
    password: String,
    #[serde(default)]
    profile_picture: Option<String>,
}

impl UserDocument {
    fn from_record(record: &UserRecord) -> Self {
        Self {
            username: record.username.clone(),
            password: record.password_hash.clone(),
            profile_picture: record.profile_picture.clone(),
        }
    }

    fn into_user(self, key: String) -> User {
        User {
            id: RecordId::Cloud(key),
            username: self.username,
            password_hash: self.password,
            profile_picture: self.profile_picture,
        }
    }
}

fn username_index_path(username: &str) -> String {
    format!("{USERNAMES}/{}", encode_key(username))
}

/// Firebaseに保存するユーザーストア
///
/// ユーザー名の一意性は`usernames`インデックスへの条件付き書き込みで担保する
#[derive(Clone)]
pub struct CloudUserStore {
    transport: Arc<dyn CloudTransport>,
}

impl CloudUserStore {
    pub fn new(transport: Arc<dyn CloudTransport>) -> Self {
        Self { transport }
    }

    /// ユーザー名を確保する
    ///
    /// # 戻り値
    /// 確保できた（または既に同じユーザーが持っている）場合はOk(())、他者が使用中ならConflict
    async fn claim_username(&self, username: &str, owner: &Value) -> AppResult<()> {
        let path = username_index_path(username);
        if self.transport.create_if_absent(&path, owner).await? {
            return Ok(());
        }

        match self.transport.get(&path).await? {
            Some(current) if &current == owner => Ok(()),
            _ => Err(AppError::conflict(format!(
                "ユーザー名「{username}」は既に使われています"
            ))),
        }
    }

    /// 確保したユーザー名を解放する（失敗はログのみ）
    async fn release_username(&self, username: &str) {
        let path = username_index_path(username);
        if let Err(e) = self.transport.delete(&path).await {
            log::warn!("ユーザー名インデックスの解放に失敗しました: path={path}, error={e}");
        }
    }

    /// 作成途中のユーザーを取り消す（失敗はログのみ）
    async fn discard_user(&self, key: &str) {
        let path = format!("{USERS}/{key}");
        if let Err(e) = self.transport.delete(&path).await {
            log::error!("作成途中のユーザーを削除できませんでした: path={path}, error={e}");
        }
    }

    async fn insert(&self, record: UserRecord) -> AppResult<User> {
        // キー生成前に一意な仮の値で確保し、作成後に実キーへ置き換える
        let pending = Value::String(format!("pending:{}", uuid::Uuid::new_v4()));
        self.claim_username(&record.username, &pending).await?;

        let document = serde_json::to_value(UserDocument::from_record(&record))?;
        let key = match self.transport.push(USERS, &document).await {
            Ok(key) => key,
            Err(e) => {
                self.release_username(&record.username).await;
                return Err(e);
            }
        };

        let index = self
            .transport
            .put(
                &username_index_path(&record.username),
                &Value::String(key.clone()),
            )
            .await;
        if let Err(e) = index {
            // 仮の値のまま残すと同名での再登録も更新もできなくなる
            self.discard_user(&key).await;
            self.release_username(&record.username).await;
            return Err(e);
        }

        log::info!("クラウドにユーザーを作成しました: key={key}");
        Ok(record.into_user(RecordId::Cloud(key)))
    }

    async fn replace(&self, key: String, record: UserRecord) -> AppResult<User> {
        let owner = Value::String(key.clone());
        let previous = self.find_by_id(&RecordId::Cloud(key.clone())).await?;

        self.claim_username(&record.username, &owner).await?;

        let document = serde_json::to_value(UserDocument::from_record(&record))?;
        self.transport.put(&format!("{USERS}/{key}"), &document).await?;

        if let Some(previous) = previous.filter(|p| p.username != record.username) {
            self.release_username(&previous.username).await;
        }

        Ok(record.into_user(RecordId::Cloud(key)))
    }
}

#[async_trait]
impl UserStore for CloudUserStore {
    async fn save_user(&self, mut record: UserRecord) -> AppResult<User> {
        match record.id.take() {
            None => self.insert(record).await,
            Some(id) => self.replace(id.to_string(), record).await,
        }
    }

    async fn find_by_username(&self, username: &str) -> AppResult<Option<User>> {
        let matches = self
            .transport
            .query(USERS, &ChildQuery::equal("username", username))
            .await?;

        match first_entry(matches) {
            Some((key, value)) => {
                let document: UserDocument = decode_snapshot(&format!("{USERS}/{key}"), value)?;
                Ok(Some(document.into_user(key)))
            }
            None => Ok(None),
        }
    }

    async fn find_by_id(&self, id: &RecordId) -> AppResult<Option<User>> {
        let key = id.to_string();
        let path = format!("{USERS}/{key}");

        match self.transport.get(&path).await? {
            Some(value) => {
                let document: UserDocument = decode_snapshot(&path, value)?;
                Ok(Some(document.into_user(key)))
            }
            None => Ok(None),
        }
    }

    async fn delete_user(&self, id: &RecordId) -> AppResult<bool> {
        let Some(user) = self.find_by_id(id).await? else {
            return Ok(false);
        };

        self.transport.delete(&format!("{USERS}/{id}")).await?;
        self.release_username(&user.username).await;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::memory_tree::{InjectedFailure, MemoryDocumentTree};
    use serde_json::json;

    fn store() -> (Arc<MemoryDocumentTree>, CloudUserStore) {
        let tree = Arc::new(MemoryDocumentTree::new());
        (tree.clone(), CloudUserStore::new(tree))
    }

    /// `usernames`配下へのputだけ失敗するトランスポート
    struct IndexWriteFails(Arc<MemoryDocumentTree>);

    #[async_trait]
    impl CloudTransport for IndexWriteFails {
        async fn get(&self, path: &str) -> AppResult<Option<Value>> {
            self.0.get(path).await
        }

        async fn query(
            &self,
            path: &str,
            query: &ChildQuery,
        ) -> AppResult<serde_json::Map<String, Value>> {
            self.0.query(path, query).await
        }

        async fn push(&self, path: &str, value: &Value) -> AppResult<String> {
            self.0.push(path, value).await
        }

        async fn put(&self, path: &str, value: &Value) -> AppResult<()> {
            if path.starts_with(USERNAMES) {
                return Err(AppError::ExternalService("down".to_string()));
            }
            self.0.put(path, value).await
        }

        async fn create_if_absent(&self, path: &str, value: &Value) -> AppResult<bool> {
            self.0.create_if_absent(path, value).await
        }

        async fn delete(&self, path: &str) -> AppResult<()> {
            self.0.delete(path).await
        }
    }

    #[tokio::test]
    async fn test_insert_and_find() {
        let (tree, store) = store();
        let user = store.save_user(UserRecord::new("alice", "hash")).await.unwrap();
        let RecordId::Cloud(key) = &user.id else {
            panic!("クラウドIDが採番されていません");
        };

        assert_eq!(store.find_by_username("alice").await.unwrap(), Some(user.clone()));
        assert_eq!(store.find_by_id(&user.id).await.unwrap(), Some(user.clone()));
        assert_eq!(store.find_by_username("bob").await.unwrap(), None);

        let snapshot = tree.snapshot().unwrap();
        assert_eq!(snapshot[USERS][key.as_str()]["password"], "hash");
        assert_eq!(
            snapshot[USERNAMES][encode_key("alice").as_str()],
            json!(key.clone())
        );
    }

    #[tokio::test]
    async fn test_second_registration_loses_claim() {
        let (tree, store) = store();
        store.save_user(UserRecord::new("alice", "one")).await.unwrap();
        let before = tree.snapshot().unwrap();

        let result = store.save_user(UserRecord::new("alice", "two")).await;
        assert!(matches!(result, Err(AppError::Conflict(_))));
        assert_eq!(tree.snapshot().unwrap(), before);
    }

    #[tokio::test]
    async fn test_failed_index_write_rolls_back_registration() {
        let tree = Arc::new(MemoryDocumentTree::new());
        let failing = CloudUserStore::new(Arc::new(IndexWriteFails(tree.clone())));

        let result = failing.save_user(UserRecord::new("alice", "hash")).await;
        assert!(matches!(result, Err(AppError::ExternalService(_))));

        // ユーザーも仮のインデックスも残らない
        let snapshot = tree.snapshot().unwrap();
        assert!(snapshot.get(USERS).map_or(true, |u| u.as_object().unwrap().is_empty()));
        assert!(snapshot
            .get(USERNAMES)
            .map_or(true, |u| u.as_object().unwrap().is_empty()));
        assert_eq!(failing.find_by_username("alice").await.unwrap(), None);

        // 障害が解消すれば同じユーザー名で登録し直せる
        let store = CloudUserStore::new(tree.clone());
        let user = store.save_user(UserRecord::new("alice", "hash")).await.unwrap();

        let mut updated = UserRecord::new("alice", "new-hash");
        updated.id = Some(user.id.clone());
        assert!(store.save_user(updated).await.is_ok());
    }

    #[tokio::test]
    async fn test_duplicate_records_resolve_to_first_key() {
        let (tree, store) = store();
        // インデックス導入前に書かれた重複レコード
        tree.put("users/-Mb", &json!({"username": "dup", "password": "b"}))
            .await
            .unwrap();
        tree.put("users/-Ma", &json!({"username": "dup", "password": "a"}))
            .await
            .unwrap();

        let user = store.find_by_username("dup").await.unwrap().unwrap();
        assert_eq!(user.id, RecordId::from("-Ma"));
        assert_eq!(user.password_hash, "a");
    }

    #[tokio::test]
    async fn test_rename_moves_username_claim() {
        let (tree, store) = store();
        let user = store.save_user(UserRecord::new("alice", "hash")).await.unwrap();

        let mut renamed = UserRecord::new("alicia", "hash");
        renamed.id = Some(user.id.clone());
        store.save_user(renamed).await.unwrap();

        let snapshot = tree.snapshot().unwrap();
        assert!(snapshot[USERNAMES].get(encode_key("alice")).is_none());
        assert!(snapshot[USERNAMES].get(encode_key("alicia")).is_some());
        assert_eq!(store.find_by_username("alicia").await.unwrap().unwrap().id, user.id);
    }

    #[tokio::test]
    async fn test_delete_releases_username() {
        let (_tree, store) = store();
        let user = store.save_user(UserRecord::new("alice", "hash")).await.unwrap();

        assert!(store.delete_user(&user.id).await.unwrap());
        assert!(!store.delete_user(&user.id).await.unwrap());
        assert!(store.save_user(UserRecord::new("alice", "again")).await.is_ok());
    }

    #[tokio::test]
    async fn test_malformed_snapshot_and_permission_errors() {
        let (tree, store) = store();
        tree.put("users/-Mx", &json!({"username": "broken"})).await.unwrap();
        assert!(matches!(
            store.find_by_id(&RecordId::from("-Mx")).await,
            Err(AppError::ExternalService(_))
        ));

        tree.inject_failure(Some(InjectedFailure::PermissionDenied)).unwrap();
        assert!(matches!(
            store.find_by_username("alice").await,
            Err(AppError::PermissionDenied(_))
        ));
    }
}
