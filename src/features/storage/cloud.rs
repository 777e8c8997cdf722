use crate::features::storage::RecordId;
use crate::shared::api_client::{ChildQuery, CloudTransport};
use crate::shared::errors::{AppError, AppResult};
use base64::{engine::general_purpose, Engine as _};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};

/// クラウド側のコレクション名
pub const USERS: &str = "users";
pub const EXPENSES: &str = "expenses";
pub const BUDGET_SETTINGS: &str = "budgetSettings";
pub const CATEGORIES: &str = "categories";
/// ユーザー名の一意性を担保するインデックス
pub const USERNAMES: &str = "usernames";

/// 任意の文字列をFirebaseのキーとして使える形に変換する
///
/// キーには`.` `$` `#` `[` `]` `/` が使えないため、URLセーフBase64にする
pub fn encode_key(value: &str) -> String {
    general_purpose::URL_SAFE_NO_PAD.encode(value.as_bytes())
}

/// スナップショットを型付きレコードに変換する
pub fn decode_snapshot<T: DeserializeOwned>(path: &str, value: Value) -> AppResult<T> {
    serde_json::from_value(value).map_err(|e| {
        log::error!("不正なスナップショット: path={path}, error={e}");
        AppError::ExternalService(format!("不正なスナップショットです（{path}）: {e}"))
    })
}

/// 問い合わせ結果から最初のエントリを選ぶ
///
/// 同じ値を持つレコードが複数あっても、キー順で先頭のものに決まる
pub fn first_entry(entries: Map<String, Value>) -> Option<(String, Value)> {
    entries.into_iter().min_by(|a, b| a.0.cmp(&b.0))
}

/// 所有者IDが一致する子要素を取得する
///
/// 他クライアントはローカルIDを数値のまま書くことがあり、Firebaseの等価比較は
/// 型も見るため、ローカルIDは文字列と数値の両方で問い合わせて結果をまとめる
///
/// # 引数
/// * `transport` - クラウドのトランスポート
/// * `path` - コレクションのパス
/// * `field` - 所有者IDを持つフィールド名
/// * `owner` - 所有者ID
pub async fn query_by_owner(
    transport: &dyn CloudTransport,
    path: &str,
    field: &str,
    owner: &RecordId,
) -> AppResult<Map<String, Value>> {
    let mut matches = transport
        .query(path, &ChildQuery::equal(field, owner.to_string()))
        .await?;

    if let RecordId::Local(id) = owner {
        let numeric = transport.query(path, &ChildQuery::equal(field, *id)).await?;
        matches.extend(numeric);
    }
    Ok(matches)
}

/// キー順に並べたエントリ一覧
pub fn sorted_entries(entries: Map<String, Value>) -> Vec<(String, Value)> {
    let mut entries: Vec<_> = entries.into_iter().collect();
    entries.sort_by(|a, b| a.0.cmp(&b.0));
    entries
}

/// 文字列でも数値でもよいID項目を文字列として読む
pub fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "IDは文字列か数値である必要があります: {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::memory_tree::MemoryDocumentTree;
    use serde_json::json;

    #[derive(Debug, Deserialize)]
    struct Owned {
        #[serde(deserialize_with = "string_or_number")]
        owner: String,
    }

    #[test]
    fn test_encode_key_is_path_safe() {
        let key = encode_key("a.b/c#d");
        assert!(!key.contains(['.', '/', '#', '$', '[', ']', '=']));
        assert_ne!(encode_key("alice"), encode_key("Alice"));
    }

    #[test]
    fn test_first_entry_uses_key_order() {
        let mut map = Map::new();
        map.insert("-Mb".to_string(), json!(2));
        map.insert("-Ma".to_string(), json!(1));
        assert_eq!(first_entry(map), Some(("-Ma".to_string(), json!(1))));
        assert_eq!(first_entry(Map::new()), None);
    }

    #[test]
    fn test_decode_snapshot_reports_malformed_data() {
        let result: AppResult<Owned> = decode_snapshot("expenses/-Ma", json!({"owner": true}));
        assert!(matches!(result, Err(AppError::ExternalService(_))));

        let owned: Owned = decode_snapshot("expenses/-Ma", json!({"owner": 12})).unwrap();
        assert_eq!(owned.owner, "12");
    }

    #[tokio::test]
    async fn test_query_by_owner_matches_numeric_local_ids() {
        let tree = MemoryDocumentTree::new();
        tree.put("expenses/-Ma", &json!({"userOwnerId": 7})).await.unwrap();
        tree.put("expenses/-Mb", &json!({"userOwnerId": "7"})).await.unwrap();
        tree.put("expenses/-Mc", &json!({"userOwnerId": 8})).await.unwrap();

        let local = query_by_owner(&tree, "expenses", "userOwnerId", &RecordId::Local(7))
            .await
            .unwrap();
        let mut keys: Vec<_> = local.keys().cloned().collect();
        keys.sort();
        assert_eq!(keys, vec!["-Ma", "-Mb"]);

        // クラウドIDは文字列でのみ一致する
        let cloud = query_by_owner(&tree, "expenses", "userOwnerId", &RecordId::from("7"))
            .await
            .unwrap();
        assert_eq!(cloud.len(), 1);
    }
}
