use crate::shared::errors::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// レコード識別子
///
/// ローカルストアは自動採番の整数、クラウドストアはサーバー生成の文字列キーを使う
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordId {
    /// SQLiteの自動採番ID
    Local(i64),
    /// Firebaseの生成キー
    Cloud(String),
}

impl RecordId {
    /// ローカルストア用の整数IDを取り出す
    pub fn as_local(&self) -> AppResult<i64> {
        match self {
            RecordId::Local(id) => Ok(*id),
            RecordId::Cloud(key) => Err(AppError::validation(format!(
                "ローカルストアではクラウドのID（{key}）を扱えません"
            ))),
        }
    }

    /// 永続化用の文字列表現（`local:1` / `cloud:-Mabc`）
    pub fn to_storage_key(&self) -> String {
        match self {
            RecordId::Local(id) => format!("local:{id}"),
            RecordId::Cloud(key) => format!("cloud:{key}"),
        }
    }

    /// `to_storage_key`の逆変換
    pub fn from_storage_key(value: &str) -> AppResult<Self> {
        if let Some(id) = value.strip_prefix("local:") {
            return id
                .parse()
                .map(RecordId::Local)
                .map_err(|_| AppError::validation(format!("不正なローカルIDです: {value}")));
        }

        match value.strip_prefix("cloud:") {
            Some(key) if !key.is_empty() => Ok(RecordId::Cloud(key.to_string())),
            _ => Err(AppError::validation(format!("不正なレコードIDです: {value}"))),
        }
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordId::Local(id) => write!(f, "{id}"),
            RecordId::Cloud(key) => write!(f, "{key}"),
        }
    }
}

impl From<i64> for RecordId {
    fn from(id: i64) -> Self {
        RecordId::Local(id)
    }
}

impl From<&str> for RecordId {
    fn from(key: &str) -> Self {
        RecordId::Cloud(key.to_string())
    }
}
