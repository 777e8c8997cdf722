//! Firebase Realtime Database RESTクライアント
//!
//! クラウドストアとの通信を行うトランスポート層。
//! 失敗はリトライせずにそのまま呼び出し元へ返す（再試行はスケジューラーの責務）

use crate::shared::config::environment::CloudConfig;
use crate::shared::errors::{AppError, AppResult};
use async_trait::async_trait;
use log::{debug, info, warn};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::time::Duration;

/// 子要素の等価条件による問い合わせ（`orderBy` + `equalTo`）
#[derive(Debug, Clone, PartialEq)]
pub struct ChildQuery {
    /// 比較対象のフィールド名
    pub order_by: String,
    /// 一致させる値
    pub equal_to: Value,
}

impl ChildQuery {
    pub fn equal(field: &str, value: impl Into<Value>) -> Self {
        Self {
            order_by: field.to_string(),
            equal_to: value.into(),
        }
    }
}

/// クラウドのドキュメントツリーに対する操作
///
/// パスは`users/-Mabc`のようなスラッシュ区切りのキー列
#[async_trait]
pub trait CloudTransport: Send + Sync {
    /// 指定パスの値を取得する（存在しなければNone）
    async fn get(&self, path: &str) -> AppResult<Option<Value>>;

    /// 子要素のうち条件に一致するものをキー付きで取得する
    async fn query(&self, path: &str, query: &ChildQuery) -> AppResult<Map<String, Value>>;

    /// サーバー側でキーを生成して子要素を追加し、生成されたキーを返す
    async fn push(&self, path: &str, value: &Value) -> AppResult<String>;

    /// 指定パスの値を置き換える
    async fn put(&self, path: &str, value: &Value) -> AppResult<()>;

    /// 指定パスが空の場合だけ書き込む（書き込めた場合はtrue）
    async fn create_if_absent(&self, path: &str, value: &Value) -> AppResult<bool>;

    /// 指定パスを削除する
    async fn delete(&self, path: &str) -> AppResult<()>;
}

/// Firebaseのエラーレスポンス（`{"error": "..."}`）
#[derive(Debug, Deserialize)]
struct FirebaseErrorBody {
    error: String,
}

/// POSTのレスポンス（`{"name": "-Mabc"}`）
#[derive(Debug, Deserialize)]
struct PushResponse {
    name: String,
}

/// 存在しないパスに対するETag
const NULL_ETAG: &str = "null_etag";

/// reqwestによるFirebase RESTクライアント
pub struct FirebaseRestClient {
    client: Client,
    config: CloudConfig,
}

impl FirebaseRestClient {
    /// 設定を指定してクライアントを作成
    pub fn new(config: CloudConfig) -> AppResult<Self> {
        config.validate()?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| AppError::configuration(format!("HTTPクライアント初期化失敗: {e}")))?;

        info!("Firebaseクライアントを初期化しました: {}", config.database_url);
        Ok(Self { client, config })
    }

    /// 環境変数の設定からクライアントを作成
    pub fn from_env() -> AppResult<Self> {
        Self::new(CloudConfig::from_env()?)
    }

    /// パスからREST URLを組み立てる
    pub fn url_for(&self, path: &str) -> String {
        format!(
            "{}/{}.json",
            self.config.database_url,
            path.trim_matches('/')
        )
    }

    /// 認証パラメータを付与する
    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.config.auth_token {
            Some(token) => request.query(&[("auth", token.as_str())]),
            None => request,
        }
    }

    /// 成功レスポンスならそのまま返し、失敗ならAppErrorに変換する
    async fn check_status(&self, response: Response, method: &str, path: &str) -> AppResult<Response> {
        let status = response.status();
        if status.is_success() {
            debug!("{method}リクエスト成功: path={path}");
            return Ok(response);
        }

        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "レスポンス読み取り失敗".to_string());
        Err(error_from_status(status, &body, method, path))
    }

    /// レスポンスボディをJSONとして読み取る
    async fn read_json(response: Response) -> AppResult<Value> {
        response
            .json::<Value>()
            .await
            .map_err(|e| AppError::ExternalService(format!("レスポンス解析エラー: {e}")))
    }
}

/// HTTPステータスとボディからAppErrorを作る
fn error_from_status(status: StatusCode, body: &str, method: &str, path: &str) -> AppError {
    let detail = serde_json::from_str::<FirebaseErrorBody>(body)
        .map(|parsed| parsed.error)
        .unwrap_or_else(|_| body.to_string());

    warn!("Firebaseエラーレスポンス: method={method}, path={path}, status={status}, body={detail}");

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            AppError::PermissionDenied(format!("{path}: {detail}"))
        }
        StatusCode::PRECONDITION_FAILED => AppError::Conflict(format!("{path}: {detail}")),
        StatusCode::NOT_FOUND => AppError::ExternalService(format!(
            "データベースが見つかりません（URLを確認してください）: {detail}"
        )),
        _ => AppError::ExternalService(format!("status={status}: {detail}")),
    }
}

#[async_trait]
impl CloudTransport for FirebaseRestClient {
    async fn get(&self, path: &str) -> AppResult<Option<Value>> {
        let request = self.authorize(self.client.get(self.url_for(path)));
        let response = self.check_status(request.send().await?, "GET", path).await?;

        match Self::read_json(response).await? {
            Value::Null => Ok(None),
            value => Ok(Some(value)),
        }
    }

    async fn query(&self, path: &str, query: &ChildQuery) -> AppResult<Map<String, Value>> {
        // Firebaseの問い合わせパラメータはJSONエンコードした値を渡す
        let order_by = Value::String(query.order_by.clone()).to_string();
        let equal_to = query.equal_to.to_string();

        let request = self
            .authorize(self.client.get(self.url_for(path)))
            .query(&[("orderBy", order_by.as_str()), ("equalTo", equal_to.as_str())]);
        let response = self.check_status(request.send().await?, "GET", path).await?;

        match Self::read_json(response).await? {
            Value::Null => Ok(Map::new()),
            Value::Object(map) => Ok(map),
            other => Err(AppError::ExternalService(format!(
                "問い合わせ結果がオブジェクトではありません: path={path}, value={other}"
            ))),
        }
    }

    async fn push(&self, path: &str, value: &Value) -> AppResult<String> {
        let request = self.authorize(self.client.post(self.url_for(path)).json(value));
        let response = self.check_status(request.send().await?, "POST", path).await?;

        let pushed: PushResponse = response
            .json()
            .await
            .map_err(|e| AppError::ExternalService(format!("生成キーの解析エラー: {e}")))?;
        Ok(pushed.name)
    }

    async fn put(&self, path: &str, value: &Value) -> AppResult<()> {
        let request = self.authorize(self.client.put(self.url_for(path)).json(value));
        self.check_status(request.send().await?, "PUT", path).await?;
        Ok(())
    }

    async fn create_if_absent(&self, path: &str, value: &Value) -> AppResult<bool> {
        // 空パスのETagを条件にしたPUTは、他者が先に書き込んでいれば412になる
        let request = self
            .authorize(self.client.put(self.url_for(path)).json(value))
            .header("if-match", NULL_ETAG);

        match self.check_status(request.send().await?, "PUT", path).await {
            Ok(_) => Ok(true),
            Err(AppError::Conflict(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn delete(&self, path: &str) -> AppResult<()> {
        let request = self.authorize(self.client.delete(self.url_for(path)));
        self.check_status(request.send().await?, "DELETE", path).await?;
        info!("DELETEリクエスト成功: path={path}");
        Ok(())
    }
}
