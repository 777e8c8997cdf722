use crate::shared::database::{initialize_database, open_in_memory_database};
use crate::shared::errors::AppResult;
use rusqlite::Connection;
use std::path::Path;
use std::sync::{Arc, Mutex};

/// 端末内SQLiteへの共有接続
///
/// rusqliteは同期APIのため、すべての操作をブロッキング用スレッドで実行する
#[derive(Clone)]
pub struct LocalDatabase {
    conn: Arc<Mutex<Connection>>,
}

impl LocalDatabase {
    /// 初期化済みの接続から作成する
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    /// ファイルを開いてスキーマを適用する
    pub fn open(path: &Path) -> AppResult<Self> {
        Ok(Self::new(initialize_database(path)?))
    }

    /// スキーマ適用済みのメモリ上データベース
    pub fn in_memory() -> AppResult<Self> {
        Ok(Self::new(open_in_memory_database()?))
    }

    /// 接続を借りてクロージャを実行する
    ///
    /// # 引数
    /// * `operation` - 接続に対して行う処理（1文ごとに自動コミット）
    ///
    /// # 戻り値
    /// クロージャの結果、またはロック・スレッド実行のエラー
    pub async fn run<T, F>(&self, operation: F) -> AppResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> AppResult<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn.lock()?;
            operation(&mut guard)
        })
        .await?
    }
}
