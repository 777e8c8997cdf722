use crate::shared::errors::{AppError, AppResult};
use rusqlite::Connection;
use std::path::Path;
use std::time::Duration;

/// データベース接続を初期化し、マイグレーションを実行する
///
/// # 引数
/// * `database_path` - データベースファイルのパス
///
/// # 処理内容
/// 1. データベース接続の開設
/// 2. 接続設定（外部キー制約の有効化など）
/// 3. テーブル作成とマイグレーションの実行
pub fn initialize_database(database_path: &Path) -> AppResult<Connection> {
    let conn = Connection::open(database_path)?;

    configure_connection(&conn)?;
    create_tables(&conn)?;

    log::info!("データベースを初期化しました: {database_path:?}");

    Ok(conn)
}

/// メモリ上にスキーマ適用済みのデータベースを作成する（テスト・一時利用向け）
pub fn open_in_memory_database() -> AppResult<Connection> {
    let conn = Connection::open_in_memory()?;
    configure_connection(&conn)?;
    create_tables(&conn)?;
    Ok(conn)
}

/// 接続ごとに必要な設定を適用する
///
/// SQLiteの外部キー制約は接続単位で有効化する必要がある
pub fn configure_connection(conn: &Connection) -> AppResult<()> {
    conn.pragma_update(None, "foreign_keys", "ON")?;
    conn.busy_timeout(Duration::from_secs(5))?;
    Ok(())
}

/// データベーステーブルを作成する
///
/// # 戻り値
/// 成功時はOk(())、失敗時はエラー
pub fn create_tables(conn: &Connection) -> AppResult<()> {
    create_users_table(conn)?;

    let expenses_exists: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='expenses'",
        [],
        |row| row.get(0),
    )?;

    if expenses_exists == 0 {
        // 新規インストール: 支払期限・通知カラムを含む統一スキーマで作成
        create_expenses_table(conn)?;
        log::info!("新規データベースを作成しました（統一経費スキーマ）");
    } else {
        // 既存インストール: 不足しているカラムを安全に追加
        log::info!("既存のデータベースを確認中...");
        migrate_existing_tables(conn)?;
    }

    create_indexes(conn)?;
    create_categories_table(conn)?;
    create_budget_settings_table(conn)?;
    create_session_state_table(conn)?;

    Ok(())
}

/// ユーザーテーブルを作成する
fn create_users_table(conn: &Connection) -> AppResult<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS users (
            user_id INTEGER PRIMARY KEY AUTOINCREMENT,
            username TEXT NOT NULL UNIQUE,
            password TEXT NOT NULL,
            profile_picture TEXT
        )",
        [],
    )?;

    Ok(())
}

/// 経費テーブルを作成する
fn create_expenses_table(conn: &Connection) -> AppResult<()> {
    conn.execute(
        "CREATE TABLE expenses (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            amount TEXT NOT NULL,
            date TEXT NOT NULL,
            start_time TEXT,
            end_time TEXT,
            description TEXT NOT NULL DEFAULT '',
            category TEXT NOT NULL,
            photo_uri TEXT,
            user_owner_id INTEGER NOT NULL
                REFERENCES users(user_id) ON DELETE CASCADE,
            due_date TEXT,
            notification_enabled INTEGER NOT NULL DEFAULT 0,
            notification_days_before INTEGER NOT NULL DEFAULT 0
        )",
        [],
    )?;

    Ok(())
}

/// 既存テーブルのマイグレーションを実行する
///
/// 旧スキーマの経費テーブルには支払期限と通知設定のカラムがないため追加する
fn migrate_existing_tables(conn: &Connection) -> AppResult<()> {
    let columns = [
        ("due_date", "ALTER TABLE expenses ADD COLUMN due_date TEXT"),
        (
            "notification_enabled",
            "ALTER TABLE expenses ADD COLUMN notification_enabled INTEGER NOT NULL DEFAULT 0",
        ),
        (
            "notification_days_before",
            "ALTER TABLE expenses ADD COLUMN notification_days_before INTEGER NOT NULL DEFAULT 0",
        ),
    ];

    for (column, statement) in columns {
        if !check_column_exists(conn, "expenses", column) {
            log::info!("{column}カラムを追加します...");
            conn.execute(statement, [])?;
        }
    }

    Ok(())
}

/// インデックスを作成する
fn create_indexes(conn: &Connection) -> AppResult<()> {
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_expenses_owner_date ON expenses(user_owner_id, date)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_expenses_category ON expenses(category)",
        [],
    )?;

    Ok(())
}

/// カテゴリテーブルを作成する
fn create_categories_table(conn: &Connection) -> AppResult<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS categories (
            username TEXT NOT NULL,
            name TEXT NOT NULL
        )",
        [],
    )?;

    // 旧データの重複を除去してから一意インデックスを張る
    let removed = conn.execute(
        "DELETE FROM categories WHERE rowid NOT IN (
            SELECT MIN(rowid) FROM categories GROUP BY username, name
        )",
        [],
    )?;
    if removed > 0 {
        log::warn!("重複したカテゴリを{removed}件削除しました");
    }

    conn.execute(
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_categories_username_name
         ON categories(username, name)",
        [],
    )?;

    Ok(())
}

/// 予算設定テーブルを作成する
fn create_budget_settings_table(conn: &Connection) -> AppResult<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS budget_settings (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL UNIQUE
                REFERENCES users(user_id) ON DELETE CASCADE,
            monthly_budget TEXT NOT NULL,
            monthly_max_goal TEXT NOT NULL,
            monthly_min_goal TEXT NOT NULL
        )",
        [],
    )?;

    Ok(())
}

/// サインイン中のユーザーを保持するテーブルを作成する（常に1行以下）
fn create_session_state_table(conn: &Connection) -> AppResult<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS session_state (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            session_id TEXT NOT NULL,
            user_id TEXT NOT NULL,
            username TEXT NOT NULL,
            signed_in_at TEXT NOT NULL
        )",
        [],
    )?;

    Ok(())
}

/// テーブルに指定されたカラムが存在するかチェックする
///
/// # 戻り値
/// カラムが存在する場合はtrue、存在しないかエラーの場合はfalse
pub fn check_column_exists(conn: &Connection, table_name: &str, column_name: &str) -> bool {
    let query = format!("PRAGMA table_info({table_name})");

    let Ok(mut stmt) = conn.prepare(&query) else {
        return false;
    };

    let Ok(rows) = stmt.query_map([], |row| row.get::<_, String>(1)) else {
        return false;
    };

    let exists = rows.flatten().any(|name| name == column_name);
    exists
}

/// 一意制約違反などのSQLiteエラーを呼び出し元向けのAppErrorに変換する
pub fn map_constraint_error(error: rusqlite::Error, message: &str) -> AppError {
    match AppError::from(error) {
        AppError::Conflict(detail) => AppError::Conflict(format!("{message}: {detail}")),
        other => other,
    }
}
