use crate::features::auth::models::{User, UserRecord};
use crate::features::storage::{LocalDatabase, RecordId, UserStore};
use crate::shared::database::connection::map_constraint_error;
use crate::shared::errors::AppResult;
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension, Row};

const USER_COLUMNS: &str = "user_id, username, password, profile_picture";

fn map_user_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: RecordId::Local(row.get(0)?),
        username: row.get(1)?,
        password_hash: row.get(2)?,
        profile_picture: row.get(3)?,
    })
}

/// ユーザーを保存する
///
/// # 引数
/// * `conn` - データベース接続
/// * `record` - 保存するユーザー（idがあれば同じIDの行を更新）
///
/// # 戻り値
/// 保存されたユーザー。ユーザー名の重複時は`AppError::Conflict`
pub fn save(conn: &Connection, record: UserRecord) -> AppResult<User> {
    let id = match &record.id {
        None => {
            conn.execute(
                "INSERT INTO users (username, password, profile_picture) VALUES (?1, ?2, ?3)",
                params![record.username, record.password_hash, record.profile_picture],
            )
            .map_err(|e| map_constraint_error(e, "ユーザー名が既に使われています"))?;
            conn.last_insert_rowid()
        }
        Some(id) => {
            // REPLACEは行を削除して作り直すため、経費がカスケード削除されないようUPSERTにする
            let id = id.as_local()?;
            conn.execute(
                "INSERT INTO users (user_id, username, password, profile_picture)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(user_id) DO UPDATE SET
                    username = excluded.username,
                    password = excluded.password,
                    profile_picture = excluded.profile_picture",
                params![id, record.username, record.password_hash, record.profile_picture],
            )
            .map_err(|e| map_constraint_error(e, "ユーザー名が既に使われています"))?;
            id
        }
    };

    log::debug!("ユーザーを保存しました: user_id={id}");
    Ok(record.into_user(RecordId::Local(id)))
}

/// ユーザー名でユーザーを取得する
pub fn find_by_username(conn: &Connection, username: &str) -> AppResult<Option<User>> {
    let user = conn
        .query_row(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE username = ?1"),
            params![username],
            map_user_row,
        )
        .optional()?;
    Ok(user)
}

/// IDでユーザーを取得する
pub fn find_by_id(conn: &Connection, id: i64) -> AppResult<Option<User>> {
    let user = conn
        .query_row(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE user_id = ?1"),
            params![id],
            map_user_row,
        )
        .optional()?;
    Ok(user)
}

/// ユーザーを削除する（経費と予算設定はカスケード削除される）
pub fn delete(conn: &Connection, id: i64) -> AppResult<bool> {
    let affected = conn.execute("DELETE FROM users WHERE user_id = ?1", params![id])?;
    if affected > 0 {
        log::info!("ユーザーを削除しました: user_id={id}");
    }
    Ok(affected > 0)
}

/// SQLiteに保存するユーザーストア
#[derive(Clone)]
pub struct LocalUserStore {
    db: LocalDatabase,
}

impl LocalUserStore {
    pub fn new(db: LocalDatabase) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserStore for LocalUserStore {
    async fn save_user(&self, record: UserRecord) -> AppResult<User> {
        self.db.run(move |conn| save(conn, record)).await
    }

    async fn find_by_username(&self, username: &str) -> AppResult<Option<User>> {
        let username = username.to_string();
        self.db
            .run(move |conn| find_by_username(conn, &username))
            .await
    }

    async fn find_by_id(&self, id: &RecordId) -> AppResult<Option<User>> {
        let id = id.as_local()?;
        self.db.run(move |conn| find_by_id(conn, id)).await
    }

    async fn delete_user(&self, id: &RecordId) -> AppResult<bool> {
        let id = id.as_local()?;
        self.db.run(move |conn| delete(conn, id)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::database::open_in_memory_database;
    use crate::shared::errors::AppError;

    #[test]
    fn test_save_and_find() {
        let conn = open_in_memory_database().unwrap();
        let user = save(&conn, UserRecord::new("alice", "hash")).unwrap();

        assert_eq!(user.id, RecordId::Local(1));
        assert_eq!(find_by_username(&conn, "alice").unwrap(), Some(user.clone()));
        assert_eq!(find_by_id(&conn, 1).unwrap(), Some(user));
        assert_eq!(find_by_username(&conn, "bob").unwrap(), None);
    }

    #[test]
    fn test_duplicate_username_is_conflict() {
        let conn = open_in_memory_database().unwrap();
        save(&conn, UserRecord::new("alice", "hash")).unwrap();

        let result = save(&conn, UserRecord::new("alice", "other"));
        assert!(matches!(result, Err(AppError::Conflict(_))));
    }

    #[test]
    fn test_replace_keeps_owned_expenses() {
        let conn = open_in_memory_database().unwrap();
        let user = save(&conn, UserRecord::new("alice", "hash")).unwrap();
        conn.execute(
            "INSERT INTO expenses (amount, date, category, user_owner_id)
             VALUES ('5.00', '2024-01-01', '食費', 1)",
            [],
        )
        .unwrap();

        let mut replacement = UserRecord::new("alice", "new-hash")
            .with_profile_picture(Some("file:///me.png".to_string()));
        replacement.id = Some(user.id.clone());
        let replaced = save(&conn, replacement).unwrap();
        assert_eq!(replaced.password_hash, "new-hash");

        let expenses: i64 = conn
            .query_row("SELECT COUNT(*) FROM expenses", [], |row| row.get(0))
            .unwrap();
        assert_eq!(expenses, 1);
    }

    #[test]
    fn test_delete_cascades_to_expenses_and_settings() {
        let conn = open_in_memory_database().unwrap();
        save(&conn, UserRecord::new("alice", "hash")).unwrap();
        conn.execute(
            "INSERT INTO expenses (amount, date, category, user_owner_id)
             VALUES ('5.00', '2024-01-01', '食費', 1)",
            [],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO budget_settings (user_id, monthly_budget, monthly_max_goal, monthly_min_goal)
             VALUES (1, '1000', '50', '20')",
            [],
        )
        .unwrap();

        assert!(delete(&conn, 1).unwrap());
        assert!(!delete(&conn, 1).unwrap());

        for table in ["expenses", "budget_settings"] {
            let count: i64 = conn
                .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))
                .unwrap();
            assert_eq!(count, 0, "{table} がカスケード削除されていません");
        }
    }

    #[tokio::test]
    async fn test_local_store_rejects_cloud_ids() {
        let store = LocalUserStore::new(LocalDatabase::in_memory().unwrap());
        let result = store.find_by_id(&RecordId::from("-Mabc")).await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }
}
