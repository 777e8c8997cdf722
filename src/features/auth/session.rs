use crate::features::auth::models::SessionUser;
use crate::features::storage::{LocalDatabase, RecordId};
use crate::shared::errors::{AppError, AppResult};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

/// サインイン状態を保存する
///
/// # 引数
/// * `conn` - データベース接続
/// * `session` - 保存するセッション（既存のものは置き換える）
pub fn save(conn: &Connection, session: &SessionUser) -> AppResult<()> {
    conn.execute(
        "INSERT INTO session_state (id, session_id, user_id, username, signed_in_at)
         VALUES (1, ?1, ?2, ?3, ?4)
         ON CONFLICT(id) DO UPDATE SET
            session_id = excluded.session_id,
            user_id = excluded.user_id,
            username = excluded.username,
            signed_in_at = excluded.signed_in_at",
        params![
            session.session_id,
            session.user_id.to_storage_key(),
            session.username,
            session.signed_in_at.to_rfc3339()
        ],
    )?;

    log::info!(
        "セッションを保存しました: user_id={}, session_id={}",
        session.user_id,
        session.session_id
    );
    Ok(())
}

/// 保存済みのサインイン状態を読み込む
pub fn load(conn: &Connection) -> AppResult<Option<SessionUser>> {
    let row = conn
        .query_row(
            "SELECT session_id, user_id, username, signed_in_at FROM session_state WHERE id = 1",
            [],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                ))
            },
        )
        .optional()?;

    let Some((session_id, user_id, username, signed_in_at)) = row else {
        return Ok(None);
    };

    let signed_in_at = DateTime::parse_from_rfc3339(&signed_in_at)
        .map_err(|e| AppError::Database(format!("サインイン日時の解析に失敗: {e}")))?
        .with_timezone(&Utc);

    Ok(Some(SessionUser {
        session_id,
        user_id: RecordId::from_storage_key(&user_id)?,
        username,
        signed_in_at,
    }))
}

/// サインイン状態を消去する
pub fn clear(conn: &Connection) -> AppResult<()> {
    conn.execute("DELETE FROM session_state", [])?;
    log::info!("セッションを削除しました");
    Ok(())
}

/// 端末に永続化されたサインイン状態
///
/// 保存先の設定に関わらず、常にローカルのSQLiteに置く
#[derive(Clone)]
pub struct SessionStore {
    db: LocalDatabase,
}

impl SessionStore {
    pub fn new(db: LocalDatabase) -> Self {
        Self { db }
    }

    pub async fn save(&self, session: &SessionUser) -> AppResult<()> {
        let session = session.clone();
        self.db.run(move |conn| save(conn, &session)).await
    }

    pub async fn current(&self) -> AppResult<Option<SessionUser>> {
        self.db.run(|conn| load(conn)).await
    }

    pub async fn clear(&self) -> AppResult<()> {
        self.db.run(|conn| clear(conn)).await
    }
}
