use crate::features::categories::models::Category;
use crate::features::storage::{CategoryStore, LocalDatabase};
use crate::shared::errors::AppResult;
use async_trait::async_trait;
use rusqlite::{params, Connection};

/// カテゴリを追加する
///
/// # 戻り値
/// 追加した場合はtrue、同じユーザーに同名のカテゴリが既にあればfalse
pub fn insert(conn: &Connection, category: &Category) -> AppResult<bool> {
    let affected = conn.execute(
        "INSERT OR IGNORE INTO categories (username, name) VALUES (?1, ?2)",
        params![category.username, category.name],
    )?;
    Ok(affected > 0)
}

/// ユーザーのカテゴリを名前順で取得する
pub fn find_by_username(conn: &Connection, username: &str) -> AppResult<Vec<Category>> {
    let mut stmt =
        conn.prepare("SELECT name, username FROM categories WHERE username = ?1 ORDER BY name")?;
    let categories = stmt
        .query_map(params![username], |row| {
            Ok(Category {
                name: row.get(0)?,
                username: row.get(1)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(categories)
}

/// SQLiteに保存するカテゴリストア
#[derive(Clone)]
pub struct LocalCategoryStore {
    db: LocalDatabase,
}

impl LocalCategoryStore {
    pub fn new(db: LocalDatabase) -> Self {
        Self { db }
    }
}

#[async_trait]
impl CategoryStore for LocalCategoryStore {
    async fn add_category(&self, category: Category) -> AppResult<bool> {
        self.db.run(move |conn| insert(conn, &category)).await
    }

    async fn categories_for(&self, username: &str) -> AppResult<Vec<Category>> {
        let username = username.to_string();
        self.db
            .run(move |conn| find_by_username(conn, &username))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::database::open_in_memory_database;

    #[test]
    fn test_insert_is_idempotent_and_scoped() {
        let conn = open_in_memory_database().unwrap();
        assert!(insert(&conn, &Category::new("alice", "食費")).unwrap());
        assert!(!insert(&conn, &Category::new("alice", "食費")).unwrap());
        assert!(insert(&conn, &Category::new("alice", "交通費")).unwrap());
        assert!(insert(&conn, &Category::new("bob", "食費")).unwrap());

        let alice = find_by_username(&conn, "alice").unwrap();
        assert_eq!(alice.len(), 2);
        assert!(alice.iter().all(|c| c.username == "alice"));
        assert!(find_by_username(&conn, "carol").unwrap().is_empty());
    }
}
