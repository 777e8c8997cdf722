use crate::features::expenses::models::{Expense, NewExpense};
use crate::features::storage::{ExpenseStore, LocalDatabase, RecordId};
use crate::shared::database::connection::map_constraint_error;
use crate::shared::errors::AppResult;
use crate::shared::utils::money::decimal_from_column;
use crate::shared::utils::{parse_expense_date, DateRange};
use async_trait::async_trait;
use chrono::NaiveDate;
use rusqlite::{params, Connection, Row};
use rust_decimal::Decimal;

const EXPENSE_COLUMNS: &str = "id, amount, date, start_time, end_time, description, category,
     photo_uri, user_owner_id, due_date, notification_enabled, notification_days_before";

fn map_expense_row(row: &Row<'_>) -> rusqlite::Result<Expense> {
    let amount: String = row.get(1)?;
    Ok(Expense {
        id: RecordId::Local(row.get(0)?),
        amount: decimal_from_column(&amount, 1)?,
        date: row.get(2)?,
        start_time: row.get(3)?,
        end_time: row.get(4)?,
        description: row.get(5)?,
        category: row.get(6)?,
        photo_uri: row.get(7)?,
        owner_id: RecordId::Local(row.get(8)?),
        due_date: row.get(9)?,
        notification_enabled: row.get(10)?,
        notification_days_before: row.get(11)?,
    })
}

/// 経費を作成する
///
/// # 引数
/// * `conn` - データベース接続
/// * `expense` - 作成する経費
///
/// # 戻り値
/// 作成された経費。所有ユーザーが存在しない場合は`AppError::Conflict`
pub fn create(conn: &Connection, expense: NewExpense) -> AppResult<Expense> {
    let owner = expense.owner_id.as_local()?;

    conn.execute(
        "INSERT INTO expenses (amount, date, start_time, end_time, description, category,
            photo_uri, user_owner_id, due_date, notification_enabled, notification_days_before)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            expense.amount.to_string(),
            expense.date,
            expense.start_time,
            expense.end_time,
            expense.description,
            expense.category,
            expense.photo_uri,
            owner,
            expense.due_date,
            expense.notification_enabled,
            expense.notification_days_before
        ],
    )
    .map_err(|e| map_constraint_error(e, "所有ユーザーが存在しません"))?;

    let id = conn.last_insert_rowid();
    log::debug!("経費を作成しました: id={id}, owner={owner}");
    Ok(expense.into_expense(RecordId::Local(id)))
}

/// 所有ユーザーの経費を日付順で取得する
pub fn find_by_owner(conn: &Connection, owner: i64) -> AppResult<Vec<Expense>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {EXPENSE_COLUMNS} FROM expenses WHERE user_owner_id = ?1 ORDER BY date, id"
    ))?;
    let expenses = stmt
        .query_map(params![owner], map_expense_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(expenses)
}

/// 日付範囲（両端含む）で経費を取得する
///
/// 移行前の端末はDD/MM/YYYY形式で保存していたため、文字列比較ではなく
/// 解析した日付で絞り込む。解析できない日付の経費は含めない
pub fn find_between(conn: &Connection, owner: i64, range: DateRange) -> AppResult<Vec<Expense>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {EXPENSE_COLUMNS} FROM expenses WHERE user_owner_id = ?1 ORDER BY id"
    ))?;
    let rows = stmt
        .query_map(params![owner], map_expense_row)?
        .collect::<Result<Vec<_>, _>>()?;

    let mut dated: Vec<(NaiveDate, Expense)> = rows
        .into_iter()
        .filter_map(|expense| parse_expense_date(&expense.date).map(|date| (date, expense)))
        .filter(|(date, _)| range.contains(*date))
        .collect();
    dated.sort_by_key(|(date, _)| *date);

    Ok(dated.into_iter().map(|(_, expense)| expense).collect())
}

/// 日付範囲内の指定カテゴリの合計金額
///
/// 金額はTEXTで保存しているため、浮動小数点を避けてDecimalで合計する
pub fn sum_for_category(
    conn: &Connection,
    owner: i64,
    category: &str,
    range: DateRange,
) -> AppResult<Decimal> {
    let mut stmt = conn.prepare(
        "SELECT amount, date FROM expenses WHERE user_owner_id = ?1 AND category = ?2",
    )?;
    let rows = stmt.query_map(params![owner, category], |row| {
        let amount: String = row.get(0)?;
        let date: String = row.get(1)?;
        Ok((decimal_from_column(&amount, 0)?, date))
    })?;

    let mut total = Decimal::ZERO;
    for row in rows {
        let (amount, date) = row?;
        if parse_expense_date(&date).is_some_and(|d| range.contains(d)) {
            total += amount;
        }
    }
    Ok(total)
}

/// 経費を削除する
pub fn delete(conn: &Connection, id: i64) -> AppResult<bool> {
    let affected = conn.execute("DELETE FROM expenses WHERE id = ?1", params![id])?;
    Ok(affected > 0)
}

/// SQLiteに保存する経費ストア
#[derive(Clone)]
pub struct LocalExpenseStore {
    db: LocalDatabase,
}

impl LocalExpenseStore {
    pub fn new(db: LocalDatabase) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ExpenseStore for LocalExpenseStore {
    async fn insert_expense(&self, expense: NewExpense) -> AppResult<Expense> {
        self.db.run(move |conn| create(conn, expense)).await
    }

    async fn expenses_for_owner(&self, owner: &RecordId) -> AppResult<Vec<Expense>> {
        let owner = owner.as_local()?;
        self.db.run(move |conn| find_by_owner(conn, owner)).await
    }

    async fn expenses_between(&self, owner: &RecordId, range: DateRange) -> AppResult<Vec<Expense>> {
        let owner = owner.as_local()?;
        self.db
            .run(move |conn| find_between(conn, owner, range))
            .await
    }

    async fn category_total(
        &self,
        owner: &RecordId,
        category: &str,
        range: DateRange,
    ) -> AppResult<Decimal> {
        let owner = owner.as_local()?;
        let category = category.to_string();
        self.db
            .run(move |conn| sum_for_category(conn, owner, &category, range))
            .await
    }

    async fn delete_expense(&self, id: &RecordId) -> AppResult<bool> {
        let id = id.as_local()?;
        self.db.run(move |conn| delete(conn, id)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::auth::models::UserRecord;
    use crate::features::auth::repository as users;
    use crate::shared::database::open_in_memory_database;
    use crate::shared::errors::AppError;

    fn setup() -> Connection {
        let conn = open_in_memory_database().unwrap();
        users::save(&conn, UserRecord::new("alice", "hash")).unwrap();
        conn
    }

    fn expense(date: &str, category: &str, cents: i64) -> NewExpense {
        NewExpense::new(RecordId::Local(1), Decimal::new(cents, 2), date, category)
    }

    fn range(start: &str, end: &str) -> DateRange {
        DateRange::new(
            NaiveDate::parse_from_str(start, "%Y-%m-%d").unwrap(),
            NaiveDate::parse_from_str(end, "%Y-%m-%d").unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn test_create_and_list_round_trip() {
        let conn = setup();
        let input = expense("2024-03-01", "食費", 1999)
            .with_description("ランチ")
            .with_times(Some("12:00".to_string()), Some("12:45".to_string()))
            .with_photo("file:///receipt.jpg")
            .with_due_date("2024-03-31", 5);

        let created = create(&conn, input.clone()).unwrap();
        assert_eq!(created, input.into_expense(RecordId::Local(1)));

        let listed = find_by_owner(&conn, 1).unwrap();
        assert_eq!(listed, vec![created]);
    }

    #[test]
    fn test_missing_owner_is_conflict() {
        let conn = open_in_memory_database().unwrap();
        let result = create(&conn, expense("2024-03-01", "食費", 100));
        assert!(matches!(result, Err(AppError::Conflict(_))));
        assert!(find_by_owner(&conn, 1).unwrap().is_empty());
    }

    #[test]
    fn test_range_query_is_inclusive() {
        let conn = setup();
        for date in ["2024-02-29", "2024-03-01", "2024-03-15", "2024-03-31", "2024-04-01"] {
            create(&conn, expense(date, "食費", 100)).unwrap();
        }

        let march = find_between(&conn, 1, range("2024-03-01", "2024-03-31")).unwrap();
        let dates: Vec<_> = march.iter().map(|e| e.date.as_str()).collect();
        assert_eq!(dates, vec!["2024-03-01", "2024-03-15", "2024-03-31"]);
    }

    #[test]
    fn test_category_sum_is_exact_decimal() {
        let conn = setup();
        // 0.10を3回足しても丸め誤差が出ない
        for _ in 0..3 {
            create(&conn, expense("2024-03-10", "交通費", 10)).unwrap();
        }
        create(&conn, expense("2024-03-10", "食費", 5000)).unwrap();
        create(&conn, expense("2024-04-10", "交通費", 10)).unwrap();

        let total = sum_for_category(&conn, 1, "交通費", range("2024-03-01", "2024-03-31")).unwrap();
        assert_eq!(total, Decimal::new(30, 2));

        let none = sum_for_category(&conn, 1, "娯楽", range("2024-03-01", "2024-03-31")).unwrap();
        assert_eq!(none, Decimal::ZERO);
    }

    #[test]
    fn test_legacy_dates_are_matched_by_range() {
        let conn = setup();
        create(&conn, expense("2024-03-20", "食費", 500)).unwrap();
        // 旧形式の日付で保存された行
        conn.execute(
            "INSERT INTO expenses (amount, date, description, category, user_owner_id)
             VALUES ('10', '05/03/2024', '', '食費', 1)",
            [],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO expenses (amount, date, description, category, user_owner_id)
             VALUES ('99', '05/04/2024', '', '食費', 1)",
            [],
        )
        .unwrap();

        let march = DateRange::month(2024, 3).unwrap();
        let dates: Vec<_> = find_between(&conn, 1, march)
            .unwrap()
            .into_iter()
            .map(|e| e.date)
            .collect();
        assert_eq!(dates, vec!["05/03/2024", "2024-03-20"]);

        let total = sum_for_category(&conn, 1, "食費", march).unwrap();
        assert_eq!(total, Decimal::from(15));
    }

    #[test]
    fn test_delete() {
        let conn = setup();
        let created = create(&conn, expense("2024-03-01", "食費", 100)).unwrap();
        let id = created.id.as_local().unwrap();

        assert!(delete(&conn, id).unwrap());
        assert!(!delete(&conn, id).unwrap());
        assert!(find_by_owner(&conn, 1).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_local_store_via_blocking_pool() {
        let db = LocalDatabase::in_memory().unwrap();
        db.run(|conn| users::save(conn, UserRecord::new("alice", "hash")).map(|_| ()))
            .await
            .unwrap();

        let store = LocalExpenseStore::new(db);
        let created = store
            .insert_expense(expense("2024-03-01", "食費", 100))
            .await
            .unwrap();
        assert_eq!(
            store.expenses_for_owner(&RecordId::Local(1)).await.unwrap(),
            vec![created.clone()]
        );
        assert!(store.delete_expense(&created.id).await.unwrap());
    }
}
