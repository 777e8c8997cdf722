/// 日付の解析・期間計算
pub mod dates;

/// 金額の表示・検証
pub mod money;

pub use dates::{days_until, parse_expense_date, parse_iso_date, today_in, DateRange};
pub use money::{format_amount, validate_amount};
