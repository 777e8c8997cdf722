use crate::shared::errors::{AppError, AppResult};
use chrono::{Datelike, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

/// 保存時に使う日付形式
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// 端末の日付ピッカーが出力していた旧形式
const LEGACY_DATE_FORMAT: &str = "%d/%m/%Y";

/// YYYY-MM-DD形式の日付を解析する（書き込み時の検証用）
pub fn parse_iso_date(value: &str) -> AppResult<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT).map_err(|_| {
        AppError::validation("日付の形式が正しくありません（YYYY-MM-DD形式で入力してください）")
    })
}

/// 保存済みの経費日付を解析する
///
/// クラウド側には他クライアントが書いた値も入るため、ISO形式に加えて
/// DD/MM/YYYY形式も受け付ける。解析できない場合はNone
pub fn parse_expense_date(value: &str) -> Option<NaiveDate> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }

    NaiveDate::parse_from_str(trimmed, DATE_FORMAT)
        .or_else(|_| NaiveDate::parse_from_str(trimmed, LEGACY_DATE_FORMAT))
        .ok()
}

/// 指定タイムゾーンでの今日の日付
pub fn today_in(timezone: Tz) -> NaiveDate {
    Utc::now().with_timezone(&timezone).date_naive()
}

/// 今日から期限日までの日数（期限を過ぎていれば負）
pub fn days_until(due: NaiveDate, today: NaiveDate) -> i64 {
    (due - today).num_days()
}

/// 両端を含む日付範囲
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    /// 範囲を作成する（開始日が終了日より後ならエラー）
    pub fn new(start: NaiveDate, end: NaiveDate) -> AppResult<Self> {
        if start > end {
            return Err(AppError::validation("開始日は終了日以前である必要があります"));
        }
        Ok(Self { start, end })
    }

    /// 指定した年月の1日から月末まで
    pub fn month(year: i32, month: u32) -> AppResult<Self> {
        let start = NaiveDate::from_ymd_opt(year, month, 1)
            .ok_or_else(|| AppError::validation(format!("不正な年月です: {year}-{month}")))?;
        let next_month = if month == 12 {
            NaiveDate::from_ymd_opt(year + 1, 1, 1)
        } else {
            NaiveDate::from_ymd_opt(year, month + 1, 1)
        }
        .ok_or_else(|| AppError::validation(format!("不正な年月です: {year}-{month}")))?;

        // 翌月1日の前日が月末
        let end = next_month
            .pred_opt()
            .ok_or_else(|| AppError::validation("月末日を計算できません"))?;
        Self::new(start, end)
    }

    /// 指定日を含む月
    pub fn month_of(date: NaiveDate) -> AppResult<Self> {
        Self::month(date.year(), date.month())
    }

    /// 日付が範囲に含まれるか
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}
