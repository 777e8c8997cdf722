use crate::shared::errors::{AppError, AppResult};
use rust_decimal::Decimal;
use std::str::FromStr;

/// 保存時の金額の小数桁数
pub const CURRENCY_SCALE: u32 = 2;

/// 入力できる金額の上限（10桁）
const MAX_AMOUNT: i64 = 9_999_999_999;

/// 金額を検証する（0以上、10桁以内、小数2桁以内）
pub fn validate_amount(amount: Decimal) -> AppResult<()> {
    if amount.is_sign_negative() && !amount.is_zero() {
        return Err(AppError::validation("金額は0以上である必要があります"));
    }

    if amount > Decimal::from(MAX_AMOUNT) {
        return Err(AppError::validation("金額は10桁以内で入力してください"));
    }

    if amount.normalize().scale() > CURRENCY_SCALE {
        return Err(AppError::validation("金額は小数点以下2桁までで入力してください"));
    }

    Ok(())
}

/// 表示用に小数2桁へ整形する
pub fn format_amount(amount: Decimal) -> String {
    format!("{:.2}", amount.round_dp(CURRENCY_SCALE))
}

/// SQLiteのTEXTカラムから金額を読み出す
pub fn decimal_from_column(value: &str, column: usize) -> rusqlite::Result<Decimal> {
    Decimal::from_str(value.trim()).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(
            column,
            rusqlite::types::Type::Text,
            Box::new(e),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_amount() {
        assert!(validate_amount(Decimal::ZERO).is_ok());
        assert!(validate_amount(Decimal::new(1999, 2)).is_ok());
        assert!(validate_amount(Decimal::new(-1, 0)).is_err());
        assert!(validate_amount(Decimal::new(12345, 3)).is_err());
        assert!(validate_amount(Decimal::from(10_000_000_000i64)).is_err());
        // 末尾のゼロは桁数に含めない
        assert!(validate_amount(Decimal::new(12300, 4)).is_ok());
    }

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(Decimal::new(5, 0)), "5.00");
        assert_eq!(format_amount(Decimal::new(1234, 1)), "123.40");
    }

    #[test]
    fn test_decimal_from_column() {
        assert_eq!(decimal_from_column("12.50", 0).unwrap(), Decimal::new(1250, 2));
        assert!(decimal_from_column("twelve", 0).is_err());
    }
}
