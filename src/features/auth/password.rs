use crate::shared::errors::{AppError, AppResult};
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{self, PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;

/// パスワードをArgon2idでハッシュ化する
///
/// # 戻り値
/// ソルトとパラメータを含むPHC文字列（`$argon2id$v=19$...`）
pub fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::validation(format!("パスワードのハッシュ化に失敗しました: {e}")))
}

/// 保存済みハッシュとパスワードを照合する
///
/// 比較はargon2側の定数時間比較で行う
///
/// # 戻り値
/// 一致すればtrue。保存値の形式が壊れている場合はエラー
pub fn verify_password(password: &str, stored: &str) -> AppResult<bool> {
    let parsed = PasswordHash::new(stored)
        .map_err(|_| AppError::validation("保存されているパスワードの形式が不正です"))?;

    match Argon2::default().verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(password_hash::Error::Password) => Ok(false),
        Err(e) => Err(AppError::validation(format!(
            "保存されているパスワードを検証できません: {e}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let hash = hash_password("correct horse").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(!hash.contains("correct horse"));
        assert!(verify_password("correct horse", &hash).unwrap());
        assert!(!verify_password("wrong horse", &hash).unwrap());
    }

    #[test]
    fn test_same_password_gets_different_salts() {
        assert_ne!(hash_password("secret").unwrap(), hash_password("secret").unwrap());
    }

    #[test]
    fn test_malformed_hash_is_rejected() {
        assert!(verify_password("x", "plaintext").is_err());
        assert!(verify_password("x", "").is_err());
        // 単純なダイジェスト形式は受け付けない
        assert!(verify_password("x", "sha256$c2FsdA$ZGlnZXN0").is_err());
    }
}
