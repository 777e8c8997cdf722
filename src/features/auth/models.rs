use crate::features::storage::RecordId;
use crate::shared::errors::{AppError, AppResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// ユーザー名の最小文字数
const USERNAME_MIN_LENGTH: usize = 3;
/// ユーザー名の最大文字数
const USERNAME_MAX_LENGTH: usize = 32;
/// パスワードの最小文字数
const PASSWORD_MIN_LENGTH: usize = 6;

/// 登録済みユーザー
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// ユーザーID
    pub id: RecordId,
    /// ユーザー名（一意）
    pub username: String,
    /// ソルト付きハッシュ（平文は保存しない）
    pub password_hash: String,
    /// プロフィール画像のURI
    pub profile_picture: Option<String>,
}

/// 保存するユーザー情報（idがNoneなら新規作成、Someなら置き換え）
#[derive(Debug, Clone, PartialEq)]
pub struct UserRecord {
    pub id: Option<RecordId>,
    pub username: String,
    pub password_hash: String,
    pub profile_picture: Option<String>,
}

impl UserRecord {
    /// 新規ユーザーを作成する
    pub fn new(username: impl Into<String>, password_hash: impl Into<String>) -> Self {
        Self {
            id: None,
            username: username.into(),
            password_hash: password_hash.into(),
            profile_picture: None,
        }
    }

    pub fn with_profile_picture(mut self, profile_picture: Option<String>) -> Self {
        self.profile_picture = profile_picture;
        self
    }

    /// 採番済みIDを付けてUserにする
    pub fn into_user(self, id: RecordId) -> User {
        User {
            id,
            username: self.username,
            password_hash: self.password_hash,
            profile_picture: self.profile_picture,
        }
    }
}

/// サインイン中のユーザー
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionUser {
    /// セッションID
    pub session_id: String,
    /// ユーザーID
    pub user_id: RecordId,
    /// ユーザー名
    pub username: String,
    /// サインイン日時
    pub signed_in_at: DateTime<Utc>,
}

impl SessionUser {
    /// ユーザーから新しいセッションを作成する
    pub fn for_user(user: &User) -> Self {
        Self {
            session_id: uuid::Uuid::new_v4().to_string(),
            user_id: user.id.clone(),
            username: user.username.clone(),
            signed_in_at: Utc::now(),
        }
    }
}

/// 登録結果
///
/// ユーザー名の重複はエラーではなく結果として返す
#[derive(Debug, Clone, PartialEq)]
pub enum RegistrationOutcome {
    /// 登録成功
    Registered(User),
    /// ユーザー名が既に使われている（ストアは変更されていない）
    UsernameTaken { message: String },
}

impl RegistrationOutcome {
    pub fn username_taken(username: &str) -> Self {
        RegistrationOutcome::UsernameTaken {
            message: format!("ユーザー名「{username}」は既に使われています"),
        }
    }

    pub fn is_registered(&self) -> bool {
        matches!(self, RegistrationOutcome::Registered(_))
    }

    /// 画面表示用のメッセージ
    pub fn message(&self) -> String {
        match self {
            RegistrationOutcome::Registered(user) => {
                format!("ユーザー「{}」を登録しました", user.username)
            }
            RegistrationOutcome::UsernameTaken { message } => message.clone(),
        }
    }
}

/// ログイン結果
#[derive(Debug, Clone, PartialEq)]
pub enum LoginOutcome {
    /// ログイン成功（セッションは保存済み）
    Success(SessionUser),
    /// ユーザー名が見つからない
    UnknownUser,
    /// パスワードが一致しない
    WrongPassword,
}

impl LoginOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, LoginOutcome::Success(_))
    }
}

/// ユーザー名を検証し、前後の空白を取り除いて返す
pub fn validate_username(username: &str) -> AppResult<String> {
    let trimmed = username.trim();
    let length = trimmed.chars().count();

    if length < USERNAME_MIN_LENGTH || length > USERNAME_MAX_LENGTH {
        return Err(AppError::validation(format!(
            "ユーザー名は{USERNAME_MIN_LENGTH}〜{USERNAME_MAX_LENGTH}文字で入力してください"
        )));
    }

    if trimmed.chars().any(char::is_whitespace) {
        return Err(AppError::validation("ユーザー名に空白は使えません"));
    }

    Ok(trimmed.to_string())
}

/// パスワードを検証する
pub fn validate_password(password: &str) -> AppResult<()> {
    if password.chars().count() < PASSWORD_MIN_LENGTH {
        return Err(AppError::validation(format!(
            "パスワードは{PASSWORD_MIN_LENGTH}文字以上で入力してください"
        )));
    }
    Ok(())
}
