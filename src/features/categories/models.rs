use crate::shared::errors::{AppError, AppResult};
use serde::{Deserialize, Serialize};

/// カテゴリ名の最大文字数
const NAME_MAX_LENGTH: usize = 50;

/// ユーザーごとのカテゴリ
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Category {
    /// カテゴリ名
    pub name: String,
    /// 所有ユーザー名
    pub username: String,
}

impl Category {
    pub fn new(username: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            username: username.into(),
        }
    }

    /// 前後の空白を除いたカテゴリを検証付きで返す
    pub fn validated(&self) -> AppResult<Self> {
        let name = self.name.trim();
        let username = self.username.trim();

        if name.is_empty() {
            return Err(AppError::validation("カテゴリ名を入力してください"));
        }
        if name.chars().count() > NAME_MAX_LENGTH {
            return Err(AppError::validation(format!(
                "カテゴリ名は{NAME_MAX_LENGTH}文字以内で入力してください"
            )));
        }
        if username.is_empty() {
            return Err(AppError::validation("カテゴリの所有ユーザーが指定されていません"));
        }

        Ok(Self::new(username, name))
    }
}
