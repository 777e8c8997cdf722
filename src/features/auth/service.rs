use crate::app_state::AppState;
use crate::features::auth::models::{
    validate_password, validate_username, LoginOutcome, RegistrationOutcome, SessionUser,
    UserRecord,
};
use crate::features::auth::password::{hash_password, verify_password};
use crate::features::auth::session::SessionStore;
use crate::features::repository::Repository;
use crate::shared::errors::AppResult;
use log::{info, warn};
use std::sync::Arc;

/// 認証サービス（登録・ログイン・ログアウト）
#[derive(Clone)]
pub struct AuthService {
    repository: Arc<Repository>,
    sessions: SessionStore,
    state: AppState,
}

impl AuthService {
    pub fn new(repository: Arc<Repository>, sessions: SessionStore, state: AppState) -> Self {
        Self {
            repository,
            sessions,
            state,
        }
    }

    /// ユーザーを登録する
    ///
    /// # 引数
    /// * `username` - ユーザー名
    /// * `password` - 平文のパスワード（ハッシュ化して保存）
    /// * `profile_picture` - プロフィール画像のURI
    ///
    /// # 戻り値
    /// 登録結果。入力不正は`AppError::Validation`
    pub async fn register(
        &self,
        username: &str,
        password: &str,
        profile_picture: Option<String>,
    ) -> AppResult<RegistrationOutcome> {
        let username = validate_username(username)?;
        validate_password(password)?;

        // Argon2は重いのでブロッキングプールで計算する
        let plain = password.to_string();
        let password_hash = tokio::task::spawn_blocking(move || hash_password(&plain)).await??;

        let record = UserRecord::new(username, password_hash).with_profile_picture(profile_picture);
        let outcome = self.repository.register_user(record).await?;

        if let RegistrationOutcome::Registered(user) = &outcome {
            info!("ユーザーを登録しました: user_id={}", user.id);
        }
        Ok(outcome)
    }

    /// ログインする
    ///
    /// 失敗時はセッションを変更しない
    pub async fn login(&self, username: &str, password: &str) -> AppResult<LoginOutcome> {
        let Some(user) = self.repository.find_user_by_username(username.trim()).await? else {
            info!("ログイン失敗: 未登録のユーザー名です");
            return Ok(LoginOutcome::UnknownUser);
        };

        let plain = password.to_string();
        let stored = user.password_hash.clone();
        let matched = tokio::task::spawn_blocking(move || verify_password(&plain, &stored)).await??;
        if !matched {
            warn!("ログイン失敗: パスワードが一致しません: user_id={}", user.id);
            return Ok(LoginOutcome::WrongPassword);
        }

        let session = SessionUser::for_user(&user);
        self.sessions.save(&session).await?;
        self.state.set_session(Some(session.clone()));

        info!("ログインしました: user_id={}", user.id);
        Ok(LoginOutcome::Success(session))
    }

    /// ログアウトする
    pub async fn logout(&self) -> AppResult<()> {
        self.sessions.clear().await?;
        self.state.set_session(None);
        self.state.publish_metrics(None);
        info!("ログアウトしました");
        Ok(())
    }

    /// 保存済みのセッションを読み込んでAppStateに反映する（起動時用）
    pub async fn restore_session(&self) -> AppResult<Option<SessionUser>> {
        let session = self.sessions.current().await?;
        if let Some(session) = &session {
            info!("保存済みのセッションを復元しました: user_id={}", session.user_id);
        }
        self.state.set_session(session.clone());
        Ok(session)
    }
}
