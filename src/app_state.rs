use crate::features::auth::models::SessionUser;
use crate::features::budget::models::BudgetMetrics;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::watch;

/// 表示テーマ
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

/// アプリケーション状態
///
/// 各値はwatchチャネルで配信する。購読側は常に最新値だけを受け取り、
/// 読み残した古い値は上書きされる
#[derive(Clone)]
pub struct AppState {
    theme: Arc<watch::Sender<Theme>>,
    session: Arc<watch::Sender<Option<SessionUser>>>,
    metrics: Arc<watch::Sender<Option<BudgetMetrics>>>,
}

impl AppState {
    pub fn new() -> Self {
        Self {
            theme: Arc::new(watch::Sender::new(Theme::default())),
            session: Arc::new(watch::Sender::new(None)),
            metrics: Arc::new(watch::Sender::new(None)),
        }
    }

    pub fn set_theme(&self, theme: Theme) {
        self.theme.send_replace(theme);
        log::debug!("テーマを変更しました: {theme:?}");
    }

    pub fn theme(&self) -> Theme {
        *self.theme.borrow()
    }

    pub fn subscribe_theme(&self) -> watch::Receiver<Theme> {
        self.theme.subscribe()
    }

    /// サインイン中のユーザーを設定する（Noneでサインアウト）
    pub fn set_session(&self, session: Option<SessionUser>) {
        self.session.send_replace(session);
    }

    pub fn current_session(&self) -> Option<SessionUser> {
        self.session.borrow().clone()
    }

    pub fn subscribe_session(&self) -> watch::Receiver<Option<SessionUser>> {
        self.session.subscribe()
    }

    /// 最新の予算指標を配信する
    pub fn publish_metrics(&self, metrics: Option<BudgetMetrics>) {
        self.metrics.send_replace(metrics);
    }

    pub fn latest_metrics(&self) -> Option<BudgetMetrics> {
        self.metrics.borrow().clone()
    }

    pub fn subscribe_metrics(&self) -> watch::Receiver<Option<BudgetMetrics>> {
        self.metrics.subscribe()
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}
