// 機能モジュール構造
pub mod app_state;
pub mod features;
pub mod shared;

use app_state::AppState;
use chrono_tz::Tz;
use features::auth::{AuthService, SessionStore};
use features::budget::BudgetService;
use features::due_check::{AlwaysSatisfied, DueCheckScheduler, DueCheckWorker};
use features::notifications::{NotificationCenter, NotificationDispatcher};
use features::repository::Repository;
use features::storage::LocalDatabase;
use log::{error, info, warn};
use shared::api_client::{CloudTransport, FirebaseRestClient};
use shared::config::{
    initialize_application, initialize_logging_system, load_environment_variables,
    log_initialization_complete, StorageRouting, WorkerConfig,
};
use shared::errors::AppResult;
use std::sync::Arc;

/// 起動時に組み立てるサービス一式
///
/// 画面側はここから各サービスと`AppState`を受け取る
#[derive(Clone)]
pub struct BudgetApp {
    pub state: AppState,
    pub repository: Arc<Repository>,
    pub auth: AuthService,
    pub budget: BudgetService,
    pub sessions: SessionStore,
    pub notifications: Arc<NotificationCenter>,
    pub due_check: Arc<DueCheckWorker>,
}

impl BudgetApp {
    /// ルーティング設定に従ってサービスを組み立てる
    ///
    /// # 引数
    /// * `db` - ローカルデータベース（セッションは常にここに保存）
    /// * `routing` - エンティティごとの保存先
    /// * `cloud` - クラウドのトランスポート
    /// * `timezone` - 期限チェックで「今日」を決めるタイムゾーン
    pub fn build(
        db: LocalDatabase,
        routing: StorageRouting,
        cloud: Option<Arc<dyn CloudTransport>>,
        timezone: Tz,
    ) -> AppResult<Self> {
        let repository = Arc::new(Repository::from_routing(routing, &db, cloud)?);
        let sessions = SessionStore::new(db);
        let state = AppState::new();
        let notifications = Arc::new(NotificationCenter::new());

        let due_check = Arc::new(DueCheckWorker::new(
            repository.clone(),
            sessions.clone(),
            NotificationDispatcher::new(notifications.clone()),
            timezone,
        ));

        Ok(Self {
            auth: AuthService::new(repository.clone(), sessions.clone(), state.clone()),
            budget: BudgetService::new(repository.clone(), state.clone()),
            sessions,
            state,
            repository,
            notifications,
            due_check,
        })
    }
}

/// 常駐プロセスとして起動する
///
/// 期限チェックのスケジュールは起動のたびに登録し直す。Ctrl+Cで停止する
pub async fn run() -> AppResult<()> {
    // 環境に応じた.envファイルを読み込み（ログシステム初期化前に実行）
    load_environment_variables();
    initialize_logging_system();

    info!("アプリケーション初期化を開始します...");

    let init = initialize_application()?;
    let db = LocalDatabase::open(&init.database_path)?;
    log_initialization_complete(&init);

    let routing = StorageRouting::from_env()?;

    let cloud: Option<Arc<dyn CloudTransport>> = if routing.uses_cloud() {
        Some(Arc::new(FirebaseRestClient::from_env()?))
    } else {
        None
    };

    let worker_config = WorkerConfig::from_env()?;
    let app = BudgetApp::build(db, routing, cloud, worker_config.timezone)?;

    match app.auth.restore_session().await {
        Ok(Some(_)) => {
            if let Err(e) = app.budget.refresh_for_session().await {
                warn!("予算指標の計算に失敗しました: {e}");
            }
        }
        Ok(None) => info!("サインイン中のユーザーはいません"),
        Err(e) => error!("セッションの復元に失敗しました: {e}"),
    }

    let scheduler = DueCheckScheduler::start(
        app.due_check.clone(),
        worker_config,
        Arc::new(AlwaysSatisfied),
    );

    tokio::signal::ctrl_c().await?;
    info!("終了シグナルを受信しました");
    scheduler.shutdown().await;

    Ok(())
}
