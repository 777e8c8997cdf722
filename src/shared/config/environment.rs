use crate::shared::errors::{AppError, AppResult};
use chrono_tz::Tz;
use std::path::PathBuf;
use std::time::Duration;

/// アプリケーションの実行環境を表す列挙型
#[derive(Debug, Clone, PartialEq)]
pub enum Environment {
    /// 開発環境
    Development,
    /// プロダクション環境
    Production,
}

/// 環境変数取得エラー
#[derive(Debug, Clone)]
pub struct EnvVarError {
    /// 変数名
    pub var_name: String,
    /// エラーメッセージ
    pub message: String,
}

impl std::fmt::Display for EnvVarError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "環境変数 {} が見つかりません: {}",
            self.var_name, self.message
        )
    }
}

impl std::error::Error for EnvVarError {}

/// 環境変数を取得する（優先順位: 起動時 > コンパイル時 > エラー）
///
/// # 取得順序
/// 1. 起動時の環境変数（`std::env::var`）
/// 2. コンパイル時の環境変数（`option_env!`マクロ、build.rsで埋め込み）
/// 3. どちらも見つからない場合はエラー
#[macro_export]
macro_rules! get_env_var {
    ($var_name:expr) => {{
        if let Ok(value) = std::env::var($var_name) {
            log::debug!("環境変数 {} を起動時の環境変数から取得しました", $var_name);
            Ok(value)
        } else if let Some(value) = option_env!($var_name) {
            log::debug!("環境変数 {} をコンパイル時の環境変数から取得しました", $var_name);
            Ok(value.to_string())
        } else {
            Err($crate::shared::config::environment::EnvVarError {
                var_name: $var_name.to_string(),
                message: format!(
                    "起動時の環境変数 {} もコンパイル時の環境変数も見つかりませんでした",
                    $var_name
                ),
            })
        }
    }};
}

/// 環境変数を取得する（オプション版）
#[macro_export]
macro_rules! get_env_var_optional {
    ($var_name:expr) => {{
        $crate::get_env_var!($var_name).ok()
    }};
}

/// 環境変数を取得する（デフォルト値付き）
#[macro_export]
macro_rules! get_env_var_or_default {
    ($var_name:expr, $default_value:expr) => {{
        $crate::get_env_var!($var_name).unwrap_or_else(|_| {
            log::debug!(
                "環境変数 {} が見つからないため、デフォルト値を使用します: {}",
                $var_name,
                $default_value
            );
            $default_value.to_string()
        })
    }};
}

/// 環境設定を管理する構造体
#[derive(Debug, Clone)]
pub struct EnvironmentConfig {
    /// 実行環境
    pub environment: String,
    /// デバッグモードの有効/無効
    pub debug_mode: bool,
    /// ログレベル
    pub log_level: String,
}

impl EnvironmentConfig {
    /// 環境変数から設定を読み込む
    pub fn from_env() -> Self {
        let environment = get_environment();
        let debug_mode = environment == Environment::Development;
        let log_level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| {
            if debug_mode {
                "debug".to_string()
            } else {
                "info".to_string()
            }
        });

        Self {
            environment: format!("{environment:?}").to_lowercase(),
            debug_mode,
            log_level,
        }
    }

    /// プロダクション環境かどうかを判定
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    /// 開発環境かどうかを判定
    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }
}

/// 現在の実行環境を判定する
///
/// # 判定ロジック
/// 1. 実行時環境変数 ENVIRONMENT を確認
/// 2. デバッグビルドの場合は Development
/// 3. リリースビルドの場合は Production
pub fn get_environment() -> Environment {
    if let Ok(env_var) = std::env::var("ENVIRONMENT") {
        let env = match env_var.as_str() {
            "production" => Environment::Production,
            _ => Environment::Development,
        };
        log::debug!("環境判定: 実行時環境変数を使用 -> {env_var} -> {env:?}");
        return env;
    }

    // フォールバック: ビルド設定に基づく判定
    let env = if cfg!(debug_assertions) {
        Environment::Development
    } else {
        Environment::Production
    };
    log::debug!(
        "環境判定: ビルド設定を使用 -> debug_assertions={} -> {env:?}",
        cfg!(debug_assertions)
    );
    env
}

/// 環境に応じたデータベースファイル名を取得する
///
/// # ファイル名の規則
/// - 開発環境: "dev_budget.db"
/// - プロダクション環境: "budget.db"
pub fn get_database_filename(env: Environment) -> &'static str {
    match env {
        Environment::Development => "dev_budget.db",
        Environment::Production => "budget.db",
    }
}

/// アプリケーションデータディレクトリを取得する
///
/// `DATA_DIR` が設定されていればそれを優先し、
/// なければプラットフォームのデータディレクトリ配下の`budget-tracker`を使う
pub fn get_app_data_dir() -> AppResult<PathBuf> {
    if let Ok(dir) = std::env::var("DATA_DIR") {
        return Ok(PathBuf::from(dir));
    }

    dirs::data_dir()
        .map(|dir| dir.join("budget-tracker"))
        .ok_or_else(|| AppError::configuration("データディレクトリを特定できません"))
}

/// 環境に応じた.envファイルを読み込む
///
/// ログシステムの初期化前に呼ばれるため、出力は標準エラーに直接書く
pub fn load_environment_variables() {
    let environment = std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string());

    let env_file = match environment.as_str() {
        "production" => ".env.production",
        _ => ".env",
    };

    eprintln!("環境: {environment}, 読み込み対象: {env_file}");

    match dotenv::from_filename(env_file) {
        Ok(_) => {
            eprintln!("{env_file}ファイルを読み込みました");
        }
        Err(_) => {
            // 環境固有のファイルがない場合は、デフォルトの.envを試行
            if env_file != ".env" && dotenv::dotenv().is_ok() {
                eprintln!("{env_file}が見つからないため、デフォルトの.envファイルを読み込みました");
            } else {
                eprintln!("環境変数ファイルが見つかりません。コンパイル時埋め込み値または直接設定された環境変数を使用します。");
            }
        }
    }
}

/// ログシステムを初期化する
///
/// 複数回呼ばれても二重初期化でパニックしない
pub fn initialize_logging_system() {
    let env_config = EnvironmentConfig::from_env();

    let log_level = match env_config.log_level.to_lowercase().as_str() {
        "error" => log::LevelFilter::Error,
        "warn" => log::LevelFilter::Warn,
        "info" => log::LevelFilter::Info,
        "debug" => log::LevelFilter::Debug,
        "trace" => log::LevelFilter::Trace,
        _ => log::LevelFilter::Info,
    };

    let result = env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .format_timestamp_secs()
        .format_module_path(false)
        .format_target(false)
        .try_init();

    if result.is_ok() {
        log::info!(
            "ログシステムを初期化しました: level={}, environment={}",
            env_config.log_level,
            env_config.environment
        );
    }
}

/// エンティティごとの保存先
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    /// 端末内のSQLite
    Local,
    /// Firebase Realtime Database
    Cloud,
}

impl StorageBackend {
    /// 文字列から保存先を解析する（`local` / `cloud`）
    pub fn parse(value: &str) -> AppResult<Self> {
        match value.trim().to_lowercase().as_str() {
            "local" | "sqlite" => Ok(StorageBackend::Local),
            "cloud" | "firebase" => Ok(StorageBackend::Cloud),
            other => Err(AppError::configuration(format!(
                "不明なストレージバックエンドです: {other}"
            ))),
        }
    }
}

/// エンティティ種別ごとの保存先ルーティング
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StorageRouting {
    pub users: StorageBackend,
    pub expenses: StorageBackend,
    pub budget_settings: StorageBackend,
    pub categories: StorageBackend,
}

impl StorageRouting {
    /// 全エンティティを同じ保存先に向ける
    pub fn uniform(backend: StorageBackend) -> Self {
        Self {
            users: backend,
            expenses: backend,
            budget_settings: backend,
            categories: backend,
        }
    }

    /// いずれかのエンティティがクラウドを使うかどうか
    pub fn uses_cloud(&self) -> bool {
        [
            self.users,
            self.expenses,
            self.budget_settings,
            self.categories,
        ]
        .contains(&StorageBackend::Cloud)
    }

    /// 環境変数からルーティングを読み込む
    ///
    /// `STORAGE_BACKEND` が全体の既定値、`STORAGE_<ENTITY>_BACKEND` が個別の上書き
    pub fn from_env() -> AppResult<Self> {
        let default = StorageBackend::parse(&crate::get_env_var_or_default!(
            "STORAGE_BACKEND",
            "local"
        ))?;

        let pick = |name: &str| -> AppResult<StorageBackend> {
            match std::env::var(name) {
                Ok(value) => StorageBackend::parse(&value),
                Err(_) => Ok(default),
            }
        };

        let routing = Self {
            users: pick("STORAGE_USERS_BACKEND")?,
            expenses: pick("STORAGE_EXPENSES_BACKEND")?,
            budget_settings: pick("STORAGE_BUDGET_BACKEND")?,
            categories: pick("STORAGE_CATEGORIES_BACKEND")?,
        };

        log::info!("ストレージルーティング: {routing:?}");
        Ok(routing)
    }
}

impl Default for StorageRouting {
    fn default() -> Self {
        Self::uniform(StorageBackend::Local)
    }
}

/// Firebase Realtime Databaseの接続設定
#[derive(Debug, Clone)]
pub struct CloudConfig {
    /// データベースのベースURL（例: https://project-id.firebaseio.com）
    pub database_url: String,
    /// REST APIの`auth`パラメータに渡すトークン
    pub auth_token: Option<String>,
    /// リクエストのタイムアウト（秒）
    pub timeout_seconds: u64,
}

impl CloudConfig {
    /// 環境変数からクラウド設定を読み込む
    pub fn from_env() -> AppResult<Self> {
        let database_url = crate::get_env_var!("FIREBASE_DATABASE_URL").map_err(|e| {
            log::error!("FIREBASE_DATABASE_URLの取得に失敗しました: {e}");
            AppError::configuration("FIREBASE_DATABASE_URLが設定されていません")
        })?;

        let auth_token = crate::get_env_var_optional!("FIREBASE_AUTH_TOKEN");

        let timeout_seconds = crate::get_env_var_or_default!("FIREBASE_TIMEOUT_SECONDS", "30")
            .parse()
            .unwrap_or_else(|_| {
                log::warn!("FIREBASE_TIMEOUT_SECONDSのパースに失敗しました。デフォルト値30秒を使用します");
                30
            });

        let config = Self {
            database_url: database_url.trim_end_matches('/').to_string(),
            auth_token,
            timeout_seconds,
        };
        config.validate()?;

        log::info!(
            "Firebase設定: url={}, timeout={}s, auth={}",
            config.database_url,
            config.timeout_seconds,
            if config.auth_token.is_some() { "あり" } else { "なし" }
        );
        Ok(config)
    }

    /// 設定を検証する
    pub fn validate(&self) -> AppResult<()> {
        if !self.database_url.starts_with("https://") && !self.database_url.starts_with("http://")
        {
            return Err(AppError::configuration(
                "FIREBASE_DATABASE_URLはhttp(s)のURLである必要があります",
            ));
        }

        if self.timeout_seconds == 0 {
            return Err(AppError::configuration(
                "タイムアウトは0より大きい値である必要があります",
            ));
        }

        Ok(())
    }
}

/// 支払期限チェックワーカーの設定
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// 定期実行の間隔
    pub interval: Duration,
    /// 1回の定期実行あたりの最大再試行回数
    pub max_retries: u32,
    /// 再試行の初回待機時間（以降は倍々で増加）
    pub backoff_base: Duration,
    /// 「今日」を決めるタイムゾーン
    pub timezone: Tz,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(12 * 3600),
            max_retries: 5,
            backoff_base: Duration::from_secs(30),
            timezone: chrono_tz::Asia::Tokyo,
        }
    }
}

impl WorkerConfig {
    /// 環境変数からワーカー設定を読み込む
    pub fn from_env() -> AppResult<Self> {
        let defaults = Self::default();

        let interval_hours: u64 = crate::get_env_var_or_default!("DUE_CHECK_INTERVAL_HOURS", "12")
            .parse()
            .map_err(|_| AppError::configuration("DUE_CHECK_INTERVAL_HOURSは整数で指定してください"))?;
        let interval = interval_from_hours(interval_hours)?;

        let max_retries = crate::get_env_var_or_default!("DUE_CHECK_MAX_RETRIES", "5")
            .parse()
            .unwrap_or(defaults.max_retries);

        let backoff_seconds: u64 = crate::get_env_var_or_default!("DUE_CHECK_BACKOFF_SECONDS", "30")
            .parse()
            .unwrap_or(30);

        let timezone = parse_timezone(&crate::get_env_var_or_default!("APP_TIMEZONE", "Asia/Tokyo"))?;

        Ok(Self {
            interval,
            max_retries,
            backoff_base: Duration::from_secs(backoff_seconds.max(1)),
            timezone,
        })
    }
}

/// 定期実行の間隔（時間単位）をDurationにする
fn interval_from_hours(hours: u64) -> AppResult<Duration> {
    if hours == 0 {
        return Err(AppError::configuration(
            "DUE_CHECK_INTERVAL_HOURSは1以上で指定してください",
        ));
    }
    hours
        .checked_mul(3600)
        .map(Duration::from_secs)
        .ok_or_else(|| AppError::configuration("DUE_CHECK_INTERVAL_HOURSが大きすぎます"))
}

/// IANAタイムゾーン名を解析する
pub fn parse_timezone(name: &str) -> AppResult<Tz> {
    name.parse::<Tz>()
        .map_err(|_| AppError::configuration(format!("不明なタイムゾーンです: {name}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_database_filename() {
        assert_eq!(get_database_filename(Environment::Development), "dev_budget.db");
        assert_eq!(get_database_filename(Environment::Production), "budget.db");
    }

    #[test]
    fn test_storage_backend_parse() {
        assert_eq!(StorageBackend::parse("local").unwrap(), StorageBackend::Local);
        assert_eq!(StorageBackend::parse(" Cloud ").unwrap(), StorageBackend::Cloud);
        assert_eq!(StorageBackend::parse("firebase").unwrap(), StorageBackend::Cloud);
        assert!(matches!(
            StorageBackend::parse("s3"),
            Err(AppError::Configuration(_))
        ));
    }

    #[test]
    fn test_routing_uses_cloud() {
        assert!(!StorageRouting::default().uses_cloud());

        let mut routing = StorageRouting::default();
        routing.expenses = StorageBackend::Cloud;
        assert!(routing.uses_cloud());
        assert!(StorageRouting::uniform(StorageBackend::Cloud).uses_cloud());
    }

    #[test]
    fn test_cloud_config_validation() {
        let config = CloudConfig {
            database_url: "https://demo.firebaseio.com".to_string(),
            auth_token: None,
            timeout_seconds: 30,
        };
        assert!(config.validate().is_ok());

        let bad_url = CloudConfig {
            database_url: "demo.firebaseio.com".to_string(),
            ..config.clone()
        };
        assert!(bad_url.validate().is_err());

        let zero_timeout = CloudConfig {
            timeout_seconds: 0,
            ..config
        };
        assert!(zero_timeout.validate().is_err());
    }

    #[test]
    fn test_worker_config_default() {
        let config = WorkerConfig::default();
        assert_eq!(config.interval, Duration::from_secs(12 * 3600));
        assert_eq!(config.timezone, chrono_tz::Asia::Tokyo);
    }

    #[test]
    fn test_interval_from_hours() {
        assert_eq!(interval_from_hours(12).unwrap(), Duration::from_secs(43_200));
        assert!(matches!(interval_from_hours(0), Err(AppError::Configuration(_))));
        assert!(matches!(
            interval_from_hours(u64::MAX),
            Err(AppError::Configuration(_))
        ));
    }

    #[test]
    fn test_parse_timezone() {
        assert_eq!(parse_timezone("UTC").unwrap(), chrono_tz::UTC);
        assert!(parse_timezone("Mars/Olympus").is_err());
    }

    #[test]
    fn test_load_environment_variables_before_logger() {
        // ロガー未初期化でも呼べて、.envがなくても失敗しない
        load_environment_variables();
        load_environment_variables();
    }

    #[test]
    fn test_environment_config_flags() {
        let config = EnvironmentConfig {
            environment: "production".to_string(),
            debug_mode: false,
            log_level: "info".to_string(),
        };
        assert!(config.is_production());
        assert!(!config.is_development());
    }
}
