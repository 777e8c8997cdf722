/// 環境変数・ログ・ストレージ設定
pub mod environment;

/// アプリケーション初期化
pub mod initialization;

pub use environment::{
    get_database_filename, get_environment, initialize_logging_system, load_environment_variables,
    CloudConfig, Environment, EnvironmentConfig, StorageBackend, StorageRouting, WorkerConfig,
};
pub use initialization::{initialize_application, log_initialization_complete, InitializationResult};
