/// 共有エラー型とエラーハンドリング
pub mod errors;

/// 共有データベース接続管理
pub mod database;

/// 共有設定管理
pub mod config;

/// 共有ユーティリティ関数
pub mod utils;

/// クラウドストアとの通信
pub mod api_client;

/// メモリ上のドキュメントツリー
pub mod memory_tree;

// 便利な再エクスポート
pub use api_client::{ChildQuery, CloudTransport, FirebaseRestClient};
pub use config::{
    get_database_filename, get_environment, initialize_application, initialize_logging_system,
    load_environment_variables, log_initialization_complete, CloudConfig, Environment,
    EnvironmentConfig, InitializationResult, StorageBackend, StorageRouting, WorkerConfig,
};
pub use database::{create_tables, initialize_database, open_in_memory_database};
pub use errors::{AppError, AppResult, ErrorSeverity};
pub use memory_tree::{InjectedFailure, MemoryDocumentTree};
