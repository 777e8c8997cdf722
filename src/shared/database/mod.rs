/// SQLite接続とスキーマ管理
pub mod connection;

pub use connection::{
    check_column_exists, configure_connection, create_tables, initialize_database,
    open_in_memory_database,
};
