/// カテゴリ機能モジュール（ユーザーごとのカテゴリ管理）
pub mod cloud;
pub mod models;
pub mod repository;

pub use cloud::CloudCategoryStore;
pub use models::Category;
pub use repository::LocalCategoryStore;
