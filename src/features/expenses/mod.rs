/// 経費機能モジュール
///
/// このモジュールは経費管理に関連する機能を提供します：
/// - 経費データのバリデーション
/// - ローカル（SQLite）とクラウド（Firebase）への保存
/// - 日付範囲・カテゴリ別の集計
// サブモジュールの宣言
pub mod cloud;
pub mod models;
pub mod repository;

// 公開インターフェース
pub use cloud::CloudExpenseStore;
pub use models::{Expense, NewExpense};
pub use repository::LocalExpenseStore;
