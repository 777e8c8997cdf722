/// ストレージ層
///
/// エンティティごとの保存先トレイトと、ローカル・クラウド共通の部品を提供します。
/// 各エンティティのアダプター実装は機能モジュール側（`repository.rs` / `cloud.rs`）にあります。
pub mod cloud;
pub mod local;
pub mod record_id;
pub mod traits;

pub use local::LocalDatabase;
pub use record_id::RecordId;
pub use traits::{BudgetSettingsStore, CategoryStore, ExpenseStore, UserStore};
