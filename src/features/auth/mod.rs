/// 認証機能モジュール
///
/// このモジュールはユーザー登録・ログインに関連する機能を提供します：
/// - ユーザーの保存（ローカル・クラウド）
/// - パスワードのハッシュ化と照合
/// - サインイン状態の永続化
// サブモジュールの宣言
pub mod cloud;
pub mod models;
pub mod password;
pub mod repository;
pub mod service;
pub mod session;

// 公開インターフェース
pub use cloud::CloudUserStore;
pub use models::{LoginOutcome, RegistrationOutcome, SessionUser, User, UserRecord};
pub use repository::LocalUserStore;
pub use service::AuthService;
pub use session::SessionStore;
