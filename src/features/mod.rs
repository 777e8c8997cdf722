/// 機能別モジュール
///
/// このモジュールは、アプリケーションの機能を機能別に整理したモジュール群を提供します。
/// 各機能モジュールは、その機能に関連するコード（モデル、ローカル・クラウドの保存処理、サービス）
/// を含む自己完結型のユニットです。
// 機能モジュールの宣言
pub mod auth;
pub mod budget;
pub mod categories;
pub mod due_check;
pub mod expenses;
pub mod notifications;
pub mod repository;
pub mod storage;
