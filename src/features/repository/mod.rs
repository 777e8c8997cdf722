//! リポジトリ（保存先の振り分け層）
//!
//! エンティティ種別ごとに1つの保存先を構築時に選び、画面側へ単一のインターフェースを提供します。
//! ストア間の同期は行いません。状態を持たないため、複数のタスクから同時に呼び出せます。

use crate::features::auth::cloud::CloudUserStore;
use crate::features::auth::models::{RegistrationOutcome, User, UserRecord};
use crate::features::auth::repository::LocalUserStore;
use crate::features::budget::cloud::CloudBudgetSettingsStore;
use crate::features::budget::models::{BudgetSettings, BudgetSettingsInput};
use crate::features::budget::repository::LocalBudgetSettingsStore;
use crate::features::categories::cloud::CloudCategoryStore;
use crate::features::categories::models::Category;
use crate::features::categories::repository::LocalCategoryStore;
use crate::features::expenses::cloud::CloudExpenseStore;
use crate::features::expenses::models::{Expense, NewExpense};
use crate::features::expenses::repository::LocalExpenseStore;
use crate::features::storage::{
    BudgetSettingsStore, CategoryStore, ExpenseStore, LocalDatabase, RecordId, UserStore,
};
use crate::shared::api_client::CloudTransport;
use crate::shared::config::{StorageBackend, StorageRouting};
use crate::shared::errors::{AppError, AppResult};
use crate::shared::utils::DateRange;
use rust_decimal::Decimal;
use std::sync::Arc;

/// エンティティごとの保存先をまとめたリポジトリ
#[derive(Clone)]
pub struct Repository {
    users: Arc<dyn UserStore>,
    expenses: Arc<dyn ExpenseStore>,
    budget_settings: Arc<dyn BudgetSettingsStore>,
    categories: Arc<dyn CategoryStore>,
}

impl Repository {
    /// 保存先を直接指定して作成する
    pub fn new(
        users: Arc<dyn UserStore>,
        expenses: Arc<dyn ExpenseStore>,
        budget_settings: Arc<dyn BudgetSettingsStore>,
        categories: Arc<dyn CategoryStore>,
    ) -> Self {
        Self {
            users,
            expenses,
            budget_settings,
            categories,
        }
    }

    /// ルーティング設定から保存先を組み立てる
    ///
    /// # 引数
    /// * `routing` - エンティティごとの保存先
    /// * `local` - ローカルデータベース
    /// * `cloud` - クラウドのトランスポート（クラウドを使う場合は必須）
    ///
    /// # 戻り値
    /// リポジトリ、または設定が矛盾している場合は`AppError::Configuration`
    pub fn from_routing(
        routing: StorageRouting,
        local: &LocalDatabase,
        cloud: Option<Arc<dyn CloudTransport>>,
    ) -> AppResult<Self> {
        validate_routing(&routing)?;

        if routing.uses_cloud() && cloud.is_none() {
            return Err(AppError::configuration(
                "クラウドストアを使う設定ですが、Firebaseの接続設定がありません",
            ));
        }
        let transport = || -> AppResult<Arc<dyn CloudTransport>> {
            cloud
                .clone()
                .ok_or_else(|| AppError::configuration("Firebaseの接続設定がありません"))
        };

        let users: Arc<dyn UserStore> = match routing.users {
            StorageBackend::Local => Arc::new(LocalUserStore::new(local.clone())),
            StorageBackend::Cloud => Arc::new(CloudUserStore::new(transport()?)),
        };
        let expenses: Arc<dyn ExpenseStore> = match routing.expenses {
            StorageBackend::Local => Arc::new(LocalExpenseStore::new(local.clone())),
            StorageBackend::Cloud => Arc::new(CloudExpenseStore::new(transport()?)),
        };
        let budget_settings: Arc<dyn BudgetSettingsStore> = match routing.budget_settings {
            StorageBackend::Local => Arc::new(LocalBudgetSettingsStore::new(local.clone())),
            StorageBackend::Cloud => Arc::new(CloudBudgetSettingsStore::new(transport()?)),
        };
        let categories: Arc<dyn CategoryStore> = match routing.categories {
            StorageBackend::Local => Arc::new(LocalCategoryStore::new(local.clone())),
            StorageBackend::Cloud => Arc::new(CloudCategoryStore::new(transport()?)),
        };

        log::info!("リポジトリを構築しました: {routing:?}");
        Ok(Self::new(users, expenses, budget_settings, categories))
    }

    /// ユーザーを登録する
    ///
    /// ユーザー名が使用済みなら`UsernameTaken`を返し、ストアは変更しない
    pub async fn register_user(&self, record: UserRecord) -> AppResult<RegistrationOutcome> {
        if self.users.find_by_username(&record.username).await?.is_some() {
            log::info!("登録済みのユーザー名です: {}", record.username);
            return Ok(RegistrationOutcome::username_taken(&record.username));
        }

        let username = record.username.clone();
        match self.users.save_user(record).await {
            Ok(user) => Ok(RegistrationOutcome::Registered(user)),
            // 確認後に他の登録が先に確定した場合
            Err(AppError::Conflict(detail)) => {
                log::warn!("ユーザー名の確保で競合しました: {detail}");
                Ok(RegistrationOutcome::username_taken(&username))
            }
            Err(e) => Err(e),
        }
    }

    /// ユーザー情報を更新する
    pub async fn update_user(&self, user: User) -> AppResult<User> {
        let record = UserRecord {
            id: Some(user.id),
            username: user.username,
            password_hash: user.password_hash,
            profile_picture: user.profile_picture,
        };
        self.users.save_user(record).await
    }

    pub async fn find_user_by_username(&self, username: &str) -> AppResult<Option<User>> {
        self.users.find_by_username(username).await
    }

    pub async fn find_user(&self, id: &RecordId) -> AppResult<Option<User>> {
        self.users.find_by_id(id).await
    }

    /// ユーザーと所有する経費を削除する
    pub async fn delete_user(&self, id: &RecordId) -> AppResult<bool> {
        for expense in self.expenses.expenses_for_owner(id).await? {
            self.expenses.delete_expense(&expense.id).await?;
        }
        self.users.delete_user(id).await
    }

    /// 経費を追加する
    ///
    /// 入力を検証し、所有ユーザーが存在しなければ`AppError::Conflict`
    pub async fn add_expense(&self, expense: NewExpense) -> AppResult<Expense> {
        expense.validate()?;
        self.ensure_user_exists(&expense.owner_id).await?;
        self.expenses.insert_expense(expense).await
    }

    pub async fn list_expenses(&self, owner: &RecordId) -> AppResult<Vec<Expense>> {
        self.expenses.expenses_for_owner(owner).await
    }

    pub async fn expenses_between(
        &self,
        owner: &RecordId,
        range: DateRange,
    ) -> AppResult<Vec<Expense>> {
        self.expenses.expenses_between(owner, range).await
    }

    pub async fn category_total_between(
        &self,
        owner: &RecordId,
        category: &str,
        range: DateRange,
    ) -> AppResult<Decimal> {
        self.expenses.category_total(owner, category, range).await
    }

    pub async fn delete_expense(&self, id: &RecordId) -> AppResult<bool> {
        self.expenses.delete_expense(id).await
    }

    /// 予算設定を保存する（ユーザーごとに1件）
    pub async fn save_budget_settings(
        &self,
        input: BudgetSettingsInput,
    ) -> AppResult<BudgetSettings> {
        input.validate()?;
        self.ensure_user_exists(&input.user_id).await?;
        self.budget_settings.upsert_settings(input).await
    }

    pub async fn load_budget_settings(&self, user_id: &RecordId) -> AppResult<Option<BudgetSettings>> {
        self.budget_settings.settings_for_user(user_id).await
    }

    /// カテゴリを追加する（既にあればfalse）
    pub async fn add_category(&self, category: Category) -> AppResult<bool> {
        let category = category.validated()?;
        self.categories.add_category(category).await
    }

    pub async fn list_categories(&self, username: &str) -> AppResult<Vec<Category>> {
        self.categories.categories_for(username).await
    }

    async fn ensure_user_exists(&self, id: &RecordId) -> AppResult<()> {
        match self.users.find_by_id(id).await? {
            Some(_) => Ok(()),
            None => Err(AppError::conflict(format!(
                "所有ユーザーが存在しません: user_id={id}"
            ))),
        }
    }
}

/// ルーティングの組み合わせを検証する
///
/// ローカルの経費・予算設定はusersテーブルへの外部キーを持つため、
/// ユーザーがクラウドにある構成は組めない
fn validate_routing(routing: &StorageRouting) -> AppResult<()> {
    let users_in_cloud = routing.users == StorageBackend::Cloud;
    let owned_in_local = routing.expenses == StorageBackend::Local
        || routing.budget_settings == StorageBackend::Local;

    if users_in_cloud && owned_in_local {
        return Err(AppError::configuration(
            "ユーザーをクラウドに置く場合、経費と予算設定もクラウドに置く必要があります",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::memory_tree::MemoryDocumentTree;

    fn local_repository() -> Repository {
        let db = LocalDatabase::in_memory().unwrap();
        Repository::from_routing(StorageRouting::default(), &db, None).unwrap()
    }

    fn cloud_repository() -> (Arc<MemoryDocumentTree>, Repository) {
        let db = LocalDatabase::in_memory().unwrap();
        let tree = Arc::new(MemoryDocumentTree::new());
        let repository = Repository::from_routing(
            StorageRouting::uniform(StorageBackend::Cloud),
            &db,
            Some(tree.clone()),
        )
        .unwrap();
        (tree, repository)
    }

    async fn register(repository: &Repository, username: &str) -> User {
        match repository
            .register_user(UserRecord::new(username, "hash"))
            .await
            .unwrap()
        {
            RegistrationOutcome::Registered(user) => user,
            other => panic!("登録に失敗しました: {other:?}"),
        }
    }

    #[test]
    fn test_routing_validation() {
        let db = LocalDatabase::in_memory().unwrap();

        let cloud_without_transport =
            Repository::from_routing(StorageRouting::uniform(StorageBackend::Cloud), &db, None);
        assert!(matches!(cloud_without_transport, Err(AppError::Configuration(_))));

        let mut mixed = StorageRouting::default();
        mixed.users = StorageBackend::Cloud;
        let tree: Arc<dyn CloudTransport> = Arc::new(MemoryDocumentTree::new());
        assert!(matches!(
            Repository::from_routing(mixed, &db, Some(tree.clone())),
            Err(AppError::Configuration(_))
        ));

        // ローカルのユーザーとクラウドの経費は組める
        let mut cloud_expenses = StorageRouting::default();
        cloud_expenses.expenses = StorageBackend::Cloud;
        assert!(Repository::from_routing(cloud_expenses, &db, Some(tree)).is_ok());
    }

    async fn assert_duplicate_rejected(repository: &Repository, tree: Option<&MemoryDocumentTree>) {
        let original = register(repository, "alice").await;
        let before = tree.map(|t| t.snapshot().unwrap());

        let outcome = repository
            .register_user(UserRecord::new("alice", "other-hash"))
            .await
            .unwrap();
        assert!(matches!(outcome, RegistrationOutcome::UsernameTaken { .. }));
        assert!(outcome.message().contains("alice"));

        let stored = repository.find_user_by_username("alice").await.unwrap().unwrap();
        assert_eq!(stored, original);
        assert_eq!(tree.map(|t| t.snapshot().unwrap()), before);
    }

    #[tokio::test]
    async fn test_duplicate_registration_does_not_mutate() {
        assert_duplicate_rejected(&local_repository(), None).await;

        let (tree, repository) = cloud_repository();
        assert_duplicate_rejected(&repository, Some(&tree)).await;
    }

    #[tokio::test]
    async fn test_add_expense_requires_existing_owner() {
        for repository in [local_repository(), cloud_repository().1] {
            let result = repository
                .add_expense(NewExpense::new(RecordId::Local(99), Decimal::ONE, "2024-03-01", "食費"))
                .await;
            assert!(matches!(result, Err(AppError::Conflict(_))));
            assert!(repository.list_expenses(&RecordId::Local(99)).await.unwrap().is_empty());
        }
    }

    #[tokio::test]
    async fn test_insert_then_list_round_trip_on_both_stores() {
        for repository in [local_repository(), cloud_repository().1] {
            let user = register(&repository, "alice").await;
            let input = NewExpense::new(user.id.clone(), Decimal::new(3050, 2), "2024-03-05", "食費")
                .with_description("夕食")
                .with_due_date("2024-03-08", 2);

            let created = repository.add_expense(input.clone()).await.unwrap();
            let listed = repository.list_expenses(&user.id).await.unwrap();
            assert_eq!(listed, vec![created.clone()]);
            assert_eq!(created.clone(), input.into_expense(created.id.clone()));
        }
    }

    #[tokio::test]
    async fn test_invalid_expense_is_rejected_before_storage() {
        let repository = local_repository();
        let user = register(&repository, "alice").await;
        let result = repository
            .add_expense(NewExpense::new(user.id.clone(), Decimal::new(-5, 0), "2024-03-01", "食費"))
            .await;
        assert!(matches!(result, Err(AppError::Validation(_))));
        assert!(repository.list_expenses(&user.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_budget_settings_and_categories() {
        for repository in [local_repository(), cloud_repository().1] {
            let user = register(&repository, "alice").await;
            let input = BudgetSettingsInput {
                user_id: user.id.clone(),
                monthly_budget: Decimal::from(1000),
                monthly_max_goal: Decimal::from(50),
                monthly_min_goal: Decimal::from(20),
            };
            repository.save_budget_settings(input.clone()).await.unwrap();
            let loaded = repository.load_budget_settings(&user.id).await.unwrap().unwrap();
            assert_eq!(loaded.monthly_budget, Decimal::from(1000));

            let mut invalid = input;
            invalid.monthly_min_goal = Decimal::from(80);
            assert!(repository.save_budget_settings(invalid).await.is_err());

            assert!(repository.add_category(Category::new("alice", "食費")).await.unwrap());
            assert!(!repository.add_category(Category::new("alice", " 食費 ")).await.unwrap());
            assert_eq!(repository.list_categories("alice").await.unwrap().len(), 1);
        }
    }

    #[tokio::test]
    async fn test_delete_user_removes_expenses() {
        for repository in [local_repository(), cloud_repository().1] {
            let user = register(&repository, "alice").await;
            repository
                .add_expense(NewExpense::new(user.id.clone(), Decimal::ONE, "2024-03-01", "食費"))
                .await
                .unwrap();

            assert!(repository.delete_user(&user.id).await.unwrap());
            assert!(repository.list_expenses(&user.id).await.unwrap().is_empty());
            assert_eq!(repository.find_user(&user.id).await.unwrap(), None);
        }
    }
}
