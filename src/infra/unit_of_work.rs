//! Unit of Work pattern implementation.
//!
//! Centralizes access to all repositories and owns the transaction helper
//! the repositories use for multi-row writes.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use sea_orm::{
    AccessMode, DatabaseConnection, DatabaseTransaction, IsolationLevel, TransactionTrait,
};

use super::repositories::{
    CartRepository, CartStore, CategoryRepository, CategoryStore, CourseRepository, CourseStore,
    EnrollmentRepository, EnrollmentStore, LessonRepository, LessonStore, OrderRepository,
    OrderStore, ProgressRepository, ProgressStore, ReviewRepository, ReviewStore, UserRepository,
    UserStore, WebhookEventRepository, WebhookEventStore,
};
use crate::errors::{AppError, AppResult};

/// Unit of Work trait for dependency injection.
///
/// Services receive one of these and pull the repositories they need.
pub trait UnitOfWork: Send + Sync {
    fn users(&self) -> Arc<dyn UserRepository>;
    fn categories(&self) -> Arc<dyn CategoryRepository>;
    fn courses(&self) -> Arc<dyn CourseRepository>;
    fn lessons(&self) -> Arc<dyn LessonRepository>;
    fn enrollments(&self) -> Arc<dyn EnrollmentRepository>;
    fn progress(&self) -> Arc<dyn ProgressRepository>;
    fn reviews(&self) -> Arc<dyn ReviewRepository>;
    fn carts(&self) -> Arc<dyn CartRepository>;
    fn orders(&self) -> Arc<dyn OrderRepository>;
    fn webhook_events(&self) -> Arc<dyn WebhookEventRepository>;
}

/// Concrete implementation of UnitOfWork over one connection pool
pub struct Persistence {
    users: Arc<UserStore>,
    categories: Arc<CategoryStore>,
    courses: Arc<CourseStore>,
    lessons: Arc<LessonStore>,
    enrollments: Arc<EnrollmentStore>,
    progress: Arc<ProgressStore>,
    reviews: Arc<ReviewStore>,
    carts: Arc<CartStore>,
    orders: Arc<OrderStore>,
    webhook_events: Arc<WebhookEventStore>,
}

impl Persistence {
    pub fn new(db: DatabaseConnection) -> Self {
        Self {
            users: Arc::new(UserStore::new(db.clone())),
            categories: Arc::new(CategoryStore::new(db.clone())),
            courses: Arc::new(CourseStore::new(db.clone())),
            lessons: Arc::new(LessonStore::new(db.clone())),
            enrollments: Arc::new(EnrollmentStore::new(db.clone())),
            progress: Arc::new(ProgressStore::new(db.clone())),
            reviews: Arc::new(ReviewStore::new(db.clone())),
            carts: Arc::new(CartStore::new(db.clone())),
            orders: Arc::new(OrderStore::new(db.clone())),
            webhook_events: Arc::new(WebhookEventStore::new(db)),
        }
    }
}

impl UnitOfWork for Persistence {
    fn users(&self) -> Arc<dyn UserRepository> {
        self.users.clone()
    }

    fn categories(&self) -> Arc<dyn CategoryRepository> {
        self.categories.clone()
    }

    fn courses(&self) -> Arc<dyn CourseRepository> {
        self.courses.clone()
    }

    fn lessons(&self) -> Arc<dyn LessonRepository> {
        self.lessons.clone()
    }

    fn enrollments(&self) -> Arc<dyn EnrollmentRepository> {
        self.enrollments.clone()
    }

    fn progress(&self) -> Arc<dyn ProgressRepository> {
        self.progress.clone()
    }

    fn reviews(&self) -> Arc<dyn ReviewRepository> {
        self.reviews.clone()
    }

    fn carts(&self) -> Arc<dyn CartRepository> {
        self.carts.clone()
    }

    fn orders(&self) -> Arc<dyn OrderRepository> {
        self.orders.clone()
    }

    fn webhook_events(&self) -> Arc<dyn WebhookEventRepository> {
        self.webhook_events.clone()
    }
}

/// Boxed transaction body borrowing the open transaction.
pub type TxFuture<'a, T> = Pin<Box<dyn Future<Output = AppResult<T>> + Send + 'a>>;

/// Run `f` inside a transaction with the given isolation level.
///
/// Commits when `f` succeeds, rolls back when it fails.
pub async fn execute_transaction<F, T>(
    db: &DatabaseConnection,
    isolation: IsolationLevel,
    f: F,
) -> AppResult<T>
where
    F: for<'a> FnOnce(&'a DatabaseTransaction) -> TxFuture<'a, T> + Send,
    T: Send,
{
    let txn = db
        .begin_with_config(Some(isolation), Some(AccessMode::ReadWrite))
        .await
        .map_err(AppError::from)?;

    match f(&txn).await {
        Ok(result) => {
            txn.commit().await.map_err(AppError::from)?;
            Ok(result)
        }
        Err(e) => {
            if let Err(rollback_err) = txn.rollback().await {
                tracing::error!("Transaction rollback failed: {}", rollback_err);
            }
            Err(e)
        }
    }
}

/// Read-committed transaction for ordinary multi-row writes.
pub async fn transaction<F, T>(db: &DatabaseConnection, f: F) -> AppResult<T>
where
    F: for<'a> FnOnce(&'a DatabaseTransaction) -> TxFuture<'a, T> + Send,
    T: Send,
{
    execute_transaction(db, IsolationLevel::ReadCommitted, f).await
}

/// Serializable transaction for writes that must not interleave.
pub async fn transaction_serializable<F, T>(db: &DatabaseConnection, f: F) -> AppResult<T>
where
    F: for<'a> FnOnce(&'a DatabaseTransaction) -> TxFuture<'a, T> + Send,
    T: Send,
{
    execute_transaction(db, IsolationLevel::Serializable, f).await
}
