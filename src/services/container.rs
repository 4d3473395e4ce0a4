//! Service Container - Centralized service access with parallel execution support.
//!
//! Handlers reach every use case through [`ServiceContainer`]; the concrete
//! [`Services`] wires the managers over one shared Unit of Work, one
//! [`DualWriter`] and the optional payment gateway.

use std::future::Future;
use std::sync::Arc;

use super::{
    AuthService, Authenticator, CartManager, CartService, CatalogManager, CatalogService,
    CheckoutManager, CheckoutService, CourseManager, CourseService, EnrollmentManager,
    EnrollmentService, LessonManager, LessonService, ReviewManager, ReviewService, SearchEngine,
    SearchService, SyncService, Synchronizer, UserManager, UserService,
};
use crate::config::Config;
use crate::errors::AppResult;
use crate::infra::{DocumentStore, DualWriter, PaymentGateway, Persistence, StripeGateway};

#[cfg(any(test, feature = "test-utils"))]
use mockall::automock;

/// Service container trait for dependency injection.
#[cfg_attr(any(test, feature = "test-utils"), automock)]
pub trait ServiceContainer: Send + Sync {
    fn auth(&self) -> Arc<dyn AuthService>;

    fn users(&self) -> Arc<dyn UserService>;

    fn catalog(&self) -> Arc<dyn CatalogService>;

    fn courses(&self) -> Arc<dyn CourseService>;

    fn lessons(&self) -> Arc<dyn LessonService>;

    fn enrollments(&self) -> Arc<dyn EnrollmentService>;

    fn reviews(&self) -> Arc<dyn ReviewService>;

    fn cart(&self) -> Arc<dyn CartService>;

    fn checkout(&self) -> Arc<dyn CheckoutService>;

    fn search(&self) -> Arc<dyn SearchService>;

    fn sync(&self) -> Arc<dyn SyncService>;
}

/// Concrete implementation of ServiceContainer
#[derive(Clone)]
pub struct Services {
    auth: Arc<dyn AuthService>,
    users: Arc<dyn UserService>,
    catalog: Arc<dyn CatalogService>,
    courses: Arc<dyn CourseService>,
    lessons: Arc<dyn LessonService>,
    enrollments: Arc<dyn EnrollmentService>,
    reviews: Arc<dyn ReviewService>,
    cart: Arc<dyn CartService>,
    checkout: Arc<dyn CheckoutService>,
    search: Arc<dyn SearchService>,
    sync: Arc<dyn SyncService>,
}

impl Services {
    /// Build every service from a database connection, the document store
    /// and config. Stripe is wired only when both secrets are set.
    pub fn from_connection(
        db: sea_orm::DatabaseConnection,
        documents: Arc<dyn DocumentStore>,
        config: Config,
    ) -> Self {
        let gateway: Option<Arc<dyn PaymentGateway>> = if config.payments_configured() {
            Some(Arc::new(StripeGateway::new(config.stripe_secret_key())))
        } else {
            tracing::warn!("Stripe is not configured; checkout is disabled");
            None
        };

        Self::with_gateway(db, documents, gateway, config)
    }

    pub fn with_gateway(
        db: sea_orm::DatabaseConnection,
        documents: Arc<dyn DocumentStore>,
        gateway: Option<Arc<dyn PaymentGateway>>,
        config: Config,
    ) -> Self {
        let uow = Arc::new(Persistence::new(db));
        let writer = DualWriter::new(documents.clone());
        let currency = config.currency.clone();

        Self {
            auth: Arc::new(Authenticator::new(
                uow.clone(),
                writer.clone(),
                config.clone(),
            )),
            users: Arc::new(UserManager::new(uow.clone(), writer.clone())),
            catalog: Arc::new(CatalogManager::new(uow.clone(), writer.clone())),
            courses: Arc::new(CourseManager::new(
                uow.clone(),
                writer.clone(),
                currency.clone(),
            )),
            lessons: Arc::new(LessonManager::new(uow.clone(), writer.clone())),
            enrollments: Arc::new(EnrollmentManager::new(uow.clone(), writer.clone())),
            reviews: Arc::new(ReviewManager::new(uow.clone(), writer.clone())),
            cart: Arc::new(CartManager::new(uow.clone(), currency)),
            checkout: Arc::new(CheckoutManager::new(
                uow.clone(),
                gateway,
                writer,
                config,
            )),
            search: Arc::new(SearchEngine::new(documents.clone())),
            sync: Arc::new(Synchronizer::new(uow, documents)),
        }
    }
}

impl ServiceContainer for Services {
    fn auth(&self) -> Arc<dyn AuthService> {
        self.auth.clone()
    }

    fn users(&self) -> Arc<dyn UserService> {
        self.users.clone()
    }

    fn catalog(&self) -> Arc<dyn CatalogService> {
        self.catalog.clone()
    }

    fn courses(&self) -> Arc<dyn CourseService> {
        self.courses.clone()
    }

    fn lessons(&self) -> Arc<dyn LessonService> {
        self.lessons.clone()
    }

    fn enrollments(&self) -> Arc<dyn EnrollmentService> {
        self.enrollments.clone()
    }

    fn reviews(&self) -> Arc<dyn ReviewService> {
        self.reviews.clone()
    }

    fn cart(&self) -> Arc<dyn CartService> {
        self.cart.clone()
    }

    fn checkout(&self) -> Arc<dyn CheckoutService> {
        self.checkout.clone()
    }

    fn search(&self) -> Arc<dyn SearchService> {
        self.search.clone()
    }

    fn sync(&self) -> Arc<dyn SyncService> {
        self.sync.clone()
    }
}

/// Parallel execution utilities for running independent operations concurrently.
pub mod parallel {
    use super::*;
    use tokio::try_join;

    /// Execute three independent async operations in parallel.
    ///
    /// If any operation fails, the first error is returned.
    pub async fn join3<F1, F2, F3, T1, T2, T3>(
        f1: F1,
        f2: F2,
        f3: F3,
    ) -> AppResult<(T1, T2, T3)>
    where
        F1: Future<Output = AppResult<T1>>,
        F2: Future<Output = AppResult<T2>>,
        F3: Future<Output = AppResult<T3>>,
    {
        try_join!(f1, f2, f3)
    }

    /// Execute operations in parallel with a concurrency limit.
    ///
    /// Results come back in completion order, not input order.
    ///
    /// # Example
    /// ```ignore
    /// let written = parallel::join_all_limited(
    ///     docs.into_iter().map(|(id, doc)| store.upsert(collection, id, doc)),
    ///     16,
    /// ).await?;
    /// ```
    pub async fn join_all_limited<F, T, I>(futures: I, limit: usize) -> AppResult<Vec<T>>
    where
        F: Future<Output = AppResult<T>>,
        I: IntoIterator<Item = F>,
    {
        use futures::stream::{self, StreamExt, TryStreamExt};

        stream::iter(futures)
            .buffer_unordered(limit.max(1))
            .try_collect()
            .await
    }
}
