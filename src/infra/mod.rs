//! Infrastructure layer - External systems integration
//!
//! - PostgreSQL via SeaORM (repositories, migrations, unit of work)
//! - Redis (rate limiting, document store)
//! - Stripe Checkout

pub mod cache;
pub mod db;
pub mod documents;
pub mod payments;
pub mod repositories;
pub mod unit_of_work;

pub use cache::Cache;
pub use db::{Database, Migrator};
pub use documents::{
    load_collection, open_document_store, Collection, DocumentStore, DualWriter,
    InMemoryDocumentStore, RedisDocumentStore,
};
pub use payments::{
    sign_webhook_payload, verify_webhook_signature, CheckoutSessionInfo, CheckoutSessionRequest,
    PaymentGateway, SessionPaymentStatus, StripeGateway,
};
pub use repositories::{
    CartRepository, CategoryRepository, CourseRepository, EnrollmentRepository, LessonRepository,
    OrderRepository, ProgressRepository, ReviewRepository, UserRepository,
    WebhookEventRepository,
};
pub use unit_of_work::{Persistence, UnitOfWork};

#[cfg(any(test, feature = "test-utils"))]
pub use documents::MockDocumentStore;
#[cfg(any(test, feature = "test-utils"))]
pub use payments::MockPaymentGateway;
