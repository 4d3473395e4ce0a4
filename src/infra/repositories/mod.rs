//! Repository layer - Data access abstraction
//!
//! One trait per aggregate, each with a SeaORM-backed `*Store`
//! implementation and a mockall mock for service tests.

mod base;
mod cart_repository;
mod category_repository;
mod course_repository;
mod enrollment_repository;
pub(crate) mod entities;
mod lesson_repository;
mod order_repository;
mod review_repository;
mod user_repository;
mod webhook_event_repository;

pub use cart_repository::{CartRepository, CartStore};
pub use category_repository::{CategoryRepository, CategoryStore};
pub use course_repository::{CatalogQuery, CourseRemoval, CourseRepository, CourseStore};
pub use enrollment_repository::{
    EnrollmentRepository, EnrollmentStore, ProgressRepository, ProgressStore,
};
pub use lesson_repository::{LessonRepository, LessonStore};
pub use order_repository::{Fulfillment, FulfillmentOutcome, OrderRepository, OrderStore};
pub use review_repository::{ReviewRepository, ReviewStore};
pub use user_repository::{UserRepository, UserStore};
pub use webhook_event_repository::{WebhookEventRepository, WebhookEventStore};

// Export mocks for tests (both unit and integration)
#[cfg(any(test, feature = "test-utils"))]
pub use cart_repository::MockCartRepository;
#[cfg(any(test, feature = "test-utils"))]
pub use category_repository::MockCategoryRepository;
#[cfg(any(test, feature = "test-utils"))]
pub use course_repository::MockCourseRepository;
#[cfg(any(test, feature = "test-utils"))]
pub use enrollment_repository::{MockEnrollmentRepository, MockProgressRepository};
#[cfg(any(test, feature = "test-utils"))]
pub use lesson_repository::MockLessonRepository;
#[cfg(any(test, feature = "test-utils"))]
pub use order_repository::MockOrderRepository;
#[cfg(any(test, feature = "test-utils"))]
pub use review_repository::MockReviewRepository;
#[cfg(any(test, feature = "test-utils"))]
pub use user_repository::MockUserRepository;
#[cfg(any(test, feature = "test-utils"))]
pub use webhook_event_repository::MockWebhookEventRepository;
