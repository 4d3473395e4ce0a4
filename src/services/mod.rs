//! Application services layer - Use cases and business logic.
//!
//! Services orchestrate domain logic and infrastructure to fulfill
//! application use cases. They depend on abstractions (traits) for
//! dependency inversion.
//!
//! Every service reaches the relational store through the Unit of Work and
//! mirrors its writes into the document store through a `DualWriter`.

mod auth_service;
mod cart_service;
mod catalog_service;
mod checkout_service;
pub mod container;
mod course_service;
mod enrollment_service;
mod lesson_service;
mod review_service;
mod search_service;
mod sync_service;
mod user_service;

#[cfg(test)]
mod test_support;

// Service Container
pub use container::{parallel, ServiceContainer, Services};

// Service traits and implementations
pub use auth_service::{AuthService, Authenticator, Claims, TokenResponse};
pub use cart_service::{CartManager, CartService};
pub use catalog_service::{CatalogManager, CatalogService};
pub use checkout_service::{CheckoutManager, CheckoutService};
pub use course_service::{CourseManager, CourseService};
pub use enrollment_service::{EnrollmentManager, EnrollmentService};
pub use lesson_service::{LessonManager, LessonService};
pub use review_service::{ReviewManager, ReviewService};
pub use search_service::{SearchEngine, SearchService};
pub use sync_service::{SyncReport, SyncService, Synchronizer};
pub use user_service::{UserManager, UserService};

#[cfg(any(test, feature = "test-utils"))]
pub use container::MockServiceContainer;
