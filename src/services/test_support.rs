//! Mock-backed unit of work and fixtures for service tests.

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::domain::{Actor, Course, CourseStatus, Lesson, User, UserRole};
use crate::infra::repositories::{
    CartRepository, CategoryRepository, CourseRepository, EnrollmentRepository, LessonRepository,
    MockCartRepository, MockCategoryRepository, MockCourseRepository, MockEnrollmentRepository,
    MockLessonRepository, MockOrderRepository, MockProgressRepository, MockReviewRepository,
    MockUserRepository, MockWebhookEventRepository, OrderRepository, ProgressRepository,
    ReviewRepository, UserRepository, WebhookEventRepository,
};
use crate::infra::{DualWriter, InMemoryDocumentStore, UnitOfWork};

/// Repository mocks to configure before building a [`TestUnitOfWork`].
#[derive(Default)]
pub struct Mocks {
    pub users: MockUserRepository,
    pub categories: MockCategoryRepository,
    pub courses: MockCourseRepository,
    pub lessons: MockLessonRepository,
    pub enrollments: MockEnrollmentRepository,
    pub progress: MockProgressRepository,
    pub reviews: MockReviewRepository,
    pub carts: MockCartRepository,
    pub orders: MockOrderRepository,
    pub webhook_events: MockWebhookEventRepository,
}

impl Mocks {
    pub fn into_uow(self) -> Arc<TestUnitOfWork> {
        Arc::new(TestUnitOfWork {
            users: Arc::new(self.users),
            categories: Arc::new(self.categories),
            courses: Arc::new(self.courses),
            lessons: Arc::new(self.lessons),
            enrollments: Arc::new(self.enrollments),
            progress: Arc::new(self.progress),
            reviews: Arc::new(self.reviews),
            carts: Arc::new(self.carts),
            orders: Arc::new(self.orders),
            webhook_events: Arc::new(self.webhook_events),
        })
    }
}

/// Test mock for UnitOfWork that wraps one mock per repository
pub struct TestUnitOfWork {
    users: Arc<MockUserRepository>,
    categories: Arc<MockCategoryRepository>,
    courses: Arc<MockCourseRepository>,
    lessons: Arc<MockLessonRepository>,
    enrollments: Arc<MockEnrollmentRepository>,
    progress: Arc<MockProgressRepository>,
    reviews: Arc<MockReviewRepository>,
    carts: Arc<MockCartRepository>,
    orders: Arc<MockOrderRepository>,
    webhook_events: Arc<MockWebhookEventRepository>,
}

impl UnitOfWork for TestUnitOfWork {
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

/// Dual writer over a fresh in-memory store, plus the store for assertions.
pub fn memory_writer() -> (DualWriter, Arc<InMemoryDocumentStore>) {
    let store = Arc::new(InMemoryDocumentStore::new());
    (DualWriter::new(store.clone()), store)
}

pub fn user(role: UserRole) -> User {
    let now = Utc::now();
    User {
        id: Uuid::new_v4(),
        email: "ada@example.com".to_string(),
        password_hash: "hashed".to_string(),
        name: "Ada Lovelace".to_string(),
        bio: None,
        role,
        created_at: now,
        updated_at: now,
        deleted_at: None,
    }
}

pub fn actor(user: &User) -> Actor {
    Actor::new(user.id, user.role)
}

pub fn course(instructor_id: Uuid, status: CourseStatus, price_cents: i64) -> Course {
    let now = Utc::now();
    Course {
        id: Uuid::new_v4(),
        instructor_id,
        category_id: None,
        title: "Rust for Web Developers".to_string(),
        slug: "rust-for-web-developers".to_string(),
        subtitle: Some("Axum from scratch".to_string()),
        description: None,
        price_cents,
        currency: "usd".to_string(),
        thumbnail_url: None,
        status,
        created_at: now,
        updated_at: now,
        published_at: (status == CourseStatus::Published).then_some(now),
    }
}

pub fn lesson(course_id: Uuid, position: i32) -> Lesson {
    let now = Utc::now();
    Lesson {
        id: Uuid::new_v4(),
        course_id,
        title: format!("Lesson {}", position),
        slug: format!("lesson-{}", position),
        description: None,
        video_url: Some(format!("https://videos.example.com/{}.mp4", position)),
        duration_seconds: 600,
        position,
        is_preview: false,
        created_at: now,
        updated_at: now,
    }
}
