//! Domain layer - Core business entities and logic
//!
//! Entities, value objects and the pure rules of the marketplace
//! (publication lifecycle, progress, order transitions, search scoring).
//! Nothing in here performs I/O.

pub mod category;
pub mod course;
pub mod enrollment;
pub mod lesson;
pub mod order;
pub mod password;
pub mod review;
pub mod search;
pub mod slug;
pub mod user;

pub use category::{Category, CategoryPatch, NewCategory};
pub use course::{
    Course, CourseDetail, CourseFilter, CoursePatch, CourseStatus, InstructorPage, NewCourse,
};
pub use enrollment::{
    CourseProgress, Enrollment, EnrollmentStatus, EnrollmentSummary, LessonProgress,
    LessonProgressEntry, ProgressUpdate,
};
pub use lesson::{Lesson, LessonOutline, LessonPatch, NewLesson, ReorderLessons};
pub use order::{
    AddCartItem, CartItem, CartLine, CartView, CheckoutRequest, CheckoutResponse, Order,
    OrderItem, OrderStatus,
};
pub use password::Password;
pub use review::{NewReview, RatingSummary, Review, ReviewList, ReviewPatch};
pub use search::{HitKind, SearchCorpus, SearchHit, SearchParams, SearchQuery, SearchResponse};
pub use user::{Actor, InstructorProfile, User, UserResponse, UserRole};
