//! OpenAPI documentation configuration.
//!
//! Provides Swagger UI for API exploration and testing.

use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::api::handlers::{
    auth_handler, cart_handler, category_handler, checkout_handler, course_handler,
    enrollment_handler, lesson_handler, review_handler, search_handler, user_handler,
};
use crate::domain::{
    AddCartItem, CartLine, CartView, Category, CategoryPatch, CheckoutRequest, CheckoutResponse,
    Course, CourseDetail, CoursePatch, CourseProgress, CourseStatus, Enrollment, EnrollmentStatus,
    EnrollmentSummary, HitKind, InstructorPage, InstructorProfile, Lesson, LessonOutline,
    LessonPatch, LessonProgress, LessonProgressEntry, NewCategory, NewCourse, NewLesson,
    NewReview, Order, OrderItem, OrderStatus, ProgressUpdate, RatingSummary, ReorderLessons,
    Review, ReviewList, ReviewPatch, SearchHit, SearchResponse, UserResponse, UserRole,
};
use crate::services::TokenResponse;
use crate::types::{CoursePage, PaginationMeta, UserPage};

/// OpenAPI documentation for the course marketplace
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Course Market API",
        version = "0.1.0",
        description = "Online course marketplace: catalog, lessons, enrollments, reviews, cart and Stripe checkout",
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    ),
    servers(
        (url = "http://localhost:3000", description = "Local development server")
    ),
    paths(
        // Authentication endpoints
        auth_handler::register,
        auth_handler::login,
        // User endpoints
        user_handler::get_current_user,
        user_handler::update_current_user,
        user_handler::list_users,
        user_handler::set_role,
        user_handler::delete_user,
        user_handler::instructor_profile,
        // Catalog
        category_handler::list_categories,
        category_handler::create_category,
        category_handler::update_category,
        category_handler::delete_category,
        course_handler::list_courses,
        course_handler::get_course,
        course_handler::create_course,
        course_handler::my_courses,
        course_handler::update_course,
        course_handler::delete_course,
        course_handler::publish_course,
        course_handler::unpublish_course,
        course_handler::archive_course,
        lesson_handler::create_lesson,
        lesson_handler::reorder_lessons,
        lesson_handler::get_lesson,
        lesson_handler::update_lesson,
        lesson_handler::delete_lesson,
        // Learning
        enrollment_handler::enroll,
        enrollment_handler::enrollment_status,
        enrollment_handler::my_enrollments,
        enrollment_handler::record_progress,
        enrollment_handler::course_progress,
        review_handler::list_reviews,
        review_handler::create_review,
        review_handler::update_review,
        review_handler::delete_review,
        // Commerce
        cart_handler::get_cart,
        cart_handler::add_item,
        cart_handler::remove_item,
        cart_handler::clear_cart,
        checkout_handler::create_checkout,
        checkout_handler::confirm_session,
        checkout_handler::list_orders,
        checkout_handler::stripe_webhook,
        search_handler::search,
    ),
    components(
        schemas(
            // Users
            UserRole,
            UserResponse,
            UserPage,
            InstructorProfile,
            InstructorPage,
            // Auth types
            auth_handler::RegisterRequest,
            auth_handler::LoginRequest,
            TokenResponse,
            user_handler::UpdateProfileRequest,
            user_handler::SetRoleRequest,
            // Catalog
            Category,
            NewCategory,
            CategoryPatch,
            Course,
            CourseStatus,
            CourseDetail,
            CoursePage,
            PaginationMeta,
            NewCourse,
            CoursePatch,
            Lesson,
            LessonOutline,
            NewLesson,
            LessonPatch,
            ReorderLessons,
            // Learning
            Enrollment,
            EnrollmentStatus,
            EnrollmentSummary,
            LessonProgress,
            LessonProgressEntry,
            ProgressUpdate,
            CourseProgress,
            Review,
            NewReview,
            ReviewPatch,
            RatingSummary,
            ReviewList,
            // Commerce
            AddCartItem,
            CartLine,
            CartView,
            Order,
            OrderItem,
            OrderStatus,
            CheckoutRequest,
            CheckoutResponse,
            // Search
            HitKind,
            SearchHit,
            SearchResponse,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Authentication", description = "User registration and login"),
        (name = "Users", description = "Profiles and user administration"),
        (name = "Categories", description = "Course categories"),
        (name = "Courses", description = "Catalog and course authoring"),
        (name = "Lessons", description = "Lesson authoring and playback"),
        (name = "Enrollments", description = "Enrollments and progress tracking"),
        (name = "Reviews", description = "Course ratings and reviews"),
        (name = "Cart", description = "Shopping cart"),
        (name = "Checkout", description = "Stripe checkout, orders and webhooks"),
        (name = "Search", description = "Full-text search")
    )
)]
pub struct ApiDoc;

/// Security scheme modifier for JWT Bearer authentication
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .description(Some("JWT token obtained from /auth/login"))
                        .build(),
                ),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_document_lists_marketplace_paths() {
        let doc = ApiDoc::openapi();
        let paths = &doc.paths.paths;

        for path in [
            "/auth/register",
            "/courses",
            "/courses/{slug}",
            "/lessons/{id}",
            "/cart/items/{course_id}",
            "/webhooks/stripe",
            "/search",
        ] {
            assert!(paths.contains_key(path), "missing {path}");
        }

        let components = doc.components.expect("components");
        assert!(components.security_schemes.contains_key("bearer_auth"));
    }
}
