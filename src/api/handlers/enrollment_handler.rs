//! Enrollment and progress handlers.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::{get, post, put},
    Router,
};
use uuid::Uuid;

use crate::api::extractors::ValidatedJson;
use crate::api::middleware::CurrentUser;
use crate::api::AppState;
use crate::domain::{
    CourseProgress, Enrollment, EnrollmentStatus, EnrollmentSummary, LessonProgress,
    ProgressUpdate,
};
use crate::errors::AppResult;

pub fn enrollment_routes() -> Router<AppState> {
    Router::new()
        .route("/courses/:id/enroll", post(enroll))
        .route("/courses/:id/enrollment", get(enrollment_status))
        .route("/courses/:id/progress", get(course_progress))
        .route("/lessons/:id/progress", put(record_progress))
        .route("/me/enrollments", get(my_enrollments))
}

/// Enroll in a free course
#[utoipa::path(
    post,
    path = "/courses/{id}/enroll",
    tag = "Enrollments",
    security(("bearer_auth" = [])),
    params(
        ("id" = Uuid, Path, description = "Course ID")
    ),
    responses(
        (status = 201, description = "Enrolled", body = Enrollment),
        (status = 400, description = "Course is not available"),
        (status = 402, description = "Course must be purchased"),
        (status = 404, description = "Course not found"),
        (status = 409, description = "Already enrolled")
    )
)]
pub async fn enroll(
    current_user: CurrentUser,
    State(state): State<AppState>,
    Path(course_id): Path<Uuid>,
) -> AppResult<(StatusCode, Json<Enrollment>)> {
    let enrollment = state
        .services
        .enrollments()
        .enroll_free(current_user.id, course_id)
        .await?;
    Ok((StatusCode::CREATED, Json(enrollment)))
}

/// Whether the caller is enrolled in a course
#[utoipa::path(
    get,
    path = "/courses/{id}/enrollment",
    tag = "Enrollments",
    security(("bearer_auth" = [])),
    params(
        ("id" = Uuid, Path, description = "Course ID")
    ),
    responses(
        (status = 200, description = "Enrollment status", body = EnrollmentStatus),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn enrollment_status(
    current_user: CurrentUser,
    State(state): State<AppState>,
    Path(course_id): Path<Uuid>,
) -> AppResult<Json<EnrollmentStatus>> {
    let status = state
        .services
        .enrollments()
        .enrollment_status(current_user.id, course_id)
        .await?;
    Ok(Json(status))
}

/// Courses the caller is enrolled in, with completion
#[utoipa::path(
    get,
    path = "/me/enrollments",
    tag = "Enrollments",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Own enrollments", body = Vec<EnrollmentSummary>),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn my_enrollments(
    current_user: CurrentUser,
    State(state): State<AppState>,
) -> AppResult<Json<Vec<EnrollmentSummary>>> {
    let enrollments = state
        .services
        .enrollments()
        .my_enrollments(current_user.id)
        .await?;
    Ok(Json(enrollments))
}

/// Report playback position for a lesson
#[utoipa::path(
    put,
    path = "/lessons/{id}/progress",
    tag = "Enrollments",
    security(("bearer_auth" = [])),
    params(
        ("id" = Uuid, Path, description = "Lesson ID")
    ),
    request_body = ProgressUpdate,
    responses(
        (status = 200, description = "Progress recorded", body = LessonProgress),
        (status = 400, description = "Validation error"),
        (status = 403, description = "Not enrolled"),
        (status = 404, description = "Lesson not found")
    )
)]
pub async fn record_progress(
    current_user: CurrentUser,
    State(state): State<AppState>,
    Path(lesson_id): Path<Uuid>,
    ValidatedJson(payload): ValidatedJson<ProgressUpdate>,
) -> AppResult<Json<LessonProgress>> {
    let progress = state
        .services
        .enrollments()
        .record_progress(current_user.id, lesson_id, payload)
        .await?;
    Ok(Json(progress))
}

/// Per-lesson progress through a course
#[utoipa::path(
    get,
    path = "/courses/{id}/progress",
    tag = "Enrollments",
    security(("bearer_auth" = [])),
    params(
        ("id" = Uuid, Path, description = "Course ID")
    ),
    responses(
        (status = 200, description = "Course progress", body = CourseProgress),
        (status = 403, description = "Not enrolled"),
        (status = 404, description = "Course not found")
    )
)]
pub async fn course_progress(
    current_user: CurrentUser,
    State(state): State<AppState>,
    Path(course_id): Path<Uuid>,
) -> AppResult<Json<CourseProgress>> {
    let progress = state
        .services
        .enrollments()
        .course_progress(current_user.id, course_id)
        .await?;
    Ok(Json(progress))
}
