//! Lesson handlers.

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
use crate::domain::{Lesson, LessonPatch, NewLesson, ReorderLessons};
use crate::errors::AppResult;

pub fn lesson_routes() -> Router<AppState> {
    Router::new()
        .route("/courses/:id/lessons", post(create_lesson))
        .route("/courses/:id/lessons/order", put(reorder_lessons))
        .route(
            "/lessons/:id",
            get(get_lesson).patch(update_lesson).delete(delete_lesson),
        )
}

/// Add a lesson at the end of a course
#[utoipa::path(
    post,
    path = "/courses/{id}/lessons",
    tag = "Lessons",
    security(("bearer_auth" = [])),
    params(
        ("id" = Uuid, Path, description = "Course ID")
    ),
    request_body = NewLesson,
    responses(
        (status = 201, description = "Lesson created", body = Lesson),
        (status = 400, description = "Validation error"),
        (status = 403, description = "Forbidden - Not the owner"),
        (status = 404, description = "Course not found")
    )
)]
pub async fn create_lesson(
    current_user: CurrentUser,
    State(state): State<AppState>,
    Path(course_id): Path<Uuid>,
    ValidatedJson(payload): ValidatedJson<NewLesson>,
) -> AppResult<(StatusCode, Json<Lesson>)> {
    let lesson = state
        .services
        .lessons()
        .create_lesson(&current_user.actor(), course_id, payload)
        .await?;
    Ok((StatusCode::CREATED, Json(lesson)))
}

/// Replace the lesson order of a course
#[utoipa::path(
    put,
    path = "/courses/{id}/lessons/order",
    tag = "Lessons",
    security(("bearer_auth" = [])),
    params(
        ("id" = Uuid, Path, description = "Course ID")
    ),
    request_body = ReorderLessons,
    responses(
        (status = 200, description = "Lessons in their new order", body = Vec<Lesson>),
        (status = 400, description = "Ids are not a permutation of the course lessons"),
        (status = 403, description = "Forbidden - Not the owner"),
        (status = 404, description = "Course not found")
    )
)]
pub async fn reorder_lessons(
    current_user: CurrentUser,
    State(state): State<AppState>,
    Path(course_id): Path<Uuid>,
    ValidatedJson(payload): ValidatedJson<ReorderLessons>,
) -> AppResult<Json<Vec<Lesson>>> {
    let lessons = state
        .services
        .lessons()
        .reorder_lessons(&current_user.actor(), course_id, payload.lesson_ids)
        .await?;
    Ok(Json(lessons))
}

/// Watch a lesson.
///
/// Preview lessons of published courses are open to everyone; the rest
/// need an enrollment, or ownership of the course.
#[utoipa::path(
    get,
    path = "/lessons/{id}",
    tag = "Lessons",
    security((), ("bearer_auth" = [])),
    params(
        ("id" = Uuid, Path, description = "Lesson ID")
    ),
    responses(
        (status = 200, description = "Lesson with its video", body = Lesson),
        (status = 401, description = "Sign in to watch this lesson"),
        (status = 402, description = "Enrollment required"),
        (status = 403, description = "Course is not published"),
        (status = 404, description = "Lesson not found")
    )
)]
pub async fn get_lesson(
    current_user: Option<CurrentUser>,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Lesson>> {
    let viewer = current_user.map(|user| user.actor());
    let lesson = state.services.lessons().get_lesson(viewer, id).await?;
    Ok(Json(lesson))
}

/// Edit a lesson (course owner or admin)
#[utoipa::path(
    patch,
    path = "/lessons/{id}",
    tag = "Lessons",
    security(("bearer_auth" = [])),
    params(
        ("id" = Uuid, Path, description = "Lesson ID")
    ),
    request_body = LessonPatch,
    responses(
        (status = 200, description = "Lesson updated", body = Lesson),
        (status = 403, description = "Forbidden - Not the owner"),
        (status = 404, description = "Lesson not found")
    )
)]
pub async fn update_lesson(
    current_user: CurrentUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    ValidatedJson(payload): ValidatedJson<LessonPatch>,
) -> AppResult<Json<Lesson>> {
    let lesson = state
        .services
        .lessons()
        .update_lesson(&current_user.actor(), id, payload)
        .await?;
    Ok(Json(lesson))
}

/// Delete a lesson; the remaining lessons close the gap
#[utoipa::path(
    delete,
    path = "/lessons/{id}",
    tag = "Lessons",
    security(("bearer_auth" = [])),
    params(
        ("id" = Uuid, Path, description = "Lesson ID")
    ),
    responses(
        (status = 204, description = "Lesson deleted"),
        (status = 403, description = "Forbidden - Not the owner"),
        (status = 404, description = "Lesson not found"),
        (status = 409, description = "Last lesson of a published course")
    )
)]
pub async fn delete_lesson(
    current_user: CurrentUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    state
        .services
        .lessons()
        .delete_lesson(&current_user.actor(), id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
