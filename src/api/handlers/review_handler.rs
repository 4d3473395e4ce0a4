//! Course review handlers.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, patch},
    Router,
};
use uuid::Uuid;

use crate::api::extractors::ValidatedJson;
use crate::api::middleware::CurrentUser;
use crate::api::AppState;
use crate::domain::{NewReview, Review, ReviewList, ReviewPatch};
use crate::errors::AppResult;
use crate::types::PaginationParams;

pub fn review_routes() -> Router<AppState> {
    Router::new()
        .route("/courses/:id/reviews", get(list_reviews).post(create_review))
        .route("/reviews/:id", patch(update_review).delete(delete_review))
}

/// Reviews of a published course, newest first, with the rating summary
#[utoipa::path(
    get,
    path = "/courses/{id}/reviews",
    tag = "Reviews",
    params(
        ("id" = Uuid, Path, description = "Course ID"),
        PaginationParams
    ),
    responses(
        (status = 200, description = "Reviews and rating", body = ReviewList),
        (status = 404, description = "Course not found")
    )
)]
pub async fn list_reviews(
    State(state): State<AppState>,
    Path(course_id): Path<Uuid>,
    Query(params): Query<PaginationParams>,
) -> AppResult<Json<ReviewList>> {
    let reviews = state
        .services
        .reviews()
        .list_reviews(course_id, params)
        .await?;
    Ok(Json(reviews))
}

/// Review a course you are enrolled in
#[utoipa::path(
    post,
    path = "/courses/{id}/reviews",
    tag = "Reviews",
    security(("bearer_auth" = [])),
    params(
        ("id" = Uuid, Path, description = "Course ID")
    ),
    request_body = NewReview,
    responses(
        (status = 201, description = "Review created", body = Review),
        (status = 400, description = "Validation error"),
        (status = 403, description = "Not enrolled"),
        (status = 409, description = "Already reviewed")
    )
)]
pub async fn create_review(
    current_user: CurrentUser,
    State(state): State<AppState>,
    Path(course_id): Path<Uuid>,
    ValidatedJson(payload): ValidatedJson<NewReview>,
) -> AppResult<(StatusCode, Json<Review>)> {
    let review = state
        .services
        .reviews()
        .create_review(current_user.id, course_id, payload)
        .await?;
    Ok((StatusCode::CREATED, Json(review)))
}

/// Edit a review (author or admin)
#[utoipa::path(
    patch,
    path = "/reviews/{id}",
    tag = "Reviews",
    security(("bearer_auth" = [])),
    params(
        ("id" = Uuid, Path, description = "Review ID")
    ),
    request_body = ReviewPatch,
    responses(
        (status = 200, description = "Review updated", body = Review),
        (status = 403, description = "Forbidden - Not the author"),
        (status = 404, description = "Review not found")
    )
)]
pub async fn update_review(
    current_user: CurrentUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    ValidatedJson(payload): ValidatedJson<ReviewPatch>,
) -> AppResult<Json<Review>> {
    let review = state
        .services
        .reviews()
        .update_review(&current_user.actor(), id, payload)
        .await?;
    Ok(Json(review))
}

/// Delete a review (author or admin)
#[utoipa::path(
    delete,
    path = "/reviews/{id}",
    tag = "Reviews",
    security(("bearer_auth" = [])),
    params(
        ("id" = Uuid, Path, description = "Review ID")
    ),
    responses(
        (status = 204, description = "Review deleted"),
        (status = 403, description = "Forbidden - Not the author"),
        (status = 404, description = "Review not found")
    )
)]
pub async fn delete_review(
    current_user: CurrentUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    state
        .services
        .reviews()
        .delete_review(&current_user.actor(), id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
