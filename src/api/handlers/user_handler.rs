//! User and instructor profile handlers.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::{delete, get, patch},
    Router,
};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::api::extractors::ValidatedJson;
use crate::api::middleware::{require_admin, CurrentUser};
use crate::api::AppState;
use crate::domain::{InstructorPage, UserResponse, UserRole};
use crate::errors::AppResult;
use crate::types::{PaginationParams, UserPage};

/// Profile update request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateProfileRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    #[schema(example = "Ada Lovelace")]
    pub name: Option<String>,
    #[validate(length(max = 2000, message = "Bio is too long"))]
    pub bio: Option<String>,
}

/// Role change request (admin only)
#[derive(Debug, Deserialize, ToSchema)]
pub struct SetRoleRequest {
    #[schema(example = "instructor")]
    pub role: UserRole,
}

/// Create user and instructor routes
pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users))
        .route("/users/me", get(get_current_user).patch(update_current_user))
        .route("/users/:id", delete(delete_user))
        .route("/users/:id/role", patch(set_role))
        .route("/instructors/:id", get(instructor_profile))
}

/// Get current authenticated user
#[utoipa::path(
    get,
    path = "/users/me",
    tag = "Users",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Current user profile", body = UserResponse),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn get_current_user(
    current_user: CurrentUser,
    State(state): State<AppState>,
) -> AppResult<Json<UserResponse>> {
    let user = state.services.users().get_user(current_user.id).await?;
    Ok(Json(UserResponse::from(user)))
}

/// Update own name and bio
#[utoipa::path(
    patch,
    path = "/users/me",
    tag = "Users",
    security(("bearer_auth" = [])),
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "Profile updated", body = UserResponse),
        (status = 400, description = "Validation error"),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn update_current_user(
    current_user: CurrentUser,
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<UpdateProfileRequest>,
) -> AppResult<Json<UserResponse>> {
    let user = state
        .services
        .users()
        .update_profile(current_user.id, payload.name, payload.bio)
        .await?;
    Ok(Json(UserResponse::from(user)))
}

/// List users (admin only)
#[utoipa::path(
    get,
    path = "/users",
    tag = "Users",
    security(("bearer_auth" = [])),
    params(PaginationParams),
    responses(
        (status = 200, description = "Page of users", body = UserPage),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden - Admin only")
    )
)]
pub async fn list_users(
    current_user: CurrentUser,
    State(state): State<AppState>,
    Query(params): Query<PaginationParams>,
) -> AppResult<Json<UserPage>> {
    require_admin(&current_user)?;
    let page = state.services.users().list_users(params).await?;
    Ok(Json(page))
}

/// Change a user's role (admin only)
#[utoipa::path(
    patch,
    path = "/users/{id}/role",
    tag = "Users",
    security(("bearer_auth" = [])),
    params(
        ("id" = Uuid, Path, description = "User ID")
    ),
    request_body = SetRoleRequest,
    responses(
        (status = 200, description = "Role updated", body = UserResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden - Admin only"),
        (status = 404, description = "User not found")
    )
)]
pub async fn set_role(
    current_user: CurrentUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<SetRoleRequest>,
) -> AppResult<Json<UserResponse>> {
    require_admin(&current_user)?;
    let user = state
        .services
        .users()
        .set_role(&current_user.actor(), id, payload.role)
        .await?;
    Ok(Json(UserResponse::from(user)))
}

/// Delete a user (admin only)
#[utoipa::path(
    delete,
    path = "/users/{id}",
    tag = "Users",
    security(("bearer_auth" = [])),
    params(
        ("id" = Uuid, Path, description = "User ID")
    ),
    responses(
        (status = 204, description = "User deleted"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden - Admin only"),
        (status = 404, description = "User not found")
    )
)]
pub async fn delete_user(
    current_user: CurrentUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    require_admin(&current_user)?;
    state
        .services
        .users()
        .delete_user(&current_user.actor(), id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Public instructor page with their published courses
#[utoipa::path(
    get,
    path = "/instructors/{id}",
    tag = "Users",
    params(
        ("id" = Uuid, Path, description = "Instructor ID")
    ),
    responses(
        (status = 200, description = "Instructor profile", body = InstructorPage),
        (status = 404, description = "Instructor not found")
    )
)]
pub async fn instructor_profile(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<InstructorPage>> {
    let page = state.services.users().instructor_profile(id).await?;
    Ok(Json(page))
}
