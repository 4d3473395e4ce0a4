//! Category handlers.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::{get, patch},
    Router,
};
use uuid::Uuid;

use crate::api::extractors::ValidatedJson;
use crate::api::middleware::{require_admin, CurrentUser};
use crate::api::AppState;
use crate::domain::{Category, CategoryPatch, NewCategory};
use crate::errors::AppResult;

pub fn category_routes() -> Router<AppState> {
    Router::new()
        .route("/categories", get(list_categories).post(create_category))
        .route(
            "/categories/:id",
            patch(update_category).delete(delete_category),
        )
}

/// List all categories
#[utoipa::path(
    get,
    path = "/categories",
    tag = "Categories",
    responses(
        (status = 200, description = "All categories", body = Vec<Category>)
    )
)]
pub async fn list_categories(State(state): State<AppState>) -> AppResult<Json<Vec<Category>>> {
    let categories = state.services.catalog().list_categories().await?;
    Ok(Json(categories))
}

/// Create a category (admin only)
#[utoipa::path(
    post,
    path = "/categories",
    tag = "Categories",
    security(("bearer_auth" = [])),
    request_body = NewCategory,
    responses(
        (status = 201, description = "Category created", body = Category),
        (status = 400, description = "Validation error"),
        (status = 403, description = "Forbidden - Admin only"),
        (status = 409, description = "Category already exists")
    )
)]
pub async fn create_category(
    current_user: CurrentUser,
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<NewCategory>,
) -> AppResult<(StatusCode, Json<Category>)> {
    require_admin(&current_user)?;
    let category = state.services.catalog().create_category(payload).await?;
    Ok((StatusCode::CREATED, Json(category)))
}

/// Rename or describe a category (admin only)
#[utoipa::path(
    patch,
    path = "/categories/{id}",
    tag = "Categories",
    security(("bearer_auth" = [])),
    params(
        ("id" = Uuid, Path, description = "Category ID")
    ),
    request_body = CategoryPatch,
    responses(
        (status = 200, description = "Category updated", body = Category),
        (status = 403, description = "Forbidden - Admin only"),
        (status = 404, description = "Category not found"),
        (status = 409, description = "Category already exists")
    )
)]
pub async fn update_category(
    current_user: CurrentUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    ValidatedJson(payload): ValidatedJson<CategoryPatch>,
) -> AppResult<Json<Category>> {
    require_admin(&current_user)?;
    let category = state
        .services
        .catalog()
        .update_category(id, payload)
        .await?;
    Ok(Json(category))
}

/// Delete a category (admin only)
#[utoipa::path(
    delete,
    path = "/categories/{id}",
    tag = "Categories",
    security(("bearer_auth" = [])),
    params(
        ("id" = Uuid, Path, description = "Category ID")
    ),
    responses(
        (status = 204, description = "Category deleted"),
        (status = 403, description = "Forbidden - Admin only"),
        (status = 404, description = "Category not found")
    )
)]
pub async fn delete_category(
    current_user: CurrentUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    require_admin(&current_user)?;
    state.services.catalog().delete_category(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
