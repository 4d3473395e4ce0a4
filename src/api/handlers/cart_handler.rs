//! Shopping cart handlers.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::{delete, get, post},
    Router,
};
use uuid::Uuid;

use crate::api::middleware::CurrentUser;
use crate::api::AppState;
use crate::domain::{AddCartItem, CartView};
use crate::errors::AppResult;

pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/cart", get(get_cart).delete(clear_cart))
        .route("/cart/items", post(add_item))
        .route("/cart/items/:course_id", delete(remove_item))
}

/// Current cart with totals
#[utoipa::path(
    get,
    path = "/cart",
    tag = "Cart",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Cart contents", body = CartView),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn get_cart(
    current_user: CurrentUser,
    State(state): State<AppState>,
) -> AppResult<Json<CartView>> {
    let cart = state.services.cart().get_cart(current_user.id).await?;
    Ok(Json(cart))
}

/// Put a paid course in the cart
#[utoipa::path(
    post,
    path = "/cart/items",
    tag = "Cart",
    security(("bearer_auth" = [])),
    request_body = AddCartItem,
    responses(
        (status = 200, description = "Updated cart", body = CartView),
        (status = 400, description = "Course is free or not available"),
        (status = 404, description = "Course not found"),
        (status = 409, description = "Already enrolled")
    )
)]
pub async fn add_item(
    current_user: CurrentUser,
    State(state): State<AppState>,
    Json(payload): Json<AddCartItem>,
) -> AppResult<Json<CartView>> {
    let cart = state
        .services
        .cart()
        .add_item(current_user.id, payload.course_id)
        .await?;
    Ok(Json(cart))
}

/// Take a course out of the cart
#[utoipa::path(
    delete,
    path = "/cart/items/{course_id}",
    tag = "Cart",
    security(("bearer_auth" = [])),
    params(
        ("course_id" = Uuid, Path, description = "Course ID")
    ),
    responses(
        (status = 200, description = "Updated cart", body = CartView),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn remove_item(
    current_user: CurrentUser,
    State(state): State<AppState>,
    Path(course_id): Path<Uuid>,
) -> AppResult<Json<CartView>> {
    let cart = state
        .services
        .cart()
        .remove_item(current_user.id, course_id)
        .await?;
    Ok(Json(cart))
}

/// Empty the cart
#[utoipa::path(
    delete,
    path = "/cart",
    tag = "Cart",
    security(("bearer_auth" = [])),
    responses(
        (status = 204, description = "Cart emptied"),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn clear_cart(
    current_user: CurrentUser,
    State(state): State<AppState>,
) -> AppResult<StatusCode> {
    state.services.cart().clear(current_user.id).await?;
    Ok(StatusCode::NO_CONTENT)
}
