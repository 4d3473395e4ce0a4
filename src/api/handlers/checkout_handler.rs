//! Checkout, order and payment webhook handlers.

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::Json,
    routing::{get, post},
    Router,
};

use crate::api::extractors::ValidatedJson;
use crate::api::middleware::CurrentUser;
use crate::api::AppState;
use crate::config::STRIPE_SIGNATURE_HEADER;
use crate::domain::{CheckoutRequest, CheckoutResponse, Order};
use crate::errors::AppResult;

pub fn checkout_routes() -> Router<AppState> {
    Router::new()
        .route("/checkout", post(create_checkout))
        .route("/checkout/sessions/:session_id", get(confirm_session))
        .route("/orders", get(list_orders))
}

/// The webhook authenticates by signature, not by bearer token.
pub fn webhook_routes() -> Router<AppState> {
    Router::new().route("/webhooks/stripe", post(stripe_webhook))
}

/// Start a hosted checkout for the given courses, or the whole cart
#[utoipa::path(
    post,
    path = "/checkout",
    tag = "Checkout",
    security(("bearer_auth" = [])),
    request_body = CheckoutRequest,
    responses(
        (status = 200, description = "Checkout session created", body = CheckoutResponse),
        (status = 400, description = "Nothing to buy or course not available"),
        (status = 409, description = "Already enrolled in a course"),
        (status = 502, description = "Payment provider error"),
        (status = 503, description = "Payments not configured")
    )
)]
pub async fn create_checkout(
    current_user: CurrentUser,
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<CheckoutRequest>,
) -> AppResult<Json<CheckoutResponse>> {
    let checkout = state
        .services
        .checkout()
        .create_checkout(current_user.id, payload.course_ids)
        .await?;
    Ok(Json(checkout))
}

/// Confirm a checkout session after the redirect back from the provider
#[utoipa::path(
    get,
    path = "/checkout/sessions/{session_id}",
    tag = "Checkout",
    security(("bearer_auth" = [])),
    params(
        ("session_id" = String, Path, description = "Checkout session ID")
    ),
    responses(
        (status = 200, description = "Order for the session", body = Order),
        (status = 404, description = "Unknown session")
    )
)]
pub async fn confirm_session(
    current_user: CurrentUser,
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> AppResult<Json<Order>> {
    let order = state
        .services
        .checkout()
        .confirm_session(current_user.id, &session_id)
        .await?;
    Ok(Json(order))
}

/// Own orders, newest first
#[utoipa::path(
    get,
    path = "/orders",
    tag = "Checkout",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Own orders", body = Vec<Order>),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn list_orders(
    current_user: CurrentUser,
    State(state): State<AppState>,
) -> AppResult<Json<Vec<Order>>> {
    let orders = state
        .services
        .checkout()
        .list_orders(current_user.id)
        .await?;
    Ok(Json(orders))
}

/// Stripe event receiver. The raw body is needed to check the signature.
#[utoipa::path(
    post,
    path = "/webhooks/stripe",
    tag = "Checkout",
    request_body(content = String, description = "Raw Stripe event payload"),
    responses(
        (status = 200, description = "Event accepted"),
        (status = 400, description = "Bad signature or payload"),
        (status = 503, description = "Payments not configured")
    )
)]
pub async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<StatusCode> {
    let signature = headers
        .get(STRIPE_SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok());

    state
        .services
        .checkout()
        .handle_webhook(&body, signature)
        .await?;
    Ok(StatusCode::OK)
}
