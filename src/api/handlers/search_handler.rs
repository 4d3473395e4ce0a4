//! Search handler.

use axum::{
    extract::{Query, State},
    response::Json,
    routing::get,
    Router,
};

use crate::api::AppState;
use crate::domain::{SearchParams, SearchResponse};
use crate::errors::AppResult;

pub fn search_routes() -> Router<AppState> {
    Router::new().route("/search", get(search))
}

/// Search published courses, lessons, categories, instructors and reviews
#[utoipa::path(
    get,
    path = "/search",
    tag = "Search",
    params(SearchParams),
    responses(
        (status = 200, description = "Ranked hits", body = SearchResponse),
        (status = 400, description = "Query too short")
    )
)]
pub async fn search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> AppResult<Json<SearchResponse>> {
    let response = state
        .services
        .search()
        .search(&params.q, params.limit)
        .await?;
    Ok(Json(response))
}
