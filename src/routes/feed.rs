use crate::{
    error::Result,
    models::{
        post::PostResponse,
        response::{ApiResponse, PaginatedResult},
    },
    state::AppState,
    utils::{extract::QueryParams, middleware::AuthUser, pagination::PageQuery},
};
use axum::{
    extract::State,
    response::Json,
    routing::get,
    Router,
};
use std::sync::Arc;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/feed", get(get_feed))
}

/// GET /api/feed?page=&page_size=
async fn get_feed(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    QueryParams(query): QueryParams<PageQuery>,
) -> Result<Json<ApiResponse<PaginatedResult<PostResponse>>>> {
    let page = query.resolve(&state.config)?;
    let feed = state.feed_service.get_feed(user.id, page).await?;
    Ok(Json(ApiResponse::success(feed)))
}
