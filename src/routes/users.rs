use crate::{
    error::Result,
    models::{
        response::{ApiResponse, PaginatedResult},
        user::{MiniUser, UserProfileResponse},
    },
    state::AppState,
    utils::{
        extract::{PathParam, QueryParams},
        pagination::PageQuery,
    },
};
use axum::{
    extract::State,
    response::Json,
    routing::get,
    Router,
};
use std::sync::Arc;
use tracing::debug;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/users/:user_id", get(get_user))
        .route("/users/:user_id/followers", get(get_followers))
        .route("/users/:user_id/following", get(get_following))
}

/// 获取用户公开资料
/// GET /api/users/:user_id
async fn get_user(
    State(state): State<Arc<AppState>>,
    PathParam(user_id): PathParam<i64>,
) -> Result<Json<ApiResponse<UserProfileResponse>>> {
    debug!("Getting user profile: {}", user_id);
    let profile = state.user_service.get_profile(user_id).await?;
    Ok(Json(ApiResponse::success(profile)))
}

/// 获取用户的关注者列表
/// GET /api/users/:user_id/followers
async fn get_followers(
    State(state): State<Arc<AppState>>,
    PathParam(user_id): PathParam<i64>,
    QueryParams(query): QueryParams<PageQuery>,
) -> Result<Json<ApiResponse<PaginatedResult<MiniUser>>>> {
    let page = query.resolve(&state.config)?;
    let followers = state.follow_service.list_followers(user_id, page).await?;
    Ok(Json(ApiResponse::success(followers)))
}

/// 获取用户关注的人列表
/// GET /api/users/:user_id/following
async fn get_following(
    State(state): State<Arc<AppState>>,
    PathParam(user_id): PathParam<i64>,
    QueryParams(query): QueryParams<PageQuery>,
) -> Result<Json<ApiResponse<PaginatedResult<MiniUser>>>> {
    let page = query.resolve(&state.config)?;
    let following = state.follow_service.list_following(user_id, page).await?;
    Ok(Json(ApiResponse::success(following)))
}
