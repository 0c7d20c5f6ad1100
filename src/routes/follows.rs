use crate::{
    error::Result,
    models::{
        follow::FollowOutcome,
        response::{ApiResponse, PaginatedResult},
        user::MiniUser,
    },
    state::AppState,
    utils::{
        extract::{PathParam, QueryParams},
        middleware::AuthUser,
        pagination::PageQuery,
    },
};
use axum::{
    extract::State,
    response::Json,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tracing::debug;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/follow/:user_id", post(follow_user))
        .route("/unfollow/:user_id", post(unfollow_user))
        .route("/following", get(my_following))
}

/// 关注用户
/// POST /api/follow/:user_id
async fn follow_user(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    PathParam(user_id): PathParam<i64>,
) -> Result<Json<ApiResponse<MiniUser>>> {
    debug!("User {} following user {}", user.id, user_id);

    let (target, outcome) = state.follow_service.follow_user(user.id, user_id).await?;
    let message = match outcome {
        FollowOutcome::Followed => format!("You are now following {}.", target.username),
        FollowOutcome::AlreadyFollowing => format!("You already follow {}.", target.username),
    };

    Ok(Json(ApiResponse::success_with_message(target, message)))
}

/// 取消关注用户
/// POST /api/unfollow/:user_id
async fn unfollow_user(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    PathParam(user_id): PathParam<i64>,
) -> Result<Json<ApiResponse<MiniUser>>> {
    debug!("User {} unfollowing user {}", user.id, user_id);

    let target = state.follow_service.unfollow_user(user.id, user_id).await?;
    let message = format!("You are not following {}.", target.username);
    Ok(Json(ApiResponse::success_with_message(target, message)))
}

/// 当前用户关注的人
/// GET /api/following
async fn my_following(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    QueryParams(query): QueryParams<PageQuery>,
) -> Result<Json<ApiResponse<PaginatedResult<MiniUser>>>> {
    let page = query.resolve(&state.config)?;
    let following = state.follow_service.list_following(user.id, page).await?;
    Ok(Json(ApiResponse::success(following)))
}
