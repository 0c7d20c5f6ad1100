use crate::{
    error::Result,
    models::{
        like::{LikeOutcome, LikeStatus},
        post::*,
        response::{ApiResponse, PaginatedResult},
    },
    state::AppState,
    utils::{
        extract::{JsonBody, PathParam, QueryParams},
        middleware::{AuthUser, OptionalAuth},
    },
};
use axum::{
    extract::State,
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tracing::debug;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/posts", get(list_posts).post(create_post))
        .route(
            "/posts/:id",
            get(get_post).patch(update_post).delete(delete_post),
        )
        .route("/posts/:id/like", post(like_post))
        .route("/posts/:id/unlike", post(unlike_post))
}

/// 获取文章列表
/// GET /api/posts?search=&author=&ordering=&page=&page_size=
async fn list_posts(
    State(state): State<Arc<AppState>>,
    viewer: OptionalAuth,
    QueryParams(query): QueryParams<PostListQuery>,
) -> Result<Json<ApiResponse<PaginatedResult<PostResponse>>>> {
    debug!("Listing posts: {:?}", query);
    let posts = state
        .post_service
        .list_posts(query, viewer.user_id(), &state.config)
        .await?;
    Ok(Json(ApiResponse::success(posts)))
}

/// POST /api/posts
async fn create_post(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    JsonBody(request): JsonBody<CreatePostRequest>,
) -> Result<(StatusCode, Json<ApiResponse<PostResponse>>)> {
    let post = state.post_service.create_post(user.id, request).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(post))))
}

/// GET /api/posts/:id
async fn get_post(
    State(state): State<Arc<AppState>>,
    viewer: OptionalAuth,
    PathParam(id): PathParam<i64>,
) -> Result<Json<ApiResponse<PostResponse>>> {
    let post = state.post_service.get_post(id, viewer.user_id()).await?;
    Ok(Json(ApiResponse::success(post)))
}

/// PATCH /api/posts/:id
async fn update_post(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    PathParam(id): PathParam<i64>,
    JsonBody(request): JsonBody<UpdatePostRequest>,
) -> Result<Json<ApiResponse<PostResponse>>> {
    let post = state.post_service.update_post(id, user.id, request).await?;
    Ok(Json(ApiResponse::success(post)))
}

/// DELETE /api/posts/:id
async fn delete_post(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    PathParam(id): PathParam<i64>,
) -> Result<StatusCode> {
    state.post_service.delete_post(id, user.id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// 点赞
/// POST /api/posts/:id/like
///
/// 201 when the like is new, 200 when it already existed.
async fn like_post(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    PathParam(id): PathParam<i64>,
) -> Result<(StatusCode, Json<ApiResponse<LikeStatus>>)> {
    let outcome = state.like_service.like_post(user.id, id).await?;
    let status = state.like_service.like_status(Some(user.id), id).await?;

    let code = match outcome {
        LikeOutcome::Liked => StatusCode::CREATED,
        LikeOutcome::AlreadyLiked => StatusCode::OK,
    };
    Ok((code, Json(ApiResponse::success_with_message(status, outcome.message()))))
}

/// 取消点赞
/// POST /api/posts/:id/unlike
async fn unlike_post(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    PathParam(id): PathParam<i64>,
) -> Result<Json<ApiResponse<LikeStatus>>> {
    state.like_service.unlike_post(user.id, id).await?;
    let status = state.like_service.like_status(Some(user.id), id).await?;
    Ok(Json(ApiResponse::success_with_message(status, "Post unliked.")))
}
