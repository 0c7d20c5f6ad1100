use crate::{
    error::Result,
    models::{
        comment::*,
        response::{ApiResponse, PaginatedResult},
    },
    state::AppState,
    utils::{
        extract::{JsonBody, PathParam, QueryParams},
        middleware::AuthUser,
    },
};
use axum::{
    extract::State,
    http::StatusCode,
    response::Json,
    routing::get,
    Router,
};
use std::sync::Arc;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/comments", get(list_comments).post(create_comment))
        .route(
            "/comments/:id",
            get(get_comment).patch(update_comment).delete(delete_comment),
        )
}

/// 获取评论列表
/// GET /api/comments?post=&page=&page_size=
async fn list_comments(
    State(state): State<Arc<AppState>>,
    QueryParams(query): QueryParams<CommentListQuery>,
) -> Result<Json<ApiResponse<PaginatedResult<CommentResponse>>>> {
    let comments = state.comment_service.list_comments(query, &state.config).await?;
    Ok(Json(ApiResponse::success(comments)))
}

/// 创建评论
/// POST /api/comments
async fn create_comment(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    JsonBody(request): JsonBody<CreateCommentRequest>,
) -> Result<(StatusCode, Json<ApiResponse<CommentResponse>>)> {
    let comment = state.comment_service.create_comment(user.id, request).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(comment))))
}

async fn get_comment(
    State(state): State<Arc<AppState>>,
    PathParam(id): PathParam<i64>,
) -> Result<Json<ApiResponse<CommentResponse>>> {
    let comment = state.comment_service.get_comment(id).await?;
    Ok(Json(ApiResponse::success(comment)))
}

/// 更新评论
/// PATCH /api/comments/:id
async fn update_comment(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    PathParam(id): PathParam<i64>,
    JsonBody(request): JsonBody<UpdateCommentRequest>,
) -> Result<Json<ApiResponse<CommentResponse>>> {
    let comment = state.comment_service.update_comment(id, user.id, request).await?;
    Ok(Json(ApiResponse::success(comment)))
}

/// 删除评论
/// DELETE /api/comments/:id
async fn delete_comment(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    PathParam(id): PathParam<i64>,
) -> Result<StatusCode> {
    state.comment_service.delete_comment(id, user.id).await?;
    Ok(StatusCode::NO_CONTENT)
}
