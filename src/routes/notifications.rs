use crate::{
    error::Result,
    models::{notification::NotificationResponse, response::ApiResponse},
    state::AppState,
    utils::{extract::PathParam, middleware::AuthUser},
};
use axum::{
    extract::State,
    response::Json,
    routing::{get, post},
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/notifications", get(list_notifications))
        .route("/notifications/unread-count", get(unread_count))
        .route("/notifications/read-all", post(mark_all_read))
        .route("/notifications/:id/read", post(mark_read))
}

/// 获取通知列表
/// GET /api/notifications
async fn list_notifications(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
) -> Result<Json<ApiResponse<Vec<NotificationResponse>>>> {
    let notifications = state.notification_service.list_notifications(user.id).await?;
    Ok(Json(ApiResponse::success(notifications)))
}

/// GET /api/notifications/unread-count
async fn unread_count(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
) -> Result<Json<ApiResponse<Value>>> {
    let count = state.notification_service.unread_count(user.id).await?;
    Ok(Json(ApiResponse::success(json!({ "unread_count": count }))))
}

/// 标记通知为已读
/// POST /api/notifications/:id/read
async fn mark_read(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    PathParam(id): PathParam<i64>,
) -> Result<Json<ApiResponse<Value>>> {
    state.notification_service.mark_read(user.id, id).await?;
    Ok(Json(ApiResponse::success_with_message(
        json!({ "id": id, "read": true }),
        "Notification marked as read.",
    )))
}

/// 标记所有通知为已读
/// POST /api/notifications/read-all
async fn mark_all_read(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
) -> Result<Json<ApiResponse<Value>>> {
    let updated = state.notification_service.mark_all_read(user.id).await?;
    Ok(Json(ApiResponse::success(json!({ "updated": updated }))))
}
