use crate::{
    error::Result,
    models::{response::ApiResponse, user::*},
    state::AppState,
    utils::{extract::JsonBody, middleware::AuthUser},
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
        .route("/accounts/register", post(register))
        .route("/accounts/login", post(login))
        .route("/accounts/profile", get(get_profile).patch(update_profile))
}

/// 注册
/// POST /api/accounts/register
async fn register(
    State(state): State<Arc<AppState>>,
    JsonBody(request): JsonBody<RegisterRequest>,
) -> Result<(StatusCode, Json<ApiResponse<AuthResponse>>)> {
    let response = state.auth_service.register(request).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success_with_message(response, "Account created.")),
    ))
}

/// 登录
/// POST /api/accounts/login
async fn login(
    State(state): State<Arc<AppState>>,
    JsonBody(request): JsonBody<LoginRequest>,
) -> Result<Json<ApiResponse<AuthResponse>>> {
    let response = state.auth_service.login(request).await?;
    Ok(Json(ApiResponse::success(response)))
}

/// GET /api/accounts/profile
async fn get_profile(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
) -> Result<Json<ApiResponse<UserProfileResponse>>> {
    debug!("Getting own profile for user: {}", user.id);
    let profile = state.user_service.get_profile(user.id).await?;
    Ok(Json(ApiResponse::success(profile)))
}

/// PATCH /api/accounts/profile
async fn update_profile(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    JsonBody(request): JsonBody<UpdateProfileRequest>,
) -> Result<Json<ApiResponse<UserProfileResponse>>> {
    let profile = state.user_service.update_profile(user.id, request).await?;
    Ok(Json(ApiResponse::success_with_message(profile, "Profile updated.")))
}
