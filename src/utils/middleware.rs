use crate::{error::AppError, services::CurrentUser, state::AppState};
use axum::{
    async_trait,
    body::Body,
    extract::{FromRequestParts, State},
    http::{request::Parts, HeaderValue, Request},
    middleware::Next,
    response::Response,
};
use std::{net::SocketAddr, sync::Arc};
use tracing::{debug, info_span, warn, Instrument};

/// 认证中间件
///
/// Resolves `Authorization: Bearer <token>` into a [`CurrentUser`] extension.
/// A missing or invalid token lets the request through anonymously; handlers
/// that need a user ask for [`AuthUser`].
pub async fn auth_middleware(
    State(app_state): State<Arc<AppState>>,
    mut request: Request<Body>,
    next: Next<Body>,
) -> Response {
    let token = request
        .headers()
        .get("authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(|s| s.trim().to_string());

    if let Some(token) = token {
        match app_state.auth_service.authenticate(&token).await {
            Ok(user) => {
                debug!("Authenticated user: {} ({})", user.id, user.username);
                request.extensions_mut().insert(user);
            }
            Err(e) => {
                // 不返回错误，让请求继续处理（作为未认证请求）
                debug!("Ignoring bearer token: {}", e);
            }
        }
    }

    next.run(request).await
}

/// 速率限制中间件
pub async fn rate_limit_middleware(
    State(app_state): State<Arc<AppState>>,
    request: Request<Body>,
    next: Next<Body>,
) -> Result<Response, AppError> {
    let client_ip = get_client_ip(&request);

    match app_state.rate_limiter.check_key(&client_ip) {
        Ok(_) => Ok(next.run(request).await),
        Err(_) => {
            warn!("Rate limit exceeded for IP: {}", client_ip);
            Err(AppError::RateLimitExceeded)
        }
    }
}

/// 请求 ID 中间件
///
/// Everything logged while handling the request carries the id, and the
/// response echoes it in `x-request-id`.
pub async fn request_id_middleware(request: Request<Body>, next: Next<Body>) -> Response {
    let request_id = uuid::Uuid::new_v4().to_string();
    let span = info_span!("request", request_id = %request_id);

    let mut response = next.run(request).instrument(span).await;
    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert("x-request-id", value);
    }
    response
}

/// 获取客户端 IP 地址
fn get_client_ip(request: &Request<Body>) -> String {
    let headers = request.headers();

    if let Some(forwarded_for) = headers.get("x-forwarded-for").and_then(|h| h.to_str().ok()) {
        if let Some(ip) = forwarded_for.split(',').next() {
            let ip = ip.trim();
            if !ip.is_empty() {
                return ip.to_string();
            }
        }
    }

    if let Some(real_ip) = headers.get("x-real-ip").and_then(|h| h.to_str().ok()) {
        return real_ip.trim().to_string();
    }

    request
        .extensions()
        .get::<axum::extract::ConnectInfo<SocketAddr>>()
        .map(|info| info.0.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// 必须认证的提取器
pub struct AuthUser(pub CurrentUser);

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentUser>()
            .cloned()
            .map(AuthUser)
            .ok_or_else(|| AppError::unauthorized("Authentication credentials were not provided."))
    }
}

/// 可选认证提取器
pub struct OptionalAuth(pub Option<CurrentUser>);

#[async_trait]
impl<S> FromRequestParts<S> for OptionalAuth
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(OptionalAuth(parts.extensions.get::<CurrentUser>().cloned()))
    }
}

impl OptionalAuth {
    pub fn user_id(&self) -> Option<i64> {
        self.0.as_ref().map(|u| u.id)
    }
}
