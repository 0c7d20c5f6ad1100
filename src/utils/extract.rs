//! Wrappers around axum's `Json`, `Query` and `Path` extractors whose
//! rejection is [`AppError`], so malformed input gets the same error body
//! as every other failure.

use crate::error::AppError;
use axum::{
    async_trait,
    extract::{FromRequest, FromRequestParts},
    http::{request::Parts, Request},
};
use serde::de::DeserializeOwned;

/// JSON request body.
pub struct JsonBody<T>(pub T);

#[async_trait]
impl<S, B, T> FromRequest<S, B> for JsonBody<T>
where
    axum::Json<T>: FromRequest<S, B, Rejection = axum::extract::rejection::JsonRejection>,
    S: Send + Sync,
    B: Send + 'static,
{
    type Rejection = AppError;

    async fn from_request(req: Request<B>, state: &S) -> Result<Self, Self::Rejection> {
        let axum::Json(value) = axum::Json::<T>::from_request(req, state).await?;
        Ok(JsonBody(value))
    }
}

/// 查询参数
pub struct QueryParams<T>(pub T);

#[async_trait]
impl<S, T> FromRequestParts<S> for QueryParams<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let axum::extract::Query(value) =
            axum::extract::Query::<T>::from_request_parts(parts, state).await?;
        Ok(QueryParams(value))
    }
}

/// 路径参数
pub struct PathParam<T>(pub T);

#[async_trait]
impl<S, T> FromRequestParts<S> for PathParam<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let axum::extract::Path(value) =
            axum::extract::Path::<T>::from_request_parts(parts, state).await?;
        Ok(PathParam(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::StatusCode, response::IntoResponse};
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Page {
        page: u32,
    }

    #[tokio::test]
    async fn bad_query_string_is_a_validation_error() {
        let (mut parts, _) = Request::builder()
            .uri("/api/posts?page=abc")
            .body(())
            .unwrap()
            .into_parts();

        let err = match QueryParams::<Page>::from_request_parts(&mut parts, &()).await {
            Ok(QueryParams(parsed)) => panic!("unexpected page {}", parsed.page),
            Err(err) => err,
        };
        assert_eq!(err.code(), "VALIDATION_ERROR");
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn json_without_content_type_is_a_validation_error() {
        let request = Request::builder()
            .method("POST")
            .uri("/api/posts")
            .body(Body::from(r#"{"page":1}"#))
            .unwrap();

        let err = match JsonBody::<serde_json::Value>::from_request(request, &()).await {
            Ok(_) => panic!("body accepted without a JSON content type"),
            Err(err) => err,
        };
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }
}
