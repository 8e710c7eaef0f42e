//! Request extractors whose rejections use the `{"error": ...}` body
//!
//! Drop-in replacements for axum's `Json`, `Query` and `Path`. A malformed
//! body, query string or path segment becomes `AppError::InvalidArgument`
//! instead of axum's plain-text rejection.

use axum::{
    extract::{FromRequest, FromRequestParts},
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::error::AppError;

/// JSON request body, also usable as a JSON response
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct Json<T>(pub T);

impl<T: Serialize> IntoResponse for Json<T> {
    fn into_response(self) -> Response {
        axum::Json(self.0).into_response()
    }
}

/// Query string parameters
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(AppError))]
pub struct Query<T>(pub T);

/// Path parameters
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(AppError))]
pub struct Path<T>(pub T);

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Movement {
        quantity: i32,
    }

    async fn error_body(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_malformed_json_is_json_error() {
        let request = Request::builder()
            .method("POST")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{\"quantity\": "))
            .unwrap();

        let err = Json::<Movement>::from_request(request, &()).await.unwrap_err();
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "application/json"
        );
        let body = error_body(response).await;
        assert!(body["error"].as_str().unwrap().starts_with("invalid request body"));
    }

    #[tokio::test]
    async fn test_missing_content_type_is_json_error() {
        let request = Request::builder()
            .method("POST")
            .body(Body::from("{\"quantity\": 1}"))
            .unwrap();

        let err = Json::<Movement>::from_request(request, &()).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn test_well_formed_json_extracts() {
        let request = Request::builder()
            .method("POST")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{\"quantity\": 3}"))
            .unwrap();

        let Json(movement) = Json::<Movement>::from_request(request, &()).await.unwrap();
        assert_eq!(movement.quantity, 3);
    }

    #[tokio::test]
    async fn test_bad_query_is_json_error() {
        let (mut parts, _) = Request::builder()
            .uri("/skus?quantity=lots")
            .body(())
            .unwrap()
            .into_parts();

        let err = Query::<Movement>::from_request_parts(&mut parts, &()).await.unwrap_err();
        let body = error_body(err.into_response()).await;
        assert!(body["error"].as_str().unwrap().starts_with("invalid query string"));
    }
}
