//! HTTP error mapping.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::error;
use uuid::Uuid;

use crate::error::ServiceError;

/// Error returned by handlers.
///
/// Validation failures become 422 with their message. Everything else
/// becomes a 500 whose body carries only a reference id; the full error is
/// logged under that id.
#[derive(Debug)]
pub struct ApiError(pub ServiceError);

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        Self(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self(ServiceError::validation(rejection.body_text()))
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self(ServiceError::validation(rejection.body_text()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self.0 {
            ServiceError::Validation(message) => {
                (StatusCode::UNPROCESSABLE_ENTITY, Json(json!({ "detail": message })))
                    .into_response()
            }
            other => {
                let reference = Uuid::new_v4();
                error!(
                    reference = %reference,
                    category = other.category(),
                    error = %other,
                    "Request failed"
                );
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({
                        "detail": format!("Internal Server Error (reference: {})", reference)
                    })),
                )
                    .into_response()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use serde_json::Value as JsonValue;

    async fn body_json(response: Response) -> JsonValue {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_validation_maps_to_422() {
        let response = ApiError(ServiceError::validation("Rating must be between 1 and 5"))
            .into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let body = body_json(response).await;
        assert_eq!(body["detail"], "Rating must be between 1 and 5");
    }

    #[tokio::test]
    async fn test_internal_errors_are_redacted() {
        let response =
            ApiError(ServiceError::llm("bad key sk-secret for GEMINI_API_KEY")).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let detail = body_json(response).await["detail"]
            .as_str()
            .unwrap()
            .to_string();
        assert!(detail.starts_with("Internal Server Error (reference: "));
        assert!(!detail.contains("sk-secret"));
    }
}
