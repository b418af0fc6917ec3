//! API error types with structured JSON responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::db::DatabaseError;
use crate::rooms::RoomError;

/// Structured error response body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: &'static str,
    pub message: String,
}

/// API-level errors with HTTP status mapping.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Authentication required")]
    Unauthorized,
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Room has already ended")]
    RoomEnded,
    #[error("Room is full")]
    RoomFull,
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Invalid request: {0}")]
    BadRequest(String),
    #[error("Assistant unavailable: {0}")]
    AssistantUnavailable(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            ApiError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "AUTH_REQUIRED",
                "Authentication required".to_string(),
            ),
            ApiError::NotFound(detail) => (StatusCode::NOT_FOUND, "NOT_FOUND", detail.clone()),
            ApiError::RoomEnded => (
                StatusCode::GONE,
                "ROOM_ENDED",
                "Room has already ended".to_string(),
            ),
            ApiError::RoomFull => (
                StatusCode::CONFLICT,
                "ROOM_FULL",
                "Room is full".to_string(),
            ),
            ApiError::Forbidden(detail) => (StatusCode::FORBIDDEN, "FORBIDDEN", detail.clone()),
            ApiError::BadRequest(detail) => {
                (StatusCode::BAD_REQUEST, "BAD_REQUEST", detail.clone())
            }
            ApiError::AssistantUnavailable(detail) => {
                tracing::warn!(detail, "Assistant unavailable");
                (
                    StatusCode::BAD_GATEWAY,
                    "ASSISTANT_UNAVAILABLE",
                    "The assistant is currently unavailable".to_string(),
                )
            }
            ApiError::Internal(detail) => {
                tracing::error!(detail, "API internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL",
                    "An internal error occurred".to_string(),
                )
            }
        };

        let body = ErrorBody {
            error: ErrorDetail { code, message },
        };
        (status, Json(body)).into_response()
    }
}

impl From<RoomError> for ApiError {
    fn from(err: RoomError) -> Self {
        match err {
            RoomError::NotFound => ApiError::NotFound("Room not found".into()),
            RoomError::AlreadyEnded => ApiError::RoomEnded,
            RoomError::Full => ApiError::RoomFull,
            RoomError::Forbidden => {
                ApiError::Forbidden("Only the room creator may end the room".into())
            }
            RoomError::EmptyContent => ApiError::BadRequest("Message content is empty".into()),
            RoomError::Assistant(e) => ApiError::AssistantUnavailable(e.to_string()),
            RoomError::Store(e) => ApiError::Internal(e.to_string()),
        }
    }
}

impl From<DatabaseError> for ApiError {
    fn from(err: DatabaseError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn body_json(response: Response) -> serde_json::Value {
        let body = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn unauthorized_returns_401() {
        let response = ApiError::Unauthorized.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let json = body_json(response).await;
        assert_eq!(json["error"]["code"], "AUTH_REQUIRED");
    }

    #[tokio::test]
    async fn room_ended_returns_410() {
        let response = ApiError::RoomEnded.into_response();
        assert_eq!(response.status(), StatusCode::GONE);
        let json = body_json(response).await;
        assert_eq!(json["error"]["code"], "ROOM_ENDED");
    }

    #[tokio::test]
    async fn room_full_returns_409() {
        let response = ApiError::RoomFull.into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn forbidden_returns_403() {
        let response = ApiError::Forbidden("nope".into()).into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn internal_hides_details() {
        let response = ApiError::Internal("lock poisoned".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = body_json(response).await;
        assert_eq!(json["error"]["message"], "An internal error occurred");
    }

    #[tokio::test]
    async fn assistant_unavailable_returns_502() {
        let response = ApiError::AssistantUnavailable("timeout".into()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        let json = body_json(response).await;
        assert_eq!(json["error"]["code"], "ASSISTANT_UNAVAILABLE");
    }

    #[test]
    fn room_errors_map_to_api_errors() {
        assert!(matches!(
            ApiError::from(RoomError::NotFound),
            ApiError::NotFound(_)
        ));
        assert!(matches!(
            ApiError::from(RoomError::AlreadyEnded),
            ApiError::RoomEnded
        ));
        assert!(matches!(ApiError::from(RoomError::Full), ApiError::RoomFull));
        assert!(matches!(
            ApiError::from(RoomError::Forbidden),
            ApiError::Forbidden(_)
        ));
        assert!(matches!(
            ApiError::from(RoomError::EmptyContent),
            ApiError::BadRequest(_)
        ));
    }
}
