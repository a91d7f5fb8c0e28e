/*
 * Responsibility
 * - アプリ共通の AppError 定義
 * - IntoResponse 実装 (HTTP status / grpc-status / JSON error body)
 * - AuthError → AppError の変換はここで 1 回だけ行う
 * - クライアントには汎用メッセージのみ返す (内部原因は tracing 側へ)
 */
use axum::{
    Json,
    http::{HeaderName, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::services::auth::error::{AuthError, RpcStatus};

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{code}: {message}")]
    BadRequest { code: &'static str, message: String },
    #[error("unauthenticated")]
    Unauthenticated,
    #[error("permission denied")]
    PermissionDenied,
    #[error("deadline exceeded")]
    DeadlineExceeded,
    #[error("internal server error")]
    Internal,
}

impl AppError {
    pub fn bad_request(code: &'static str, message: impl Into<String>) -> Self {
        Self::BadRequest {
            code,
            message: message.into(),
        }
    }

    /// gRPC status code carried in the `grpc-status` header.
    pub fn grpc_code(&self) -> u16 {
        match self {
            AppError::BadRequest { .. } => 3,
            AppError::Unauthenticated => RpcStatus::Unauthenticated.grpc_code(),
            AppError::PermissionDenied => RpcStatus::PermissionDenied.grpc_code(),
            AppError::DeadlineExceeded => RpcStatus::DeadlineExceeded.grpc_code(),
            AppError::Internal => RpcStatus::Internal.grpc_code(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let grpc_code = self.grpc_code();
        let (status, code, message) = match self {
            AppError::BadRequest { code, message } => (StatusCode::BAD_REQUEST, code, message),
            AppError::Unauthenticated => (
                StatusCode::UNAUTHORIZED,
                "UNAUTHENTICATED",
                "unauthenticated".into(),
            ),
            AppError::PermissionDenied => (
                StatusCode::FORBIDDEN,
                "PERMISSION_DENIED",
                "permission denied".into(),
            ),
            AppError::DeadlineExceeded => (
                StatusCode::GATEWAY_TIMEOUT,
                "DEADLINE_EXCEEDED",
                "deadline exceeded".into(),
            ),
            AppError::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL",
                "internal server error".into(),
            ),
        };

        let body = ErrorResponse {
            error: ErrorBody { code, message },
        };

        let mut response = (status, Json(body)).into_response();
        let headers = response.headers_mut();
        headers.insert(
            HeaderName::from_static("grpc-status"),
            HeaderValue::from(grpc_code),
        );
        if status == StatusCode::UNAUTHORIZED {
            headers.insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        response
    }
}

impl From<AuthError> for AppError {
    fn from(e: AuthError) -> Self {
        match e.status() {
            RpcStatus::Unauthenticated => AppError::Unauthenticated,
            RpcStatus::PermissionDenied => AppError::PermissionDenied,
            RpcStatus::DeadlineExceeded => AppError::DeadlineExceeded,
            RpcStatus::Internal => AppError::Internal,
        }
    }
}
