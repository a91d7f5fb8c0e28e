//! Failure taxonomy of the authentication pipeline.
//!
//! Every variant maps to exactly one terminal rejection (`Rejection`) and one
//! wire status (`RpcStatus`). The `Display` strings are for logs only; clients
//! never see them (see `crate::error::AppError`).

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("credential missing")]
    TokenMissing,
    #[error("credential malformed: {0}")]
    TokenMalformed(&'static str),
    #[error("credential signature invalid")]
    SignatureInvalid,
    #[error("credential expired")]
    TokenExpired,
    #[error("identity not found")]
    IdentityNotFound,
    #[error("identity deactivated")]
    IdentityDeactivated,
    #[error("identity has no granted roles")]
    IdentityNoRoles,
    #[error("identity resolver timed out")]
    ResolverTimeout,
    #[error("permission denied for operation {0}")]
    PermissionDenied(String),
    #[error("call deadline exceeded")]
    DeadlineExceeded,
    #[error("internal error: {0}")]
    Internal(String),
}

/// Terminal state a failed call ends in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    Unauthenticated,
    Forbidden,
}

/// Status reported at the RPC boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RpcStatus {
    Unauthenticated,
    PermissionDenied,
    DeadlineExceeded,
    Internal,
}

impl RpcStatus {
    /// Numeric gRPC status code.
    pub fn grpc_code(self) -> u16 {
        match self {
            RpcStatus::DeadlineExceeded => 4,
            RpcStatus::PermissionDenied => 7,
            RpcStatus::Internal => 13,
            RpcStatus::Unauthenticated => 16,
        }
    }
}

impl AuthError {
    pub fn internal(cause: impl Into<String>) -> Self {
        Self::Internal(cause.into())
    }

    pub fn rejection(&self) -> Rejection {
        match self {
            AuthError::PermissionDenied(_) | AuthError::IdentityNoRoles => Rejection::Forbidden,
            _ => Rejection::Unauthenticated,
        }
    }

    pub fn status(&self) -> RpcStatus {
        match self {
            AuthError::TokenMissing
            | AuthError::TokenMalformed(_)
            | AuthError::SignatureInvalid
            | AuthError::TokenExpired
            | AuthError::IdentityNotFound
            | AuthError::IdentityDeactivated
            | AuthError::ResolverTimeout => RpcStatus::Unauthenticated,
            AuthError::PermissionDenied(_) | AuthError::IdentityNoRoles => {
                RpcStatus::PermissionDenied
            }
            AuthError::DeadlineExceeded => RpcStatus::DeadlineExceeded,
            AuthError::Internal(_) => RpcStatus::Internal,
        }
    }
}
