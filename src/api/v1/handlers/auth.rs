/*
 * Responsibility
 * - POST /auth.v1.AuthService/ValidateToken (公開 operation)
 * - 他サービスがトークンの有効性と roles を問い合わせる入口
 * - 失敗理由はクライアントに返さず is_valid=false にまとめる (原因は tracing へ)
 * - JSON として読めない body だけは 400 INVALID_ARGUMENT
 */
use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
};

use crate::api::v1::dto::auth::{ValidateTokenRequest, ValidateTokenResponse};
use crate::api::v1::extractors::CallCtx;
use crate::error::AppError;
use crate::state::AppState;

pub async fn validate_token(
    State(state): State<AppState>,
    CallCtx(ctx): CallCtx,
    payload: Result<Json<ValidateTokenRequest>, JsonRejection>,
) -> Result<Json<ValidateTokenResponse>, AppError> {
    // 壊れたリクエストは is_valid=false ではなく INVALID_ARGUMENT
    let Json(req) = payload.map_err(|rejection| {
        tracing::debug!(request_id = %ctx.request_id(), %rejection, "unreadable request body");
        AppError::bad_request("INVALID_ARGUMENT", "request body must be {\"token\": string}")
    })?;

    let claims = match state.auth.codec().decode(req.token.trim()) {
        Ok(claims) => claims,
        Err(err) => {
            tracing::debug!(request_id = %ctx.request_id(), error = ?err, "token rejected");
            return Ok(Json(ValidateTokenResponse::invalid()));
        }
    };

    let resolver = state.auth.resolver();
    let resolved = tokio::time::timeout_at(ctx.deadline(), resolver.resolve(&claims.subject)).await;

    let response = match resolved {
        Ok(Ok(identity)) => ValidateTokenResponse {
            is_valid: true,
            user_id: Some(identity.id.clone()),
            subject: Some(identity.subject.clone()),
            roles: identity.role_names(),
        },
        Ok(Err(err)) => {
            tracing::debug!(request_id = %ctx.request_id(), error = ?err, "identity rejected");
            ValidateTokenResponse::invalid()
        }
        Err(_) => {
            tracing::warn!(
                request_id = %ctx.request_id(),
                "identity lookup ran past the call deadline"
            );
            ValidateTokenResponse::invalid()
        }
    };

    Ok(Json(response))
}
