/*
 * Responsibility
 * - POST /users.v1.UserService/WhoAmI
 * - middleware が入れた CallContext から identity を読むだけ (DB は叩かない)
 */
use axum::Json;

use crate::api::v1::dto::users::WhoAmIResponse;
use crate::api::v1::extractors::CallCtx;
use crate::error::AppError;

pub async fn who_am_i(CallCtx(ctx): CallCtx) -> Result<Json<WhoAmIResponse>, AppError> {
    // Only reachable through the authenticated path; an anonymous context here is a wiring bug.
    let identity = ctx.identity().ok_or_else(|| {
        tracing::error!(request_id = %ctx.request_id(), "WhoAmI reached without identity");
        AppError::Internal
    })?;

    Ok(Json(WhoAmIResponse::new(identity, ctx.request_id())))
}
