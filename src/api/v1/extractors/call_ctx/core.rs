use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::error::AppError;

use super::CallContext;

/// Handler で CallContext を受け取るための extractor
/// middleware が CallContext を request.extensions() に insert 済みである前提
/// 見つからない場合は INTERNAL（middleware 未設定のルートに handler が載っている）
pub struct CallCtx(pub CallContext);

impl<S> FromRequestParts<S> for CallCtx
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        match parts.extensions.get::<CallContext>() {
            Some(ctx) => Ok(CallCtx(ctx.clone())),
            None => {
                tracing::error!(uri = %parts.uri, "handler reached without a call context");
                Err(AppError::Internal)
            }
        }
    }
}
