//! bearer token 検証 → identity 解決 → 認可 → CallContext を extensions に入れる
//!
//! - operation 名は URI の最後のセグメント (`/users.v1.UserService/WhoAmI` → `WhoAmI`)
//! - 拒否した呼び出しは handler に到達しない。CallContext も作らない
//! - パイプライン全体を呼び出しの deadline で打ち切る (DEADLINE_EXCEEDED)

use axum::{
    Router,
    body::Body,
    extract::{OriginalUri, State},
    http::{HeaderMap, Request},
    middleware::{self, Next},
    response::Response,
};
use uuid::Uuid;

use crate::api::v1::extractors::CallContext;
use crate::error::AppError;
use crate::middleware::auth::deadline;
use crate::services::auth::{Admission, AuthError, CallState};
use crate::state::AppState;

const REQUEST_ID: &str = "x-request-id";

/// 認証を掛けたいルート群に middleware を適用する。
///
/// 例：
/// ```ignore
/// let rpc = api::v1::routes(state.clone());
/// let rpc = middleware::auth::access::apply(rpc, state.clone());
/// ```
pub fn apply(router: Router<AppState>, state: AppState) -> Router<AppState> {
    router.layer(middleware::from_fn_with_state(state, access_middleware))
}

/// `/pkg.Service/Method` → `Method`
pub fn operation_name(path: &str) -> &str {
    path.rsplit('/').find(|s| !s.is_empty()).unwrap_or("")
}

fn request_id(headers: &HeaderMap) -> String {
    headers
        .get(REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(str::to_owned)
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

async fn access_middleware(
    State(state): State<AppState>,
    OriginalUri(original_uri): OriginalUri,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let operation = operation_name(original_uri.path()).to_owned();
    let request_id = request_id(req.headers());
    let deadline = deadline::call_deadline(req.headers(), state.call_timeout);

    let admitted = tokio::time::timeout_at(deadline, state.auth.admit(&operation, req.headers()))
        .await
        .unwrap_or(Err(AuthError::DeadlineExceeded));

    let ctx = match admitted {
        Ok(Admission::Public) => CallContext::anonymous(request_id, deadline),
        Ok(Admission::Authenticated { identity, .. }) => {
            CallContext::authenticated(identity, request_id, deadline)
        }
        Err(err) => {
            tracing::warn!(
                operation = %operation,
                request_id = %request_id,
                state = ?CallState::rejected(&err),
                error = ?err,
                "call rejected"
            );
            return Err(err.into());
        }
    };

    tracing::debug!(
        operation = %operation,
        request_id = %ctx.request_id(),
        state = ?CallState::Dispatched
    );

    // middleware → extractor への受け渡し
    req.extensions_mut().insert(ctx);

    Ok(next.run(req).await)
}
