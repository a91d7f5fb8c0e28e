/*
 * Responsibility
 * - v1 の URL 構造を定義 (gRPC 風の `/pkg.Service/Method`)
 * - ここで返す Router はすべて認証 middleware の内側に置かれる
 * - /health は認証の外 (app.rs)
 */
use axum::{Router, routing::post};

use crate::state::AppState;

use crate::api::v1::handlers::{auth::validate_token, users::who_am_i};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/auth.v1.AuthService/ValidateToken", post(validate_token))
        .route("/users.v1.UserService/WhoAmI", post(who_am_i))
}
