/**
 * Responsibility
 * - user store が上位 (IdentityResolver) に伝える意味の定義
 * - どの失敗も resolver 側では deny として扱われる
 */
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("db error")]
    Db(#[from] sqlx::Error),
    #[error("user store unavailable: {0}")]
    Unavailable(String),
}
