/*
 * Responsibility
 * - Router に紐づける共有コンテキスト (AppState)
 *   - auth: 認証パイプライン (codec / resolver / policy), call_timeout: 呼び出し単位の予算
 * - Clone 前提で持つ (内部は Arc/Clone cheap)
 */
use std::sync::Arc;
use std::time::Duration;

use crate::services::auth::Authenticator;

#[derive(Clone, Debug)]
pub struct AppState {
    pub auth: Arc<Authenticator>,
    pub call_timeout: Duration,
}

impl AppState {
    pub fn new(auth: Arc<Authenticator>, call_timeout: Duration) -> Self {
        Self { auth, call_timeout }
    }
}
