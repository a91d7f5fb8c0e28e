/*
 * Responsibility
 * - Handler から見える「呼び出し単位のコンテキスト」の型
 * - middleware が 1 回だけ組み立てて request extensions に格納し、handler は読むだけ
 *
 * Notes
 * - 資格情報 (bearer token) そのものは持たない
 * - プロセス全体の "current user" スロットは存在しない。寿命は request と同じ
 */
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use crate::services::identity::types::Identity;

/// Per-call carrier of the resolved identity and call metadata.
///
/// - `identity` is `None` only for operations on the public allow-list
/// - `deadline` is the instant after which the call should stop working
#[derive(Debug, Clone)]
pub struct CallContext {
    identity: Option<Arc<Identity>>,
    request_id: String,
    deadline: Instant,
}

impl CallContext {
    pub fn authenticated(identity: Arc<Identity>, request_id: String, deadline: Instant) -> Self {
        Self {
            identity: Some(identity),
            request_id,
            deadline,
        }
    }

    pub fn anonymous(request_id: String, deadline: Instant) -> Self {
        Self {
            identity: None,
            request_id,
            deadline,
        }
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_deref()
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }
}
