/*
 * Responsibility
 * - IdentityResolver が使う UserStore の契約 (find_by_subject)
 * - テスト/デモ用の InMemoryUserStore
 * - 永続化フォーマットはここでは決めない (PgUserStore は既存 users テーブルを読むだけ)
 */
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::{future::Future, pin::Pin};

use crate::repos::error::StoreError;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
pub type StoreResult<T> = Result<T, StoreError>;

/// Raw user record as the store knows it.
///
/// `roles`:
/// - `None`: the store carries no role data for this user (resolves to `{USER}`)
/// - `Some(vec![])`: the store explicitly granted nothing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub id: String,
    pub subject: String,
    pub email: Option<String>,
    pub roles: Option<Vec<String>>,
    pub active: bool,
}

/// Lookup interface consumed by the identity resolver.
///
/// Returns:
/// - `Ok(Some(_))` => record found (active or not)
/// - `Ok(None)`    => no such subject
/// - `Err(_)`      => backend failure (caller must deny)
pub trait UserStore: Send + Sync {
    fn find_by_subject<'a>(&'a self, subject: &'a str)
    -> BoxFuture<'a, StoreResult<Option<UserRecord>>>;
}

/// Process-local store, keyed by subject.
#[derive(Clone, Debug, Default)]
pub struct InMemoryUserStore {
    users: Arc<RwLock<HashMap<String, UserRecord>>>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_users(records: impl IntoIterator<Item = UserRecord>) -> Self {
        let store = Self::new();
        for record in records {
            store.upsert(record);
        }
        store
    }

    pub fn upsert(&self, record: UserRecord) {
        let mut users = self.users.write().unwrap_or_else(|e| e.into_inner());
        users.insert(record.subject.clone(), record);
    }

    pub fn remove(&self, subject: &str) -> Option<UserRecord> {
        let mut users = self.users.write().unwrap_or_else(|e| e.into_inner());
        users.remove(subject)
    }
}

impl UserStore for InMemoryUserStore {
    fn find_by_subject<'a>(
        &'a self,
        subject: &'a str,
    ) -> BoxFuture<'a, StoreResult<Option<UserRecord>>> {
        Box::pin(async move {
            let users = self
                .users
                .read()
                .map_err(|_| StoreError::Unavailable("in-memory store lock poisoned".into()))?;
            Ok(users.get(subject).cloned())
        })
    }
}
