//! Subject → identity resolution with a single-flight, TTL-bounded cache.
//!
//! Cache layout: one slot per subject, either a ready entry (served while
//! younger than the TTL) or an in-flight fetch. An in-flight fetch runs on its
//! own task and publishes its outcome through a `watch` channel, so every
//! concurrent caller for the same subject waits on the same fetch, and a
//! caller that gives up (deadline, disconnect) does not cancel it.
//!
//! Only successful resolutions are cached.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::repos::user_store::{UserRecord, UserStore};
use crate::services::auth::error::AuthError;
use crate::services::identity::types::{Identity, Role};

pub type Resolution = Result<Arc<Identity>, AuthError>;

/// Maps a validated subject to the caller's identity.
///
/// Implementations must fail closed: anything other than `Ok` denies the call.
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    async fn resolve(&self, subject: &str) -> Resolution;
}

/// Convert a store record into an identity, enforcing the activity and role rules.
pub fn identity_from_record(record: UserRecord) -> Result<Identity, AuthError> {
    if !record.active {
        return Err(AuthError::IdentityDeactivated);
    }

    let roles: BTreeSet<Role> = match record.roles {
        None => BTreeSet::from([Role::user()]),
        Some(names) => names
            .into_iter()
            .map(|n| n.trim().to_owned())
            .filter(|n| !n.is_empty())
            .map(Role::new)
            .collect(),
    };
    if roles.is_empty() {
        return Err(AuthError::IdentityNoRoles);
    }

    Ok(Identity {
        id: record.id,
        subject: record.subject,
        email: record.email,
        roles,
        active: true,
    })
}

#[derive(Debug, Clone, Copy)]
pub struct ResolverConfig {
    pub cache_ttl: Duration,
    pub timeout: Duration,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            cache_ttl: Duration::from_secs(60),
            timeout: Duration::from_secs(2),
        }
    }
}

type Flight = watch::Receiver<Option<Resolution>>;

struct CacheEntry {
    identity: Arc<Identity>,
    fetched_at: Instant,
}

enum Slot {
    Ready(CacheEntry),
    Pending(Flight),
}

enum Lookup {
    Hit(Arc<Identity>),
    Wait(Flight),
}

struct Inner {
    store: Arc<dyn UserStore>,
    config: ResolverConfig,
    slots: Mutex<HashMap<String, Slot>>,
}

/// Production resolver: store lookups behind the single-flight cache.
#[derive(Clone)]
pub struct CachingIdentityResolver {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for CachingIdentityResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachingIdentityResolver")
            .field("config", &self.inner.config)
            .finish()
    }
}

impl CachingIdentityResolver {
    pub fn new(store: Arc<dyn UserStore>, config: ResolverConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                config,
                slots: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Drop a cached identity, e.g. after a deactivation event.
    ///
    /// An in-flight fetch for the subject is left alone.
    pub fn invalidate(&self, subject: &str) {
        if let Ok(mut slots) = self.inner.slots.lock()
            && matches!(slots.get(subject), Some(Slot::Ready(_)))
        {
            slots.remove(subject);
        }
    }

    fn lookup(&self, subject: &str) -> Result<Lookup, AuthError> {
        let mut slots = self
            .inner
            .slots
            .lock()
            .map_err(|_| AuthError::internal("identity cache lock poisoned"))?;

        let ttl = self.inner.config.cache_ttl;
        match slots.get(subject) {
            Some(Slot::Ready(entry)) if entry.fetched_at.elapsed() < ttl => {
                return Ok(Lookup::Hit(Arc::clone(&entry.identity)));
            }
            Some(Slot::Pending(flight)) => return Ok(Lookup::Wait(flight.clone())),
            _ => {}
        }

        // Expired entries of subjects that never come back would otherwise stay forever
        slots.retain(|_, slot| match slot {
            Slot::Ready(entry) => entry.fetched_at.elapsed() < ttl,
            Slot::Pending(_) => true,
        });

        let (tx, rx) = watch::channel(None);
        slots.insert(subject.to_owned(), Slot::Pending(rx.clone()));
        drop(slots);

        debug!(subject, "identity cache miss, fetching from store");
        let inner = Arc::clone(&self.inner);
        let subject = subject.to_owned();
        tokio::spawn(async move { inner.fetch(subject, tx).await });

        Ok(Lookup::Wait(rx))
    }

    /// Remove a pending slot whose fetch task died without publishing.
    fn evict_abandoned(&self, subject: &str, flight: &Flight) {
        if let Ok(mut slots) = self.inner.slots.lock()
            && let Some(Slot::Pending(current)) = slots.get(subject)
            && current.same_channel(flight)
        {
            slots.remove(subject);
        }
    }
}

impl Inner {
    async fn fetch(&self, subject: String, tx: watch::Sender<Option<Resolution>>) {
        let outcome =
            tokio::time::timeout(self.config.timeout, self.store.find_by_subject(&subject)).await;

        let resolution = match outcome {
            Err(_) => {
                warn!(
                    subject = %subject,
                    timeout = ?self.config.timeout,
                    "user store lookup timed out"
                );
                Err(AuthError::ResolverTimeout)
            }
            Ok(Err(err)) => {
                warn!(subject = %subject, error = ?err, "user store lookup failed");
                Err(AuthError::internal("user store failure"))
            }
            Ok(Ok(None)) => Err(AuthError::IdentityNotFound),
            Ok(Ok(Some(record))) => identity_from_record(record).map(Arc::new),
        };

        match self.slots.lock() {
            Ok(mut slots) => match &resolution {
                Ok(identity) => {
                    slots.insert(
                        subject,
                        Slot::Ready(CacheEntry {
                            identity: Arc::clone(identity),
                            fetched_at: Instant::now(),
                        }),
                    );
                }
                Err(_) => {
                    slots.remove(&subject);
                }
            },
            Err(_) => warn!(subject = %subject, "identity cache lock poisoned, result not cached"),
        }

        // Waiters may all be gone; the value is stored regardless.
        tx.send_replace(Some(resolution));
    }
}

#[async_trait]
impl IdentityResolver for CachingIdentityResolver {
    async fn resolve(&self, subject: &str) -> Resolution {
        let mut flight = match self.lookup(subject)? {
            Lookup::Hit(identity) => return Ok(identity),
            Lookup::Wait(flight) => flight,
        };

        let published = match flight.wait_for(Option::is_some).await {
            Ok(value) => value.clone(),
            Err(_) => None,
        };

        match published {
            Some(resolution) => resolution,
            None => {
                self.evict_abandoned(subject, &flight);
                Err(AuthError::internal("identity fetch abandoned"))
            }
        }
    }
}

/// Fixed identity table; resolves without caching or timeouts.
#[derive(Debug, Clone, Default)]
pub struct InMemoryIdentityResolver {
    identities: HashMap<String, Arc<Identity>>,
}

impl InMemoryIdentityResolver {
    pub fn new(identities: impl IntoIterator<Item = Identity>) -> Self {
        Self {
            identities: identities
                .into_iter()
                .map(|i| (i.subject.clone(), Arc::new(i)))
                .collect(),
        }
    }
}

#[async_trait]
impl IdentityResolver for InMemoryIdentityResolver {
    async fn resolve(&self, subject: &str) -> Resolution {
        match self.identities.get(subject) {
            None => Err(AuthError::IdentityNotFound),
            Some(identity) if !identity.active => Err(AuthError::IdentityDeactivated),
            Some(identity) if identity.roles.is_empty() => Err(AuthError::IdentityNoRoles),
            Some(identity) => Ok(Arc::clone(identity)),
        }
    }
}
