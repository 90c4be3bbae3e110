//! Run-scoped contact cache.
//!
//! [`ContactStore`] is the injectable seam: the resolver and coordinator only
//! see the trait, so tests can substitute fakes and a longer-lived store can
//! be layered on top without touching resolution logic.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::{Mutex, RwLock};
use tokio::sync::Mutex as AsyncMutex;

use morningbrief_shared::ContactProfile;

/// Storage for resolved contacts and CRM metadata discovered during a run.
///
/// Resolution of one key must be serialized through [`ContactStore::key_lock`]:
/// check, take the lock, check again, resolve, `put`. Unrelated keys have
/// independent locks.
pub trait ContactStore: Send + Sync {
    fn get(&self, email: &str) -> Option<ContactProfile>;

    /// Store a fully resolved profile, replacing any previous one wholesale.
    fn put(&self, email: &str, profile: ContactProfile);

    /// Forget the profile and legacy id for `email`.
    fn invalidate(&self, email: &str);

    /// Per-key async lock guarding resolution of `key`.
    fn key_lock(&self, key: &str) -> Arc<AsyncMutex<()>>;

    /// Field ids known to carry the social-profile attribute for a CRM schema.
    fn field_mapping(&self, scope: &str) -> Option<Vec<String>>;

    fn put_field_mapping(&self, scope: &str, field_ids: Vec<String>);

    /// Legacy CRM person id previously found for `email`.
    fn legacy_id(&self, email: &str) -> Option<i64>;

    fn put_legacy_id(&self, email: &str, legacy_id: i64);
}

/// Counters for the run report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub profiles: usize,
    pub hits: usize,
    pub misses: usize,
}

/// In-memory [`ContactStore`] for one pipeline run.
#[derive(Default)]
pub struct ContactCache {
    profiles: RwLock<HashMap<String, ContactProfile>>,
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
    field_mappings: RwLock<HashMap<String, Vec<String>>>,
    legacy_ids: RwLock<HashMap<String, i64>>,
    hits: AtomicUsize,
    misses: AtomicUsize,
}

impl ContactCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            profiles: self.profiles.read().len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

impl ContactStore for ContactCache {
    fn get(&self, email: &str) -> Option<ContactProfile> {
        let found = self.profiles.read().get(email).cloned();
        let counter = if found.is_some() { &self.hits } else { &self.misses };
        counter.fetch_add(1, Ordering::Relaxed);
        found
    }

    fn put(&self, email: &str, profile: ContactProfile) {
        self.profiles.write().insert(email.to_string(), profile);
    }

    fn invalidate(&self, email: &str) {
        self.profiles.write().remove(email);
        self.legacy_ids.write().remove(email);
    }

    fn key_lock(&self, key: &str) -> Arc<AsyncMutex<()>> {
        self.locks
            .lock()
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    fn field_mapping(&self, scope: &str) -> Option<Vec<String>> {
        self.field_mappings.read().get(scope).cloned()
    }

    fn put_field_mapping(&self, scope: &str, field_ids: Vec<String>) {
        self.field_mappings
            .write()
            .insert(scope.to_string(), field_ids);
    }

    fn legacy_id(&self, email: &str) -> Option<i64> {
        self.legacy_ids.read().get(email).copied()
    }

    fn put_legacy_id(&self, email: &str, legacy_id: i64) {
        self.legacy_ids.write().insert(email.to_string(), legacy_id);
    }
}
