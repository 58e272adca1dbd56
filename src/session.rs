//! TTL-less cache of currently authenticated principals.
//!
//! Entries are created on login and leave only on logout or when the owning
//! service deletes the principal. Nothing expires passively and there is no
//! capacity bound: the set of active sessions is the working set.
//!
//! Services consult the session cache ahead of their generic by-id cache, so
//! an active principal resolves without touching TTL bookkeeping or
//! persistence.

use dashmap::DashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::Arc;

/// Map of principal id to the snapshot taken at login (or last refresh).
pub struct SessionCache<K, V> {
    sessions: Arc<DashMap<K, V>>,
}

impl<K, V> Clone for SessionCache<K, V> {
    fn clone(&self) -> Self {
        SessionCache {
            sessions: Arc::clone(&self.sessions),
        }
    }
}

impl<K, V> SessionCache<K, V>
where
    K: Eq + Hash + Debug,
    V: Clone,
{
    pub fn new() -> Self {
        SessionCache {
            sessions: Arc::new(DashMap::new()),
        }
    }

    /// Start (or replace) the session for `id`.
    pub fn activate(&self, id: K, principal: V) {
        debug!("✓ Session ACTIVATE {:?}", id);
        self.sessions.insert(id, principal);
    }

    /// End the session for `id`, returning the snapshot if there was one.
    pub fn deactivate(&self, id: &K) -> Option<V> {
        let removed = self.sessions.remove(id).map(|(_, v)| v);
        if removed.is_some() {
            debug!("✓ Session DEACTIVATE {:?}", id);
        }
        removed
    }

    /// Replace the snapshot for `id` only if a session is active.
    ///
    /// Returns true if a session was refreshed.
    pub fn refresh(&self, id: &K, principal: V) -> bool {
        match self.sessions.get_mut(id) {
            Some(mut entry) => {
                *entry = principal;
                debug!("✓ Session REFRESH {:?}", id);
                true
            }
            None => false,
        }
    }

    /// The active snapshot for `id`. `None` means "no active session".
    pub fn get_active(&self, id: &K) -> Option<V> {
        self.sessions.get(id).map(|entry| entry.value().clone())
    }

    pub fn contains(&self, id: &K) -> bool {
        self.sessions.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

impl<K, V> Default for SessionCache<K, V>
where
    K: Eq + Hash + Debug,
    V: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}
