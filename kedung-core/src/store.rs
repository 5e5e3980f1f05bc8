//! The TTL-indexed key/value store (§4.B). A single mutex serializes every
//! operation; store mutations never hold the lock across an `.await`, so
//! this is safe to share across connection tasks and the sweeper without
//! contending on async suspension.

use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

struct Entry {
    expires_at: u64,
    value: Value,
}

/// A process-wide, in-memory cache with a single global TTL applied to
/// every write.
pub struct Store {
    cache_duration_secs: u64,
    entries: Mutex<HashMap<String, Entry>>,
}

/// The wall-clock time, in seconds since the epoch. Only deltas against
/// entries' `expires_at` are ever compared, so any monotonic-adjacent UTC
/// clock is equivalent to the local-timezone-aware clock the reference
/// implementation used.
pub fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before unix epoch")
        .as_secs()
}

impl Store {
    /// Construct an empty store with the given TTL, in minutes.
    pub fn new(cache_duration_minutes: u64) -> Self {
        Self {
            cache_duration_secs: cache_duration_minutes * 60,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Insert `value` under `key` unless a non-expired entry already
    /// exists there. Returns `true` if the write happened.
    pub fn set(&self, key: &str, value: Value) -> bool {
        let mut entries = self.entries.lock().expect("store mutex poisoned");
        let now = now_secs();

        if let Some(existing) = entries.get(key) {
            if existing.expires_at > now {
                return false;
            }
        }

        entries.insert(
            key.to_string(),
            Entry {
                expires_at: now + self.cache_duration_secs,
                value,
            },
        );
        true
    }

    /// Fetch the value stored under `key`, regardless of whether its
    /// deadline has passed — eviction of expired entries is the
    /// sweeper's job, not `get`'s (§4.B, §9).
    pub fn get(&self, key: &str) -> Option<Value> {
        let entries = self.entries.lock().expect("store mutex poisoned");
        entries.get(key).map(|entry| entry.value.clone())
    }

    /// True iff `get` would return a *truthy* value for this key.
    ///
    /// The reference implementation's `exist`/`bulk_exists` apply Python's
    /// `bool()` to the stored value (`_commands.py`'s `bool(status.get(key))`),
    /// so a stored `null`, `0`, `false`, `""`, `[]`, or `{}` all read back
    /// as absent, not just a stored `null`.
    pub fn exists(&self, key: &str) -> bool {
        self.get(key).is_some_and(|v| is_truthy(&v))
    }

    /// Remove `key`. Returns `true` iff it was present.
    pub fn del(&self, key: &str) -> bool {
        let mut entries = self.entries.lock().expect("store mutex poisoned");
        entries.remove(key).is_some()
    }

    /// Remove every entry. Always returns `true`.
    pub fn flush(&self) -> bool {
        let mut entries = self.entries.lock().expect("store mutex poisoned");
        entries.clear();
        true
    }

    /// A point-in-time snapshot of `(key, expires_at)` pairs, used by the
    /// sweeper. Snapshotting avoids mutating the map while iterating it.
    pub(crate) fn snapshot_deadlines(&self) -> Vec<(String, u64)> {
        let entries = self.entries.lock().expect("store mutex poisoned");
        entries
            .iter()
            .map(|(key, entry)| (key.clone(), entry.expires_at))
            .collect()
    }

    /// The number of entries currently stored, expired or not. Exposed
    /// for tests and the sweeper's logging.
    pub fn len(&self) -> usize {
        self.entries.lock().expect("store mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Python-style truthiness of a stored JSON value, matching the reference
/// `exist`/`bulk_exists` commands' `bool(value)`: `null`, `false`, `0`/`0.0`,
/// `""`, `[]`, and `{}` are all falsy; everything else is truthy.
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

/// Sweep `store` once, deleting every entry whose deadline has passed as
/// of `now`. Returns the number of entries evicted.
pub fn sweep_once(store: &Store, now: u64) -> usize {
    let mut evicted = 0;
    for (key, expires_at) in store.snapshot_deadlines() {
        if expires_at < now {
            if store.del(&key) {
                evicted += 1;
            }
        }
    }
    evicted
}
