//! Per-key mutual exclusion with lazily created, reference-counted entries.
//!
//! Every lookup of a key increments the entry's holder count under the
//! table mutex, and eviction only removes entries whose count is zero under
//! that same mutex. A task that has obtained a lock object from the table is
//! therefore always counted, and the object it waits on can never be evicted
//! and replaced by a different one behind its back.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tokio::task::JoinHandle;
use tracing::debug;

struct LockEntry {
    lock: Arc<AsyncMutex<()>>,
    holders: usize,
    idle_since: Instant,
}

struct LockTable<K> {
    entries: Mutex<HashMap<K, LockEntry>>,
    idle_ttl: Duration,
}

impl<K: Hash + Eq + Clone> LockTable<K> {
    fn check_out(self: &Arc<Self>, key: K) -> CheckedOut<K> {
        let mut entries = self.entries.lock();
        let entry = entries.entry(key.clone()).or_insert_with(|| LockEntry {
            lock: Arc::new(AsyncMutex::new(())),
            holders: 0,
            idle_since: Instant::now(),
        });
        entry.holders += 1;
        CheckedOut {
            table: Arc::clone(self),
            key,
            lock: Arc::clone(&entry.lock),
        }
    }

    fn check_in(&self, key: &K) {
        let mut entries = self.entries.lock();
        if let Some(entry) = entries.get_mut(key) {
            entry.holders = entry.holders.saturating_sub(1);
            if entry.holders == 0 {
                entry.idle_since = Instant::now();
            }
        }
    }

    fn sweep(&self) -> usize {
        let mut entries = self.entries.lock();
        let before = entries.len();
        let ttl = self.idle_ttl;
        entries.retain(|_, entry| entry.holders > 0 || entry.idle_since.elapsed() < ttl);
        before - entries.len()
    }
}

/// A counted reference to one table entry, returned to the table on drop.
struct CheckedOut<K: Hash + Eq + Clone> {
    table: Arc<LockTable<K>>,
    key: K,
    lock: Arc<AsyncMutex<()>>,
}

impl<K: Hash + Eq + Clone> Drop for CheckedOut<K> {
    fn drop(&mut self) {
        self.table.check_in(&self.key);
    }
}

// Field order matters: the permit is released before the entry is checked in.
struct HeldKey<K: Hash + Eq + Clone> {
    _permit: OwnedMutexGuard<()>,
    entry: CheckedOut<K>,
}

/// Proof that every requested key is held. Dropping it releases them all.
#[must_use = "the keys are released as soon as the guard is dropped"]
pub struct KeyGuard<K: Hash + Eq + Clone> {
    held: Vec<HeldKey<K>>,
}

impl<K: Hash + Eq + Clone> KeyGuard<K> {
    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.held.iter().map(|held| &held.entry.key)
    }

    pub fn release(self) {}
}

impl<K: Hash + Eq + Clone> Drop for KeyGuard<K> {
    fn drop(&mut self) {
        while let Some(held) = self.held.pop() {
            drop(held);
        }
    }
}

/// Mutual exclusion keyed by arbitrary ordered values.
///
/// Multi-key requests are sorted before acquisition, so two tasks asking for
/// `{a, b}` and `{b, a}` always take `a` first and cannot deadlock.
pub struct KeyLocker<K> {
    table: Arc<LockTable<K>>,
}

impl<K> KeyLocker<K>
where
    K: Ord + Hash + Clone + Debug + Send + Sync + 'static,
{
    pub fn new(idle_ttl: Duration) -> Self {
        Self {
            table: Arc::new(LockTable {
                entries: Mutex::new(HashMap::new()),
                idle_ttl,
            }),
        }
    }

    /// Waits until every key in `keys` is held by the caller.
    ///
    /// Dropping the returned future before it resolves releases whatever was
    /// already taken and leaves the table as it found it.
    pub async fn acquire<I>(&self, keys: I) -> KeyGuard<K>
    where
        I: IntoIterator<Item = K>,
    {
        let mut keys: Vec<K> = keys.into_iter().collect();
        keys.sort();
        keys.dedup();

        let mut guard = KeyGuard {
            held: Vec::with_capacity(keys.len()),
        };
        for key in keys {
            let entry = self.table.check_out(key);
            let permit = Arc::clone(&entry.lock).lock_owned().await;
            guard.held.push(HeldKey {
                _permit: permit,
                entry,
            });
        }
        debug!(keys = ?guard.keys().collect::<Vec<_>>(), "keys acquired");
        guard
    }

    /// Drops entries nobody holds or waits on and that have been idle for at
    /// least the configured TTL. Returns how many were removed.
    pub fn sweep(&self) -> usize {
        self.table.sweep()
    }

    /// Number of entries currently in the table, idle ones included.
    pub fn len(&self) -> usize {
        self.table.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Spawns a task that sweeps every `every`. It stops once the locker is
    /// dropped.
    pub fn spawn_sweeper(&self, every: Duration) -> JoinHandle<()> {
        let table: Weak<LockTable<K>> = Arc::downgrade(&self.table);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(table) = table.upgrade() else {
                    break;
                };
                let evicted = table.sweep();
                if evicted > 0 {
                    debug!(evicted, "evicted idle lock entries");
                }
            }
        })
    }
}
