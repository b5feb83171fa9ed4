//! Per-participant serialization of record updates.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::combat::types::ParticipantId;

use super::store::lock;

/// Lock table keyed by participant id.
///
/// Multi-key sections lock in sorted order so two overlapping updates can
/// never wait on each other in a cycle.
#[derive(Debug, Default)]
pub struct KeyedLocks {
    table: Mutex<HashMap<ParticipantId, Arc<Mutex<()>>>>,
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_locked<T>(&self, keys: &[&ParticipantId], f: impl FnOnce() -> T) -> T {
        let mut sorted: Vec<ParticipantId> = keys.iter().map(|k| (*k).clone()).collect();
        sorted.sort();
        sorted.dedup();

        let handles: Vec<Arc<Mutex<()>>> = {
            let mut table = lock(&self.table);
            sorted
                .iter()
                .map(|key| Arc::clone(table.entry(key.clone()).or_default()))
                .collect()
        };

        let result = {
            let _guards: Vec<MutexGuard<'_, ()>> = handles.iter().map(|m| lock(m)).collect();
            f()
        };

        drop(handles);
        self.prune(&sorted);
        result
    }

    // Drops entries nobody else is holding or waiting on.
    fn prune(&self, keys: &[ParticipantId]) {
        let mut table = lock(&self.table);
        for key in keys {
            if table.get(key).is_some_and(|m| Arc::strong_count(m) == 1) {
                table.remove(key);
            }
        }
    }

    pub fn len(&self) -> usize {
        lock(&self.table).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::thread;

    #[test]
    fn test_table_is_pruned_after_use() {
        let locks = KeyedLocks::new();
        let a = ParticipantId::new("a");
        let b = ParticipantId::new("b");
        let value = locks.with_locked(&[&b, &a, &a], || 7);
        assert_eq!(value, 7);
        assert!(locks.is_empty());
    }

    #[test]
    fn test_same_key_updates_are_serialized() {
        let locks = Arc::new(KeyedLocks::new());
        let counter = Arc::new(AtomicU32::new(0));
        let a = ParticipantId::new("a");
        let b = ParticipantId::new("b");

        let workers: Vec<_> = (0..8)
            .map(|i| {
                let locks = Arc::clone(&locks);
                let counter = Arc::clone(&counter);
                let (first, second) = if i % 2 == 0 {
                    (a.clone(), b.clone())
                } else {
                    (b.clone(), a.clone())
                };
                thread::spawn(move || {
                    for _ in 0..200 {
                        locks.with_locked(&[&first, &second], || {
                            // Non-atomic read-modify-write; only safe if serialized
                            let seen = counter.load(Ordering::SeqCst);
                            counter.store(seen + 1, Ordering::SeqCst);
                        });
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }
        assert_eq!(counter.load(Ordering::SeqCst), 1_600);
    }
}
