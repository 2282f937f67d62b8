//! Fragment store shared by all fetch workers.
//!
//! One mutex guards the presence bitmap, the index-keyed fragment map and the
//! completion counter, so check-then-insert-then-count is a single critical
//! section. Workers never hold the lock across network I/O or validation.

mod bitmap;

pub use bitmap::FragmentBitmap;

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// One accepted fragment: a complete container holding one band of the image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    pub index: u32,
    pub bytes: Vec<u8>,
    /// Accepted despite CRC mismatches (warn policy).
    pub flagged: bool,
}

impl Fragment {
    pub fn size(&self) -> usize {
        self.bytes.len()
    }
}

/// Result of offering a fragment to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// First copy of this index; `completed` is the counter after the increment.
    Inserted { completed: usize },
    /// Index already held; the offered copy was dropped.
    Duplicate,
    /// Index outside `[0, target)`.
    OutOfRange,
}

#[derive(Debug)]
struct StoreInner {
    seen: FragmentBitmap,
    fragments: BTreeMap<u32, Fragment>,
    completed: usize,
}

/// Concurrency-safe index → fragment table with a monotonic completion counter.
#[derive(Debug)]
pub struct FragmentStore {
    target: usize,
    inner: Mutex<StoreInner>,
}

impl FragmentStore {
    pub fn new(target: usize) -> Self {
        Self {
            target,
            inner: Mutex::new(StoreInner {
                seen: FragmentBitmap::new(target),
                fragments: BTreeMap::new(),
                completed: 0,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, StoreInner> {
        // Every critical section leaves the state consistent, so a poisoned lock is still usable.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of fragments the image is split into.
    pub fn target(&self) -> usize {
        self.target
    }

    /// Insert unless the index is already held. Duplicates never overwrite.
    pub fn insert(&self, fragment: Fragment) -> InsertOutcome {
        let index = fragment.index as usize;
        if index >= self.target {
            return InsertOutcome::OutOfRange;
        }
        let mut inner = self.lock();
        if !inner.seen.set(index) {
            return InsertOutcome::Duplicate;
        }
        inner.fragments.insert(fragment.index, fragment);
        inner.completed += 1;
        InsertOutcome::Inserted {
            completed: inner.completed,
        }
    }

    pub fn contains(&self, index: u32) -> bool {
        self.lock().seen.is_set(index as usize)
    }

    pub fn completed(&self) -> usize {
        self.lock().completed
    }

    pub fn is_complete(&self) -> bool {
        self.completed() >= self.target
    }

    /// Indices still missing, ascending.
    pub fn missing(&self) -> Vec<u32> {
        self.lock()
            .seen
            .unset()
            .into_iter()
            .map(|i| i as u32)
            .collect()
    }

    /// Move every held fragment out, ascending by index. The counter is left
    /// untouched so late arrivals are still recognised as duplicates.
    pub fn take_ordered(&self) -> Vec<Fragment> {
        std::mem::take(&mut self.lock().fragments)
            .into_values()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn frag(index: u32, tag: u8) -> Fragment {
        Fragment {
            index,
            bytes: vec![tag; 4],
            flagged: false,
        }
    }

    #[test]
    fn duplicate_keeps_first_copy_and_counts_once() {
        let store = FragmentStore::new(3);
        assert_eq!(
            store.insert(frag(1, 0xAA)),
            InsertOutcome::Inserted { completed: 1 }
        );
        assert_eq!(store.insert(frag(1, 0xBB)), InsertOutcome::Duplicate);
        assert_eq!(store.completed(), 1);
        let held = store.take_ordered();
        assert_eq!(held.len(), 1);
        assert_eq!(held[0].bytes, vec![0xAA; 4]);
    }

    #[test]
    fn out_of_range_index_is_refused() {
        let store = FragmentStore::new(2);
        assert_eq!(store.insert(frag(2, 0)), InsertOutcome::OutOfRange);
        assert_eq!(store.insert(frag(u32::MAX, 0)), InsertOutcome::OutOfRange);
        assert_eq!(store.completed(), 0);
        assert!(!store.contains(2));
    }

    #[test]
    fn take_ordered_sorts_by_index_not_arrival() {
        let store = FragmentStore::new(4);
        for i in [3, 1, 0, 2] {
            store.insert(frag(i, i as u8));
        }
        assert!(store.is_complete());
        let order: Vec<u32> = store.take_ordered().iter().map(|f| f.index).collect();
        assert_eq!(order, vec![0, 1, 2, 3]);
        // Still complete afterwards: late copies remain duplicates.
        assert_eq!(store.insert(frag(0, 9)), InsertOutcome::Duplicate);
    }

    #[test]
    fn missing_lists_gaps() {
        let store = FragmentStore::new(5);
        store.insert(frag(0, 0));
        store.insert(frag(3, 0));
        assert_eq!(store.missing(), vec![1, 2, 4]);
        assert!(!store.is_complete());
    }

    #[test]
    fn concurrent_duplicates_count_each_index_once() {
        const N: u32 = 64;
        let store = Arc::new(FragmentStore::new(N as usize));
        let handles: Vec<_> = (0..8u32)
            .map(|t| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    let mut inserted = 0usize;
                    for k in 0..N {
                        // Each thread walks the indices from a different starting point.
                        let index = (k + t * 7) % N;
                        if let InsertOutcome::Inserted { .. } = store.insert(frag(index, t as u8)) {
                            inserted += 1;
                        }
                    }
                    inserted
                })
            })
            .collect();
        let total: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(total, N as usize);
        assert_eq!(store.completed(), N as usize);
        let held = store.take_ordered();
        assert_eq!(held.len(), N as usize);
        assert!(held.iter().enumerate().all(|(i, f)| f.index as usize == i));
    }
}
