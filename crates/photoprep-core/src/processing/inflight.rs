//! Per-key single-flight markers.

use std::cell::RefCell;
use std::collections::HashSet;
use std::fmt;
use std::hash::Hash;
use std::rc::Rc;

/// Set of keys with an operation in progress.
///
/// [`InFlight::try_begin`] inserts synchronously; the returned guard removes
/// the key when dropped, which covers success, failure and an abandoned
/// future alike.
pub struct InFlight<K: Eq + Hash> {
    keys: Rc<RefCell<HashSet<K>>>,
}

impl<K: Eq + Hash + Clone> InFlight<K> {
    pub fn new() -> Self {
        Self {
            keys: Rc::new(RefCell::new(HashSet::new())),
        }
    }

    /// Marks `key` in flight. Returns `None` if it already is.
    pub fn try_begin(&self, key: K) -> Option<InFlightGuard<K>> {
        if !self.keys.borrow_mut().insert(key.clone()) {
            return None;
        }
        Some(InFlightGuard {
            keys: Rc::clone(&self.keys),
            key,
        })
    }

    pub fn contains(&self, key: &K) -> bool {
        self.keys.borrow().contains(key)
    }

    pub fn len(&self) -> usize {
        self.keys.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.borrow().is_empty()
    }
}

impl<K: Eq + Hash + Clone> Default for InFlight<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Eq + Hash> Clone for InFlight<K> {
    fn clone(&self) -> Self {
        Self {
            keys: Rc::clone(&self.keys),
        }
    }
}

impl<K: Eq + Hash + fmt::Debug> fmt::Debug for InFlight<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.keys.borrow().iter()).finish()
    }
}

/// Clears its key from the owning [`InFlight`] set on drop.
#[must_use = "the key is released as soon as the guard is dropped"]
pub struct InFlightGuard<K: Eq + Hash> {
    keys: Rc<RefCell<HashSet<K>>>,
    key: K,
}

impl<K: Eq + Hash> Drop for InFlightGuard<K> {
    fn drop(&mut self) {
        self.keys.borrow_mut().remove(&self.key);
    }
}
