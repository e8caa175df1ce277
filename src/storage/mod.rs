//! In-memory key-value storage.
//!
//! The [`Store`] is the single dictionary shared by every client connection. It has no
//! knowledge of networking; the [`command`](crate::command) dispatcher is its only caller
//! on the request path.
//!
//! # Concurrency
//!
//! The map sits behind a [`RwLock`]: any number of readers proceed together while a writer
//! holds exclusive access, so reads and writes are linearizable with respect to each other.
//!
//! # Example
//! ```rust
//! use frost::storage::Store;
//!
//! let store = Store::new();
//! store.set("foo", "bar");
//!
//! assert_eq!(store.get(b"foo"), Some(b"bar".to_vec()));
//! assert_eq!(store.get(b"missing"), None);
//! ```
use std::{
    collections::HashMap,
    sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard},
};

/// Thread-safe dictionary of binary-safe keys and values. No ordering, size bound or expiry.
#[derive(Debug, Default)]
pub struct Store {
    data: RwLock<HashMap<Vec<u8>, Vec<u8>>>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of the value stored under `key`.
    pub fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.read().get(key).cloned()
    }

    /// Stores `value` under `key`, returning the value it replaced.
    pub fn set(&self, key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Option<Vec<u8>> {
        self.write().insert(key.into(), value.into())
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    // A panicking holder cannot leave a half-applied insert behind, so poisoning is ignored.
    fn read(&self) -> RwLockReadGuard<'_, HashMap<Vec<u8>, Vec<u8>>> {
        self.data.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<Vec<u8>, Vec<u8>>> {
        self.data.write().unwrap_or_else(PoisonError::into_inner)
    }
}
