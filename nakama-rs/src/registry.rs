//! Handle table for applications that address clients by number.
//!
//! Bindings and game engines often hold plain integer ids instead of Rust
//! references. A [`ClientRegistry`] hands out such ids; it is owned by the
//! application and any number of registries may coexist.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;

/// Id of a registered client. Never reused within one registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClientHandle(u64);

impl ClientHandle {
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ClientHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

pub struct ClientRegistry<T> {
    clients: DashMap<ClientHandle, Arc<T>>,
    next: AtomicU64,
}

impl<T> ClientRegistry<T> {
    pub fn new() -> Self {
        Self {
            clients: DashMap::new(),
            next: AtomicU64::new(1),
        }
    }

    pub fn register(&self, client: T) -> ClientHandle {
        self.register_shared(Arc::new(client))
    }

    pub fn register_shared(&self, client: Arc<T>) -> ClientHandle {
        let handle = ClientHandle(self.next.fetch_add(1, Ordering::Relaxed));
        self.clients.insert(handle, client);
        tracing::debug!("client {} registered", handle);
        handle
    }

    pub fn get(&self, handle: ClientHandle) -> Option<Arc<T>> {
        self.clients.get(&handle).map(|entry| entry.value().clone())
    }

    /// Remove a client. Holders of its `Arc` keep it alive.
    pub fn unregister(&self, handle: ClientHandle) -> Option<Arc<T>> {
        let removed = self.clients.remove(&handle).map(|(_, client)| client);
        if removed.is_some() {
            tracing::debug!("client {} unregistered", handle);
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    /// Registered handles, in ascending order.
    pub fn handles(&self) -> Vec<ClientHandle> {
        let mut handles: Vec<ClientHandle> = self.clients.iter().map(|entry| *entry.key()).collect();
        handles.sort();
        handles
    }
}

impl<T> Default for ClientRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}
