//! Key-value store capability and client pooling
//!
//! The pipeline never talks to a store directly. It asks a [`ClientPool`] for
//! the handle of an endpoint and calls [`StoreClient::set`]. Handles are built
//! by a [`StoreConnector`], so tests and alternative backends can be plugged in.

pub mod memcache;

use crate::error::StoreError;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

pub use memcache::{MemcacheClient, MemcacheConnector};

/// Write access to one key-value store endpoint
#[async_trait::async_trait]
pub trait StoreClient: Send + Sync {
    /// Store `value` under `key`, replacing any previous value
    async fn set(&self, key: &str, value: &[u8]) -> Result<(), StoreError>;
}

/// Builds a client handle for an endpoint address
///
/// Construction must be cheap and must not perform I/O; connecting is the
/// client's business on first use.
pub trait StoreConnector: Send + Sync {
    /// Create a handle for `address` ("host:port")
    fn connect(&self, address: &str) -> Arc<dyn StoreClient>;
}

/// Lazily built, process-lifetime cache of one client per endpoint address
///
/// Lookups of known addresses only take the read lock. The first lookup of an
/// address takes the write lock and re-checks before constructing, so an address
/// is never constructed twice even when workers race on it.
pub struct ClientPool {
    connector: Arc<dyn StoreConnector>,
    clients: RwLock<HashMap<String, Arc<dyn StoreClient>>>,
}

impl ClientPool {
    /// Create an empty pool
    pub fn new(connector: Arc<dyn StoreConnector>) -> Self {
        Self {
            connector,
            clients: RwLock::new(HashMap::new()),
        }
    }

    /// Return the cached handle for `address`, constructing it on first use
    pub fn get_or_create(&self, address: &str) -> Arc<dyn StoreClient> {
        if let Some(client) = self
            .clients
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(address)
        {
            return Arc::clone(client);
        }

        let mut clients = self.clients.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(client) = clients.get(address) {
            return Arc::clone(client);
        }

        tracing::debug!(endpoint = address, "Creating store client");
        let client = self.connector.connect(address);
        clients.insert(address.to_string(), Arc::clone(&client));
        client
    }

    /// Number of distinct endpoints that have a handle
    pub fn len(&self) -> usize {
        self.clients
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether no handle has been created yet
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
