//! Minimal memcached client speaking the text protocol
//!
//! Only `set` is implemented. Each client keeps a small stack of idle
//! connections so concurrent workers writing to the same endpoint do not
//! serialize on one socket.

use super::{StoreClient, StoreConnector};
use crate::config::StoreConfig;
use crate::error::StoreError;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufStream};
use tokio::net::TcpStream;
use tokio::time::timeout;

/// Longest key memcached accepts
const MAX_KEY_LEN: usize = 250;

type Connection = BufStream<TcpStream>;

/// memcached client for one endpoint
pub struct MemcacheClient {
    address: String,
    config: StoreConfig,
    idle: Mutex<Vec<Connection>>,
}

impl MemcacheClient {
    /// Create a client. No connection is made until the first write.
    pub fn new(address: impl Into<String>, config: StoreConfig) -> Self {
        Self {
            address: address.into(),
            config,
            idle: Mutex::new(Vec::new()),
        }
    }

    async fn checkout(&self) -> Result<Connection, StoreError> {
        let reused = self
            .idle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop();
        if let Some(conn) = reused {
            return Ok(conn);
        }

        let stream = timeout(self.config.connect_timeout, TcpStream::connect(&self.address))
            .await
            .map_err(|_| StoreError::Timeout(self.config.connect_timeout))?
            .map_err(|source| StoreError::Connect {
                address: self.address.clone(),
                source,
            })?;
        stream.set_nodelay(true)?;
        tracing::debug!(endpoint = %self.address, "Opened memcached connection");
        Ok(BufStream::new(stream))
    }

    fn checkin(&self, conn: Connection) {
        let mut idle = self.idle.lock().unwrap_or_else(PoisonError::into_inner);
        if idle.len() < self.config.max_idle_connections {
            idle.push(conn);
        }
    }
}

#[async_trait::async_trait]
impl StoreClient for MemcacheClient {
    async fn set(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        validate_key(key)?;

        let mut conn = self.checkout().await?;
        let io_timeout = self.config.io_timeout;
        let result = match timeout(io_timeout, send_set(&mut conn, key, value)).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::Timeout(io_timeout)),
        };

        match &result {
            Ok(()) => self.checkin(conn),
            Err(e) if e.keeps_connection() => self.checkin(conn),
            Err(_) => {}
        }
        result
    }
}

async fn send_set(conn: &mut Connection, key: &str, value: &[u8]) -> Result<(), StoreError> {
    let header = format!("set {key} 0 0 {}\r\n", value.len());
    conn.write_all(header.as_bytes()).await?;
    conn.write_all(value).await?;
    conn.write_all(b"\r\n").await?;
    conn.flush().await?;

    let mut reply = String::new();
    if conn.read_line(&mut reply).await? == 0 {
        return Err(StoreError::Io(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            "connection closed by store",
        )));
    }

    match reply.trim_end() {
        "STORED" => Ok(()),
        other => Err(StoreError::Rejected {
            response: other.to_string(),
        }),
    }
}

fn validate_key(key: &str) -> Result<(), StoreError> {
    let valid = !key.is_empty()
        && key.len() <= MAX_KEY_LEN
        && key.bytes().all(|b| b > b' ' && b != 0x7f);
    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidKey(key.to_string()))
    }
}

/// [`StoreConnector`] producing [`MemcacheClient`]s
#[derive(Clone, Debug, Default)]
pub struct MemcacheConnector {
    config: StoreConfig,
}

impl MemcacheConnector {
    /// Create a connector whose clients use `config`
    pub fn new(config: StoreConfig) -> Self {
        Self { config }
    }
}

impl StoreConnector for MemcacheConnector {
    fn connect(&self, address: &str) -> Arc<dyn StoreClient> {
        Arc::new(MemcacheClient::new(address, self.config.clone()))
    }
}
