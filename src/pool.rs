use crate::config::PoolConfig;
use crate::h2::connection::H2Connection;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PoolKey {
    pub host: String,
    pub port: u16,
    pub scheme: String,
}

impl PoolKey {
    pub fn new(host: impl Into<String>, port: u16, scheme: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port,
            scheme: scheme.into(),
        }
    }
}

struct Slot {
    connection: H2Connection,
    last_used: Instant,
}

/// Keyed connection pool. One lock guards the map of keys to connection
/// lists; `H2Connection` is itself a cheap, internally-synchronized handle
/// (cloning it just clones a few `Arc`s), so once a connection is handed
/// out, contention for *using* it is arbitrated by the connection's own
/// writer queue, not by this pool.
pub struct ConnectionPool {
    config: PoolConfig,
    slots: Mutex<HashMap<PoolKey, Vec<Slot>>>,
}

impl ConnectionPool {
    pub fn new(config: PoolConfig) -> Self {
        Self {
            config,
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Returns a pooled connection for `key` if one is idle and still under
    /// the per-key cap, evicting the least-recently-used entry first when
    /// the cap would otherwise be exceeded by inserting a new one.
    pub async fn acquire(&self, key: &PoolKey) -> Option<H2Connection> {
        let mut slots = self.slots.lock().await;
        let bucket = slots.get_mut(key)?;
        bucket.pop().map(|slot| {
            debug!(host = %key.host, port = key.port, "reusing pooled connection");
            slot.connection
        })
    }

    pub async fn put_back(&self, key: PoolKey, connection: H2Connection) {
        let mut slots = self.slots.lock().await;
        let bucket = slots.entry(key.clone()).or_default();

        if bucket.len() >= self.config.max_connections_per_key {
            debug!(host = %key.host, port = key.port, "pool at capacity, evicting LRU entry");
            bucket.remove(0);
        }

        bucket.push(Slot {
            connection,
            last_used: Instant::now(),
        });
    }

    pub async fn warmup_connection(&self, key: PoolKey, connection: H2Connection) {
        self.put_back(key, connection).await;
    }

    /// Drops connections that have sat idle longer than `idle_ttl`. Meant to
    /// be driven by a periodic task at `config.cleanup_interval`.
    pub async fn cleanup_expired_connections(&self) {
        let ttl = self.config.idle_ttl;
        let mut slots = self.slots.lock().await;
        let mut removed = 0usize;

        for bucket in slots.values_mut() {
            let before = bucket.len();
            bucket.retain(|slot| slot.last_used.elapsed() < ttl);
            removed += before - bucket.len();
        }
        slots.retain(|_, bucket| !bucket.is_empty());

        if removed > 0 {
            debug!(removed, "evicted idle pooled connections");
        }
    }

    pub fn cleanup_interval(&self) -> Duration {
        self.config.cleanup_interval
    }

    pub async fn len(&self, key: &PoolKey) -> usize {
        self.slots
            .lock()
            .await
            .get(key)
            .map(|bucket| bucket.len())
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> PoolConfig {
        PoolConfig {
            max_connections_per_key: 2,
            idle_ttl: Duration::from_millis(5),
            cleanup_interval: Duration::from_secs(1),
        }
    }

    #[tokio::test]
    async fn acquire_on_empty_pool_returns_none() {
        let pool = ConnectionPool::new(test_config());
        let key = PoolKey::new("example.com", 443, "https");
        assert!(pool.acquire(&key).await.is_none());
    }

    #[tokio::test]
    async fn cleanup_on_empty_pool_is_a_no_op() {
        let pool = ConnectionPool::new(test_config());
        pool.cleanup_expired_connections().await;
        let key = PoolKey::new("example.com", 443, "https");
        assert_eq!(pool.len(&key).await, 0);
    }

    #[tokio::test]
    async fn cleanup_interval_matches_config() {
        let pool = ConnectionPool::new(test_config());
        assert_eq!(pool.cleanup_interval(), Duration::from_secs(1));
    }
}
