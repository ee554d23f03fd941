//! Pooled HTTP clients keyed by routing target
//!
//! Each distinct [`TargetKey`] gets its own `reqwest::Client`, so connection pools and
//! proxy settings never leak between destinations. Clients are built lazily on first use
//! and reused for every later request to the same target.
//!
//! # Concurrency
//!
//! Lookups go through a [`DashMap`]. A miss takes the entry lock of one shard only, so
//! concurrent first-time lookups of the same key converge on a single construction while
//! other keys stay unaffected.
//!
//! # Bound
//!
//! The cache holds at most `max_clients` entries. Going over evicts the least recently
//! used client; requests still holding its `Arc` finish normally.

use crate::config::ClientPoolConfig;
use crate::error::{Error, Result};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use url::Url;

/// Identity used to select a pooled client
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum TargetKey {
    /// All traffic goes through this proxy
    Proxy(String),
    /// Direct connection to `scheme://host:port`
    Origin(String),
}

impl TargetKey {
    /// Derive the key for a request URL
    ///
    /// With a proxy configured every request shares the proxy's client; otherwise the
    /// destination origin decides.
    pub fn for_url(url: &str, proxy: Option<&str>) -> Result<Self> {
        if let Some(proxy) = proxy {
            return Ok(TargetKey::Proxy(proxy.to_string()));
        }
        let parsed = Url::parse(url)
            .map_err(|e| Error::InvalidRequest(format!("invalid URL '{}': {}", url, e)))?;
        if parsed.host_str().is_none() {
            return Err(Error::InvalidRequest(format!("URL '{}' has no host", url)));
        }
        Ok(TargetKey::Origin(parsed.origin().ascii_serialization()))
    }
}

impl fmt::Display for TargetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetKey::Proxy(proxy) => write!(f, "proxy:{}", proxy),
            TargetKey::Origin(origin) => write!(f, "{}", origin),
        }
    }
}

struct PooledClient {
    client: Arc<reqwest::Client>,
    last_used: AtomicU64,
}

/// Process-wide cache of HTTP clients
pub struct ClientPool {
    config: ClientPoolConfig,
    clients: DashMap<TargetKey, PooledClient>,
    /// Logical clock for LRU ordering
    clock: AtomicU64,
    created: AtomicUsize,
}

impl ClientPool {
    /// Create an empty pool
    pub fn new(config: ClientPoolConfig) -> Self {
        Self {
            config,
            clients: DashMap::new(),
            clock: AtomicU64::new(0),
            created: AtomicUsize::new(0),
        }
    }

    /// Get the client for `key`, building it on first use
    ///
    /// Fails with [`Error::Config`] when the client cannot be built (e.g. an invalid proxy
    /// URI). Nothing is cached in that case.
    pub fn client(&self, key: &TargetKey) -> Result<Arc<reqwest::Client>> {
        let tick = self.clock.fetch_add(1, Ordering::Relaxed);

        // The read guard must be gone before `entry` takes the write lock on the same shard
        if let Some(entry) = self.clients.get(key) {
            entry.last_used.store(tick, Ordering::Relaxed);
            return Ok(Arc::clone(&entry.client));
        }

        let client = match self.clients.entry(key.clone()) {
            Entry::Occupied(entry) => {
                // Another caller won the race
                entry.get().last_used.store(tick, Ordering::Relaxed);
                Arc::clone(&entry.get().client)
            }
            Entry::Vacant(entry) => {
                let client = Arc::new(self.build(key)?);
                entry.insert(PooledClient {
                    client: Arc::clone(&client),
                    last_used: AtomicU64::new(tick),
                });
                self.created.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(target_key = %key, "created pooled HTTP client");
                client
            }
        };

        self.evict_over_capacity(key);
        Ok(client)
    }

    /// Number of cached clients
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    /// Whether the pool holds no clients
    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    /// Total clients constructed since the pool was created (evicted ones included)
    pub fn created_count(&self) -> usize {
        self.created.load(Ordering::Relaxed)
    }

    fn build(&self, key: &TargetKey) -> Result<reqwest::Client> {
        let mut builder =
            reqwest::Client::builder().pool_idle_timeout(self.config.pool_idle_timeout);
        if let Some(connect_timeout) = self.config.connect_timeout {
            builder = builder.connect_timeout(connect_timeout);
        }

        builder = match key {
            TargetKey::Proxy(proxy) => {
                let proxy = reqwest::Proxy::all(proxy.as_str()).map_err(|e| {
                    Error::config(format!("invalid proxy '{}': {}", proxy, e), "proxy")
                })?;
                builder.proxy(proxy)
            }
            // Keep HTTP(S)_PROXY from the environment out of direct routes
            TargetKey::Origin(_) => builder.no_proxy(),
        };

        builder.build().map_err(|e| {
            Error::config(
                format!("failed to build HTTP client for {}: {}", key, e),
                "client_pool",
            )
        })
    }

    /// Drop least recently used clients until the pool fits `max_clients`
    ///
    /// `keep` is never evicted so a caller does not lose the client it just got.
    fn evict_over_capacity(&self, keep: &TargetKey) {
        while self.clients.len() > self.config.max_clients {
            let victim = self
                .clients
                .iter()
                .filter(|entry| entry.key() != keep)
                .min_by_key(|entry| entry.value().last_used.load(Ordering::Relaxed))
                .map(|entry| entry.key().clone());

            match victim {
                Some(victim) => {
                    if self.clients.remove(&victim).is_some() {
                        tracing::debug!(target_key = %victim, "evicted pooled HTTP client");
                    }
                }
                None => break,
            }
        }
    }
}
