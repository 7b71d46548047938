//! Redis lock provider implementation.

use std::sync::Arc;
use std::time::Duration;

use fred::prelude::*;
use quorum_lock_core::error::{LockError, LockResult};
use quorum_lock_core::traits::LockProvider;
use tracing::info;

use crate::lock::RedisDistributedLock;
use crate::node::LockNode;
use crate::options::RedLockOptions;

/// Environment variable read by [`RedisLockProviderBuilder::urls_from_env`].
pub const REDLOCK_URLS_ENV: &str = "REDLOCK_URLS";

/// Builder for Redis lock provider configuration.
pub struct RedisLockProviderBuilder {
    urls: Vec<String>,
    clients: Vec<RedisClient>,
    options: RedLockOptions,
}

impl RedisLockProviderBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            urls: vec![],
            clients: vec![],
            options: RedLockOptions::default(),
        }
    }

    /// Adds a Redis server URL.
    ///
    /// For RedLock, add multiple independent servers (ideally 3 or 5).
    /// Replicas of one another do not count as independent.
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.urls.push(url.into());
        self
    }

    /// Adds multiple Redis server URLs.
    pub fn urls(mut self, urls: &[impl AsRef<str>]) -> Self {
        for url in urls {
            self.urls.push(url.as_ref().to_string());
        }
        self
    }

    /// Adds the comma-separated URLs found in `REDLOCK_URLS`, if set.
    pub fn urls_from_env(mut self) -> Self {
        if let Ok(value) = std::env::var(REDLOCK_URLS_ENV) {
            self.urls.extend(
                value
                    .split(',')
                    .map(str::trim)
                    .filter(|url| !url.is_empty())
                    .map(str::to_string),
            );
        }
        self
    }

    /// Uses an existing, already connected Redis client.
    pub fn client(mut self, client: RedisClient) -> Self {
        self.clients.push(client);
        self
    }

    /// Replaces all timing and naming options.
    pub fn options(mut self, options: RedLockOptions) -> Self {
        self.options = options;
        self
    }

    /// Sets the lock expiry time.
    pub fn expiry(mut self, expiry: Duration) -> Self {
        self.options.expiry = expiry;
        self
    }

    /// Sets the lock extension cadence.
    pub fn extension_cadence(mut self, cadence: Duration) -> Self {
        self.options.extension_cadence = cadence;
        self
    }

    /// Sets the minimum validity time.
    ///
    /// After acquiring, at least this much time must remain on the lock
    /// for the acquisition to be considered successful.
    pub fn min_validity(mut self, validity: Duration) -> Self {
        self.options.min_validity = validity;
        self
    }

    /// Sets the pause between attempts made by `acquire`.
    pub fn try_lock_interval(mut self, interval: Duration) -> Self {
        self.options.try_lock_interval = interval;
        self
    }

    /// Sets the prefix prepended to lock names.
    pub fn key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.options.key_prefix = prefix.into();
        self
    }

    /// Connects to every URL and builds the provider.
    pub async fn build(self) -> LockResult<RedisLockProvider> {
        let mut clients = self.clients;

        // Create clients from URLs if provided
        for url in self.urls {
            let config = RedisConfig::from_url(&url).map_err(|e| {
                LockError::Connection(Box::new(std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    format!("invalid Redis URL: {}", e),
                )))
            })?;

            let client = RedisClient::new(config, None, None, None);
            client.connect();
            client.wait_for_connect().await.map_err(|e| {
                LockError::Connection(Box::new(std::io::Error::other(format!(
                    "failed to connect to Redis: {}",
                    e
                ))))
            })?;

            clients.push(client);
        }

        info!(servers = clients.len(), "redis lock provider ready");
        RedisLockProvider::with_nodes(clients, self.options)
    }
}

impl Default for RedisLockProviderBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Provider for quorum locks over a fixed set of nodes.
///
/// Every lock it creates shares the same nodes and options.
pub struct RedisLockProvider<N: LockNode = RedisClient> {
    nodes: Arc<[N]>,
    options: Arc<RedLockOptions>,
}

impl RedisLockProvider {
    /// Returns a new builder for configuring the provider.
    pub fn builder() -> RedisLockProviderBuilder {
        RedisLockProviderBuilder::new()
    }

    /// Creates a provider using the specified Redis URL.
    pub async fn new(url: impl Into<String>) -> LockResult<Self> {
        Self::builder().url(url).build().await
    }
}

impl<N: LockNode> RedisLockProvider<N> {
    /// Creates a provider over already constructed nodes.
    ///
    /// Fails when `nodes` is empty or the options are unusable.
    pub fn with_nodes(
        nodes: impl IntoIterator<Item = N>,
        options: RedLockOptions,
    ) -> LockResult<Self> {
        let nodes: Arc<[N]> = nodes.into_iter().collect();
        if nodes.is_empty() {
            return Err(LockError::InvalidConfiguration(
                "no Redis clients or URLs provided".to_string(),
            ));
        }
        options.validate()?;

        Ok(Self {
            nodes,
            options: Arc::new(options),
        })
    }

    /// The configured nodes, in order.
    pub fn nodes(&self) -> &[N] {
        &self.nodes
    }

    /// Options shared by every lock this provider creates.
    pub fn options(&self) -> &RedLockOptions {
        &self.options
    }
}

impl<N: LockNode> LockProvider for RedisLockProvider<N> {
    type Lock = RedisDistributedLock<N>;

    fn create_lock(&self, name: &str) -> Self::Lock {
        RedisDistributedLock::new(name, self.nodes.clone(), self.options.clone())
    }
}
