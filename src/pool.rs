//! Host-keyed connection pool with LRU eviction and idle expiry.
//!
//! The [`ConnectionPool`] owns a bounded set of entries, each binding a
//! dedicated [`reqwest::Client`] to one `(host, port, scheme)` endpoint.
//! Acquisition prunes expired idle entries, reuses an idle match, creates
//! a fresh entry while under the cap, or reinitializes the least-recently
//! used idle entry for the new endpoint. When every entry is in use the
//! pool fails fast with [`Error::NoAvailableConnections`] — it never waits
//! for another caller.
//!
//! [`PooledClient`] is the request-level facade: it draws a connection for
//! the request's endpoint, dispatches through it, and releases it once the
//! response body has been read.

use crate::http::{HttpRequest, HttpResponse, dispatch};
use crate::{Error, Result};
use log::debug;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Pool configuration.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Upper bound on pool entries.
    pub max_connections: usize,
    /// Idle entries older than this are pruned on acquire.
    pub max_idle: Duration,
    /// Per-request timeout configured into each entry's client.
    pub connection_timeout: Duration,
    /// TCP keep-alive on pooled sockets.
    pub keep_alive: bool,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: 10,
            max_idle: Duration::from_secs(300),
            connection_timeout: Duration::from_secs(30),
            keep_alive: true,
        }
    }
}

impl PoolConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    pub fn with_max_idle(mut self, max_idle: Duration) -> Self {
        self.max_idle = max_idle;
        self
    }

    pub fn with_connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout = timeout;
        self
    }

    pub fn with_keep_alive(mut self, keep_alive: bool) -> Self {
        self.keep_alive = keep_alive;
        self
    }
}

struct PoolEntry {
    id: u64,
    client: reqwest::Client,
    host: String,
    port: u16,
    is_https: bool,
    last_used: Instant,
    in_use: bool,
}

/// A leased pool entry. Must be handed back via [`ConnectionPool::release`];
/// until then the entry stays marked in-use and cannot be evicted.
#[derive(Debug, Clone)]
pub struct PooledConnection {
    client: reqwest::Client,
    host: String,
    port: u16,
    is_https: bool,
    entry_id: u64,
}

impl PooledConnection {
    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn is_https(&self) -> bool {
        self.is_https
    }
}

/// Snapshot of pool occupancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    pub total: usize,
    pub active: usize,
    pub idle: usize,
    /// Idle entries already past `max_idle`, not yet pruned.
    pub expired: usize,
}

/// See the module docs.
pub struct ConnectionPool {
    entries: Mutex<Vec<PoolEntry>>,
    next_id: AtomicU64,
    config: PoolConfig,
}

impl ConnectionPool {
    pub fn new(config: PoolConfig) -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
            config,
        }
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    fn build_client(&self) -> Result<reqwest::Client> {
        let mut builder = reqwest::Client::builder().timeout(self.config.connection_timeout);
        builder = if self.config.keep_alive {
            builder.tcp_keepalive(Some(Duration::from_secs(60)))
        } else {
            builder.tcp_keepalive(None)
        };
        Ok(builder.build()?)
    }

    /// Lease a connection for the given URL's endpoint.
    pub fn get_connection(&self, url: &str) -> Result<PooledConnection> {
        let (host, port, is_https) = parse_endpoint(url)?;
        let now = Instant::now();
        let mut entries = self.entries.lock().unwrap();

        // Prune idle entries past their keep-around window.
        let before = entries.len();
        entries.retain(|e| e.in_use || now.duration_since(e.last_used) <= self.config.max_idle);
        if entries.len() < before {
            debug!("pruned {} expired pool entries", before - entries.len());
        }

        // Reuse an idle entry already bound to this endpoint.
        if let Some(entry) = entries
            .iter_mut()
            .find(|e| !e.in_use && e.host == host && e.port == port && e.is_https == is_https)
        {
            entry.in_use = true;
            entry.last_used = now;
            return Ok(lease(entry));
        }

        // Room for a fresh entry.
        if entries.len() < self.config.max_connections {
            let entry = PoolEntry {
                id: self.next_id.fetch_add(1, Ordering::Relaxed),
                client: self.build_client()?,
                host,
                port,
                is_https,
                last_used: now,
                in_use: true,
            };
            let conn = lease(&entry);
            entries.push(entry);
            return Ok(conn);
        }

        // Reinitialize the least-recently-used idle entry for this endpoint.
        match entries
            .iter_mut()
            .filter(|e| !e.in_use)
            .min_by_key(|e| e.last_used)
        {
            Some(entry) => {
                debug!(
                    "evicting LRU pool entry for {}:{} in favor of {}:{}",
                    entry.host, entry.port, host, port
                );
                entry.client = self.build_client()?;
                entry.host = host;
                entry.port = port;
                entry.is_https = is_https;
                entry.last_used = now;
                entry.in_use = true;
                Ok(lease(entry))
            }
            None => Err(Error::NoAvailableConnections),
        }
    }

    /// Return a leased connection: clears in-use and stamps `last_used`.
    pub fn release(&self, conn: &PooledConnection) {
        let mut entries = self.entries.lock().unwrap();
        if let Some(entry) = entries.iter_mut().find(|e| e.id == conn.entry_id) {
            entry.in_use = false;
            entry.last_used = Instant::now();
        }
    }

    pub fn stats(&self) -> PoolStats {
        let now = Instant::now();
        let entries = self.entries.lock().unwrap();
        let total = entries.len();
        let active = entries.iter().filter(|e| e.in_use).count();
        let expired = entries
            .iter()
            .filter(|e| !e.in_use && now.duration_since(e.last_used) > self.config.max_idle)
            .count();
        PoolStats {
            total,
            active,
            idle: total - active,
            expired,
        }
    }
}

impl std::fmt::Debug for ConnectionPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let stats = self.stats();
        f.debug_struct("ConnectionPool")
            .field("config", &self.config)
            .field("stats", &stats)
            .finish()
    }
}

fn lease(entry: &PoolEntry) -> PooledConnection {
    PooledConnection {
        client: entry.client.clone(),
        host: entry.host.clone(),
        port: entry.port,
        is_https: entry.is_https,
        entry_id: entry.id,
    }
}

/// Split a URL into its pool key: host, port (443/80 defaults), scheme.
pub(crate) fn parse_endpoint(url: &str) -> Result<(String, u16, bool)> {
    let parsed = reqwest::Url::parse(url)
        .map_err(|e| Error::invalid_input(format!("invalid URL '{url}': {e}")))?;
    let is_https = match parsed.scheme() {
        "https" => true,
        "http" => false,
        other => {
            return Err(Error::invalid_input(format!(
                "unsupported URL scheme '{other}'"
            )));
        }
    };
    let host = parsed
        .host_str()
        .ok_or_else(|| Error::invalid_input(format!("URL '{url}' has no host")))?
        .to_string();
    let port = parsed.port().unwrap_or(if is_https { 443 } else { 80 });
    Ok((host, port, is_https))
}

/// Pool-backed request executor.
#[derive(Debug)]
pub struct PooledClient {
    pool: Arc<ConnectionPool>,
    user_agent: String,
    bearer_token: Option<String>,
}

impl PooledClient {
    pub fn new(pool: Arc<ConnectionPool>) -> Self {
        Self {
            pool,
            user_agent: concat!("agent-substrate/", env!("CARGO_PKG_VERSION")).to_string(),
            bearer_token: None,
        }
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }

    pub fn pool(&self) -> &Arc<ConnectionPool> {
        &self.pool
    }

    /// Acquire, dispatch, release.
    pub async fn execute(&self, request: &HttpRequest) -> Result<HttpResponse> {
        let conn = self.pool.get_connection(&request.url)?;
        let result = dispatch(
            conn.client(),
            request,
            &self.user_agent,
            self.bearer_token.as_deref(),
        )
        .await;
        self.pool.release(&conn);
        result
    }
}
