//! Persistent storage backends for events.
//!
//! A [`StorageBackend`] is the polymorphic persistence seam behind the
//! recorder: store, query, delete, count, clear, close. Two implementations
//! ship with the substrate:
//!
//! - [`MemoryBackend`] — an insertion-ordered list under a mutex. Every
//!   operation hands back owned clones, so callers can freely mutate or
//!   drop results.
//! - [`FileBackend`] — an append-only log, one JSON document per line.
//!   Queries re-read the file and skip lines that fail to parse (a torn
//!   write cannot be trusted). Deletion is unsupported by design; `clear`
//!   truncates the whole log.

use crate::event::Event;
use crate::filter::FilterExpr;
use crate::{Error, Result};
use async_trait::async_trait;
use log::warn;
use std::path::PathBuf;
use std::sync::Mutex as StdMutex;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::io::AsyncWriteExt;

/// Capability set every event store provides.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Persist one event.
    async fn store(&self, event: &Event) -> Result<()>;

    /// Events in insertion order, optionally filtered, stopping at `limit`.
    async fn retrieve(
        &self,
        filter: Option<&FilterExpr>,
        limit: Option<usize>,
    ) -> Result<Vec<Event>>;

    /// Events whose id appears in `ids`, in insertion order.
    async fn retrieve_by_ids(&self, ids: &[String]) -> Result<Vec<Event>>;

    /// Remove events by id; returns how many were removed.
    async fn delete_by_ids(&self, ids: &[String]) -> Result<usize>;

    /// Remove events matching a filter; returns how many were removed.
    async fn delete_by_filter(&self, filter: &FilterExpr) -> Result<usize>;

    /// Number of stored events, optionally filtered.
    async fn count(&self, filter: Option<&FilterExpr>) -> Result<usize>;

    /// Remove everything.
    async fn clear(&self) -> Result<()>;

    /// Release resources; subsequent calls fail with [`Error::Lifecycle`].
    async fn close(&self) -> Result<()>;
}

fn passes(filter: Option<&FilterExpr>, event: &Event) -> bool {
    filter.map_or(true, |f| f.matches(event))
}

// ---------------------------------------------------------------------------
// Memory backend
// ---------------------------------------------------------------------------

/// In-memory event store, insertion-ordered.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    events: StdMutex<Vec<Event>>,
    closed: AtomicBool,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(Error::lifecycle("memory backend is closed"));
        }
        Ok(())
    }
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    async fn store(&self, event: &Event) -> Result<()> {
        self.ensure_open()?;
        self.events.lock().unwrap().push(event.clone());
        Ok(())
    }

    async fn retrieve(
        &self,
        filter: Option<&FilterExpr>,
        limit: Option<usize>,
    ) -> Result<Vec<Event>> {
        self.ensure_open()?;
        let events = self.events.lock().unwrap();
        let mut out = Vec::new();
        for event in events.iter() {
            if passes(filter, event) {
                out.push(event.clone());
                if limit.is_some_and(|n| out.len() >= n) {
                    break;
                }
            }
        }
        Ok(out)
    }

    async fn retrieve_by_ids(&self, ids: &[String]) -> Result<Vec<Event>> {
        self.ensure_open()?;
        let events = self.events.lock().unwrap();
        Ok(events
            .iter()
            .filter(|e| ids.contains(&e.id))
            .cloned()
            .collect())
    }

    async fn delete_by_ids(&self, ids: &[String]) -> Result<usize> {
        self.ensure_open()?;
        let mut events = self.events.lock().unwrap();
        let before = events.len();
        events.retain(|e| !ids.contains(&e.id));
        Ok(before - events.len())
    }

    async fn delete_by_filter(&self, filter: &FilterExpr) -> Result<usize> {
        self.ensure_open()?;
        let mut events = self.events.lock().unwrap();
        let before = events.len();
        events.retain(|e| !filter.matches(e));
        Ok(before - events.len())
    }

    async fn count(&self, filter: Option<&FilterExpr>) -> Result<usize> {
        self.ensure_open()?;
        let events = self.events.lock().unwrap();
        Ok(events.iter().filter(|e| passes(filter, e)).count())
    }

    async fn clear(&self) -> Result<()> {
        self.ensure_open()?;
        self.events.lock().unwrap().clear();
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.ensure_open()?;
        self.closed.store(true, Ordering::SeqCst);
        self.events.lock().unwrap().clear();
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// File (append-log) backend
// ---------------------------------------------------------------------------

/// Append-only event log: one JSON document per line.
#[derive(Debug)]
pub struct FileBackend {
    path: PathBuf,
    io: tokio::sync::Mutex<()>,
    closed: AtomicBool,
}

impl FileBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            io: tokio::sync::Mutex::new(()),
            closed: AtomicBool::new(false),
        }
    }

    /// Path of the underlying log file.
    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(Error::lifecycle("file backend is closed"));
        }
        Ok(())
    }

    /// Read the whole log, skipping lines that fail to parse.
    /// A missing file reads as an empty log.
    async fn read_events(&self) -> Result<Vec<Event>> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };
        let mut events = Vec::new();
        for line in contents.lines() {
            if line.trim().is_empty() {
                continue;
            }
            match Event::from_json(line) {
                Ok(event) => events.push(event),
                Err(err) => warn!("skipping unparseable event log line: {err}"),
            }
        }
        Ok(events)
    }
}

#[async_trait]
impl StorageBackend for FileBackend {
    async fn store(&self, event: &Event) -> Result<()> {
        self.ensure_open()?;
        let line = event.to_json()?;
        let _guard = self.io.lock().await;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.write_all(b"\n").await?;
        file.flush().await?;
        Ok(())
    }

    async fn retrieve(
        &self,
        filter: Option<&FilterExpr>,
        limit: Option<usize>,
    ) -> Result<Vec<Event>> {
        self.ensure_open()?;
        let _guard = self.io.lock().await;
        let mut out = Vec::new();
        for event in self.read_events().await? {
            if passes(filter, &event) {
                out.push(event);
                if limit.is_some_and(|n| out.len() >= n) {
                    break;
                }
            }
        }
        Ok(out)
    }

    async fn retrieve_by_ids(&self, ids: &[String]) -> Result<Vec<Event>> {
        self.ensure_open()?;
        let _guard = self.io.lock().await;
        Ok(self
            .read_events()
            .await?
            .into_iter()
            .filter(|e| ids.contains(&e.id))
            .collect())
    }

    async fn delete_by_ids(&self, _ids: &[String]) -> Result<usize> {
        self.ensure_open()?;
        Err(Error::unsupported(
            "append-only event log does not support delete_by_ids",
        ))
    }

    async fn delete_by_filter(&self, _filter: &FilterExpr) -> Result<usize> {
        self.ensure_open()?;
        Err(Error::unsupported(
            "append-only event log does not support delete_by_filter",
        ))
    }

    async fn count(&self, filter: Option<&FilterExpr>) -> Result<usize> {
        self.ensure_open()?;
        let _guard = self.io.lock().await;
        Ok(self
            .read_events()
            .await?
            .iter()
            .filter(|e| passes(filter, e))
            .count())
    }

    async fn clear(&self) -> Result<()> {
        self.ensure_open()?;
        let _guard = self.io.lock().await;
        tokio::fs::write(&self.path, b"").await?;
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.ensure_open()?;
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}
