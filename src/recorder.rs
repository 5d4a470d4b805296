//! Event recorder: a filtered gate in front of a storage backend.
//!
//! The [`EventRecorder`] persists the subset of the event stream that
//! passes all of its named filters (conjunctive). It can be called
//! explicitly via [`EventRecorder::record`], or attached to an emitter as
//! an ordinary subscription with [`EventRecorder::attach`]. Recording can
//! be toggled at any time; the toggle is a single atomic read at the head
//! of `record`.

use crate::emitter::{EventEmitter, SubscribeOptions, SubscriptionId};
use crate::event::Event;
use crate::filter::FilterExpr;
use crate::storage::StorageBackend;
use crate::{Error, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Persists matching events through a [`StorageBackend`].
pub struct EventRecorder {
    backend: Arc<dyn StorageBackend>,
    filters: Mutex<Vec<(String, FilterExpr)>>,
    recording: AtomicBool,
}

impl EventRecorder {
    /// New recorder over the given backend; recording starts enabled.
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        Self {
            backend,
            filters: Mutex::new(Vec::new()),
            recording: AtomicBool::new(true),
        }
    }

    /// Add a named filter. All filters must pass for an event to be stored.
    pub fn add_filter(&self, name: impl Into<String>, filter: FilterExpr) {
        self.filters.lock().unwrap().push((name.into(), filter));
    }

    /// Remove a named filter. Returns whether it existed.
    pub fn remove_filter(&self, name: &str) -> bool {
        let mut filters = self.filters.lock().unwrap();
        let before = filters.len();
        filters.retain(|(n, _)| n != name);
        filters.len() < before
    }

    pub fn start_recording(&self) {
        self.recording.store(true, Ordering::SeqCst);
    }

    pub fn stop_recording(&self) {
        self.recording.store(false, Ordering::SeqCst);
    }

    pub fn is_recording(&self) -> bool {
        self.recording.load(Ordering::SeqCst)
    }

    /// Store the event iff recording is on and every filter passes.
    /// Returns whether it was stored.
    pub async fn record(&self, event: &Event) -> Result<bool> {
        if !self.is_recording() {
            return Ok(false);
        }
        {
            let filters = self.filters.lock().unwrap();
            if !filters.iter().all(|(_, f)| f.matches(event)) {
                return Ok(false);
            }
        }
        self.backend.store(event).await?;
        Ok(true)
    }

    /// Subscribe this recorder to an emitter pattern. Storage failures are
    /// reported through the emitter's error handler, not the producer.
    pub fn attach(
        self: &Arc<Self>,
        emitter: &EventEmitter,
        pattern: impl Into<String>,
    ) -> SubscriptionId {
        let recorder = self.clone();
        emitter.subscribe_async(
            pattern,
            move |event| {
                let recorder = recorder.clone();
                async move {
                    recorder
                        .record(&event)
                        .await
                        .map(|_| ())
                        .map_err(|err| Error::handler(format!("recorder store failed: {err}")))
                }
            },
            SubscribeOptions::default(),
        )
    }

    /// Query stored events through the backend.
    pub async fn query(
        &self,
        filter: Option<&FilterExpr>,
        limit: Option<usize>,
    ) -> Result<Vec<Event>> {
        self.backend.retrieve(filter, limit).await
    }

    pub async fn query_by_ids(&self, ids: &[String]) -> Result<Vec<Event>> {
        self.backend.retrieve_by_ids(ids).await
    }

    pub async fn count(&self, filter: Option<&FilterExpr>) -> Result<usize> {
        self.backend.count(filter).await
    }

    pub async fn clear(&self) -> Result<()> {
        self.backend.clear().await
    }

    pub async fn close(&self) -> Result<()> {
        self.backend.close().await
    }
}
