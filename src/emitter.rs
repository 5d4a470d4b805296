//! Pattern-matched pub/sub event emitter with optional batched async delivery.
//!
//! The [`EventEmitter`] accepts events from any number of producers and
//! delivers each to every [`Subscription`] whose pattern and filter options
//! match. Two scheduling models are supported:
//!
//! - **Sync** (default): [`EventEmitter::emit`] dispatches inline, blocking
//!   the producer for the whole delivery walk.
//! - **Async** (`async_processing`): `emit` appends to a bounded FIFO queue
//!   and returns; a single background worker wakes every `flush_interval`,
//!   drains up to `batch_size` events, and dispatches them. [`EventEmitter::stop`]
//!   joins the worker and drains whatever remains, so no accepted event is
//!   lost on shutdown.
//!
//! Dispatch snapshots the matching subscriptions under the lock and invokes
//! handlers with the lock released: a slow or failing handler never blocks
//! producers or other subscribers. Handler errors are absorbed — retried for
//! async subscriptions per [`SubscribeOptions`], then routed to the
//! configured error handler — and never propagate to the producer.
//!
//! # Pattern language
//!
//! Literal equality wins. A pattern ending in `*` is a prefix match
//! (`agent.*` matches `agent.llm.started`). Otherwise both sides split on
//! `.` and compare segment-by-segment, `*` matching exactly one segment;
//! both must exhaust together (`agent.*.started` matches
//! `agent.llm.started` but not `agent.started`).
//!
//! # Example
//!
//! ```
//! use agent_substrate::{EmitterConfig, Event, EventEmitter, SubscribeOptions};
//! use std::sync::{Arc, Mutex};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> agent_substrate::Result<()> {
//! let emitter = EventEmitter::new(EmitterConfig::default());
//! let seen = Arc::new(Mutex::new(Vec::new()));
//! let sink = seen.clone();
//!
//! emitter.subscribe("tool.*", move |event| {
//!     sink.lock().unwrap().push(event.name.clone());
//!     Ok(())
//! }, SubscribeOptions::default());
//!
//! emitter.emit(Event::tool_invoked("search", serde_json::json!({"q": "rust"}))).await?;
//! assert_eq!(seen.lock().unwrap().as_slice(), ["tool.invoked"]);
//! # Ok(())
//! # }
//! ```

use crate::event::{Event, EventCategory, Severity};
use crate::{Error, Result};
use futures::future::BoxFuture;
use log::{debug, warn};
use std::collections::VecDeque;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

/// Identifier returned by `subscribe` and consumed by
/// `unsubscribe`/`pause`/`resume`.
pub type SubscriptionId = u64;

/// Synchronous subscription handler.
pub type SyncHandler = Arc<dyn Fn(&Event) -> Result<()> + Send + Sync>;

/// Asynchronous subscription handler: owns its event and returns a boxed
/// future, mirroring the tool-handler shape used elsewhere in the substrate.
pub type AsyncHandler = Arc<dyn Fn(Event) -> BoxFuture<'static, Result<()>> + Send + Sync>;

/// Sink for handler errors that exhausted their retries.
pub type ErrorHandler = Arc<dyn Fn(&Error, &Event) + Send + Sync>;

#[derive(Clone)]
enum HandlerKind {
    Sync(SyncHandler),
    Async(AsyncHandler),
}

/// Per-subscription delivery options.
#[derive(Clone)]
pub struct SubscribeOptions {
    /// Deliver only events at or above this severity.
    pub min_severity: Option<Severity>,
    /// Deliver only events whose category is in this set.
    pub categories: Option<Vec<EventCategory>>,
    /// Deliver only events carrying every listed tag.
    pub required_tags: Vec<String>,
    /// Re-invocations of a failing async handler before giving up.
    pub max_retries: u32,
    /// Pause between async-handler retries.
    pub retry_delay: Duration,
}

impl Default for SubscribeOptions {
    fn default() -> Self {
        Self {
            min_severity: None,
            categories: None,
            required_tags: Vec::new(),
            max_retries: 0,
            retry_delay: Duration::from_millis(100),
        }
    }
}

impl SubscribeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_min_severity(mut self, severity: Severity) -> Self {
        self.min_severity = Some(severity);
        self
    }

    pub fn with_categories(mut self, categories: Vec<EventCategory>) -> Self {
        self.categories = Some(categories);
        self
    }

    pub fn with_required_tag(mut self, tag: impl Into<String>) -> Self {
        self.required_tags.push(tag.into());
        self
    }

    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }
}

impl std::fmt::Debug for SubscribeOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscribeOptions")
            .field("min_severity", &self.min_severity)
            .field("categories", &self.categories)
            .field("required_tags", &self.required_tags)
            .field("max_retries", &self.max_retries)
            .field("retry_delay", &self.retry_delay)
            .finish()
    }
}

struct Subscription {
    id: SubscriptionId,
    pattern: String,
    handler: HandlerKind,
    options: SubscribeOptions,
    active: bool,
}

/// Emitter configuration.
#[derive(Clone)]
pub struct EmitterConfig {
    /// Bound on the async-mode queue; `emit` fails with
    /// [`Error::QueueFull`] at saturation rather than dropping the oldest.
    pub max_queue_size: usize,
    /// Queue + background worker instead of inline dispatch.
    pub async_processing: bool,
    /// Events drained per worker wakeup.
    pub batch_size: usize,
    /// Worker wakeup period.
    pub flush_interval: Duration,
    /// Sink for handler errors; defaults to a `warn!` log line.
    pub error_handler: Option<ErrorHandler>,
}

impl Default for EmitterConfig {
    fn default() -> Self {
        Self {
            max_queue_size: 10_000,
            async_processing: false,
            batch_size: 100,
            flush_interval: Duration::from_millis(100),
            error_handler: None,
        }
    }
}

impl EmitterConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_queue_size(mut self, size: usize) -> Self {
        self.max_queue_size = size;
        self
    }

    pub fn with_async_processing(mut self, enabled: bool) -> Self {
        self.async_processing = enabled;
        self
    }

    pub fn with_batch_size(mut self, size: usize) -> Self {
        self.batch_size = size;
        self
    }

    pub fn with_flush_interval(mut self, interval: Duration) -> Self {
        self.flush_interval = interval;
        self
    }

    pub fn with_error_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&Error, &Event) + Send + Sync + 'static,
    {
        self.error_handler = Some(Arc::new(handler));
        self
    }
}

impl std::fmt::Debug for EmitterConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmitterConfig")
            .field("max_queue_size", &self.max_queue_size)
            .field("async_processing", &self.async_processing)
            .field("batch_size", &self.batch_size)
            .field("flush_interval", &self.flush_interval)
            .field("error_handler", &self.error_handler.as_ref().map(|_| "<fn>"))
            .finish()
    }
}

struct EmitterShared {
    subscriptions: RwLock<Vec<Subscription>>,
    queue: Mutex<VecDeque<Event>>,
    running: AtomicBool,
    next_id: AtomicU64,
    shutdown: Notify,
    config: EmitterConfig,
}

/// Pub/sub emitter; see the module docs for the delivery model.
pub struct EventEmitter {
    shared: Arc<EmitterShared>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl EventEmitter {
    pub fn new(config: EmitterConfig) -> Self {
        Self {
            shared: Arc::new(EmitterShared {
                subscriptions: RwLock::new(Vec::new()),
                queue: Mutex::new(VecDeque::new()),
                running: AtomicBool::new(false),
                next_id: AtomicU64::new(1),
                shutdown: Notify::new(),
                config,
            }),
            worker: Mutex::new(None),
        }
    }

    /// Register a synchronous handler for a pattern.
    pub fn subscribe<F>(
        &self,
        pattern: impl Into<String>,
        handler: F,
        options: SubscribeOptions,
    ) -> SubscriptionId
    where
        F: Fn(&Event) -> Result<()> + Send + Sync + 'static,
    {
        self.add_subscription(pattern.into(), HandlerKind::Sync(Arc::new(handler)), options)
    }

    /// Register an asynchronous handler for a pattern.
    pub fn subscribe_async<F, Fut>(
        &self,
        pattern: impl Into<String>,
        handler: F,
        options: SubscribeOptions,
    ) -> SubscriptionId
    where
        F: Fn(Event) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let handler: AsyncHandler = Arc::new(move |event| Box::pin(handler(event)));
        self.add_subscription(pattern.into(), HandlerKind::Async(handler), options)
    }

    fn add_subscription(
        &self,
        pattern: String,
        handler: HandlerKind,
        options: SubscribeOptions,
    ) -> SubscriptionId {
        let id = self.shared.next_id.fetch_add(1, Ordering::Relaxed);
        let mut subs = self.shared.subscriptions.write().unwrap();
        subs.push(Subscription {
            id,
            pattern,
            handler,
            options,
            active: true,
        });
        id
    }

    /// Remove a subscription. Returns whether it existed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subs = self.shared.subscriptions.write().unwrap();
        let before = subs.len();
        subs.retain(|s| s.id != id);
        subs.len() < before
    }

    /// Stop delivering to a subscription without removing it.
    pub fn pause(&self, id: SubscriptionId) -> bool {
        self.set_active(id, false)
    }

    /// Resume a paused subscription.
    pub fn resume(&self, id: SubscriptionId) -> bool {
        self.set_active(id, true)
    }

    fn set_active(&self, id: SubscriptionId, active: bool) -> bool {
        let mut subs = self.shared.subscriptions.write().unwrap();
        match subs.iter_mut().find(|s| s.id == id) {
            Some(sub) => {
                sub.active = active;
                true
            }
            None => false,
        }
    }

    /// Number of active (non-paused) subscriptions.
    pub fn active_subscriptions(&self) -> usize {
        self.shared
            .subscriptions
            .read()
            .unwrap()
            .iter()
            .filter(|s| s.active)
            .count()
    }

    /// Hand an event to the emitter.
    ///
    /// In async mode this is an O(1) queue append under the lock, failing
    /// with [`Error::QueueFull`] when the bound is reached. In sync mode it
    /// dispatches inline and returns once every matching handler ran.
    pub async fn emit(&self, event: Event) -> Result<()> {
        if self.shared.config.async_processing {
            let mut queue = self.shared.queue.lock().unwrap();
            if queue.len() >= self.shared.config.max_queue_size {
                return Err(Error::QueueFull);
            }
            queue.push_back(event);
            Ok(())
        } else {
            self.shared.dispatch(&event).await;
            Ok(())
        }
    }

    /// Dispatch immediately, bypassing the queue in async mode.
    pub async fn emit_now(&self, event: Event) {
        self.shared.dispatch(&event).await;
    }

    /// Start the background worker. Idempotent; a no-op in sync mode.
    pub fn start(&self) {
        if !self.shared.config.async_processing {
            return;
        }
        if self
            .shared
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return;
        }

        let shared = self.shared.clone();
        let handle = tokio::spawn(async move {
            debug!("event emitter worker started");
            let mut ticker = tokio::time::interval(shared.config.flush_interval);
            // First tick fires immediately; consume it so the loop sleeps
            // a full interval before its first drain.
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        shared.drain_batch().await;
                    }
                    _ = shared.shutdown.notified() => {
                        break;
                    }
                }
            }
            debug!("event emitter worker exited");
        });
        *self.worker.lock().unwrap() = Some(handle);
    }

    /// Stop the worker and drain the queue.
    ///
    /// The worker exits at its next wakeup; any queued events are then
    /// delivered synchronously, in insertion order, before this returns.
    /// In-flight handler invocations are never interrupted.
    pub async fn stop(&self) {
        if self
            .shared
            .running
            .compare_exchange(true, false, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            self.shared.shutdown.notify_one();
            let handle = self.worker.lock().unwrap().take();
            if let Some(handle) = handle {
                let _ = handle.await;
            }
        }
        self.flush().await;
    }

    /// Drain every queued event right now, in insertion order.
    pub async fn flush(&self) {
        loop {
            let batch: Vec<Event> = {
                let mut queue = self.shared.queue.lock().unwrap();
                if queue.is_empty() {
                    return;
                }
                queue.drain(..).collect()
            };
            for event in &batch {
                self.shared.dispatch(event).await;
            }
        }
    }

    /// Events currently waiting in the queue.
    pub fn queued_events(&self) -> usize {
        self.shared.queue.lock().unwrap().len()
    }
}

impl EmitterShared {
    async fn drain_batch(&self) {
        let batch: Vec<Event> = {
            let mut queue = self.queue.lock().unwrap();
            let n = queue.len().min(self.config.batch_size);
            queue.drain(..n).collect()
        };
        if !batch.is_empty() {
            debug!("draining {} queued events", batch.len());
        }
        for event in &batch {
            self.dispatch(event).await;
        }
    }

    async fn dispatch(&self, event: &Event) {
        // Snapshot matching subscriptions, then invoke with the lock released.
        let matched: Vec<(HandlerKind, SubscribeOptions)> = {
            let subs = self.subscriptions.read().unwrap();
            subs.iter()
                .filter(|s| s.active && subscription_matches(s, event))
                .map(|s| (s.handler.clone(), s.options.clone()))
                .collect()
        };

        for (handler, options) in matched {
            match handler {
                HandlerKind::Sync(h) => {
                    if let Err(err) = h(event) {
                        self.report_handler_error(err, event);
                    }
                }
                HandlerKind::Async(h) => {
                    let mut attempt = 0;
                    loop {
                        match h(event.clone()).await {
                            Ok(()) => break,
                            Err(err) => {
                                if attempt >= options.max_retries {
                                    self.report_handler_error(err, event);
                                    break;
                                }
                                attempt += 1;
                                tokio::time::sleep(options.retry_delay).await;
                            }
                        }
                    }
                }
            }
        }
    }

    fn report_handler_error(&self, err: Error, event: &Event) {
        match &self.config.error_handler {
            Some(handler) => handler(&err, event),
            None => warn!("handler failed for event '{}': {}", event.name, err),
        }
    }
}

fn subscription_matches(sub: &Subscription, event: &Event) -> bool {
    if !pattern_matches(&event.name, &sub.pattern) {
        return false;
    }
    if let Some(min) = sub.options.min_severity {
        if event.severity < min {
            return false;
        }
    }
    if let Some(categories) = &sub.options.categories {
        if !categories.contains(&event.category) {
            return false;
        }
    }
    sub.options
        .required_tags
        .iter()
        .all(|tag| event.metadata.tags.iter().any(|t| t == tag))
}

/// Match a dotted event name against a subscription pattern.
///
/// Literal equality wins; a trailing `*` is a prefix match; otherwise the
/// comparison is segment-by-segment with `*` matching exactly one segment,
/// and both sides must exhaust together.
pub fn pattern_matches(name: &str, pattern: &str) -> bool {
    if name == pattern {
        return true;
    }
    if let Some(prefix) = pattern.strip_suffix('*') {
        if name.starts_with(prefix) {
            return true;
        }
    }
    let mut name_segments = name.split('.');
    let mut pattern_segments = pattern.split('.');
    loop {
        match (name_segments.next(), pattern_segments.next()) {
            (None, None) => return true,
            (Some(n), Some(p)) => {
                if p != "*" && p != n {
                    return false;
                }
            }
            _ => return false,
        }
    }
}
