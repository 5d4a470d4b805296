//! # Agent Substrate
//!
//! An embeddable runtime substrate for building LLM-powered agents. Script
//! engines and host applications construct agents, tools, and workflows on
//! top of three tightly-coupled subsystems provided here:
//!
//! ## Event pipeline
//!
//! A pattern-matching pub/sub [`EventEmitter`] with per-subscription
//! filtering, optional batched background delivery, persistent
//! [`StorageBackend`]s behind an [`EventRecorder`], and a time-scaled
//! [`EventReplayer`]:
//!
//! ```
//! use agent_substrate::{EmitterConfig, Event, EventEmitter, Severity, SubscribeOptions};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> agent_substrate::Result<()> {
//! let emitter = EventEmitter::new(EmitterConfig::default());
//! emitter.subscribe(
//!     "tool.*",
//!     |event| {
//!         println!("[{}] {}", event.severity, event.name);
//!         Ok(())
//!     },
//!     SubscribeOptions::new().with_min_severity(Severity::Info),
//! );
//! emitter.emit(Event::tool_invoked("search", serde_json::json!({"q": "rust"}))).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Resilient HTTP
//!
//! A request/response [`HttpClient`], a host-keyed [`ConnectionPool`] with
//! LRU eviction and idle expiry, and a retry engine with exponential
//! backoff, jitter, and `Retry-After` honoring ([`RetryableClient`]).
//! LLM provider bindings are consumers of this layer, not part of it.
//!
//! ## Schema core
//!
//! Structural [`Schema`] nodes, a pure [`validate`] function, a
//! [`SchemaRepository`] for named schemas, and a [`coerce`] engine that
//! normalizes loose inputs (script-bridge strings, tool arguments) into
//! schema-conformant values:
//!
//! ```
//! use agent_substrate::{CoercionOptions, Schema, coerce, validate};
//! use serde_json::json;
//!
//! let schema = Schema::object()
//!     .required_property("n", Schema::number())
//!     .build();
//! let options = CoercionOptions::new()
//!     .with_string_to_number(true)
//!     .with_trim_strings(true);
//!
//! let outcome = coerce(&json!({"n": " 42 "}), &schema, &options).unwrap();
//! assert!(outcome.coerced);
//! assert!(validate(&outcome.value, &schema).valid);
//! ```
//!
//! Agent/tool/workflow *execution*, the script bridge, and provider wire
//! protocols live in the layers above; this crate gives them validation,
//! event emission, and HTTP primitives.

// ============================================================================
// MODULE DECLARATIONS
// ============================================================================

/// Type coercion engine: normalize loose inputs toward a schema under
/// explicit option flags.
mod coerce;

/// Pattern-matched pub/sub emitter with bounded queueing and a background
/// flush worker.
mod emitter;

/// Error types and conversions used across all public APIs.
mod error;

/// The event model: categories, severities, metadata, builder, and the
/// canonical collaborator events.
mod event;

/// Composable filter expression trees evaluated by the recorder and the
/// storage backends.
mod filter;

/// Process-wide emitter handle with explicit install/teardown.
mod global;

/// HTTP request/response values and the single-shot client.
mod http;

/// Host-keyed connection pool with LRU eviction, idle expiry, and the
/// pool-backed request executor.
mod pool;

/// Event recorder gating a storage backend behind named filters.
mod recorder;

/// Time-scaled and stepwise replay of recorded event slices.
mod replay;

/// Named schema repositories: in-memory and one-file-per-schema.
mod repository;

/// Retry engine: backoff schedule, jitter, classification, Retry-After.
mod retry;

/// Structural schema nodes shared by the validator, coercer, and
/// repositories.
mod schema;

/// Persistent event storage backends: memory and append-log file.
mod storage;

/// Structural validation of JSON values against schema trees.
mod validate;

/// Workflow definition interchange: JSON and the ZLWF binary form.
mod workflow;

// ============================================================================
// PUBLIC EXPORTS
// ============================================================================

// --- Events ---

pub use event::{Event, EventBuilder, EventCategory, EventMetadata, Severity};

pub use filter::{FilterExpr, FilterField, FilterOp, FilterValue};

pub use emitter::{
    AsyncHandler, EmitterConfig, ErrorHandler, EventEmitter, SubscribeOptions, SubscriptionId,
    SyncHandler, pattern_matches,
};

pub use global::{global_emitter, install_global_emitter, teardown_global_emitter};

pub use recorder::EventRecorder;

pub use replay::{EventReplayer, ReplayConfig};

pub use storage::{FileBackend, MemoryBackend, StorageBackend};

// --- HTTP ---

pub use http::{
    HeaderMap, HttpClient, HttpClientConfig, HttpMethod, HttpRequest, HttpResponse,
    MAX_RESPONSE_BYTES,
};

pub use pool::{ConnectionPool, PoolConfig, PoolStats, PooledClient, PooledConnection};

pub use retry::{
    RetryConfig, RetryResult, RetryableClient, TransportErrorClass, classify_error,
    parse_retry_after, run_with_retry,
};

// --- Schema core ---

pub use coerce::{CoercionOptions, CoercionOutcome, StringCase, coerce};

pub use repository::{
    FileSchemaRepository, MemorySchemaRepository, SchemaFileFormat, SchemaRepository,
};

pub use schema::{ObjectSchemaBuilder, Schema, StringFormat};

pub use validate::{ValidationError, ValidationReport, validate};

// --- Workflow interchange ---

pub use workflow::{WorkflowDefinition, WorkflowMetadata, WorkflowStep};

// --- Errors ---

pub use error::{Error, Result};

// ============================================================================
// CONVENIENCE PRELUDE
// ============================================================================

/// Commonly used types and functions in one import:
/// `use agent_substrate::prelude::*;`
pub mod prelude {
    pub use crate::{
        CoercionOptions, EmitterConfig, Error, Event, EventCategory, EventEmitter, EventRecorder,
        EventReplayer, FilterExpr, HttpClient, HttpMethod, HttpRequest, HttpResponse, Result,
        RetryConfig, RetryableClient, Schema, Severity, SubscribeOptions, coerce, validate,
    };
}
