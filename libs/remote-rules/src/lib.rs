//! Remote Rules - remote pattern/response rule cache
//!
//! Keeps chat-responder rules in sync with operator-declared remote documents:
//! - Source declarations persisted in SQLite (or memory)
//! - Documents fetched over HTTP(S) or from `file://` URLs
//! - Line-oriented compilation into trigger → response rules
//! - Lock-free hot-swapped rule snapshots for the message path
//! - Interval-based refresh with at most one in-flight fetch per URL
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐     ┌──────────────┐     ┌─────────────┐
//! │  Scheduler  │────▶│ Coordinator  │────▶│   Fetcher   │
//! │   (30s)     │     │ (per-URL tok)│     │ (http/file) │
//! └─────────────┘     └──────────────┘     └─────────────┘
//!        │                   │ compile + publish
//!        ▼                   ▼
//! ┌─────────────┐     ┌──────────────┐     ┌─────────────┐
//! │ SourceStore │     │  RuleCache   │◀────│   Matcher   │
//! │  (SQLite)   │     │ (snapshots)  │     │ (evaluate)  │
//! └─────────────┘     └──────────────┘     └─────────────┘
//! ```

mod cache;
mod compiler;
mod coordinator;
mod error;
mod fetcher;
pub mod interval;
mod manager;
mod matcher;
mod repository;
mod scheduler;
mod store;
mod template;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
pub mod types;

// Re-export public API
pub use cache::RuleCache;
pub use compiler::{compile_document, compile_rule, CompileStats, CompiledDocument, ExtractionPattern};
pub use coordinator::RefreshCoordinator;
pub use error::{RemoteInfoError, Result};
pub use fetcher::{DocumentFetcher, FetchSettings, UrlFetcher, DEFAULT_FETCH_TIMEOUT_SECS};
pub use interval::{format_interval, parse_interval};
pub use manager::{RemoteInfo, SourceDefaults};
pub use matcher::{evaluate_rule, Matcher};
pub use repository::SqliteSourceStore;
pub use scheduler::{SchedulerStatus, SourceScheduler, DEFAULT_TICK_SECS};
pub use store::{MemorySourceStore, SourceStore};
pub use template::Template;

// Re-export core types for convenience
pub use types::{
    CompiledRule, DeliveryKind, Evaluation, RefreshOutcome, ResponseDirective, RuleFlags,
    RuleSetSnapshot, SourceConfig, SourceSummary, DEFAULT_EXTRACTION_PATTERN,
    DEFAULT_INTERVAL_SECS,
};
