//! Remote rule type definitions
//!
//! Core types shared by the compiler, cache and matcher:
//! - SourceConfig: a declared remote source (persisted)
//! - CompiledRule / RuleFlags: one trigger → response rule (derived, in memory only)
//! - RuleSetSnapshot: the immutable published rule set of one source
//! - ResponseDirective / Evaluation: what the matcher hands back to the caller

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::template::Template;

// ============================================================================
// Defaults
// ============================================================================

/// Default extraction pattern: `<flags> trigger => message` or `trigger => message`
///
/// Third-party documents are authored against this exact grammar.
pub const DEFAULT_EXTRACTION_PATTERN: &str =
    r"\s*(?:<(?P<flags>[^>]*)>\s*)?(?P<trigger>.*?)\s*=>\s*(?P<message>.*)";

/// Default refresh interval (10 minutes)
pub const DEFAULT_INTERVAL_SECS: u64 = 600;

// ============================================================================
// Source configuration
// ============================================================================

/// A declared remote source, keyed by URL
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Document URL (unique key)
    pub url: String,

    /// Regular expression applied to every document line
    pub pattern: String,

    /// Refresh interval in seconds (always > 0)
    pub interval_secs: u64,
}

impl SourceConfig {
    pub fn new(url: impl Into<String>, pattern: impl Into<String>, interval_secs: u64) -> Self {
        Self {
            url: url.into(),
            pattern: pattern.into(),
            interval_secs,
        }
    }

    /// Refresh interval as a Duration
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

// ============================================================================
// Compiled rules
// ============================================================================

/// Behaviour flags parsed from the `<...>` prefix of a document line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RuleFlags {
    /// Only evaluate against messages addressed to the bot (cleared by `g`)
    pub addressed_only: bool,
    /// Prefix plain replies with the sender's name (cleared by `a`)
    pub include_sender_prefix: bool,
    /// Match the trigger case-sensitively (set by `s`)
    pub case_sensitive: bool,
}

impl RuleFlags {
    /// Parse a flag string. Unknown characters are ignored.
    pub fn parse(flags: &str) -> Self {
        Self {
            addressed_only: !flags.contains('g'),
            include_sender_prefix: !flags.contains('a'),
            case_sensitive: flags.contains('s'),
        }
    }
}

impl Default for RuleFlags {
    fn default() -> Self {
        Self::parse("")
    }
}

/// A single compiled trigger → response rule
#[derive(Debug, Clone)]
pub struct CompiledRule {
    /// Trigger text as written in the document, with the trailing `$` anchor
    pub trigger_source: String,
    /// Compiled trigger, anchored at both ends
    pub trigger: Regex,
    /// Response template (trimmed message text)
    pub template: Template,
    /// Raw flag string (trimmed)
    pub raw_flags: String,
    /// Parsed flags
    pub flags: RuleFlags,
}

impl CompiledRule {
    /// Response template text as written in the document
    pub fn message(&self) -> &str {
        self.template.source()
    }

    /// Rule identity within one document (byte-identical trigger text)
    pub fn key(&self) -> &str {
        &self.trigger_source
    }
}

impl PartialEq for CompiledRule {
    fn eq(&self, other: &Self) -> bool {
        self.trigger_source == other.trigger_source
            && self.template == other.template
            && self.raw_flags == other.raw_flags
    }
}

/// The published rule set of one source
///
/// Snapshots are immutable once built; the cache swaps whole `Arc`s.
#[derive(Debug)]
pub struct RuleSetSnapshot {
    pub url: String,
    pub rules: Vec<CompiledRule>,
    /// Monotonic refresh time, used for staleness decisions
    pub refreshed_at: Instant,
    /// Wall-clock refresh time, for display
    pub refreshed_at_utc: DateTime<Utc>,
}

impl RuleSetSnapshot {
    pub fn new(url: impl Into<String>, rules: Vec<CompiledRule>) -> Self {
        Self {
            url: url.into(),
            rules,
            refreshed_at: Instant::now(),
            refreshed_at_utc: Utc::now(),
        }
    }

    /// Time elapsed since this snapshot was built, as seen at `now`
    pub fn age_at(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.refreshed_at)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

// ============================================================================
// Match results
// ============================================================================

/// How a response is to be delivered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryKind {
    /// Plain message
    Message,
    /// Action-style message (`/me ...`)
    Action,
    /// Notice (`/notice ...`)
    Notice,
}

/// One outbound response produced by a matching rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResponseDirective {
    /// Source the rule came from
    pub source_url: String,
    pub kind: DeliveryKind,
    /// Response body with placeholders substituted and any `/me ` or `/notice ` prefix removed
    pub text: String,
    /// Whether the transport should prefix the body with the sender's name
    pub with_sender_prefix: bool,
}

impl ResponseDirective {
    /// Final outbound text for a reply to `sender`
    pub fn render(&self, sender: &str) -> String {
        if self.with_sender_prefix {
            format!("{}: {}", sender, self.text)
        } else {
            self.text.clone()
        }
    }
}

/// Result of evaluating one inbound message
#[derive(Debug, Clone, Default, Serialize)]
pub struct Evaluation {
    pub directives: Vec<ResponseDirective>,
}

impl Evaluation {
    /// True if at least one rule produced a response
    pub fn matched(&self) -> bool {
        !self.directives.is_empty()
    }
}

// ============================================================================
// Management views
// ============================================================================

/// Outcome of a refresh request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshOutcome {
    /// A refresh task was spawned
    Started,
    /// A refresh for the URL is already running; the request was dropped
    AlreadyInProgress,
}

impl RefreshOutcome {
    pub fn started(self) -> bool {
        matches!(self, RefreshOutcome::Started)
    }
}

/// Listing entry for a declared source
#[derive(Debug, Clone, Serialize)]
pub struct SourceSummary {
    pub url: String,
    pub interval_secs: u64,
    /// Human readable interval, e.g. "10 minutes"
    pub interval: String,
    pub pattern: String,
    /// Last successful refresh, if any
    pub refreshed_at: Option<DateTime<Utc>>,
    /// Number of rules in the current snapshot
    pub rule_count: usize,
    /// Whether a refresh is running right now
    pub refreshing: bool,
}

/// Shared handle to a published snapshot
pub type SnapshotRef = Arc<RuleSetSnapshot>;
