//! Rule Compiler - turns a remote response document into compiled rules
//!
//! Every document line is matched against the source's extraction pattern.
//! Lines that don't match are prose and are skipped silently. Matching lines
//! yield `trigger`, `message` and optional `flags` groups; the trigger is
//! anchored at end-of-string and compiled as a regular expression.
//!
//! Within one document the trigger text is a mapping key: a later line with a
//! byte-identical trigger replaces the earlier rule in place.

use indexmap::IndexMap;
use regex::{Captures, Regex, RegexBuilder};
use tracing::{debug, warn};

use crate::error::{RemoteInfoError, Result};
use crate::template::Template;
use crate::types::{CompiledRule, RuleFlags};

/// Group names an extraction pattern may declare
const TRIGGER_GROUP: &str = "trigger";
const MESSAGE_GROUP: &str = "message";
const MESSAGE_GROUP_ALIAS: &str = "msg";
const FLAGS_GROUP: &str = "flags";

// ============================================================================
// Extraction pattern
// ============================================================================

/// A validated extraction pattern
///
/// The pattern is applied at the start of each line (prefix match).
#[derive(Debug, Clone)]
pub struct ExtractionPattern {
    source: String,
    regex: Regex,
    message_group: &'static str,
}

impl ExtractionPattern {
    /// Compile and validate an extraction pattern
    ///
    /// The pattern must declare a `trigger` group and a `message` (or `msg`) group.
    pub fn new(pattern: &str) -> Result<Self> {
        let regex = Regex::new(&format!("^(?:{})", pattern)).map_err(|e| {
            RemoteInfoError::InvalidPattern {
                pattern: pattern.to_string(),
                reason: e.to_string(),
            }
        })?;

        let has_group = |name: &str| regex.capture_names().flatten().any(|n| n == name);

        if !has_group(TRIGGER_GROUP) {
            return Err(RemoteInfoError::InvalidPattern {
                pattern: pattern.to_string(),
                reason: "missing named group 'trigger'".to_string(),
            });
        }

        let message_group = if has_group(MESSAGE_GROUP) {
            MESSAGE_GROUP
        } else if has_group(MESSAGE_GROUP_ALIAS) {
            MESSAGE_GROUP_ALIAS
        } else {
            return Err(RemoteInfoError::InvalidPattern {
                pattern: pattern.to_string(),
                reason: "missing named group 'message'".to_string(),
            });
        };

        Ok(Self {
            source: pattern.to_string(),
            regex,
            message_group,
        })
    }

    /// Pattern text as declared
    pub fn as_str(&self) -> &str {
        &self.source
    }

    fn extract<'t>(&self, caps: &Captures<'t>) -> (Option<&'t str>, Option<&'t str>, &'t str) {
        let group = |name: &str| caps.name(name).map(|m| m.as_str());
        (
            group(TRIGGER_GROUP),
            group(self.message_group),
            group(FLAGS_GROUP).unwrap_or(""),
        )
    }
}

// ============================================================================
// Document compilation
// ============================================================================

/// Per-document compile counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompileStats {
    /// Lines in the document
    pub lines: usize,
    /// Lines that matched the extraction pattern
    pub matched: usize,
    /// Matched lines dropped for an empty trigger or message
    pub empty: usize,
    /// Matched lines whose trigger failed to compile
    pub invalid: usize,
    /// Rules that replaced an earlier rule with the same trigger
    pub replaced: usize,
}

/// Output of compiling one document
#[derive(Debug, Clone)]
pub struct CompiledDocument {
    pub rules: Vec<CompiledRule>,
    pub stats: CompileStats,
}

/// Compile a response document into an ordered rule list
pub fn compile_document(text: &str, pattern: &ExtractionPattern) -> CompiledDocument {
    let mut rules: IndexMap<String, CompiledRule> = IndexMap::new();
    let mut stats = CompileStats::default();

    for (index, line) in text.lines().enumerate() {
        stats.lines += 1;

        let Some(caps) = pattern.regex.captures(line) else {
            continue;
        };
        stats.matched += 1;

        let (trigger, message, flags) = pattern.extract(&caps);
        let trigger = trigger.map(str::trim).unwrap_or("");
        let message = message.map(str::trim).unwrap_or("");
        if trigger.is_empty() || message.is_empty() {
            stats.empty += 1;
            continue;
        }

        match compile_rule(index + 1, trigger, message, flags) {
            Ok(rule) => {
                let key = rule.key().to_string();
                if rules.insert(key, rule).is_some() {
                    stats.replaced += 1;
                }
            },
            Err(e) => {
                stats.invalid += 1;
                warn!("Skipping rule: {}", e);
            },
        }
    }

    debug!(
        "Compiled {} rules from {} lines ({} matched, {} empty, {} invalid, {} replaced)",
        rules.len(),
        stats.lines,
        stats.matched,
        stats.empty,
        stats.invalid,
        stats.replaced
    );

    CompiledDocument {
        rules: rules.into_values().collect(),
        stats,
    }
}

/// Compile a single rule from already-extracted parts
pub fn compile_rule(line: usize, trigger: &str, message: &str, flags: &str) -> Result<CompiledRule> {
    let raw_flags = flags.trim().to_string();
    let flags = RuleFlags::parse(&raw_flags);

    let mut trigger_source = trigger.to_string();
    if !trigger_source.ends_with('$') {
        trigger_source.push('$');
    }

    let regex = RegexBuilder::new(&format!("^(?:{})", trigger_source))
        .case_insensitive(!flags.case_sensitive)
        .build()
        .map_err(|e| RemoteInfoError::LineParse {
            line,
            reason: format!("invalid trigger '{}': {}", trigger, e),
        })?;

    Ok(CompiledRule {
        trigger_source,
        trigger: regex,
        template: Template::parse(message),
        raw_flags,
        flags,
    })
}
