//! Matcher - evaluates an inbound message against every cached rule
//!
//! Runs on the message-handling path and never touches the network.
//! Sources are visited in URL order and rules in document order; every
//! matching rule contributes a directive.

use std::sync::Arc;

use tracing::debug;

use crate::cache::RuleCache;
use crate::types::{CompiledRule, DeliveryKind, Evaluation, ResponseDirective};

const ACTION_PREFIX: &str = "/me ";
const NOTICE_PREFIX: &str = "/notice ";

pub struct Matcher {
    cache: Arc<RuleCache>,
}

impl Matcher {
    pub fn new(cache: Arc<RuleCache>) -> Self {
        Self { cache }
    }

    /// Evaluate `text` against all cached rules
    pub fn evaluate(&self, text: &str, addressed: bool) -> Evaluation {
        let mut directives = Vec::new();

        for snapshot in self.cache.snapshots() {
            for rule in &snapshot.rules {
                if let Some(directive) = evaluate_rule(rule, &snapshot.url, text, addressed) {
                    directives.push(directive);
                }
            }
        }

        Evaluation { directives }
    }
}

/// Evaluate one rule; `None` if it doesn't apply
pub fn evaluate_rule(
    rule: &CompiledRule,
    source_url: &str,
    text: &str,
    addressed: bool,
) -> Option<ResponseDirective> {
    if rule.flags.addressed_only && !addressed {
        return None;
    }

    let caps = rule.trigger.captures(text)?;

    let rendered = rule.template.render(|name| {
        if rule.trigger.capture_names().flatten().any(|n| n == name) {
            // Declared but non-participating groups render empty
            Some(caps.name(name).map(|m| m.as_str()).unwrap_or(""))
        } else {
            None
        }
    });

    let Some(body) = rendered else {
        debug!(
            "Rule '{}' from {} references an unknown capture, skipped",
            rule.trigger_source, source_url
        );
        return None;
    };

    let (kind, text, with_sender_prefix) = if let Some(rest) = body.strip_prefix(ACTION_PREFIX) {
        (DeliveryKind::Action, rest.to_string(), false)
    } else if let Some(rest) = body.strip_prefix(NOTICE_PREFIX) {
        (DeliveryKind::Notice, rest.to_string(), false)
    } else {
        (DeliveryKind::Message, body, rule.flags.include_sender_prefix)
    };

    Some(ResponseDirective {
        source_url: source_url.to_string(),
        kind,
        text,
        with_sender_prefix,
    })
}
