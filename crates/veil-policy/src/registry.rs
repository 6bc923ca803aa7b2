use std::sync::Arc;

use parking_lot::RwLock;

use crate::authority::AuthorityPattern;
use crate::errors::PolicyError;

/// A single pass-through rule. The source spec and compiled pattern are
/// fixed at creation; only `enabled` is toggled in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassThroughRule {
    source: String,
    pattern: AuthorityPattern,
    enabled: bool,
}

impl PassThroughRule {
    pub fn compile(spec: &str, enabled: bool) -> Result<PassThroughRule, PolicyError> {
        let pattern = AuthorityPattern::compile(spec)?;
        Ok(PassThroughRule {
            source: pattern.normalized(),
            pattern,
            enabled,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn pattern(&self) -> &AuthorityPattern {
        &self.pattern
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }
}

/// Insertion-ordered listing row, suitable for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassThroughEntry {
    pub name: String,
    pub enabled: bool,
}

/// Ordered pass-through rule collection.
///
/// Rules are published as an immutable `Arc<Vec<_>>` snapshot: writers
/// rebuild the vector outside the lock where possible and hold the write
/// lock only to validate identity and swap the snapshot, so evaluator
/// reads on the connection-accept path stay short and never observe a
/// half-applied mutation.
#[derive(Debug, Default)]
pub struct PassThroughRegistry {
    rules: RwLock<Arc<Vec<PassThroughRule>>>,
}

impl PassThroughRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compiles and appends a rule. The registry is untouched when the
    /// spec does not compile or duplicates an existing rule.
    pub fn add(&self, spec: &str, enabled: bool) -> Result<(), PolicyError> {
        let rule = PassThroughRule::compile(spec, enabled)?;

        let mut rules = self.rules.write();
        if rules.iter().any(|existing| existing.source == rule.source) {
            return Err(PolicyError::DuplicateRule(rule.source));
        }
        let mut next = Vec::with_capacity(rules.len() + 1);
        next.extend(rules.iter().cloned());
        next.push(rule);
        *rules = Arc::new(next);
        Ok(())
    }

    /// Removes the rule whose source spec matches; reports whether one
    /// was found.
    pub fn remove(&self, spec: &str) -> bool {
        let Some(key) = normalized_key(spec) else {
            return false;
        };

        let mut rules = self.rules.write();
        let Some(position) = rules.iter().position(|rule| rule.source == key) else {
            return false;
        };
        let mut next: Vec<PassThroughRule> = rules.iter().cloned().collect();
        next.remove(position);
        *rules = Arc::new(next);
        true
    }

    /// Toggles an existing rule in place; reports whether one was found.
    pub fn set_enabled(&self, spec: &str, enabled: bool) -> bool {
        let Some(key) = normalized_key(spec) else {
            return false;
        };

        let mut rules = self.rules.write();
        let Some(position) = rules.iter().position(|rule| rule.source == key) else {
            return false;
        };
        let mut next: Vec<PassThroughRule> = rules.iter().cloned().collect();
        next[position].enabled = enabled;
        *rules = Arc::new(next);
        true
    }

    /// Replaces the whole rule list, e.g. when loading saved options.
    pub fn set_rules(&self, rules: Vec<PassThroughRule>) -> Result<(), PolicyError> {
        for (index, rule) in rules.iter().enumerate() {
            if rules[..index].iter().any(|prior| prior.source == rule.source) {
                return Err(PolicyError::DuplicateRule(rule.source.clone()));
            }
        }
        *self.rules.write() = Arc::new(rules);
        Ok(())
    }

    pub fn clear(&self) {
        *self.rules.write() = Arc::new(Vec::new());
    }

    /// Read-only snapshot in insertion order.
    pub fn list(&self) -> Vec<PassThroughEntry> {
        self.snapshot()
            .iter()
            .map(|rule| PassThroughEntry {
                name: rule.source.clone(),
                enabled: rule.enabled,
            })
            .collect()
    }

    /// Current rule snapshot. The returned `Arc` is detached from the
    /// registry; concurrent writes publish a new vector instead of
    /// mutating this one.
    pub fn snapshot(&self) -> Arc<Vec<PassThroughRule>> {
        Arc::clone(&self.rules.read())
    }
}

fn normalized_key(spec: &str) -> Option<String> {
    AuthorityPattern::compile(spec)
        .ok()
        .map(|pattern| pattern.normalized())
}
