//! Canonical allow, deny and threshold rules.

use crate::config::{ListEntry, UNLIMITED};
use crate::engine::Engine;
use scangate_common::Severity;
use scangate_detect::Finding;
use std::collections::BTreeSet;

/// Anything a policy rule can evaluate.
pub trait PolicyObject {
    fn id(&self) -> &str;
    fn severity(&self) -> Severity;
}

impl PolicyObject for Finding {
    fn id(&self) -> &str {
        &self.id
    }

    fn severity(&self) -> Severity {
        self.severity
    }
}

/// Configuration carrying allow and deny lists.
pub trait ListPolicy {
    fn allow_list(&self) -> &[ListEntry];
    fn deny_list(&self) -> &[ListEntry];

    fn is_allowed(&self, id: &str) -> bool {
        self.allow_list().iter().any(|e| e.id == id)
    }

    fn is_denied(&self, id: &str) -> bool {
        self.deny_list().iter().any(|e| e.id == id)
    }
}

/// The number of findings allowed at one severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeverityLimit {
    pub severity: Severity,
    /// Name used in failure messages.
    pub label: &'static str,
    /// `-1` means unlimited.
    pub allowed: i64,
}

impl SeverityLimit {
    pub fn new(severity: Severity, allowed: i64) -> Self {
        Self::labelled(severity, severity.label(), allowed)
    }

    pub fn labelled(severity: Severity, label: &'static str, allowed: i64) -> Self {
        Self {
            severity,
            label,
            allowed,
        }
    }

    pub fn is_unlimited(&self) -> bool {
        self.allowed == UNLIMITED
    }
}

/// Configuration carrying per-severity limits. Severities without a limit
/// are not counted.
pub trait SeverityLimits {
    fn limits(&self) -> Vec<SeverityLimit>;
}

/// Allow rule: exempt objects named on the allow-list.
pub fn allow_listed<O: PolicyObject, C: ListPolicy>(object: &O, config: &C) -> bool {
    config.is_allowed(object.id())
}

/// Fail when any severity has more objects than its limit allows. Every
/// violated severity is reported in one failure.
pub fn threshold_rule<O: PolicyObject, C: SeverityLimits>(
    objects: &[&O],
    config: &C,
) -> Result<(), String> {
    let exceeded: Vec<String> = config
        .limits()
        .iter()
        .filter(|limit| !limit.is_unlimited())
        .filter_map(|limit| {
            let found = objects
                .iter()
                .filter(|o| o.severity() == limit.severity)
                .count() as i64;
            (found > limit.allowed).then(|| {
                format!("{} ({} found > {} allowed)", limit.label, found, limit.allowed)
            })
        })
        .collect();

    if exceeded.is_empty() {
        Ok(())
    } else {
        Err(format!("Severity threshold exceeded: {}", exceeded.join(", ")))
    }
}

/// Fail when any object is named on the deny-list, regardless of severity
/// limits.
pub fn deny_rule<O: PolicyObject, C: ListPolicy>(objects: &[&O], config: &C) -> Result<(), String> {
    let denied: BTreeSet<&str> = objects
        .iter()
        .map(|o| o.id())
        .filter(|id| config.is_denied(id))
        .collect();

    if denied.is_empty() {
        Ok(())
    } else {
        Err(format!(
            "Denied by policy: {}",
            denied.into_iter().collect::<Vec<_>>().join(", ")
        ))
    }
}

/// Allow-list pre-filter, threshold rule and deny rule.
pub fn standard_engine<O, C>() -> Engine<O, C>
where
    O: PolicyObject + 'static,
    C: ListPolicy + SeverityLimits + 'static,
{
    Engine::new()
        .with_allow_rule(allow_listed::<O, C>)
        .with_validation_rule(threshold_rule::<O, C>)
        .with_validation_rule(deny_rule::<O, C>)
}
