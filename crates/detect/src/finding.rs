//! The format-independent unit of policy evaluation.

use scangate_common::Severity;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One reported issue: a vulnerability, a static-analysis hit or a leaked
/// secret.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    /// CVE id, rule id, etc.
    pub id: String,
    pub severity: Severity,
    /// What the finding is about, e.g. `openssl@1.1.1k` or `src/main.go:12`.
    pub subject: String,
}

impl Finding {
    pub fn new(id: impl Into<String>, severity: Severity, subject: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            severity,
            subject: subject.into(),
        }
    }
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}] {}", self.id, self.severity, self.subject)
    }
}
