//! External risk signals: the known-exploited vulnerability catalog and EPSS
//! scores.
//!
//! Both are parsed from bytes the caller has already read. Their rules
//! capture the parsed data and plug into an [`Engine`](crate::Engine) like
//! any other rule.

use crate::config::GrypeConfig;
use crate::error::ConfigError;
use crate::rules::PolicyObject;
use serde::Deserialize;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use tracing::debug;

/// Identifiers listed in a known-exploited vulnerabilities catalog.
#[derive(Debug, Clone, Default)]
pub struct KevCatalog {
    ids: HashSet<String>,
}

#[derive(Deserialize)]
struct KevDocument {
    #[serde(default)]
    vulnerabilities: Vec<KevEntry>,
}

#[derive(Deserialize)]
struct KevEntry {
    #[serde(rename = "cveID")]
    cve_id: String,
}

impl KevCatalog {
    /// Parse the catalog JSON: `{"vulnerabilities": [{"cveID": ...}, ...]}`.
    pub fn from_json(raw: &[u8]) -> Result<Self, ConfigError> {
        let doc: KevDocument =
            serde_json::from_slice(raw).map_err(|e| ConfigError::ExternalData {
                kind: "KEV catalog",
                reason: e.to_string(),
            })?;
        let catalog = Self::from_ids(doc.vulnerabilities.into_iter().map(|v| v.cve_id));
        debug!("Loaded {} known exploited vulnerabilities", catalog.len());
        Ok(catalog)
    }

    pub fn from_ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            ids: ids.into_iter().map(Into::into).collect(),
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Exploit prediction scores keyed by CVE id.
#[derive(Debug, Clone, Default)]
pub struct EpssScores {
    scores: HashMap<String, f64>,
}

impl EpssScores {
    /// Parse the EPSS CSV (`cve,epss,percentile`). Comment lines starting
    /// with `#`, blank lines and the header row are skipped.
    pub fn from_csv(raw: &[u8]) -> Result<Self, ConfigError> {
        let text = std::str::from_utf8(raw).map_err(|e| ConfigError::ExternalData {
            kind: "EPSS",
            reason: e.to_string(),
        })?;

        let mut scores = HashMap::new();
        for (index, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let mut fields = line.split(',');
            let cve = fields.next().unwrap_or_default().trim();
            if cve.eq_ignore_ascii_case("cve") {
                continue;
            }
            let score = fields
                .next()
                .map(str::trim)
                .ok_or_else(|| ConfigError::ExternalData {
                    kind: "EPSS",
                    reason: format!("line {}: missing score", index + 1),
                })?
                .parse::<f64>()
                .map_err(|e| ConfigError::ExternalData {
                    kind: "EPSS",
                    reason: format!("line {}: {}", index + 1, e),
                })?;
            scores.insert(cve.to_string(), score);
        }

        debug!("Loaded {} EPSS scores", scores.len());
        Ok(Self { scores })
    }

    pub fn score(&self, id: &str) -> Option<f64> {
        self.scores.get(id).copied()
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }
}

/// Allow rule: exempt findings scored below `epssAllowThreshold`.
pub fn epss_allow_rule<O: PolicyObject>(
    scores: Arc<EpssScores>,
) -> impl Fn(&O, &GrypeConfig) -> bool + Send + Sync + 'static {
    move |object, config| match (config.epss_allow_threshold, scores.score(object.id())) {
        (Some(threshold), Some(score)) => score < threshold,
        _ => false,
    }
}

/// Fail on findings scored at or above `epssDenyThreshold`.
pub fn epss_deny_rule<O: PolicyObject>(
    scores: Arc<EpssScores>,
) -> impl Fn(&[&O], &GrypeConfig) -> Result<(), String> + Send + Sync + 'static {
    move |objects, config| {
        let Some(threshold) = config.epss_deny_threshold else {
            return Ok(());
        };
        let flagged: BTreeSet<&str> = objects
            .iter()
            .map(|o| o.id())
            .filter(|id| scores.score(id).is_some_and(|s| s >= threshold))
            .collect();
        if flagged.is_empty() {
            Ok(())
        } else {
            Err(format!(
                "EPSS score at or above {}: {}",
                threshold,
                flagged.into_iter().collect::<Vec<_>>().join(", ")
            ))
        }
    }
}

/// Fail on known exploited findings when `kevLimitEnabled` is set.
pub fn kev_deny_rule<O: PolicyObject>(
    catalog: Arc<KevCatalog>,
) -> impl Fn(&[&O], &GrypeConfig) -> Result<(), String> + Send + Sync + 'static {
    move |objects, config| {
        if !config.kev_limit_enabled {
            return Ok(());
        }
        let exploited: BTreeSet<&str> = objects
            .iter()
            .map(|o| o.id())
            .filter(|id| catalog.contains(id))
            .collect();
        if exploited.is_empty() {
            Ok(())
        } else {
            Err(format!(
                "Known exploited vulnerabilities: {}",
                exploited.into_iter().collect::<Vec<_>>().join(", ")
            ))
        }
    }
}
