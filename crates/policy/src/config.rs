//! Policy document sections.

use crate::error::ConfigError;
use crate::rules::{ListPolicy, SeverityLimit, SeverityLimits};
use scangate_common::Severity;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const GRYPE_SECTION: &str = "grype";
pub const CYCLONEDX_SECTION: &str = "cyclonedx";
pub const SEMGREP_SECTION: &str = "semgrep";
pub const GITLEAKS_SECTION: &str = "gitleaks";

/// Value of a severity limit meaning "no limit".
pub const UNLIMITED: i64 = -1;

/// A section type that can be read from a policy document.
pub trait PolicySection: DeserializeOwned + Default {
    /// Reject values that parse but cannot be enforced.
    fn check(&self) -> Result<(), String> {
        Ok(())
    }
}

/// Every limit must be [`UNLIMITED`] or a non-negative cap.
fn check_limits<C: SeverityLimits>(config: &C) -> Result<(), String> {
    let invalid: Vec<String> = config
        .limits()
        .iter()
        .filter(|l| l.allowed < UNLIMITED)
        .map(|l| format!("{} limit {}", l.label, l.allowed))
        .collect();
    if invalid.is_empty() {
        Ok(())
    } else {
        Err(format!(
            "{} (use {} for unlimited or a count of 0 or more)",
            invalid.join(", "),
            UNLIMITED
        ))
    }
}

/// Read one named section of a YAML (or JSON) policy document.
///
/// A present but empty (`null`) section yields `C::default()`.
pub fn read_section<C: PolicySection>(raw_doc: &[u8], field: &str) -> Result<C, ConfigError> {
    let doc: serde_yaml::Value =
        serde_yaml::from_slice(raw_doc).map_err(|e| ConfigError::Malformed(e.to_string()))?;
    let sections = doc
        .as_mapping()
        .ok_or_else(|| ConfigError::Malformed("expected a mapping of sections".to_string()))?;
    let section = sections
        .get(field)
        .ok_or_else(|| ConfigError::MissingSection(field.to_string()))?;

    if section.is_null() {
        debug!("Section {} is empty, using defaults", field);
        return Ok(C::default());
    }

    let config: C =
        serde_yaml::from_value(section.clone()).map_err(|e| ConfigError::InvalidSection {
            section: field.to_string(),
            reason: e.to_string(),
        })?;
    config.check().map_err(|reason| ConfigError::InvalidSection {
        section: field.to_string(),
        reason,
    })?;
    Ok(config)
}

/// An allow-list or deny-list entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListEntry {
    pub id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub reason: String,
}

impl ListEntry {
    pub fn new(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            reason: reason.into(),
        }
    }
}

/// Limits for Grype reports. Missing keys allow zero findings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GrypeConfig {
    pub critical: i64,
    pub high: i64,
    pub medium: i64,
    pub low: i64,
    pub negligible: i64,
    pub unknown: i64,
    pub allow_list: Vec<ListEntry>,
    pub deny_list: Vec<ListEntry>,
    /// Findings whose EPSS score is below this are exempt.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub epss_allow_threshold: Option<f64>,
    /// Findings whose EPSS score is at or above this fail.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub epss_deny_threshold: Option<f64>,
    /// Fail on any finding in the known-exploited catalog.
    pub kev_limit_enabled: bool,
}

impl SeverityLimits for GrypeConfig {
    fn limits(&self) -> Vec<SeverityLimit> {
        vec![
            SeverityLimit::new(Severity::Critical, self.critical),
            SeverityLimit::new(Severity::High, self.high),
            SeverityLimit::new(Severity::Medium, self.medium),
            SeverityLimit::new(Severity::Low, self.low),
            SeverityLimit::new(Severity::Negligible, self.negligible),
            SeverityLimit::new(Severity::Unknown, self.unknown),
        ]
    }
}

impl PolicySection for GrypeConfig {
    fn check(&self) -> Result<(), String> {
        check_limits(self)
    }
}

impl ListPolicy for GrypeConfig {
    fn allow_list(&self) -> &[ListEntry] {
        &self.allow_list
    }

    fn deny_list(&self) -> &[ListEntry] {
        &self.deny_list
    }
}

/// Limits for vulnerabilities embedded in CycloneDX SBOMs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CycloneDxConfig {
    pub critical: i64,
    pub high: i64,
    pub medium: i64,
    pub low: i64,
    pub info: i64,
    pub none: i64,
    pub unknown: i64,
    pub allow_list: Vec<ListEntry>,
    pub deny_list: Vec<ListEntry>,
}

impl SeverityLimits for CycloneDxConfig {
    fn limits(&self) -> Vec<SeverityLimit> {
        vec![
            SeverityLimit::new(Severity::Critical, self.critical),
            SeverityLimit::new(Severity::High, self.high),
            SeverityLimit::new(Severity::Medium, self.medium),
            SeverityLimit::new(Severity::Low, self.low),
            SeverityLimit::new(Severity::Info, self.info),
            SeverityLimit::new(Severity::None, self.none),
            SeverityLimit::new(Severity::Unknown, self.unknown),
        ]
    }
}

impl PolicySection for CycloneDxConfig {
    fn check(&self) -> Result<(), String> {
        check_limits(self)
    }
}

impl ListPolicy for CycloneDxConfig {
    fn allow_list(&self) -> &[ListEntry] {
        &self.allow_list
    }

    fn deny_list(&self) -> &[ListEntry] {
        &self.deny_list
    }
}

/// Limits for Semgrep results, keyed by Semgrep's own severity names.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SemgrepConfig {
    pub error: i64,
    pub warning: i64,
    pub info: i64,
    pub allow_list: Vec<ListEntry>,
    pub deny_list: Vec<ListEntry>,
}

impl SeverityLimits for SemgrepConfig {
    fn limits(&self) -> Vec<SeverityLimit> {
        vec![
            SeverityLimit::labelled(Severity::High, "Error", self.error),
            SeverityLimit::labelled(Severity::Medium, "Warning", self.warning),
            SeverityLimit::labelled(Severity::Info, "Info", self.info),
        ]
    }
}

impl PolicySection for SemgrepConfig {
    fn check(&self) -> Result<(), String> {
        check_limits(self)
    }
}

impl ListPolicy for SemgrepConfig {
    fn allow_list(&self) -> &[ListEntry] {
        &self.allow_list
    }

    fn deny_list(&self) -> &[ListEntry] {
        &self.deny_list
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GitleaksConfig {
    pub secrets_allowed: bool,
}

impl PolicySection for GitleaksConfig {}

/// A complete policy document with one section per report kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyDocument {
    pub version: String,
    pub grype: GrypeConfig,
    pub cyclonedx: CycloneDxConfig,
    pub semgrep: SemgrepConfig,
    pub gitleaks: GitleaksConfig,
}

impl Default for PolicyDocument {
    /// Strict template: nothing above low severity passes, secrets never do.
    fn default() -> Self {
        Self {
            version: "1".to_string(),
            grype: GrypeConfig {
                low: UNLIMITED,
                negligible: UNLIMITED,
                unknown: UNLIMITED,
                ..Default::default()
            },
            cyclonedx: CycloneDxConfig {
                low: UNLIMITED,
                info: UNLIMITED,
                none: UNLIMITED,
                unknown: UNLIMITED,
                ..Default::default()
            },
            semgrep: SemgrepConfig {
                info: UNLIMITED,
                ..Default::default()
            },
            gitleaks: GitleaksConfig::default(),
        }
    }
}

impl PolicyDocument {
    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        serde_yaml::to_string(self).map_err(|e| ConfigError::Malformed(e.to_string()))
    }
}
