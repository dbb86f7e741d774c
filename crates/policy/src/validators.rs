//! Validators bound to one report format.

use crate::config::{
    CycloneDxConfig, PolicySection, GitleaksConfig, GrypeConfig, SemgrepConfig, CYCLONEDX_SECTION,
    GITLEAKS_SECTION, GRYPE_SECTION, SEMGREP_SECTION,
};
use crate::context::ValidationContext;
use crate::engine::Engine;
use crate::error::PolicyError;
use crate::external::{epss_allow_rule, epss_deny_rule, kev_deny_rule};
use crate::rules::standard_engine;
use scangate_detect::{Decoded, Finding, Format};
use std::fmt;

/// An [`Engine`] that only accepts decoded values of one format.
pub struct DecoderValidator<O, C> {
    format: Format,
    extract: fn(&Decoded) -> Vec<O>,
    engine: Engine<O, C>,
}

impl<O, C> fmt::Debug for DecoderValidator<O, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecoderValidator")
            .field("format", &self.format)
            .field("engine", &self.engine)
            .finish()
    }
}

impl<O, C> DecoderValidator<O, C> {
    pub fn new(format: Format, extract: fn(&Decoded) -> Vec<O>, engine: Engine<O, C>) -> Self {
        Self {
            format,
            extract,
            engine,
        }
    }

    pub fn format(&self) -> Format {
        self.format
    }

    pub fn validate(&self, decoded: &Decoded, config: &C) -> Result<(), PolicyError> {
        let objects = self.objects(decoded)?;
        self.engine.validate(&objects, config)
    }

    fn objects(&self, decoded: &Decoded) -> Result<Vec<O>, PolicyError> {
        if decoded.format() != self.format {
            return Err(PolicyError::UnexpectedFormat {
                expected: self.format,
                actual: decoded.format(),
            });
        }
        Ok((self.extract)(decoded))
    }
}

impl<O, C: PolicySection> DecoderValidator<O, C> {
    pub fn read_config_and_validate(
        &self,
        decoded: &Decoded,
        raw_doc: &[u8],
        field: &str,
    ) -> Result<(), PolicyError> {
        let objects = self.objects(decoded)?;
        self.engine.read_config_and_validate(&objects, raw_doc, field)
    }
}

fn findings(decoded: &Decoded) -> Vec<Finding> {
    decoded.findings().unwrap_or_default()
}

/// Grype validator; EPSS and KEV rules are added when the context carries
/// their data.
pub fn grype_validator(ctx: &ValidationContext) -> DecoderValidator<Finding, GrypeConfig> {
    let mut engine = standard_engine::<Finding, GrypeConfig>();
    if let Some(scores) = &ctx.epss {
        engine = engine
            .with_allow_rule(epss_allow_rule::<Finding>(scores.clone()))
            .with_validation_rule(epss_deny_rule::<Finding>(scores.clone()));
    }
    if let Some(catalog) = &ctx.kev {
        engine = engine.with_validation_rule(kev_deny_rule::<Finding>(catalog.clone()));
    }
    DecoderValidator::new(Format::Grype, findings, engine)
}

pub fn cyclonedx_validator() -> DecoderValidator<Finding, CycloneDxConfig> {
    DecoderValidator::new(Format::CycloneDx, findings, standard_engine())
}

pub fn semgrep_validator() -> DecoderValidator<Finding, SemgrepConfig> {
    DecoderValidator::new(Format::Semgrep, findings, standard_engine())
}

/// Gitleaks has no severities: any leak fails unless secrets are allowed.
pub fn gitleaks_validator() -> DecoderValidator<Finding, GitleaksConfig> {
    let engine = Engine::new().with_validation_rule(|leaks: &[&Finding], config: &GitleaksConfig| {
        if config.secrets_allowed || leaks.is_empty() {
            Ok(())
        } else {
            Err(format!("{} secrets detected", leaks.len()))
        }
    });
    DecoderValidator::new(Format::Gitleaks, findings, engine)
}

/// Validate a decoded report against its section of the policy document.
/// Bundles are not reports; see [`crate::validate_decoded`].
pub fn validate_report(
    decoded: &Decoded,
    raw_doc: &[u8],
    ctx: &ValidationContext,
) -> Result<(), PolicyError> {
    match decoded.format() {
        Format::Grype => grype_validator(ctx).read_config_and_validate(decoded, raw_doc, GRYPE_SECTION),
        Format::Semgrep => {
            semgrep_validator().read_config_and_validate(decoded, raw_doc, SEMGREP_SECTION)
        }
        Format::Gitleaks => {
            gitleaks_validator().read_config_and_validate(decoded, raw_doc, GITLEAKS_SECTION)
        }
        Format::CycloneDx => {
            cyclonedx_validator().read_config_and_validate(decoded, raw_doc, CYCLONEDX_SECTION)
        }
        Format::Bundle | Format::Generic => Err(PolicyError::UnexpectedFormat {
            expected: Format::Generic,
            actual: decoded.format(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PolicyDocument;
    use crate::error::ConfigError;
    use crate::external::KevCatalog;
    use pretty_assertions::assert_eq;
    use scangate_detect::{cyclonedx, gitleaks, grype, semgrep};

    const GRYPE: &str = include_str!("../../detect/testdata/grype-report.json");
    const SEMGREP: &str = include_str!("../../detect/testdata/semgrep-report.json");
    const GITLEAKS: &str = include_str!("../../detect/testdata/gitleaks-report.json");
    const CYCLONEDX: &str = include_str!("../../detect/testdata/cyclonedx-sbom.json");

    fn decoded_grype() -> Decoded {
        grype::decode(GRYPE.as_bytes()).unwrap()
    }

    #[test]
    fn test_wrong_format_is_rejected() {
        let decoded = semgrep::decode(SEMGREP.as_bytes()).unwrap();
        let err = grype_validator(&ValidationContext::default())
            .validate(&decoded, &GrypeConfig::default())
            .unwrap_err();
        assert!(matches!(
            err,
            PolicyError::UnexpectedFormat {
                expected: Format::Grype,
                actual: Format::Semgrep
            }
        ));
    }

    #[test]
    fn test_grype_sample_against_template() {
        let doc = PolicyDocument::default().to_yaml().unwrap();
        let err = validate_report(&decoded_grype(), doc.as_bytes(), &ValidationContext::default())
            .unwrap_err();
        assert_eq!(
            err.failures(),
            &["Severity threshold exceeded: Critical (1 found > 0 allowed), High (1 found > 0 allowed)"
                .to_string()]
        );
    }

    #[test]
    fn test_grype_allow_list_clears_sample() {
        let doc = br#"
grype:
  low: -1
  allowList:
    - id: CVE-2023-0286
    - id: CVE-2022-4450
"#;
        assert!(validate_report(&decoded_grype(), doc, &ValidationContext::default()).is_ok());
    }

    #[test]
    fn test_grype_kev_from_context() {
        let doc = b"grype:\n  critical: -1\n  high: -1\n  low: -1\n  kevLimitEnabled: true\n";
        let ctx = ValidationContext::default().with_kev(KevCatalog::from_ids(["CVE-2022-4450"]));

        let err = validate_report(&decoded_grype(), doc, &ctx).unwrap_err();
        assert_eq!(
            err.failures(),
            &["Known exploited vulnerabilities: CVE-2022-4450".to_string()]
        );
        assert!(validate_report(&decoded_grype(), doc, &ValidationContext::default()).is_ok());
    }

    #[test]
    fn test_semgrep_sample() {
        let decoded = semgrep::decode(SEMGREP.as_bytes()).unwrap();
        let doc = b"semgrep:\n  error: 1\n  warning: 0\n";
        let err = validate_report(&decoded, doc, &ValidationContext::default()).unwrap_err();
        assert_eq!(
            err.failures(),
            &["Severity threshold exceeded: Warning (1 found > 0 allowed)".to_string()]
        );
    }

    #[test]
    fn test_gitleaks_secrets() {
        let decoded = gitleaks::decode(GITLEAKS.as_bytes()).unwrap();
        let err = validate_report(&decoded, b"gitleaks:\n", &ValidationContext::default())
            .unwrap_err();
        assert_eq!(err.failures(), &["2 secrets detected".to_string()]);

        let allowed = b"gitleaks:\n  secretsAllowed: true\n";
        assert!(validate_report(&decoded, allowed, &ValidationContext::default()).is_ok());

        let clean = gitleaks::decode(b"[]").unwrap();
        assert!(validate_report(&clean, b"gitleaks:\n", &ValidationContext::default()).is_ok());
    }

    #[test]
    fn test_cyclonedx_deny_list() {
        let decoded = cyclonedx::decode(CYCLONEDX.as_bytes()).unwrap();
        let doc = br#"
cyclonedx:
  critical: -1
  unknown: -1
  denyList:
    - id: CVE-2022-42889
      reason: Text4Shell
"#;
        let err = validate_report(&decoded, doc, &ValidationContext::default()).unwrap_err();
        assert_eq!(err.failures(), &["Denied by policy: CVE-2022-42889".to_string()]);
    }

    #[test]
    fn test_missing_section_never_passes() {
        let err = validate_report(&decoded_grype(), b"semgrep: {}\n", &ValidationContext::default())
            .unwrap_err();
        assert!(matches!(
            err,
            PolicyError::Config(ConfigError::MissingSection(ref s)) if s == "grype"
        ));
    }
}
