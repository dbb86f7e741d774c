//! Generic rule-composition engine.

use crate::config::{read_section, PolicySection};
use crate::error::PolicyError;
use std::fmt;
use tracing::debug;

/// Exempts an object from every validation rule when it returns true.
pub type AllowRule<O, C> = Box<dyn Fn(&O, &C) -> bool + Send + Sync>;

/// Checks the filtered objects; `Err` carries a human-readable failure.
pub type ValidationRule<O, C> = Box<dyn Fn(&[&O], &C) -> Result<(), String> + Send + Sync>;

/// Composes allow rules and validation rules over objects of type `O`
/// checked against a configuration of type `C`.
///
/// Validation never short-circuits: every rule runs and every failure is
/// reported.
pub struct Engine<O, C> {
    allow_rules: Vec<AllowRule<O, C>>,
    validation_rules: Vec<ValidationRule<O, C>>,
}

impl<O, C> Default for Engine<O, C> {
    fn default() -> Self {
        Self {
            allow_rules: Vec::new(),
            validation_rules: Vec::new(),
        }
    }
}

impl<O, C> fmt::Debug for Engine<O, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("allow_rules", &self.allow_rules.len())
            .field("validation_rules", &self.validation_rules.len())
            .finish()
    }
}

impl<O, C> Engine<O, C> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_allow_rule<F>(mut self, rule: F) -> Self
    where
        F: Fn(&O, &C) -> bool + Send + Sync + 'static,
    {
        self.allow_rules.push(Box::new(rule));
        self
    }

    pub fn with_validation_rule<F>(mut self, rule: F) -> Self
    where
        F: Fn(&[&O], &C) -> Result<(), String> + Send + Sync + 'static,
    {
        self.validation_rules.push(Box::new(rule));
        self
    }

    /// Drop allowed objects, then run every validation rule on the rest.
    pub fn validate(&self, objects: &[O], config: &C) -> Result<(), PolicyError> {
        let filtered: Vec<&O> = objects
            .iter()
            .filter(|object| !self.allow_rules.iter().any(|allow| allow(object, config)))
            .collect();

        debug!(
            "Validating {} of {} objects against {} rules",
            filtered.len(),
            objects.len(),
            self.validation_rules.len()
        );

        let failures: Vec<String> = self
            .validation_rules
            .iter()
            .filter_map(|rule| rule(&filtered, config).err())
            .collect();

        if failures.is_empty() {
            Ok(())
        } else {
            Err(PolicyError::Violation { failures })
        }
    }
}

impl<O, C: PolicySection> Engine<O, C> {
    /// Read section `field` of a YAML or JSON policy document and validate
    /// against it.
    pub fn read_config_and_validate(
        &self,
        objects: &[O],
        raw_doc: &[u8],
        field: &str,
    ) -> Result<(), PolicyError> {
        let config: C = read_section(raw_doc, field)?;
        self.validate(objects, &config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConfigError;
    use pretty_assertions::assert_eq;
    use serde::Deserialize;

    #[derive(Debug, Default, Deserialize)]
    #[serde(default)]
    struct Limit {
        max: usize,
        exempt: Vec<i32>,
    }

    impl PolicySection for Limit {}

    fn engine() -> Engine<i32, Limit> {
        Engine::new()
            .with_allow_rule(|n: &i32, cfg: &Limit| cfg.exempt.contains(n))
            .with_validation_rule(|ns: &[&i32], cfg: &Limit| {
                if ns.len() > cfg.max {
                    Err(format!("too many ({} > {})", ns.len(), cfg.max))
                } else {
                    Ok(())
                }
            })
            .with_validation_rule(|ns: &[&i32], _: &Limit| {
                if ns.iter().any(|n| **n < 0) {
                    Err("negative value".to_string())
                } else {
                    Ok(())
                }
            })
    }

    #[test]
    fn test_passes_without_failures() {
        let cfg = Limit { max: 3, exempt: vec![] };
        assert!(engine().validate(&[1, 2, 3], &cfg).is_ok());
    }

    #[test]
    fn test_allow_rule_filters_before_validation() {
        let cfg = Limit { max: 1, exempt: vec![2, 3] };
        assert!(engine().validate(&[1, 2, 3], &cfg).is_ok());
    }

    #[test]
    fn test_aggregates_every_failure() {
        let cfg = Limit { max: 1, exempt: vec![] };
        let err = engine().validate(&[-1, 2], &cfg).unwrap_err();
        assert_eq!(
            err.failures(),
            &["too many (2 > 1)".to_string(), "negative value".to_string()]
        );
        let message = err.to_string();
        assert!(message.contains("too many"));
        assert!(message.contains("negative value"));
    }

    #[test]
    fn test_empty_engine_accepts_everything() {
        let engine: Engine<i32, Limit> = Engine::new();
        assert!(engine.validate(&[-5], &Limit::default()).is_ok());
    }

    #[test]
    fn test_read_config_and_validate() {
        let doc = b"limits:\n  max: 1\nother: {}\n";
        assert!(engine().read_config_and_validate(&[1], doc, "limits").is_ok());
        assert!(engine().read_config_and_validate(&[1, 2], doc, "limits").is_err());
    }

    #[test]
    fn test_missing_section_is_an_error() {
        let err = engine()
            .read_config_and_validate(&[], b"other: {}\n", "limits")
            .unwrap_err();
        assert!(matches!(
            err,
            PolicyError::Config(ConfigError::MissingSection(ref s)) if s == "limits"
        ));
    }

    #[test]
    fn test_null_section_uses_defaults() {
        // Defaults allow nothing.
        let err = engine()
            .read_config_and_validate(&[1], b"limits:\n", "limits")
            .unwrap_err();
        assert!(matches!(err, PolicyError::Violation { .. }));
    }

    #[test]
    fn test_malformed_and_invalid_documents() {
        let err = engine()
            .read_config_and_validate(&[], b"limits: [unclosed", "limits")
            .unwrap_err();
        assert!(matches!(err, PolicyError::Config(ConfigError::Malformed(_))));

        let err = engine()
            .read_config_and_validate(&[], b"limits:\n  max: many\n", "limits")
            .unwrap_err();
        assert!(matches!(
            err,
            PolicyError::Config(ConfigError::InvalidSection { .. })
        ));
    }
}
