//! Policy evaluation for decoded scan reports.
//!
//! The [`Engine`] composes allow rules (pre-filters) and validation rules over
//! any object and configuration type. [`DecoderValidator`] binds an engine to
//! one report format, and [`validate_bundle`] walks bundles recursively.

pub mod bundle;
pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod external;
pub mod rules;
pub mod validators;

pub use bundle::{validate_bundle, validate_bundle_entries, validate_decoded, EntryOutcome, EntryReport};
pub use config::{
    read_section, CycloneDxConfig, GitleaksConfig, GrypeConfig, ListEntry, PolicyDocument,
    PolicySection, SemgrepConfig,
};
pub use context::ValidationContext;
pub use engine::Engine;
pub use error::{ConfigError, PolicyError};
pub use external::{EpssScores, KevCatalog};
pub use rules::{ListPolicy, PolicyObject, SeverityLimit, SeverityLimits};
pub use validators::DecoderValidator;
