//! Common utilities and types shared across scangate crates.

pub mod hash;
pub mod severity;

pub use severity::Severity;
