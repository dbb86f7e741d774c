//! Per-run validation settings.

use crate::external::{EpssScores, KevCatalog};
use scangate_detect::{DetectMode, Detector, DEFAULT_TIMEOUT};
use std::sync::Arc;
use std::time::Duration;

/// Everything a validation run needs besides the policy document itself.
/// Passed explicitly; nothing here is process-wide.
#[derive(Debug, Clone)]
pub struct ValidationContext {
    pub kev: Option<Arc<KevCatalog>>,
    pub epss: Option<Arc<EpssScores>>,
    /// Budget for detecting each bundle entry.
    pub detect_timeout: Duration,
    /// Detect bundle entries in candidate order instead of racing.
    pub sequential: bool,
}

impl Default for ValidationContext {
    fn default() -> Self {
        Self {
            kev: None,
            epss: None,
            detect_timeout: DEFAULT_TIMEOUT,
            sequential: false,
        }
    }
}

impl ValidationContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_kev(mut self, catalog: KevCatalog) -> Self {
        self.kev = Some(Arc::new(catalog));
        self
    }

    pub fn with_epss(mut self, scores: EpssScores) -> Self {
        self.epss = Some(Arc::new(scores));
        self
    }

    pub fn with_detect_timeout(mut self, timeout: Duration) -> Self {
        self.detect_timeout = timeout;
        self
    }

    pub fn sequential(mut self) -> Self {
        self.sequential = true;
        self
    }

    /// A fresh detector for one input.
    pub fn detector(&self) -> Detector {
        let mode = if self.sequential {
            DetectMode::Sequential
        } else {
            DetectMode::Race
        };
        Detector::new().with_mode(mode)
    }
}
