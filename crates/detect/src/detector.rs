//! Concurrent format detection.
//!
//! Every candidate runs as its own blocking task over a shared, immutable
//! [`Bytes`] buffer. The first plausible result observed wins; ties between
//! candidates are broken by completion order, not list order. Use
//! [`Detector::sequential`] when a deterministic answer is needed.

use crate::candidate::{default_candidates, Candidate};
use crate::error::DetectError;
use crate::format::{Decoded, Format};
use bytes::Bytes;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::task::JoinSet;
use tracing::{debug, trace, warn};

/// Default time budget for a single detection.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// How candidates are evaluated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DetectMode {
    /// All candidates concurrently; first plausible result wins.
    #[default]
    Race,
    /// Candidates one after another in list order.
    Sequential,
}

/// Classifies an input into one of the candidate formats.
///
/// Intended for a single input: the [`file_type`](Self::file_type) label is
/// set by the first successful decode and never reset.
#[derive(Debug)]
pub struct Detector {
    candidates: Arc<[Candidate]>,
    mode: DetectMode,
    file_type: Arc<OnceLock<&'static str>>,
}

impl Default for Detector {
    fn default() -> Self {
        Self::new()
    }
}

impl Detector {
    /// Detector over the built-in candidates.
    pub fn new() -> Self {
        Self::with_candidates(default_candidates())
    }

    pub fn with_candidates(candidates: Vec<Candidate>) -> Self {
        Self {
            candidates: candidates.into(),
            mode: DetectMode::Race,
            file_type: Arc::new(OnceLock::new()),
        }
    }

    pub fn with_mode(mut self, mode: DetectMode) -> Self {
        self.mode = mode;
        self
    }

    /// Evaluate candidates in list order instead of racing them.
    pub fn sequential(self) -> Self {
        self.with_mode(DetectMode::Sequential)
    }

    /// Display label of the first format this detector recognized.
    pub fn file_type(&self) -> Option<&'static str> {
        self.file_type.get().copied()
    }

    /// Detect the format of `bytes` within `timeout`.
    pub async fn detect(
        &self,
        bytes: impl Into<Bytes>,
        timeout: Duration,
    ) -> Result<Decoded, DetectError> {
        let bytes = bytes.into();
        self.bounded(timeout, self.run(bytes)).await
    }

    /// Read `reader` to the end and detect its format. The timeout covers the
    /// read as well, so a reader that never finishes yields
    /// [`DetectError::Cancelled`].
    pub async fn detect_reader<R>(&self, mut reader: R, timeout: Duration) -> Result<Decoded, DetectError>
    where
        R: AsyncRead + Unpin,
    {
        self.bounded(timeout, async {
            let mut buf = Vec::new();
            reader.read_to_end(&mut buf).await?;
            debug!("Read {} bytes for detection", buf.len());
            self.run(Bytes::from(buf)).await
        })
        .await
    }

    /// Try the candidate named by a trusted hint (usually a file name) first,
    /// falling back to full detection when the hint names nothing or its
    /// candidate rejects the input.
    pub async fn detect_with_hint(
        &self,
        hint: &str,
        bytes: impl Into<Bytes>,
        timeout: Duration,
    ) -> Result<Decoded, DetectError> {
        let bytes = bytes.into();
        let hinted = Format::from_hint(hint);
        let candidate = self
            .candidates
            .iter()
            .find(|c| c.format() == hinted)
            .copied();

        self.bounded(timeout, async {
            if let Some(candidate) = candidate {
                let file_type = Arc::clone(&self.file_type);
                let input = bytes.clone();
                match tokio::task::spawn_blocking(move || attempt(candidate, &input, &file_type))
                    .await
                {
                    Ok(Some(decoded)) => return Ok(decoded),
                    Ok(None) => debug!("Hint {} suggested {} but it did not match", hint, hinted),
                    Err(e) => warn!("Hinted decoder for {} failed: {}", hinted, e),
                }
            }
            self.run(bytes).await
        })
        .await
    }

    async fn bounded<F>(&self, timeout: Duration, work: F) -> Result<Decoded, DetectError>
    where
        F: std::future::Future<Output = Result<Decoded, DetectError>>,
    {
        match tokio::time::timeout(timeout, work).await {
            Ok(result) => result,
            Err(_) => {
                debug!("Detection cancelled after {:?}", timeout);
                Err(DetectError::Cancelled { timeout })
            }
        }
    }

    async fn run(&self, bytes: Bytes) -> Result<Decoded, DetectError> {
        match self.mode {
            DetectMode::Race => self.race(bytes).await,
            DetectMode::Sequential => self.scan_in_order(bytes).await,
        }
    }

    async fn race(&self, bytes: Bytes) -> Result<Decoded, DetectError> {
        let mut tasks = JoinSet::new();
        for candidate in self.candidates.iter().copied() {
            let input = bytes.clone();
            let file_type = Arc::clone(&self.file_type);
            tasks.spawn_blocking(move || attempt(candidate, &input, &file_type));
        }

        // Losing tasks are abandoned when `tasks` drops; blocking decoders
        // finish on their own and their results are discarded.
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Some(decoded)) => {
                    debug!("Detected {}", decoded.format());
                    return Ok(decoded);
                }
                Ok(None) => {}
                Err(e) => warn!("Candidate decoder task failed: {}", e),
            }
        }

        Err(DetectError::Unsupported)
    }

    async fn scan_in_order(&self, bytes: Bytes) -> Result<Decoded, DetectError> {
        // One blocking task per candidate, awaited in list order.
        for candidate in self.candidates.iter().copied() {
            let input = bytes.clone();
            let file_type = Arc::clone(&self.file_type);
            match tokio::task::spawn_blocking(move || attempt(candidate, &input, &file_type)).await {
                Ok(Some(decoded)) => {
                    debug!("Detected {}", decoded.format());
                    return Ok(decoded);
                }
                Ok(None) => {}
                Err(e) => warn!("Candidate decoder {} failed: {}", candidate.format(), e),
            }
        }

        Err(DetectError::Unsupported)
    }
}

fn attempt(
    candidate: Candidate,
    bytes: &[u8],
    file_type: &OnceLock<&'static str>,
) -> Option<Decoded> {
    let decoded = candidate.try_decode(bytes);
    match decoded {
        Some(_) => {
            let _ = file_type.set(candidate.format().file_type());
            debug!("Candidate {} matched", candidate.format());
        }
        None => trace!("Candidate {} rejected input", candidate.format()),
    }
    decoded
}
