//! Match orchestration.
//!
//! Prepares the source image once, then walks the reference set in
//! enumeration order: prepare each target, ask the comparison service about
//! the pair, and decide on the first target holding a face that scores
//! above the acceptance threshold. Per-target failures never abort a run.

use crate::asset::{ImageAsset, ImageProcessingError};
use crate::compare::{ComparisonRequest, DetectedFace, FaceComparer};
use crate::limit::{limit, SizeLimits};
use crate::normalize::normalize;
use crate::scan::{ReferenceEntry, ReferenceSet};
use serde::Serialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::Instrument;
use uuid::Uuid;

pub const DEFAULT_FACES_DIR: &str = "faces";
/// Similarity (0–100) a face must strictly exceed to count as a match.
pub const DEFAULT_SIMILARITY_THRESHOLD: f32 = 70.0;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("source image cannot be prepared: {0}")]
    Source(#[source] ImageProcessingError),
}

/// Orchestrator settings, resolved by the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchConfig {
    /// Directory holding the reference set.
    pub faces_dir: PathBuf,
    /// Acceptance threshold applied to returned similarity scores.
    pub similarity_threshold: f32,
    /// Threshold forwarded to the service with each request.
    pub service_threshold: f32,
    pub limits: SizeLimits,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            faces_dir: PathBuf::from(DEFAULT_FACES_DIR),
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            service_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            limits: SizeLimits::default(),
        }
    }
}

/// A reference image that matched the source.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TargetMatch {
    /// Reference file name.
    pub name: String,
    /// Path of the reference file as enumerated.
    pub path: PathBuf,
    pub similarity: f32,
    /// The matched face within the target image.
    pub face: DetectedFace,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MatchDecision {
    Match(TargetMatch),
    NoMatch,
}

impl MatchDecision {
    pub fn is_match(&self) -> bool {
        matches!(self, Self::Match(_))
    }

    pub fn target(&self) -> Option<&TargetMatch> {
        match self {
            Self::Match(m) => Some(m),
            Self::NoMatch => None,
        }
    }
}

/// A reference image that could not be prepared.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedTarget {
    pub name: String,
    pub reason: String,
}

/// A comparison the service did not complete.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailedComparison {
    pub name: String,
    pub reason: String,
}

/// Everything learned during one pass over the reference set.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    pub run_id: String,
    pub decision: MatchDecision,
    /// Comparison requests issued, successful or not.
    pub comparisons: usize,
    /// Every matching target, in enumeration order.
    pub matches: Vec<TargetMatch>,
    pub skipped: Vec<SkippedTarget>,
    pub failed: Vec<FailedComparison>,
}

impl RunReport {
    fn new(run_id: Uuid) -> Self {
        Self {
            run_id: run_id.to_string(),
            decision: MatchDecision::NoMatch,
            comparisons: 0,
            matches: Vec::new(),
            skipped: Vec::new(),
            failed: Vec::new(),
        }
    }

    fn record_match(&mut self, hit: TargetMatch) {
        if !self.decision.is_match() {
            self.decision = MatchDecision::Match(hit.clone());
        }
        self.matches.push(hit);
    }
}

/// Terminal state of a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RunOutcome {
    Decided(RunReport),
    /// The reference directory is absent or unreadable; nothing was compared.
    DirectoryMissing { dir: PathBuf, reason: String },
}

/// Progress notifications for the presentation layer.
#[derive(Debug, Clone, PartialEq)]
pub enum RunEvent {
    SourcePrepared(ImageAsset),
    Comparing { name: String },
    TargetSkipped { name: String, reason: String },
    ComparisonFailed { name: String, reason: String },
    Matched(TargetMatch),
}

/// Probe, normalize, then size-limit the image at `path`.
///
/// An image that passes through both stages untouched has only had its
/// header read, so it is fully decoded once here; the returned asset is
/// still the original file.
pub fn prepare_image(path: &Path, limits: &SizeLimits) -> Result<ImageAsset, ImageProcessingError> {
    let asset = ImageAsset::probe(path)?;
    let asset = normalize(asset)?;
    let asset = limit(asset, limits)?;
    if asset.path == path {
        asset.decode()?;
    }
    Ok(asset)
}

/// Drives one source image through the reference set.
pub struct MatchOrchestrator<C> {
    comparer: C,
    config: MatchConfig,
}

impl<C: FaceComparer> MatchOrchestrator<C> {
    pub fn new(comparer: C, config: MatchConfig) -> Self {
        Self { comparer, config }
    }

    pub fn config(&self) -> &MatchConfig {
        &self.config
    }

    /// [`prepare_image`] on the blocking thread pool.
    pub async fn prepare(&self, path: &Path) -> Result<ImageAsset, ImageProcessingError> {
        let path = path.to_path_buf();
        let limits = self.config.limits.clone();
        tokio::task::spawn_blocking(move || prepare_image(&path, &limits))
            .await
            .map_err(|e| ImageProcessingError::Worker(e.to_string()))?
    }

    /// Prepare `source` and compare it against every reference image.
    ///
    /// Fails only when the source itself cannot be prepared; in that case no
    /// comparison is issued.
    pub async fn run<F>(&self, source: &Path, mut observer: F) -> Result<RunOutcome, PipelineError>
    where
        F: FnMut(&RunEvent),
    {
        let run_id = Uuid::new_v4();
        self.run_source(run_id, source, &mut observer)
            .instrument(tracing::info_span!("run", %run_id))
            .await
    }

    async fn run_source<F>(
        &self,
        run_id: Uuid,
        source: &Path,
        observer: &mut F,
    ) -> Result<RunOutcome, PipelineError>
    where
        F: FnMut(&RunEvent),
    {
        tracing::info!(source = %source.display(), "preparing source image");
        let source = self.prepare(source).await.map_err(|e| {
            tracing::error!(error = %e, "source image rejected");
            PipelineError::Source(e)
        })?;
        observer(&RunEvent::SourcePrepared(source.clone()));

        Ok(self.scan(run_id, &source, observer).await)
    }

    /// Compare an already prepared source against the reference set.
    pub async fn run_prepared<F>(&self, source: &ImageAsset, mut observer: F) -> RunOutcome
    where
        F: FnMut(&RunEvent),
    {
        let run_id = Uuid::new_v4();
        self.scan(run_id, source, &mut observer)
            .instrument(tracing::info_span!("run", %run_id))
            .await
    }

    async fn scan<F>(&self, run_id: Uuid, source: &ImageAsset, observer: &mut F) -> RunOutcome
    where
        F: FnMut(&RunEvent),
    {
        let dir = &self.config.faces_dir;
        let entries = match ReferenceSet::open(dir).and_then(|set| set.entries()) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(dir = %dir.display(), error = %e, "reference set unavailable");
                return RunOutcome::DirectoryMissing {
                    dir: dir.clone(),
                    reason: e.to_string(),
                };
            }
        };

        let mut report = RunReport::new(run_id);
        for entry in entries {
            self.compare_target(source, entry, &mut report, observer).await;
        }

        match &report.decision {
            MatchDecision::Match(hit) => tracing::info!(
                reference = %hit.name,
                similarity = hit.similarity,
                comparisons = report.comparisons,
                "match found"
            ),
            MatchDecision::NoMatch => tracing::info!(
                comparisons = report.comparisons,
                skipped = report.skipped.len(),
                failed = report.failed.len(),
                "no match"
            ),
        }

        RunOutcome::Decided(report)
    }

    async fn compare_target<F>(
        &self,
        source: &ImageAsset,
        entry: ReferenceEntry,
        report: &mut RunReport,
        observer: &mut F,
    ) where
        F: FnMut(&RunEvent),
    {
        let ReferenceEntry { path, name } = entry;
        observer(&RunEvent::Comparing { name: name.clone() });

        let target = match self.prepare(&path).await {
            Ok(target) => target,
            Err(e) => {
                tracing::warn!(reference = %name, error = %e, "skipping reference image");
                let reason = e.to_string();
                observer(&RunEvent::TargetSkipped {
                    name: name.clone(),
                    reason: reason.clone(),
                });
                report.skipped.push(SkippedTarget { name, reason });
                return;
            }
        };

        let request = ComparisonRequest {
            source,
            target: &target,
            similarity_threshold: self.config.service_threshold,
        };
        report.comparisons += 1;

        let result = match self.comparer.compare(&request).await {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!(reference = %name, error = %e, "comparison failed; treating as no match");
                let reason = e.to_string();
                observer(&RunEvent::ComparisonFailed {
                    name: name.clone(),
                    reason: reason.clone(),
                });
                report.failed.push(FailedComparison { name, reason });
                return;
            }
        };

        tracing::debug!(
            reference = %name,
            matches = result.face_matches.len(),
            unmatched = result.unmatched_faces.len(),
            "comparison complete"
        );

        if let Some(best) = result.first_above(self.config.similarity_threshold) {
            let hit = TargetMatch {
                name,
                path,
                similarity: best.similarity,
                face: best.face.clone(),
            };
            observer(&RunEvent::Matched(hit.clone()));
            report.record_match(hit);
        }
    }
}
