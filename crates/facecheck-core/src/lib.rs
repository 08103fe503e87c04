//! facecheck-core — Image preparation and match orchestration.
//!
//! Normalizes and size-limits images so a managed face comparison service
//! accepts them, enumerates a folder of reference faces, and relays each
//! comparison through the [`FaceComparer`] capability to reach a single
//! match decision.

pub mod asset;
pub mod compare;
pub mod limit;
pub mod normalize;
pub mod orchestrator;
pub mod scan;
pub mod upload;

pub use asset::{ImageAsset, ImageProcessingError};
pub use compare::{
    BoundingBox, CompareError, ComparisonRequest, ComparisonResult, DetectedFace, FaceComparer,
    FaceMatch,
};
pub use limit::{limit, ResizePolicy, SizeLimits};
pub use normalize::normalize;
pub use orchestrator::{
    prepare_image, FailedComparison, MatchConfig, MatchDecision, MatchOrchestrator,
    PipelineError, RunEvent, RunOutcome, RunReport, SkippedTarget, TargetMatch,
};
pub use scan::{ReferenceEntry, ReferenceSet, ScanError};
pub use upload::{Upload, UploadError};
