//! The face comparison capability.
//!
//! Matching itself happens in an external service. The orchestrator only
//! sees this narrow contract, which lets tests substitute a scripted fake.

use crate::asset::ImageAsset;
use serde::{Deserialize, Serialize};
use std::future::Future;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CompareError {
    #[error("failed to read image {path}: {source}")]
    ImageRead {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("missing credentials: {0}")]
    Credentials(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("request timed out")]
    Timeout,
    #[error("service error {code} (HTTP {status}): {message}")]
    Service {
        status: u16,
        code: String,
        message: String,
    },
    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

impl CompareError {
    /// Whether retrying the same request might succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Network(_) | Self::Timeout => true,
            Self::Service { status, code, .. } => {
                *status >= 500
                    || *status == 429
                    || matches!(
                        code.as_str(),
                        "ThrottlingException"
                            | "ProvisionedThroughputExceededException"
                            | "InternalServerError"
                            | "ServiceUnavailableException"
                    )
            }
            Self::ImageRead { .. } | Self::Credentials(_) | Self::MalformedResponse(_) => false,
        }
    }
}

/// A prepared (source, target) pair and the threshold forwarded to the service.
#[derive(Debug, Clone, Copy)]
pub struct ComparisonRequest<'a> {
    pub source: &'a ImageAsset,
    pub target: &'a ImageAsset,
    /// Minimum similarity (0–100) the service should report.
    pub similarity_threshold: f32,
}

/// Face region as ratios of the overall image width/height.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BoundingBox {
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
}

/// A face located by the service.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DetectedFace {
    pub bounding_box: BoundingBox,
    /// Detection confidence (0–100).
    pub confidence: f32,
}

/// A face in the target image that resembles the source face.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaceMatch {
    /// Similarity score (0–100).
    pub similarity: f32,
    pub face: DetectedFace,
}

/// Service response for one (source, target) pair.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ComparisonResult {
    /// Matches in the order the service returned them.
    pub face_matches: Vec<FaceMatch>,
    pub unmatched_faces: Vec<DetectedFace>,
    pub source_face: Option<DetectedFace>,
}

impl ComparisonResult {
    /// First match, in service order, whose similarity strictly exceeds `threshold`.
    pub fn first_above(&self, threshold: f32) -> Option<&FaceMatch> {
        self.face_matches.iter().find(|m| m.similarity > threshold)
    }
}

/// Submit a comparison to the external service.
pub trait FaceComparer {
    fn compare(
        &self,
        request: &ComparisonRequest<'_>,
    ) -> impl Future<Output = Result<ComparisonResult, CompareError>> + Send;
}

impl<C: FaceComparer> FaceComparer for &C {
    fn compare(
        &self,
        request: &ComparisonRequest<'_>,
    ) -> impl Future<Output = Result<ComparisonResult, CompareError>> + Send {
        (**self).compare(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn face_match(similarity: f32, left: f32) -> FaceMatch {
        FaceMatch {
            similarity,
            face: DetectedFace {
                bounding_box: BoundingBox {
                    left,
                    ..Default::default()
                },
                confidence: 99.0,
            },
        }
    }

    #[test]
    fn test_first_above_is_strict() {
        let result = ComparisonResult {
            face_matches: vec![face_match(70.0, 0.1)],
            ..Default::default()
        };
        assert!(result.first_above(70.0).is_none());
        assert!(result.first_above(69.9).is_some());
    }

    #[test]
    fn test_first_above_keeps_service_order() {
        let result = ComparisonResult {
            face_matches: vec![
                face_match(50.0, 0.1),
                face_match(80.0, 0.2),
                face_match(99.0, 0.3),
            ],
            ..Default::default()
        };
        let m = result.first_above(70.0).unwrap();
        assert_eq!(m.similarity, 80.0);
        assert_eq!(m.face.bounding_box.left, 0.2);
    }

    #[test]
    fn test_first_above_empty() {
        assert!(ComparisonResult::default().first_above(0.0).is_none());
    }

    #[test]
    fn test_transient_classification() {
        assert!(CompareError::Timeout.is_transient());
        assert!(CompareError::Network("reset".into()).is_transient());
        assert!(CompareError::Service {
            status: 400,
            code: "ThrottlingException".into(),
            message: "slow down".into(),
        }
        .is_transient());
        assert!(CompareError::Service {
            status: 503,
            code: "Unknown".into(),
            message: String::new(),
        }
        .is_transient());
        assert!(!CompareError::Service {
            status: 400,
            code: "InvalidParameterException".into(),
            message: "no face in source".into(),
        }
        .is_transient());
        assert!(!CompareError::MalformedResponse("eof".into()).is_transient());
    }
}
