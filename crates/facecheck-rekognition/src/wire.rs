//! Rekognition JSON protocol shapes for `CompareFaces`.

use crate::config::QualityFilter;
use facecheck_core::{BoundingBox, ComparisonResult, DetectedFace, FaceMatch};
use serde::{Deserialize, Serialize};

pub const TARGET: &str = "RekognitionService.CompareFaces";
pub const CONTENT_TYPE: &str = "application/x-amz-json-1.1";

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CompareFacesRequest {
    pub source_image: ImagePayload,
    pub target_image: ImagePayload,
    pub similarity_threshold: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quality_filter: Option<QualityFilter>,
}

/// Inline image bytes, base64 encoded on the wire.
#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ImagePayload {
    pub bytes: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CompareFacesResponse {
    #[serde(default)]
    pub source_image_face: Option<WireFace>,
    #[serde(default)]
    pub face_matches: Vec<WireMatch>,
    #[serde(default)]
    pub unmatched_faces: Vec<WireFace>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct WireMatch {
    #[serde(default)]
    pub similarity: f32,
    #[serde(default)]
    pub face: WireFace,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct WireFace {
    #[serde(default)]
    pub bounding_box: WireBox,
    #[serde(default)]
    pub confidence: f32,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct WireBox {
    #[serde(default)]
    pub width: f32,
    #[serde(default)]
    pub height: f32,
    #[serde(default)]
    pub left: f32,
    #[serde(default)]
    pub top: f32,
}

/// Error body: `{"__type": "com.amazonaws...#Code", "message": "..."}`.
/// Some services capitalize `Message`.
#[derive(Debug, Deserialize)]
pub struct ErrorBody {
    #[serde(rename = "__type", default)]
    pub error_type: Option<String>,
    #[serde(alias = "Message", default)]
    pub message: Option<String>,
}

impl ErrorBody {
    /// Short error code with any namespace prefix stripped.
    pub fn code(&self) -> Option<&str> {
        self.error_type
            .as_deref()
            .map(|t| t.rsplit('#').next().unwrap_or(t))
    }
}

impl From<WireFace> for DetectedFace {
    fn from(face: WireFace) -> Self {
        Self {
            bounding_box: BoundingBox {
                left: face.bounding_box.left,
                top: face.bounding_box.top,
                width: face.bounding_box.width,
                height: face.bounding_box.height,
            },
            confidence: face.confidence,
        }
    }
}

impl From<CompareFacesResponse> for ComparisonResult {
    fn from(response: CompareFacesResponse) -> Self {
        Self {
            face_matches: response
                .face_matches
                .into_iter()
                .map(|m| FaceMatch {
                    similarity: m.similarity,
                    face: m.face.into(),
                })
                .collect(),
            unmatched_faces: response.unmatched_faces.into_iter().map(Into::into).collect(),
            source_face: response.source_image_face.map(Into::into),
        }
    }
}
