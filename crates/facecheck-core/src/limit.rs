//! Dimension and payload ceilings imposed by the comparison service.

use crate::asset::{sibling_jpeg, ImageAsset, ImageProcessingError};
use crate::normalize::{encode_jpeg, JPEG_QUALITY};
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat};
use serde::{Deserialize, Serialize};

// --- Service limits ---
pub const MAX_DIMENSION: u32 = 4096;
pub const MAX_IMAGE_BYTES: u64 = 5 * 1024 * 1024;

/// Qualities tried in order when a re-encoded image must fit `max_bytes`.
const QUALITY_LADDER: [u8; 5] = [JPEG_QUALITY, 80, 70, 60, 50];

/// How an oversized image is brought within `max_dimension`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResizePolicy {
    /// Scale down uniformly until both axes fit.
    #[default]
    Fit,
    /// Stretch to a `max_dimension` square regardless of aspect ratio.
    Square,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SizeLimits {
    pub max_dimension: u32,
    /// Upper bound on the encoded file size. `None` disables the check.
    pub max_bytes: Option<u64>,
    pub policy: ResizePolicy,
}

impl Default for SizeLimits {
    fn default() -> Self {
        Self {
            max_dimension: MAX_DIMENSION,
            max_bytes: Some(MAX_IMAGE_BYTES),
            policy: ResizePolicy::Fit,
        }
    }
}

impl SizeLimits {
    fn exceeds_dimensions(&self, asset: &ImageAsset) -> bool {
        asset.width > self.max_dimension || asset.height > self.max_dimension
    }
}

/// Return `asset` unchanged if it is within `limits`, otherwise write a
/// downscaled (and if needed recompressed) JPEG to `<stem>_resized.jpg`.
pub fn limit(asset: ImageAsset, limits: &SizeLimits) -> Result<ImageAsset, ImageProcessingError> {
    let over_dimensions = limits.exceeds_dimensions(&asset);
    let bytes = asset.byte_len()?;
    let over_bytes = limits.max_bytes.is_some_and(|max| bytes > max);

    if !over_dimensions && !over_bytes {
        return Ok(asset);
    }

    let mut img = asset.decode()?;
    if over_dimensions {
        let max = limits.max_dimension;
        img = match limits.policy {
            ResizePolicy::Fit => img.resize(max, max, FilterType::Lanczos3),
            ResizePolicy::Square => img.resize_exact(max, max, FilterType::Lanczos3),
        };
    }
    let rgb = DynamicImage::ImageRgb8(img.to_rgb8());
    let output = sibling_jpeg(&asset.path, "_resized");

    let mut last_len = 0;
    for quality in QUALITY_LADDER {
        let buf = encode_jpeg(&rgb, quality, &output)?;
        last_len = buf.len() as u64;
        if limits.max_bytes.is_some_and(|max| last_len > max) {
            tracing::debug!(quality, bytes = last_len, "still over byte limit");
            continue;
        }

        std::fs::write(&output, buf).map_err(|source| ImageProcessingError::Io {
            path: output.clone(),
            source,
        })?;

        tracing::info!(
            from = %asset.path.display(),
            to = %output.display(),
            original = ?(asset.width, asset.height),
            resized = ?(rgb.width(), rgb.height()),
            quality,
            bytes = last_len,
            "resized for comparison service"
        );

        return Ok(ImageAsset {
            path: output,
            format: ImageFormat::Jpeg,
            width: rgb.width(),
            height: rgb.height(),
        });
    }

    Err(ImageProcessingError::TooLarge {
        path: asset.path,
        bytes: last_len,
        limit: limits.max_bytes.unwrap_or(u64::MAX),
    })
}
