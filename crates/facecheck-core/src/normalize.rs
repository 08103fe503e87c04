//! Encoding normalization.
//!
//! JPEG and PNG pass through untouched. Anything else the `image` crate can
//! decode (WebP, GIF, BMP, TIFF, ...) is flattened to 8-bit RGB and written
//! as a JPEG sibling of the original.

use crate::asset::{sibling_jpeg, ImageAsset, ImageProcessingError};
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageFormat};
use std::path::{Path, PathBuf};

pub(crate) const JPEG_QUALITY: u8 = 90;

/// Return `asset` unchanged if it is already JPEG or PNG, otherwise convert
/// it to a full-color JPEG at `<stem>.jpg` next to the original.
///
/// The original file is never deleted or overwritten.
pub fn normalize(asset: ImageAsset) -> Result<ImageAsset, ImageProcessingError> {
    if asset.is_accepted() {
        tracing::trace!(path = %asset.path.display(), format = ?asset.format, "encoding accepted");
        return Ok(asset);
    }

    let img = asset.decode()?;
    let rgb = DynamicImage::ImageRgb8(img.to_rgb8());
    let output = converted_path(&asset.path);

    write_jpeg(&rgb, &output, JPEG_QUALITY)?;

    tracing::info!(
        from = %asset.path.display(),
        to = %output.display(),
        format = ?asset.format,
        "converted to JPEG"
    );

    Ok(ImageAsset {
        path: output,
        format: ImageFormat::Jpeg,
        width: rgb.width(),
        height: rgb.height(),
    })
}

/// `<stem>.jpg`, or `<stem>_converted.jpg` when that name is the original
/// itself (mislabelled content) or another file already holds it.
fn converted_path(path: &Path) -> PathBuf {
    let candidate = sibling_jpeg(path, "");
    if candidate == path || candidate.exists() {
        sibling_jpeg(path, "_converted")
    } else {
        candidate
    }
}

/// Encode `img` as JPEG at `quality` and write it to `path`.
pub(crate) fn write_jpeg(
    img: &DynamicImage,
    path: &Path,
    quality: u8,
) -> Result<u64, ImageProcessingError> {
    let buf = encode_jpeg(img, quality, path)?;
    let len = buf.len() as u64;
    std::fs::write(path, buf).map_err(|source| ImageProcessingError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(len)
}

pub(crate) fn encode_jpeg(
    img: &DynamicImage,
    quality: u8,
    path: &Path,
) -> Result<Vec<u8>, ImageProcessingError> {
    let mut buf = Vec::new();
    img.write_with_encoder(JpegEncoder::new_with_quality(&mut buf, quality))
        .map_err(|source| ImageProcessingError::Encode {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(buf)
}
