//! Format normalization: decode any accepted raster image, re-encode as
//! RGB JPEG.
//!
//! Two entry points cover the pipeline's two encode sites:
//!
//! - [`to_jpeg`] converts a non-JPEG input (in practice, PNG) to a JPEG
//!   *sibling* in the input directory, so the rest of the pipeline only ever
//!   handles JPEGs. The source file is left in place — deletion is the file
//!   lifecycle layer's call, gated on overall item success.
//! - [`save_rgb_jpeg`] re-opens the (possibly converted) image and writes it
//!   to its final caption-derived output path.
//!
//! Both force an RGB8 pixel representation first, discarding alpha channels
//! and palettes, since JPEG carries neither.

use crate::naming::OUTPUT_EXTENSION;
use image::{ImageFormat, ImageReader, RgbImage};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConvertError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to decode {path}: {detail}")]
    Decode { path: PathBuf, detail: String },
    #[error("Failed to encode {path}: {detail}")]
    Encode { path: PathBuf, detail: String },
}

/// Convert the image at `path` to a JPEG sibling (`photo.png` → `photo.jpg`).
///
/// Returns the sibling path on success. On any decode/encode failure the
/// caller must skip the item and keep the original untouched.
pub fn to_jpeg(path: &Path) -> Result<PathBuf, ConvertError> {
    let rgb = load_rgb(path)?;
    let dest = path.with_extension(OUTPUT_EXTENSION);
    encode_jpeg(&rgb, &dest)?;
    Ok(dest)
}

/// Open `src` and re-save it as an RGB JPEG at `dest`.
pub fn save_rgb_jpeg(src: &Path, dest: &Path) -> Result<(), ConvertError> {
    let rgb = load_rgb(src)?;
    encode_jpeg(&rgb, dest)
}

/// Decode an image and flatten it to RGB8.
fn load_rgb(path: &Path) -> Result<RgbImage, ConvertError> {
    let decoded = ImageReader::open(path)
        .map_err(ConvertError::Io)?
        .decode()
        .map_err(|e| ConvertError::Decode {
            path: path.to_path_buf(),
            detail: e.to_string(),
        })?;
    Ok(decoded.to_rgb8())
}

fn encode_jpeg(rgb: &RgbImage, dest: &Path) -> Result<(), ConvertError> {
    rgb.save_with_format(dest, ImageFormat::Jpeg)
        .map_err(|e| ConvertError::Encode {
            path: dest.to_path_buf(),
            detail: e.to_string(),
        })
}
