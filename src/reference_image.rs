use std::path::Path;

use image::{DynamicImage, ImageFormat};
use ndarray::{Array3, s};

use crate::Error;

/// An RGB sample grid of shape `(rows, columns, 3)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceImage {
    pixels: Array3<u8>,
}

impl ReferenceImage {
    pub fn from_rgb(pixels: Array3<u8>) -> crate::Result<Self> {
        if pixels.shape()[2] != 3 {
            return Err(Error::UnsupportedImage(format!(
                "expected 3 channels, got {}",
                pixels.shape()[2]
            )));
        }
        Ok(Self { pixels })
    }

    pub fn pixels(&self) -> &Array3<u8> {
        &self.pixels
    }

    /// `[rows, columns, channels]`
    pub fn shape(&self) -> Vec<u64> {
        self.pixels.shape().iter().map(|&n| n as u64).collect()
    }

    /// Samples in C order.
    pub fn to_vec(&self) -> Vec<u8> {
        self.pixels.iter().copied().collect()
    }
}

/// Decode a PNG file and drop its alpha channel.
///
/// 8-bit RGBA and RGB images are accepted.
/// Any other colour encoding is rejected rather than converted.
pub fn load_png(path: impl AsRef<Path>) -> crate::Result<ReferenceImage> {
    let path = path.as_ref();
    let bytes = std::fs::read(path)?;
    let decoded = image::load_from_memory_with_format(&bytes, ImageFormat::Png)?;
    let rgba = match decoded {
        DynamicImage::ImageRgba8(buf) => buf,
        DynamicImage::ImageRgb8(buf) => DynamicImage::ImageRgb8(buf).to_rgba8(),
        other => {
            return Err(Error::UnsupportedImage(format!(
                "{} has colour type {:?}, expected 8-bit RGB or RGBA",
                path.display(),
                other.color()
            )));
        }
    };
    let (width, height) = rgba.dimensions();
    log::debug!("decoded {}: {width}x{height}", path.display());

    let rgba = Array3::from_shape_vec((height as usize, width as usize, 4), rgba.into_raw())
        .map_err(Error::wrap)?;
    ReferenceImage::from_rgb(rgba.slice(s![.., .., ..3]).to_owned())
}
