//! Page-image cleanup ahead of OCR.
//!
//! Grayscale → adaptive Gaussian threshold → morphological opening. The
//! threshold is local rather than global so that scans with uneven lighting
//! still binarise cleanly. The opening removes bright specks narrower than
//! the kernel, which otherwise break glyph strokes apart.
//!
//! Preprocessing is an enhancement, never a precondition: [`preprocess`]
//! returns the untouched input if anything goes wrong.

use crate::config::PreprocessSettings;
use image::{DynamicImage, GrayImage, Luma};
use imageproc::distance_transform::Norm;
use imageproc::filter::gaussian_blur_f32;
use imageproc::morphology::open;
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error, PartialEq)]
pub enum PreprocessError {
    #[error("image is empty ({width}x{height})")]
    EmptyImage { width: u32, height: u32 },

    #[error("image {width}x{height} is smaller than the {block}px threshold window")]
    TooSmall { width: u32, height: u32, block: u32 },
}

/// Binarise and denoise a page render for OCR; falls back to the input.
pub fn preprocess(image: &DynamicImage, settings: &PreprocessSettings) -> DynamicImage {
    match try_preprocess(image, settings) {
        Ok(binary) => DynamicImage::ImageLuma8(binary),
        Err(e) => {
            error!("Error preprocessing image: {}", e);
            image.clone()
        }
    }
}

/// Fallible core of [`preprocess`].
pub fn try_preprocess(
    image: &DynamicImage,
    settings: &PreprocessSettings,
) -> Result<GrayImage, PreprocessError> {
    let (width, height) = (image.width(), image.height());
    if width == 0 || height == 0 {
        return Err(PreprocessError::EmptyImage { width, height });
    }
    if width < settings.block_size || height < settings.block_size {
        return Err(PreprocessError::TooSmall {
            width,
            height,
            block: settings.block_size,
        });
    }

    let gray = image.to_luma8();
    let binary = adaptive_threshold_gaussian(&gray, settings.block_size, settings.offset);
    Ok(open(&binary, Norm::LInf, settings.kernel_radius))
}

/// Gaussian-weighted local threshold.
///
/// A pixel becomes white (255) when it is brighter than its neighbourhood's
/// Gaussian-weighted mean minus `offset`, black (0) otherwise.
pub fn adaptive_threshold_gaussian(gray: &GrayImage, block_size: u32, offset: i16) -> GrayImage {
    let local_mean = gaussian_blur_f32(gray, block_sigma(block_size));
    let mut out = GrayImage::new(gray.width(), gray.height());
    for (x, y, pixel) in gray.enumerate_pixels() {
        let mean = i16::from(local_mean.get_pixel(x, y)[0]);
        let value = if i16::from(pixel[0]) > mean - offset {
            255
        } else {
            0
        };
        out.put_pixel(x, y, Luma([value]));
    }
    out
}

/// Standard deviation of the Gaussian kernel that spans `block_size` pixels.
fn block_sigma(block_size: u32) -> f32 {
    0.3 * ((block_size as f32 - 1.0) * 0.5 - 1.0) + 0.8
}
