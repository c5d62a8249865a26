//! Binarization of page images ahead of marker decoding.
//!
//! Scanners from different vendors produce very different contrast, and QR
//! decoders are sensitive to it. Every supported image is reduced to 8-bit
//! grayscale and thresholded to pure black and white before decoding.

use image::{DynamicImage, GrayImage, RgbImage};
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::pdf::images::{EmbeddedImage, ImageFilter};

/// Gray level a pixel must exceed to become white
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Brightness(u8);

impl Brightness {
    pub const DEFAULT: Brightness = Brightness(128);

    pub fn clamped(value: i64) -> Self {
        Brightness(value.clamp(0, 255) as u8)
    }

    pub fn value(self) -> u8 {
        self.0
    }
}

impl Default for Brightness {
    fn default() -> Self {
        Brightness::DEFAULT
    }
}

#[derive(Debug, Error)]
pub enum PreprocessError {
    #[error("unsupported image filter {0}")]
    UnsupportedFilter(ImageFilter),

    #[error("unsupported sample layout: {width}x{height}, {bits} bits per component, {len} bytes")]
    UnsupportedLayout {
        width: u32,
        height: u32,
        bits: u8,
        len: usize,
    },

    #[error("failed to decode image: {0}")]
    Decode(#[from] image::ImageError),

    #[error("failed to decode JPEG 2000 image: {0}")]
    Jpx(String),

    #[error("failed to write scratch image {}: {source}", .path.display())]
    Scratch {
        path: PathBuf,
        source: image::ImageError,
    },
}

/// Binarize `image` and write it as a PNG into `scratch_dir`, returning its path
pub fn preprocess(
    image: &EmbeddedImage,
    threshold: Brightness,
    scratch_dir: &Path,
) -> Result<PathBuf, PreprocessError> {
    let binary = binarize(to_grayscale(image)?, threshold);

    let path = scratch_dir.join(format!("{}.png", scratch_name(&image.name)));
    binary
        .save(&path)
        .map_err(|source| PreprocessError::Scratch {
            path: path.clone(),
            source,
        })?;

    Ok(path)
}

pub fn to_grayscale(image: &EmbeddedImage) -> Result<GrayImage, PreprocessError> {
    match &image.filter {
        ImageFilter::Flate => samples_to_gray(image),
        ImageFilter::Dct => Ok(image::load_from_memory(&image.data)?.to_luma8()),
        ImageFilter::Jpx => jpx_to_gray(&image.data),
        other => Err(PreprocessError::UnsupportedFilter(other.clone())),
    }
}

// `image` has no JPEG 2000 codec; openjpeg handles both JP2 files and raw codestreams.
fn jpx_to_gray(data: &[u8]) -> Result<GrayImage, PreprocessError> {
    let decoded = jpeg2k::Image::from_bytes(data).map_err(jpx_error)?;
    let dynamic = DynamicImage::try_from(&decoded).map_err(jpx_error)?;
    Ok(dynamic.to_luma8())
}

fn jpx_error(e: impl fmt::Display) -> PreprocessError {
    PreprocessError::Jpx(e.to_string())
}

pub fn binarize(mut gray: GrayImage, threshold: Brightness) -> GrayImage {
    let threshold = threshold.value();
    for pixel in gray.pixels_mut() {
        pixel.0[0] = if pixel.0[0] > threshold { 255 } else { 0 };
    }
    gray
}

fn samples_to_gray(image: &EmbeddedImage) -> Result<GrayImage, PreprocessError> {
    let layout_error = || PreprocessError::UnsupportedLayout {
        width: image.width,
        height: image.height,
        bits: image.bits_per_component,
        len: image.data.len(),
    };

    let (width, height) = (image.width as usize, image.height as usize);
    let pixels = width * height;
    if pixels == 0 {
        return Err(layout_error());
    }

    match image.bits_per_component {
        8 => {
            // /ColorSpace may be an indirect ICC profile; the sample count is authoritative
            let components = image.data.len() / pixels;
            let samples = &image.data[..pixels * components];
            match components {
                1 => GrayImage::from_raw(image.width, image.height, samples.to_vec())
                    .ok_or_else(layout_error),
                3 => RgbImage::from_raw(image.width, image.height, samples.to_vec())
                    .map(|rgb| DynamicImage::ImageRgb8(rgb).to_luma8())
                    .ok_or_else(layout_error),
                4 => {
                    let rgb = samples.chunks_exact(4).flat_map(cmyk_to_rgb).collect();
                    RgbImage::from_raw(image.width, image.height, rgb)
                        .map(|rgb| DynamicImage::ImageRgb8(rgb).to_luma8())
                        .ok_or_else(layout_error)
                }
                _ => Err(layout_error()),
            }
        }
        1 => {
            let stride = width.div_ceil(8);
            if image.data.len() < stride * height {
                return Err(layout_error());
            }
            let gray = image
                .data
                .chunks_exact(stride)
                .take(height)
                .flat_map(|row| {
                    (0..width).map(move |x| {
                        if (row[x / 8] >> (7 - x % 8)) & 1 == 1 {
                            255
                        } else {
                            0
                        }
                    })
                })
                .collect();
            GrayImage::from_raw(image.width, image.height, gray).ok_or_else(layout_error)
        }
        _ => Err(layout_error()),
    }
}

fn cmyk_to_rgb(cmyk: &[u8]) -> [u8; 3] {
    let k = 255 - u16::from(cmyk[3]);
    let channel = |c: u8| ((255 - u16::from(c)) * k / 255) as u8;
    [channel(cmyk[0]), channel(cmyk[1]), channel(cmyk[2])]
}

fn scratch_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    if cleaned.is_empty() {
        "image".to_string()
    } else {
        cleaned
    }
}
