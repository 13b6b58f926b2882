//! This module prepares images for the tagger models.
//!
//! The models take a single square NHWC tensor in BGR channel order with raw
//! `0..=255` float pixel values. `ImagePreprocessor` flattens transparency onto
//! white, pads the image to a square white canvas, resizes it with a bicubic
//! filter when the square does not already match the model input, and flips
//! the channels.

use std::path::Path;

use image::{imageops, imageops::FilterType, DynamicImage, ImageReader, Rgb, RgbImage, RgbaImage};
use ndarray::{Array, Ix4};

use crate::error::{Result, TaggerError};

const WHITE: Rgb<u8> = Rgb([255, 255, 255]);

/// Fixed-point precision used when blending over the background.
const PRECISION_BITS: u32 = 7;

/// A preprocessor producing `[1, size, size, 3]` BGR tensors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImagePreprocessor {
    pub size: u32,
}

impl ImagePreprocessor {
    pub fn new(size: u32) -> Self {
        Self { size }
    }

    /// Decodes the image at `path` and converts it into a model input tensor.
    ///
    /// The format is sniffed from the file contents, so the extension does
    /// not have to match.
    pub fn prepare<P: AsRef<Path>>(&self, path: P) -> Result<Array<f32, Ix4>> {
        let path = path.as_ref();
        let decode_error = |message: String| TaggerError::ImageDecode {
            path: path.to_path_buf(),
            message,
        };
        let image = ImageReader::open(path)
            .and_then(|reader| reader.with_guessed_format())
            .map_err(|e| decode_error(e.to_string()))?
            .decode()
            .map_err(|e| decode_error(e.to_string()))?;
        Ok(self.process(&image))
    }

    /// Converts an already decoded image into a model input tensor.
    pub fn process(&self, image: &DynamicImage) -> Array<f32, Ix4> {
        let rgb = flatten_alpha(&image.to_rgba8());
        let square = pad_to_square(&rgb);

        let square = if square.width() != self.size {
            imageops::resize(&square, self.size, self.size, FilterType::CatmullRom)
        } else {
            square
        };

        to_bgr_tensor(&square)
    }
}

/// Composites `image` over an opaque white background and drops the alpha channel.
///
/// Uses the same fixed-point arithmetic as PIL's `alpha_composite` so that
/// partially transparent pixels land on identical byte values.
pub fn flatten_alpha(image: &RgbaImage) -> RgbImage {
    let (width, height) = image.dimensions();
    let mut out = RgbImage::from_pixel(width, height, WHITE);
    for (src, dst) in image.pixels().zip(out.pixels_mut()) {
        let [r, g, b, a] = src.0;
        let a = a as u32;
        let coef1 = a << PRECISION_BITS;
        let coef2 = (255 - a) << PRECISION_BITS;
        let blend = |c: u8| {
            let tmp = c as u32 * coef1 + 255 * coef2 + (0x80 << PRECISION_BITS);
            ((((tmp >> 8) + tmp) >> 8) >> PRECISION_BITS) as u8
        };
        dst.0 = [blend(r), blend(g), blend(b)];
    }
    out
}

/// Pastes `image` onto a white square canvas with side `max(width, height)`.
///
/// Offsets are floor-divided, so odd padding leaves the extra row/column on
/// the bottom/right.
pub fn pad_to_square(image: &RgbImage) -> RgbImage {
    let (width, height) = image.dimensions();
    let max_dim = width.max(height);
    if width == height {
        return image.clone();
    }

    let pad_left = (max_dim - width) / 2;
    let pad_top = (max_dim - height) / 2;

    let mut padded = RgbImage::from_pixel(max_dim, max_dim, WHITE);
    imageops::replace(&mut padded, image, pad_left as i64, pad_top as i64);
    padded
}

fn to_bgr_tensor(image: &RgbImage) -> Array<f32, Ix4> {
    let (width, height) = image.dimensions();
    let mut tensor = Array::zeros((1, height as usize, width as usize, 3));
    for (x, y, pixel) in image.enumerate_pixels() {
        let [r, g, b] = pixel.0;
        let (y, x) = (y as usize, x as usize);
        tensor[[0, y, x, 0]] = b as f32;
        tensor[[0, y, x, 1]] = g as f32;
        tensor[[0, y, x, 2]] = r as f32;
    }
    tensor
}
