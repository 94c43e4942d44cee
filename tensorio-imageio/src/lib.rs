//! Utilities for loading, saving and preprocessing images for use with
//! tensorio image layers.
//!
//! The codec in `tensorio` requires that images already have the width and
//! height of the layer they are encoded into. [`resize_for_layer`] performs
//! that step explicitly.

use std::error::Error;
use std::path::Path;

use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageFormat, RgbaImage};
use tensorio::{PixelBufferDescription, Value};

/// Errors reported when reading an image.
#[derive(Debug)]
pub enum ReadImageError {
    /// The image could not be loaded or decoded.
    ImageError(image::ImageError),
    /// The image has zero width or height.
    EmptyImage,
}

impl std::fmt::Display for ReadImageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReadImageError::ImageError(e) => write!(f, "failed to read image: {}", e),
            ReadImageError::EmptyImage => write!(f, "image is empty"),
        }
    }
}

impl Error for ReadImageError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ReadImageError::ImageError(e) => Some(e),
            ReadImageError::EmptyImage => None,
        }
    }
}

fn check_not_empty(image: DynamicImage) -> Result<DynamicImage, ReadImageError> {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return Err(ReadImageError::EmptyImage);
    }
    Ok(image)
}

/// Read an image from a file.
pub fn read_image<P: AsRef<Path>>(path: P) -> Result<DynamicImage, ReadImageError> {
    image::open(path)
        .map_err(ReadImageError::ImageError)
        .and_then(check_not_empty)
}

/// Decode an image from an encoded byte buffer, eg. the contents of a PNG or
/// JPEG file.
pub fn decode_image(bytes: &[u8]) -> Result<DynamicImage, ReadImageError> {
    image::load_from_memory(bytes)
        .map_err(ReadImageError::ImageError)
        .and_then(check_not_empty)
}

/// Scale `image` to the width and height of an image layer.
///
/// The aspect ratio is not preserved. Images that already have the right
/// size are returned unchanged.
pub fn resize_for_layer(image: DynamicImage, desc: &PixelBufferDescription) -> DynamicImage {
    let volume = desc.volume();
    let (width, height) = (volume.width as u32, volume.height as u32);
    if image.dimensions() == (width, height) {
        return image;
    }
    image.resize_exact(width, height, FilterType::Triangle)
}

/// Read an image from a file and scale it to the size of an image layer.
pub fn read_image_for_layer<P: AsRef<Path>>(
    path: P,
    desc: &PixelBufferDescription,
) -> Result<DynamicImage, ReadImageError> {
    read_image(path).map(|image| resize_for_layer(image, desc))
}

/// Errors returned when writing an image.
#[derive(Debug)]
pub enum WriteImageError {
    /// The value to write is not an image.
    NotAnImage(&'static str),
    /// The image could not be written.
    ImageError(image::ImageError),
}

impl std::fmt::Display for WriteImageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotAnImage(kind) => write!(f, "expected an image but found {}", kind),
            Self::ImageError(e) => write!(f, "failed to write image: {}", e),
        }
    }
}

impl Error for WriteImageError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::ImageError(e) => Some(e),
            Self::NotAnImage(_) => None,
        }
    }
}

/// Write an image to a PNG file.
pub fn write_image<P: AsRef<Path>>(path: P, image: &RgbaImage) -> Result<(), WriteImageError> {
    image
        .save_with_format(path, ImageFormat::Png)
        .map_err(WriteImageError::ImageError)
}

/// Write a decoded image output to a PNG file.
pub fn write_value<P: AsRef<Path>>(path: P, value: Value) -> Result<(), WriteImageError> {
    let kind = value.view().type_name();
    let image = value
        .into_image()
        .ok_or(WriteImageError::NotAnImage(kind))?;
    write_image(path, &image)
}
