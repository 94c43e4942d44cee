//! Channel-wise transforms between pixel bytes and model float values.
//!
//! Channel indices passed to these functions always refer to the colour of
//! the channel (0 = red, 1 = green, 2 = blue), regardless of the order in
//! which a layer stores its channels.

use crate::quantize::StandardRange;

/// Maps a pixel byte in `[0, 255]` to the float range a model expects.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum PixelNormalizer {
    /// `x / 255`
    ZeroToOne,

    /// `x / 127.5 - 1`
    NegativeOneToOne,

    /// `x * scale + bias[channel]`
    Affine { scale: f32, bias: [f32; 3] },
}

impl PixelNormalizer {
    pub fn standard(range: StandardRange) -> PixelNormalizer {
        match range {
            StandardRange::ZeroToOne => PixelNormalizer::ZeroToOne,
            StandardRange::NegativeOneToOne => PixelNormalizer::NegativeOneToOne,
        }
    }

    /// Create an affine normalizer with a bias for each of the red, green and
    /// blue channels.
    pub fn affine(scale: f32, bias: [f32; 3]) -> PixelNormalizer {
        PixelNormalizer::Affine { scale, bias }
    }

    /// Normalize byte `value` from colour channel `channel`.
    pub fn normalize(&self, value: u8, channel: usize) -> f32 {
        let x = value as f32;
        match *self {
            PixelNormalizer::ZeroToOne => x / 255.0,
            PixelNormalizer::NegativeOneToOne => x / 127.5 - 1.0,
            PixelNormalizer::Affine { scale, bias } => x * scale + bias[channel],
        }
    }
}

/// Maps a model float value back to a pixel byte.
///
/// Results outside `[0, 255]` are clamped.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum PixelDenormalizer {
    /// `v * 255`
    ZeroToOne,

    /// `(v + 1) * 127.5`
    NegativeOneToOne,

    /// `(v + bias[channel]) * scale`
    Affine { scale: f32, bias: [f32; 3] },
}

impl PixelDenormalizer {
    pub fn standard(range: StandardRange) -> PixelDenormalizer {
        match range {
            StandardRange::ZeroToOne => PixelDenormalizer::ZeroToOne,
            StandardRange::NegativeOneToOne => PixelDenormalizer::NegativeOneToOne,
        }
    }

    pub fn affine(scale: f32, bias: [f32; 3]) -> PixelDenormalizer {
        PixelDenormalizer::Affine { scale, bias }
    }

    /// Denormalize `value` for colour channel `channel`.
    pub fn denormalize(&self, value: f32, channel: usize) -> u8 {
        let x = match *self {
            PixelDenormalizer::ZeroToOne => value * 255.0,
            PixelDenormalizer::NegativeOneToOne => (value + 1.0) * 127.5,
            PixelDenormalizer::Affine { scale, bias } => (value + bias[channel]) * scale,
        };
        x.clamp(0., 255.) as u8
    }
}
