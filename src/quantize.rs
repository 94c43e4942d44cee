//! Conversions between floating point vector values and quantized bytes.
//!
//! Quantized layers store each element as a single unsigned byte. A
//! [`Quantizer`] maps application floats into that byte range before input
//! values are written to a tensor, and a [`Dequantizer`] maps output bytes
//! back into floats.
//!
//! The two directions are configured independently. The affine forms do not
//! assume that a quantizer and dequantizer with the same parameters are
//! inverses of one another.

/// Standard value ranges which have built-in quantization functions.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum StandardRange {
    /// Values in `[0, 1]`.
    ZeroToOne,
    /// Values in `[-1, 1]`.
    NegativeOneToOne,
}

impl StandardRange {
    /// Parse the `standard` key of a quantization or normalization entry.
    pub fn from_name(name: &str) -> Option<StandardRange> {
        match name {
            "[0,1]" => Some(StandardRange::ZeroToOne),
            "[-1,1]" => Some(StandardRange::NegativeOneToOne),
            _ => None,
        }
    }
}

/// Converts floating point values into quantized values.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Quantizer {
    /// Maps `[0, 1]` to `[0, 255]`: `q = v * 255`.
    ZeroToOne,

    /// Maps `[-1, 1]` to `[0, 255]`: `q = (v + 1) * 127.5`.
    NegativeOneToOne,

    /// Applies `q = (v + bias) * scale`.
    Affine { scale: f32, bias: f32 },
}

impl Quantizer {
    /// Create the quantizer for a standard range.
    pub fn standard(range: StandardRange) -> Quantizer {
        match range {
            StandardRange::ZeroToOne => Quantizer::ZeroToOne,
            StandardRange::NegativeOneToOne => Quantizer::NegativeOneToOne,
        }
    }

    /// Create a quantizer that computes `(v + bias) * scale`.
    pub fn affine(scale: f32, bias: f32) -> Quantizer {
        Quantizer::Affine { scale, bias }
    }

    /// Quantize a single value.
    ///
    /// The result is truncated towards zero. It is not clamped to the byte
    /// range, callers which store it as a byte keep only the low 8 bits.
    pub fn quantize(&self, value: f32) -> i32 {
        let q = match *self {
            Quantizer::ZeroToOne => value * 255.0,
            Quantizer::NegativeOneToOne => (value + 1.0) * 127.5,
            Quantizer::Affine { scale, bias } => (value + bias) * scale,
        };
        q as i32
    }

    /// Quantize a value and truncate it to a single byte.
    pub fn quantize_to_byte(&self, value: f32) -> u8 {
        self.quantize(value) as u8
    }
}

/// Converts quantized values back into floating point values.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Dequantizer {
    /// Maps `[0, 255]` to `[0, 1]`: `v = q / 255`.
    ZeroToOne,

    /// Maps `[0, 255]` to `[-1, 1]`: `v = q / 127.5 - 1`.
    NegativeOneToOne,

    /// Applies `v = q * scale + bias`.
    Affine { scale: f32, bias: f32 },
}

impl Dequantizer {
    /// Create the dequantizer for a standard range.
    pub fn standard(range: StandardRange) -> Dequantizer {
        match range {
            StandardRange::ZeroToOne => Dequantizer::ZeroToOne,
            StandardRange::NegativeOneToOne => Dequantizer::NegativeOneToOne,
        }
    }

    /// Create a dequantizer that computes `q * scale + bias`.
    pub fn affine(scale: f32, bias: f32) -> Dequantizer {
        Dequantizer::Affine { scale, bias }
    }

    /// Dequantize a single value.
    pub fn dequantize(&self, value: i32) -> f32 {
        let value = value as f32;
        match *self {
            Dequantizer::ZeroToOne => value / 255.0,
            Dequantizer::NegativeOneToOne => value / 127.5 - 1.0,
            Dequantizer::Affine { scale, bias } => value * scale + bias,
        }
    }

    /// Dequantize a stored byte, interpreting it as unsigned.
    pub fn dequantize_byte(&self, value: u8) -> f32 {
        self.dequantize(value as i32)
    }
}
