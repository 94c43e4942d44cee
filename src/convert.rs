//! Encoders and decoders between application values and tensor buffers.
//!
//! There is one converter per kind of layer description. [`LayerCodec`]
//! selects the right converter for a [`LayerDescription`].

use std::error::Error;
use std::fmt;

use crate::buffer::TensorBuffer;
use crate::layer::LayerDescription;
use crate::value::{Value, ValueView};

mod pixel_buffer;
mod string;
mod vector;

pub use pixel_buffer::{PixelBufferConverter, PixelLayout};
pub use string::StringConverter;
pub use vector::VectorConverter;

/// Errors reported when encoding or decoding a value.
#[derive(Clone, Debug, PartialEq)]
pub enum ConvertError {
    /// The value's type is not accepted by the layer.
    TypeMismatch {
        /// Description of the accepted types.
        expected: &'static str,
        actual: &'static str,
    },

    /// The number of elements in the value differs from the layer's length.
    LengthMismatch { expected: usize, actual: usize },

    /// The image dimensions differ from the layer's. Sizes are `[height, width]`.
    ShapeMismatch {
        expected: [usize; 2],
        actual: [usize; 2],
    },

    /// A float value was supplied for a quantized layer with no quantizer.
    MissingQuantizer,

    /// A float value was requested from a quantized layer with no dequantizer.
    MissingDequantizer,

    /// A supplied buffer does not have the size the layer requires.
    BufferSize { expected: usize, actual: usize },

    /// A labeled view was requested for a vector whose label count differs
    /// from its length.
    LabelCountMismatch { labels: usize, values: usize },
}

impl fmt::Display for ConvertError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TypeMismatch { expected, actual } => {
                write!(f, "expected {} value but got {}", expected, actual)
            }
            Self::LengthMismatch { expected, actual } => write!(
                f,
                "expected {} elements but value has {}",
                expected, actual
            ),
            Self::ShapeMismatch { expected, actual } => write!(
                f,
                "expected image of size {}x{} but got {}x{}",
                expected[1], expected[0], actual[1], actual[0]
            ),
            Self::MissingQuantizer => write!(f, "quantized layer has no quantizer"),
            Self::MissingDequantizer => write!(f, "quantized layer has no dequantizer"),
            Self::BufferSize { expected, actual } => write!(
                f,
                "buffer has {} bytes but layer requires {}",
                actual, expected
            ),
            Self::LabelCountMismatch { labels, values } => write!(
                f,
                "vector has {} labels but {} values",
                labels, values
            ),
        }
    }
}

impl Error for ConvertError {}

/// Check that `buffer` has exactly the size a layer requires.
fn check_buffer_len(buffer: &TensorBuffer, expected: usize) -> Result<(), ConvertError> {
    if buffer.len() != expected {
        return Err(ConvertError::BufferSize {
            expected,
            actual: buffer.len(),
        });
    }
    Ok(())
}

/// Encodes values into, and decodes values from, tensor buffers for one kind
/// of layer description.
///
/// Encoding validates the value completely before writing anything, so a
/// failed encode leaves no partial result.
pub trait Converter {
    /// The layer description type this converter handles.
    type Description;

    /// Allocate a zero-filled buffer sized for one item of `desc`.
    fn create_backing_buffer(&self, desc: &Self::Description) -> TensorBuffer;

    /// Encode `value` into `buffer`.
    ///
    /// The buffer is rewound before writing. Its size must equal the size
    /// of a buffer from [`create_backing_buffer`](Converter::create_backing_buffer).
    fn encode_into(
        &self,
        value: ValueView,
        desc: &Self::Description,
        buffer: &mut TensorBuffer,
    ) -> Result<(), ConvertError>;

    /// Encode `value` into a newly allocated buffer.
    fn encode(
        &self,
        value: ValueView,
        desc: &Self::Description,
    ) -> Result<TensorBuffer, ConvertError> {
        let mut buffer = self.create_backing_buffer(desc);
        self.encode_into(value, desc, &mut buffer)?;
        Ok(buffer)
    }

    /// Decode the value stored in `buffer`.
    fn decode(&self, buffer: &TensorBuffer, desc: &Self::Description)
        -> Result<Value, ConvertError>;
}

/// Encodes and decodes values for any kind of layer.
#[derive(Copy, Clone, Debug, Default)]
pub struct LayerCodec {
    vector: VectorConverter,
    pixel_buffer: PixelBufferConverter,
    string: StringConverter,
}

impl LayerCodec {
    /// Create a codec which uses `layout` for image tensors.
    pub fn new(layout: PixelLayout) -> LayerCodec {
        LayerCodec {
            vector: VectorConverter,
            pixel_buffer: PixelBufferConverter::new(layout),
            string: StringConverter,
        }
    }

    pub fn pixel_layout(&self) -> PixelLayout {
        self.pixel_buffer.layout()
    }

    pub fn create_backing_buffer(&self, desc: &LayerDescription) -> TensorBuffer {
        match desc {
            LayerDescription::Vector(desc) => self.vector.create_backing_buffer(desc),
            LayerDescription::PixelBuffer(desc) => self.pixel_buffer.create_backing_buffer(desc),
            LayerDescription::String(desc) => self.string.create_backing_buffer(desc),
        }
    }

    pub fn encode_into(
        &self,
        value: ValueView,
        desc: &LayerDescription,
        buffer: &mut TensorBuffer,
    ) -> Result<(), ConvertError> {
        match desc {
            LayerDescription::Vector(desc) => self.vector.encode_into(value, desc, buffer),
            LayerDescription::PixelBuffer(desc) => {
                self.pixel_buffer.encode_into(value, desc, buffer)
            }
            LayerDescription::String(desc) => self.string.encode_into(value, desc, buffer),
        }
    }

    pub fn encode(
        &self,
        value: ValueView,
        desc: &LayerDescription,
    ) -> Result<TensorBuffer, ConvertError> {
        let mut buffer = self.create_backing_buffer(desc);
        self.encode_into(value, desc, &mut buffer)?;
        Ok(buffer)
    }

    pub fn decode(
        &self,
        buffer: &TensorBuffer,
        desc: &LayerDescription,
    ) -> Result<Value, ConvertError> {
        match desc {
            LayerDescription::Vector(desc) => self.vector.decode(buffer, desc),
            LayerDescription::PixelBuffer(desc) => self.pixel_buffer.decode(buffer, desc),
            LayerDescription::String(desc) => self.string.decode(buffer, desc),
        }
    }
}
