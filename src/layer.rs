//! Descriptions of the tensor slots in a model's input and output contract.

use std::fmt;

use smallvec::SmallVec;

use crate::convert::ConvertError;
use crate::dtype::DataType;
use crate::normalize::{PixelDenormalizer, PixelNormalizer};
use crate::quantize::{Dequantizer, Quantizer};
use crate::value::LabeledValues;

/// Declared shape of a layer. A dimension of -1 is a batch axis.
pub type Shape = SmallVec<[i32; 4]>;

/// Return the number of elements described by `shape`, treating batch axes
/// (-1) as size 1.
fn element_count(shape: &[i32]) -> usize {
    shape.iter().map(|d| d.unsigned_abs() as usize).product()
}

/// Return true if the first dimension of `shape` is a batch axis.
fn is_batched(shape: &[i32]) -> bool {
    shape.first() == Some(&-1)
}

/// The role a layer plays in a model's contract.
#[derive(Copy, Clone, Debug, Eq, Hash, PartialEq)]
pub enum Mode {
    Input,
    Output,

    /// An input that is only supplied during training, such as a learning
    /// rate.
    Placeholder,
}

impl Mode {
    /// Return true if values flow from the application into the model for
    /// this mode.
    pub fn is_input(self) -> bool {
        matches!(self, Mode::Input | Mode::Placeholder)
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Mode::Input => "input",
            Mode::Output => "output",
            Mode::Placeholder => "placeholder",
        })
    }
}

/// Describes a flattened numeric vector.
#[derive(Clone, Debug, PartialEq)]
pub struct VectorDescription {
    shape: Shape,
    length: usize,
    batched: bool,
    quantized: bool,
    dtype: DataType,
    labels: Option<Vec<String>>,
    quantizer: Option<Quantizer>,
    dequantizer: Option<Dequantizer>,
}

impl VectorDescription {
    /// Create a float32 vector description with no labels or transforms.
    pub fn new(shape: &[i32], quantized: bool) -> VectorDescription {
        VectorDescription {
            shape: shape.into(),
            length: element_count(shape),
            batched: is_batched(shape),
            quantized,
            dtype: DataType::Float32,
            labels: None,
            quantizer: None,
            dequantizer: None,
        }
    }

    /// Set the element type of unquantized values.
    pub fn with_dtype(mut self, dtype: DataType) -> Self {
        self.dtype = dtype;
        self
    }

    pub fn with_labels(mut self, labels: Vec<String>) -> Self {
        self.labels = Some(labels);
        self
    }

    pub fn with_quantizer(mut self, quantizer: Quantizer) -> Self {
        self.quantizer = Some(quantizer);
        self
    }

    pub fn with_dequantizer(mut self, dequantizer: Dequantizer) -> Self {
        self.dequantizer = Some(dequantizer);
        self
    }

    pub fn shape(&self) -> &[i32] {
        &self.shape
    }

    /// Number of elements in one item of the vector.
    pub fn length(&self) -> usize {
        self.length
    }

    pub fn batched(&self) -> bool {
        self.batched
    }

    pub fn quantized(&self) -> bool {
        self.quantized
    }

    pub fn dtype(&self) -> DataType {
        self.dtype
    }

    pub fn labels(&self) -> Option<&[String]> {
        self.labels.as_deref()
    }

    pub fn quantizer(&self) -> Option<&Quantizer> {
        self.quantizer.as_ref()
    }

    pub fn dequantizer(&self) -> Option<&Dequantizer> {
        self.dequantizer.as_ref()
    }

    /// Return the element type stored in the tensor buffer.
    pub fn storage_dtype(&self) -> DataType {
        if self.quantized {
            DataType::UInt8
        } else {
            self.dtype
        }
    }

    pub fn byte_len(&self) -> usize {
        self.length * self.storage_dtype().size()
    }

    /// Return true if this vector has classification labels.
    pub fn is_labeled(&self) -> bool {
        self.labels.is_some()
    }

    /// Pair each decoded value with the label at the same position.
    ///
    /// Returns `Ok(None)` if the vector has no labels.
    pub fn labeled_values(&self, values: &[f32]) -> Result<Option<LabeledValues>, ConvertError> {
        let Some(labels) = self.labels.as_deref() else {
            return Ok(None);
        };
        LabeledValues::zip(labels, values)
            .map(Some)
            .ok_or(ConvertError::LabelCountMismatch {
                labels: labels.len(),
                values: values.len(),
            })
    }
}

/// Channel order of pixels in an image tensor.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum PixelFormat {
    Rgb,
    Bgr,
}

impl PixelFormat {
    pub fn from_name(name: &str) -> Option<PixelFormat> {
        match name {
            "RGB" => Some(PixelFormat::Rgb),
            "BGR" => Some(PixelFormat::Bgr),
            _ => None,
        }
    }

    /// Return the colour channel (0 = R, 1 = G, 2 = B) stored at each
    /// position of a pixel.
    pub fn channel_order(self) -> [usize; 3] {
        match self {
            PixelFormat::Rgb => [0, 1, 2],
            PixelFormat::Bgr => [2, 1, 0],
        }
    }
}

/// Dimensions of an image tensor.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ImageVolume {
    pub height: usize,
    pub width: usize,
    pub channels: usize,
}

impl ImageVolume {
    pub fn new(height: usize, width: usize) -> ImageVolume {
        ImageVolume {
            height,
            width,
            channels: 3,
        }
    }

    /// Number of channel values in the image.
    pub fn len(&self) -> usize {
        self.height * self.width * self.channels
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Describes an RGB image tensor.
#[derive(Clone, Debug, PartialEq)]
pub struct PixelBufferDescription {
    volume: ImageVolume,
    pixel_format: PixelFormat,
    batched: bool,
    quantized: bool,
    normalizer: Option<PixelNormalizer>,
    denormalizer: Option<PixelDenormalizer>,
}

impl PixelBufferDescription {
    pub fn new(
        volume: ImageVolume,
        pixel_format: PixelFormat,
        quantized: bool,
    ) -> PixelBufferDescription {
        PixelBufferDescription {
            volume,
            pixel_format,
            batched: false,
            quantized,
            normalizer: None,
            denormalizer: None,
        }
    }

    pub fn with_batched(mut self, batched: bool) -> Self {
        self.batched = batched;
        self
    }

    pub fn with_normalizer(mut self, normalizer: PixelNormalizer) -> Self {
        self.normalizer = Some(normalizer);
        self
    }

    pub fn with_denormalizer(mut self, denormalizer: PixelDenormalizer) -> Self {
        self.denormalizer = Some(denormalizer);
        self
    }

    pub fn volume(&self) -> ImageVolume {
        self.volume
    }

    pub fn pixel_format(&self) -> PixelFormat {
        self.pixel_format
    }

    pub fn batched(&self) -> bool {
        self.batched
    }

    pub fn quantized(&self) -> bool {
        self.quantized
    }

    pub fn normalizer(&self) -> Option<&PixelNormalizer> {
        self.normalizer.as_ref()
    }

    pub fn denormalizer(&self) -> Option<&PixelDenormalizer> {
        self.denormalizer.as_ref()
    }

    /// Return the declared shape as `[height, width, channels]`, prefixed by
    /// a batch axis if batched.
    pub fn shape(&self) -> Shape {
        let mut shape = Shape::new();
        if self.batched {
            shape.push(-1);
        }
        for dim in [self.volume.height, self.volume.width, self.volume.channels] {
            shape.push(dim as i32);
        }
        shape
    }

    pub fn byte_len(&self) -> usize {
        let elem_size = if self.quantized {
            DataType::UInt8.size()
        } else {
            DataType::Float32.size()
        };
        self.volume.len() * elem_size
    }
}

/// Describes a tensor of raw, untransformed values.
#[derive(Clone, Debug, PartialEq)]
pub struct StringDescription {
    shape: Shape,
    length: usize,
    batched: bool,
    quantized: bool,
    dtype: DataType,
}

impl StringDescription {
    pub fn new(shape: &[i32], dtype: DataType) -> StringDescription {
        StringDescription {
            shape: shape.into(),
            length: element_count(shape),
            batched: is_batched(shape),
            quantized: false,
            dtype,
        }
    }

    /// Record the model-level quantization flag. This does not change how
    /// values are encoded.
    pub fn with_quantized(mut self, quantized: bool) -> Self {
        self.quantized = quantized;
        self
    }

    pub fn shape(&self) -> &[i32] {
        &self.shape
    }

    pub fn length(&self) -> usize {
        self.length
    }

    pub fn batched(&self) -> bool {
        self.batched
    }

    pub fn quantized(&self) -> bool {
        self.quantized
    }

    pub fn dtype(&self) -> DataType {
        self.dtype
    }

    pub fn byte_len(&self) -> usize {
        self.length * self.dtype.size()
    }
}

/// Description of a single tensor slot.
#[derive(Clone, Debug, PartialEq)]
pub enum LayerDescription {
    Vector(VectorDescription),
    PixelBuffer(PixelBufferDescription),
    String(StringDescription),
}

impl LayerDescription {
    /// Call the function matching this description's variant.
    pub fn dispatch<R>(
        &self,
        on_vector: impl FnOnce(&VectorDescription) -> R,
        on_pixel_buffer: impl FnOnce(&PixelBufferDescription) -> R,
        on_string: impl FnOnce(&StringDescription) -> R,
    ) -> R {
        match self {
            LayerDescription::Vector(desc) => on_vector(desc),
            LayerDescription::PixelBuffer(desc) => on_pixel_buffer(desc),
            LayerDescription::String(desc) => on_string(desc),
        }
    }

    pub fn quantized(&self) -> bool {
        self.dispatch(
            VectorDescription::quantized,
            PixelBufferDescription::quantized,
            StringDescription::quantized,
        )
    }

    pub fn batched(&self) -> bool {
        self.dispatch(
            VectorDescription::batched,
            PixelBufferDescription::batched,
            StringDescription::batched,
        )
    }

    /// Return the exact size in bytes of a buffer holding one item of this
    /// layer.
    pub fn byte_len(&self) -> usize {
        self.dispatch(
            VectorDescription::byte_len,
            PixelBufferDescription::byte_len,
            StringDescription::byte_len,
        )
    }

    pub fn shape(&self) -> Shape {
        self.dispatch(
            |desc| desc.shape().into(),
            |desc| desc.shape(),
            |desc| desc.shape().into(),
        )
    }

    /// Remove transforms that do not apply to layers of the given mode.
    fn restrict_to(self, mode: Mode) -> Self {
        match self {
            LayerDescription::Vector(mut desc) => {
                if mode.is_input() {
                    desc.dequantizer = None;
                } else {
                    desc.quantizer = None;
                }
                LayerDescription::Vector(desc)
            }
            LayerDescription::PixelBuffer(mut desc) => {
                if mode.is_input() {
                    desc.denormalizer = None;
                } else {
                    desc.normalizer = None;
                }
                LayerDescription::PixelBuffer(desc)
            }
            desc @ LayerDescription::String(_) => desc,
        }
    }
}

impl From<VectorDescription> for LayerDescription {
    fn from(desc: VectorDescription) -> Self {
        LayerDescription::Vector(desc)
    }
}

impl From<PixelBufferDescription> for LayerDescription {
    fn from(desc: PixelBufferDescription) -> Self {
        LayerDescription::PixelBuffer(desc)
    }
}

impl From<StringDescription> for LayerDescription {
    fn from(desc: StringDescription) -> Self {
        LayerDescription::String(desc)
    }
}

/// A named input, output or placeholder of a model.
#[derive(Clone, Debug, PartialEq)]
pub struct LayerInterface {
    name: String,
    mode: Mode,
    description: LayerDescription,
}

impl LayerInterface {
    /// Create a layer.
    ///
    /// Input and placeholder layers keep only quantizers and normalizers.
    /// Output layers keep only dequantizers and denormalizers.
    pub fn new(
        name: impl Into<String>,
        mode: Mode,
        description: impl Into<LayerDescription>,
    ) -> LayerInterface {
        LayerInterface {
            name: name.into(),
            mode,
            description: description.into().restrict_to(mode),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn description(&self) -> &LayerDescription {
        &self.description
    }

    /// See [`LayerDescription::dispatch`].
    pub fn dispatch<R>(
        &self,
        on_vector: impl FnOnce(&VectorDescription) -> R,
        on_pixel_buffer: impl FnOnce(&PixelBufferDescription) -> R,
        on_string: impl FnOnce(&StringDescription) -> R,
    ) -> R {
        self.description
            .dispatch(on_vector, on_pixel_buffer, on_string)
    }

    /// Return the declared tensor shape of this layer.
    pub fn tensor_shape(&self) -> Shape {
        self.description.shape()
    }

    pub fn byte_len(&self) -> usize {
        self.description.byte_len()
    }
}
