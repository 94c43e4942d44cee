use std::fmt;

use image::{DynamicImage, RgbaImage};
use rten_tensor::errors::FromDataError;
use rten_tensor::Tensor;
use rustc_hash::FxHashMap;

use crate::dtype::DataType;

/// A borrowed application value that can be encoded into a tensor buffer.
///
/// Which variants a layer accepts depends on the layer's description. See
/// the converters in [`crate::convert`].
#[derive(Clone, Copy, Debug)]
pub enum ValueView<'a> {
    Float32(&'a [f32]),
    UInt8(&'a [u8]),
    Int32(&'a [i32]),
    Int64(&'a [i64]),
    Image(&'a DynamicImage),
}

impl ValueView<'_> {
    /// Return the element type of a numeric value, or `None` for images.
    pub fn dtype(&self) -> Option<DataType> {
        match self {
            ValueView::Float32(_) => Some(DataType::Float32),
            ValueView::UInt8(_) => Some(DataType::UInt8),
            ValueView::Int32(_) => Some(DataType::Int32),
            ValueView::Int64(_) => Some(DataType::Int64),
            ValueView::Image(_) => None,
        }
    }

    /// Return the number of elements in a numeric value.
    ///
    /// For images this is the number of pixels.
    pub fn len(&self) -> usize {
        match self {
            ValueView::Float32(v) => v.len(),
            ValueView::UInt8(v) => v.len(),
            ValueView::Int32(v) => v.len(),
            ValueView::Int64(v) => v.len(),
            ValueView::Image(img) => img.width() as usize * img.height() as usize,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Short name of the value's type, used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            ValueView::Float32(_) => "float32",
            ValueView::UInt8(_) => "uint8",
            ValueView::Int32(_) => "int32",
            ValueView::Int64(_) => "int64",
            ValueView::Image(_) => "image",
        }
    }
}

impl<'a> From<&'a [f32]> for ValueView<'a> {
    fn from(val: &'a [f32]) -> Self {
        ValueView::Float32(val)
    }
}

impl<'a> From<&'a [u8]> for ValueView<'a> {
    fn from(val: &'a [u8]) -> Self {
        ValueView::UInt8(val)
    }
}

impl<'a> From<&'a [i32]> for ValueView<'a> {
    fn from(val: &'a [i32]) -> Self {
        ValueView::Int32(val)
    }
}

impl<'a> From<&'a [i64]> for ValueView<'a> {
    fn from(val: &'a [i64]) -> Self {
        ValueView::Int64(val)
    }
}

impl<'a> From<&'a DynamicImage> for ValueView<'a> {
    fn from(val: &'a DynamicImage) -> Self {
        ValueView::Image(val)
    }
}

/// An owned value decoded from a tensor buffer.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Float32(Vec<f32>),
    UInt8(Vec<u8>),
    Int32(Vec<i32>),
    Int64(Vec<i64>),

    /// A decoded image. Images produced by the pixel buffer converter are
    /// always RGBA with an opaque alpha channel.
    Image(DynamicImage),
}

impl Value {
    /// Return a borrowed view of this value.
    pub fn view(&self) -> ValueView<'_> {
        match self {
            Value::Float32(v) => ValueView::Float32(v),
            Value::UInt8(v) => ValueView::UInt8(v),
            Value::Int32(v) => ValueView::Int32(v),
            Value::Int64(v) => ValueView::Int64(v),
            Value::Image(img) => ValueView::Image(img),
        }
    }

    pub fn dtype(&self) -> Option<DataType> {
        self.view().dtype()
    }

    pub fn as_f32(&self) -> Option<&[f32]> {
        match self {
            Value::Float32(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_u8(&self) -> Option<&[u8]> {
        match self {
            Value::UInt8(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_i32(&self) -> Option<&[i32]> {
        match self {
            Value::Int32(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<&[i64]> {
        match self {
            Value::Int64(v) => Some(v),
            _ => None,
        }
    }

    /// Convert an image value into an RGBA image.
    pub fn into_image(self) -> Option<RgbaImage> {
        match self {
            Value::Image(img) => Some(img.into_rgba8()),
            _ => None,
        }
    }

    /// Reshape a float vector into a tensor.
    ///
    /// Batch dimensions in `shape` (-1) are replaced by the size that makes
    /// the element count match. At most one batch dimension is supported.
    pub fn to_tensor(&self, shape: &[i32]) -> Option<Result<Tensor<f32>, FromDataError>> {
        let data = self.as_f32()?;
        let fixed: usize = shape.iter().filter(|d| **d >= 0).map(|d| *d as usize).product();
        let batch = if fixed == 0 { 0 } else { data.len() / fixed };
        let shape: Vec<usize> = shape
            .iter()
            .map(|&d| if d < 0 { batch } else { d as usize })
            .collect();
        Some(Tensor::try_from_data(shape.as_slice(), data.to_vec()))
    }
}

impl From<Vec<f32>> for Value {
    fn from(val: Vec<f32>) -> Self {
        Value::Float32(val)
    }
}

impl From<Vec<u8>> for Value {
    fn from(val: Vec<u8>) -> Self {
        Value::UInt8(val)
    }
}

impl From<Vec<i32>> for Value {
    fn from(val: Vec<i32>) -> Self {
        Value::Int32(val)
    }
}

impl From<Vec<i64>> for Value {
    fn from(val: Vec<i64>) -> Self {
        Value::Int64(val)
    }
}

impl From<RgbaImage> for Value {
    fn from(val: RgbaImage) -> Self {
        Value::Image(DynamicImage::ImageRgba8(val))
    }
}

/// Values of a classification vector keyed by label.
///
/// Entries keep the order of the labels in the layer description.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LabeledValues {
    entries: Vec<(String, f32)>,

    /// Map of label to position in `entries`.
    index: FxHashMap<String, usize>,
}

impl LabeledValues {
    pub fn new() -> LabeledValues {
        LabeledValues::default()
    }

    /// Pair `labels` with `values` by position.
    ///
    /// Returns `None` if the lengths differ. If a label is repeated, lookups
    /// return the value of its first occurrence.
    pub fn zip(labels: &[String], values: &[f32]) -> Option<LabeledValues> {
        if labels.len() != values.len() {
            return None;
        }
        let mut index = FxHashMap::default();
        index.reserve(labels.len());
        for (i, label) in labels.iter().enumerate() {
            index.entry(label.clone()).or_insert(i);
        }
        Some(LabeledValues {
            entries: labels.iter().cloned().zip(values.iter().copied()).collect(),
            index,
        })
    }

    /// Return the value for `label`.
    pub fn get(&self, label: &str) -> Option<f32> {
        self.index.get(label).map(|&i| self.entries[i].1)
    }

    /// Add or replace the value for `label`.
    pub fn insert(&mut self, label: &str, value: f32) {
        match self.index.get(label) {
            Some(&i) => self.entries[i].1 = value,
            None => {
                self.index.insert(label.to_string(), self.entries.len());
                self.entries.push((label.to_string(), value));
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f32)> {
        self.entries.iter().map(|(l, v)| (l.as_str(), *v))
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(l, _)| l.as_str())
    }

    pub fn into_vec(self) -> Vec<(String, f32)> {
        self.entries
    }
}

impl FromIterator<(String, f32)> for LabeledValues {
    fn from_iter<I: IntoIterator<Item = (String, f32)>>(iter: I) -> Self {
        let mut values = LabeledValues::new();
        for (label, value) in iter {
            values.insert(&label, value);
        }
        values
    }
}

impl fmt::Display for LabeledValues {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (label, value)) in self.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}: {}", label, value)?;
        }
        write!(f, "}}")
    }
}
