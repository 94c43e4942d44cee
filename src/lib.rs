//! tensorio converts application values to and from the tensor buffers that
//! machine learning models consume and produce.
//!
//! # Bundles
//!
//! A model is distributed as a bundle: a directory containing the model file,
//! a `model.json` descriptor and an `assets` directory. The descriptor declares
//! the model's inputs and outputs as layers. Each layer is one of:
//!
//! - A vector of numbers, optionally quantized to bytes and optionally
//!   labeled for classification outputs.
//! - An RGB image (pixel buffer), with optional normalization of pixel
//!   values.
//! - A raw byte string or scalar of a given data type.
//!
//! Descriptors are parsed with [`ModelBundle::load_dir`] or
//! [`ModelBundle::from_json`].
//!
//! # Encoding and decoding
//!
//! [`LayerCodec`] encodes a [`ValueView`] into a [`TensorBuffer`] laid out as
//! a layer's description requires, and decodes buffers back into [`Value`]s.
//! The byte layout is exact: quantized layers store one byte per element,
//! unquantized layers store elements in native byte order, and images are
//! stored either interleaved (HWC) or planar (CHW) depending on
//! [`PixelLayout`].
//!
//! # Running models
//!
//! Running a model is delegated to a [`Backend`], which wraps a native
//! inference runtime. A [`Model`] pairs a bundle with a backend, validates
//! named inputs against the bundle, encodes them into buffers which are
//! reused between runs, calls the backend and decodes the outputs.
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use tensorio::{BackendRegistry, ModelBundle, ModelOptions, Output, ValueView};
//! # use tensorio::{Backend, BackendError, Bindings};
//! # struct TfLite;
//! # impl Backend for TfLite {
//! #     fn run(&mut self, _: &mut Bindings) -> Result<(), BackendError> { Ok(()) }
//! # }
//! # fn create_tflite(_: &ModelBundle) -> Result<Box<dyn Backend>, BackendError> {
//! #     Ok(Box::new(TfLite))
//! # }
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let bundle = Arc::new(ModelBundle::load_dir("mobilenet.tiobundle")?);
//!
//!     let mut registry = BackendRegistry::new();
//!     registry.register("tflite", create_tflite);
//!
//!     let mut model = ModelOptions::with_backends(registry).create(bundle)?;
//!     model.load()?;
//!
//!     let image = image::open("cat.jpg")?.resize_exact(224, 224, image::imageops::FilterType::Triangle);
//!     let outputs = model.run(&[("image", ValueView::from(&image))], &[])?;
//!
//!     if let Some(Output::Labeled(scores)) = outputs.get("classification") {
//!         for (label, score) in tensorio::classification::top_n(scores, 5, 0.1) {
//!             println!("{}: {}", label, score);
//!         }
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Logging
//!
//! The crate emits events using [tracing](https://docs.rs/tracing). Install a
//! subscriber in the host application to see them.

mod batch;
mod buffer;
mod dtype;
mod io_list;
mod layer;
mod model;
mod normalize;
mod quantize;
mod value;

pub mod bundle;
pub mod classification;
pub mod convert;
pub mod env;

pub use batch::{Batch, Item, KeyMismatch};
pub use buffer::{BufferCache, TensorBuffer};
pub use bundle::{BundleErrorKind, BundleFormatError, ModelBundle};
pub use convert::{ConvertError, LayerCodec, PixelLayout};
pub use dtype::{DataType, Element};
pub use io_list::{DuplicateNameError, Io, IoList};
pub use layer::{
    ImageVolume, LayerDescription, LayerInterface, Mode, PixelBufferDescription, PixelFormat,
    Shape, StringDescription, VectorDescription,
};
pub use model::{
    Backend, BackendError, BackendFactory, BackendRegistry, Binding, Bindings, Model,
    ModelOptions, Output, OutputBinding, Outputs, RegistryError, RunError,
};
pub use normalize::{PixelDenormalizer, PixelNormalizer};
pub use quantize::{Dequantizer, Quantizer, StandardRange};
pub use value::{LabeledValues, Value, ValueView};
