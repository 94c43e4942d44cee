//! Parsing of bundle descriptors.
//!
//! A bundle is a directory containing a model file, a `model.json`
//! descriptor and an `assets` directory. The descriptor declares bundle
//! metadata and the model's inputs, outputs and placeholders. See
//! [`ModelBundle::from_json`] for the document format.

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::dtype::DataType;
use crate::io_list::{Io, IoList};
use crate::layer::{
    ImageVolume, LayerDescription, LayerInterface, Mode, PixelBufferDescription, PixelFormat,
    StringDescription, VectorDescription,
};
use crate::normalize::{PixelDenormalizer, PixelNormalizer};
use crate::quantize::{Dequantizer, Quantizer, StandardRange};

mod assets;
mod error;
mod json;

pub use assets::{AssetSource, DirAssets, MemoryAssets};
pub(crate) use error::{bundle_error, BundleErrorImpl};
pub use error::{BundleErrorKind, BundleFormatError};
use json::{RawBundle, RawLayer, RawModel, RawTransform};

/// File name of the descriptor in a bundle directory.
pub const DESCRIPTOR_FILE: &str = "model.json";

/// Camera a model prefers when capturing images.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum DevicePosition {
    Front,
    #[default]
    Back,
}

/// Bundle-level options from the descriptor's `options` object.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BundleOptions {
    pub device_position: DevicePosition,
}

/// The ways in which a model can be used.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Modes {
    predict: bool,
    train: bool,
    eval: bool,
}

impl Default for Modes {
    /// A model that supports prediction only.
    fn default() -> Self {
        Modes {
            predict: true,
            train: false,
            eval: false,
        }
    }
}

impl Modes {
    /// Parse the `modes` list of a descriptor.
    ///
    /// An empty list means prediction only. Unknown entries are ignored.
    pub fn from_names<'a>(names: impl IntoIterator<Item = &'a str>) -> Modes {
        let mut modes = Modes {
            predict: false,
            train: false,
            eval: false,
        };
        let mut any = false;
        for name in names {
            any = true;
            match name {
                "predict" => modes.predict = true,
                "train" => modes.train = true,
                "eval" => modes.eval = true,
                other => warn!(mode = other, "ignoring unknown model mode"),
            }
        }
        if !any {
            return Modes::default();
        }
        modes
    }

    pub fn predicts(&self) -> bool {
        self.predict
    }

    pub fn trains(&self) -> bool {
        self.train
    }

    pub fn evals(&self) -> bool {
        self.eval
    }
}

/// Properties of the model file, from the descriptor's `model` object.
#[derive(Clone, Debug, PartialEq)]
pub struct ModelSpec {
    file: Option<String>,
    model_type: String,
    backend: Option<String>,
    quantized: bool,
    placeholder: bool,
    modes: Modes,
}

impl ModelSpec {
    /// Name of the model file within the bundle.
    ///
    /// This is `None` only for placeholder bundles.
    pub fn file(&self) -> Option<&str> {
        self.file.as_deref()
    }

    /// Free-form model type, eg. "image.classification.imagenet".
    pub fn model_type(&self) -> &str {
        &self.model_type
    }

    /// Identifier of the backend that should run the model.
    pub fn backend(&self) -> Option<&str> {
        self.backend.as_deref()
    }

    pub fn quantized(&self) -> bool {
        self.quantized
    }

    /// True if the bundle describes a model that is not yet available.
    pub fn placeholder(&self) -> bool {
        self.placeholder
    }

    pub fn modes(&self) -> Modes {
        self.modes
    }
}

/// A parsed bundle descriptor.
///
/// Bundles are immutable once parsed and can be shared between models and
/// threads.
#[derive(Clone, Debug)]
pub struct ModelBundle {
    id: String,
    name: String,
    version: String,
    details: String,
    author: String,
    license: String,
    options: BundleOptions,
    model: ModelSpec,
    io: Io,
    dir: Option<PathBuf>,
}

impl ModelBundle {
    /// Parse a bundle descriptor.
    ///
    /// ```json
    /// {
    ///   "id": "mobilenet-v2",
    ///   "name": "MobileNet V2",
    ///   "version": "1.0",
    ///   "details": "...",
    ///   "author": "...",
    ///   "license": "Apache 2",
    ///   "model": { "file": "model.tflite", "quantized": false },
    ///   "inputs": [
    ///     { "name": "image", "type": "image", "shape": [224, 224, 3],
    ///       "format": "RGB", "normalize": { "standard": "[-1,1]" } }
    ///   ],
    ///   "outputs": [
    ///     { "name": "classification", "type": "array", "shape": [1000],
    ///       "labels": "labels.txt" }
    ///   ]
    /// }
    /// ```
    ///
    /// Label files named by layers are read from `assets`.
    pub fn from_json(
        json: &str,
        assets: &dyn AssetSource,
    ) -> Result<ModelBundle, BundleFormatError> {
        let raw: RawBundle = serde_json::from_str(json).map_err(BundleErrorImpl::Json)?;
        Self::from_raw(raw, assets)
    }

    /// Load the bundle in directory `dir`.
    ///
    /// The descriptor is read from `model.json` and assets from the `assets`
    /// subdirectory.
    pub fn load_dir<P: AsRef<Path>>(dir: P) -> Result<ModelBundle, BundleFormatError> {
        let dir = dir.as_ref();
        let json = std::fs::read_to_string(dir.join(DESCRIPTOR_FILE)).map_err(|error| {
            BundleErrorImpl::Asset {
                name: DESCRIPTOR_FILE.to_string(),
                error,
            }
        })?;
        let mut bundle = Self::from_json(&json, &DirAssets::new(dir))?;
        bundle.dir = Some(dir.to_path_buf());
        Ok(bundle)
    }

    fn from_raw(
        raw: RawBundle,
        assets: &dyn AssetSource,
    ) -> Result<ModelBundle, BundleFormatError> {
        let required = |value: Option<String>, field: &'static str| {
            value.ok_or_else(|| bundle_error!(None, MissingField, field))
        };

        let id = required(raw.id, "id")?;
        let name = required(raw.name, "name")?;
        let version = required(raw.version, "version")?;
        let details = required(raw.details, "details")?;
        let author = required(raw.author, "author")?;
        let license = required(raw.license, "license")?;

        let device_position = match raw.options.device_position.as_deref() {
            Some("front") => DevicePosition::Front,
            None | Some("back") => DevicePosition::Back,
            Some(other) => {
                warn!(
                    device_position = other,
                    "unknown device position, using \"back\""
                );
                DevicePosition::Back
            }
        };

        let model = raw
            .model
            .ok_or_else(|| bundle_error!(None, MissingField, "model"))?;
        let model = parse_model(model)?;
        let quantized = model.quantized;

        let inputs = raw
            .inputs
            .ok_or_else(|| bundle_error!(None, MissingField, "inputs"))?;
        let outputs = raw
            .outputs
            .ok_or_else(|| bundle_error!(None, MissingField, "outputs"))?;

        let io = Io {
            inputs: parse_list(inputs, Mode::Input, quantized, assets)?,
            outputs: parse_list(outputs, Mode::Output, quantized, assets)?,
            placeholders: parse_list(raw.placeholders, Mode::Placeholder, quantized, assets)?,
        };

        info!(
            id = id.as_str(),
            inputs = io.inputs.len(),
            outputs = io.outputs.len(),
            placeholders = io.placeholders.len(),
            "parsed bundle descriptor"
        );

        Ok(ModelBundle {
            id,
            name,
            version,
            details,
            author,
            license,
            options: BundleOptions { device_position },
            model,
            io,
            dir: None,
        })
    }

    /// Unique identifier of the bundle, usually in reverse domain notation.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Human readable name of the model.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn details(&self) -> &str {
        &self.details
    }

    pub fn author(&self) -> &str {
        &self.author
    }

    pub fn license(&self) -> &str {
        &self.license
    }

    pub fn options(&self) -> &BundleOptions {
        &self.options
    }

    pub fn model(&self) -> &ModelSpec {
        &self.model
    }

    pub fn quantized(&self) -> bool {
        self.model.quantized
    }

    /// See [`ModelSpec::backend`].
    pub fn backend(&self) -> Option<&str> {
        self.model.backend()
    }

    pub fn modes(&self) -> Modes {
        self.model.modes
    }

    pub fn io(&self) -> &Io {
        &self.io
    }

    pub fn inputs(&self) -> &IoList {
        &self.io.inputs
    }

    pub fn outputs(&self) -> &IoList {
        &self.io.outputs
    }

    pub fn placeholders(&self) -> &IoList {
        &self.io.placeholders
    }

    /// Directory the bundle was loaded from, if it was loaded from disk.
    pub fn dir(&self) -> Option<&Path> {
        self.dir.as_deref()
    }

    /// Path of the model file, if the bundle was loaded from disk and is not a
    /// placeholder.
    pub fn model_file_path(&self) -> Option<PathBuf> {
        Some(self.dir.as_ref()?.join(self.model.file()?))
    }
}

/// Parse a JSON array of layer entries.
///
/// `quantized` is the model-level quantization flag. Label files are read
/// from `assets`.
pub fn parse_io(
    json: &str,
    mode: Mode,
    quantized: bool,
    assets: &dyn AssetSource,
) -> Result<Vec<LayerInterface>, BundleFormatError> {
    let raw: Vec<RawLayer> = serde_json::from_str(json).map_err(BundleErrorImpl::Json)?;
    raw.into_iter()
        .map(|layer| parse_layer(layer, mode, quantized, assets))
        .collect()
}

fn parse_model(raw: RawModel) -> Result<ModelSpec, BundleFormatError> {
    let quantized = raw
        .quantized
        .ok_or_else(|| bundle_error!(None, MissingField, "model.quantized"))?;
    if raw.file.is_none() && !raw.placeholder {
        return Err(bundle_error!(None, MissingField, "model.file"));
    }
    Ok(ModelSpec {
        file: raw.file,
        model_type: raw.model_type.unwrap_or_else(|| "unknown".to_string()),
        backend: raw.backend,
        quantized,
        placeholder: raw.placeholder,
        modes: Modes::from_names(raw.modes.iter().map(|m| m.as_str())),
    })
}

fn parse_list(
    raw: Vec<RawLayer>,
    mode: Mode,
    quantized: bool,
    assets: &dyn AssetSource,
) -> Result<IoList, BundleFormatError> {
    let layers = raw
        .into_iter()
        .map(|layer| parse_layer(layer, mode, quantized, assets))
        .collect::<Result<Vec<_>, _>>()?;
    IoList::new(layers).map_err(|err| {
        let name = err.0;
        BundleFormatError::for_layer(Some(name.as_str()), BundleErrorImpl::DuplicateName(name.clone()))
    })
}

fn parse_layer(
    raw: RawLayer,
    mode: Mode,
    quantized: bool,
    assets: &dyn AssetSource,
) -> Result<LayerInterface, BundleFormatError> {
    let name = raw
        .name
        .clone()
        .ok_or_else(|| bundle_error!(None, MissingField, "name"))?;
    let layer_type = raw
        .layer_type
        .as_deref()
        .ok_or_else(|| bundle_error!(Some(name.as_str()), MissingField, "type"))?;

    let description: LayerDescription = match layer_type {
        "array" => parse_vector(&name, &raw, mode, quantized, assets)?.into(),
        "image" => parse_image(&name, &raw, mode, quantized)?.into(),
        "string" => parse_string(&name, &raw, quantized)?.into(),
        other => {
            return Err(bundle_error!(
                Some(name.as_str()),
                InvalidValue,
                "type",
                "expected \"array\", \"image\" or \"string\", found \"{}\"",
                other
            ))
        }
    };

    Ok(LayerInterface::new(name, mode, description))
}

/// Return the shape of a vector or string layer.
///
/// Each dimension must be positive, or -1 for a batch axis.
fn parse_shape<'a>(name: &str, raw: &'a RawLayer) -> Result<&'a [i32], BundleFormatError> {
    let shape = raw
        .shape
        .as_deref()
        .ok_or_else(|| bundle_error!(Some(name), MissingField, "shape"))?;
    if shape.is_empty() {
        return Err(bundle_error!(Some(name), InvalidShape, "shape is empty",));
    }
    if let Some(dim) = shape.iter().find(|&&d| d <= 0 && d != -1) {
        return Err(bundle_error!(
            Some(name),
            InvalidShape,
            "dimension {} in {:?} is not positive",
            dim,
            shape
        ));
    }
    Ok(shape)
}

/// Check that a tensor with dimensions `dims` and elements of `elem_size`
/// bytes has a byte length that fits in `usize`. Batch axes count as 1.
fn check_byte_len(name: &str, dims: &[i32], elem_size: usize) -> Result<(), BundleFormatError> {
    dims.iter()
        .try_fold(elem_size, |len, &d| len.checked_mul(d.unsigned_abs() as usize))
        .map(|_| ())
        .ok_or_else(|| {
            bundle_error!(
                Some(name),
                InvalidShape,
                "size of {:?} overflows the address space",
                dims
            )
        })
}

fn parse_dtype(name: &str, dtype: &str) -> Result<DataType, BundleFormatError> {
    DataType::from_name(dtype).ok_or_else(|| {
        bundle_error!(
            Some(name),
            InvalidValue,
            "dtype",
            "expected one of uint8, float32, int32, int64, found \"{}\"",
            dtype
        )
    })
}

fn parse_standard(
    name: &str,
    field: &'static str,
    standard: &str,
) -> Result<StandardRange, BundleFormatError> {
    StandardRange::from_name(standard).ok_or_else(|| {
        bundle_error!(
            Some(name),
            InvalidValue,
            field,
            "expected standard range \"[0,1]\" or \"[-1,1]\", found \"{}\"",
            standard
        )
    })
}

/// A quantization entry: either a standard range or `scale` and `bias`.
enum ScalarTransform {
    Standard(StandardRange),
    Affine { scale: f32, bias: f32 },
}

fn parse_scalar_transform(
    name: &str,
    field: &'static str,
    raw: &RawTransform,
) -> Result<ScalarTransform, BundleFormatError> {
    if let Some(standard) = raw.standard.as_deref() {
        return parse_standard(name, field, standard).map(ScalarTransform::Standard);
    }
    match (raw.scale, raw.bias) {
        (Some(scale), Some(bias)) => Ok(ScalarTransform::Affine { scale, bias }),
        _ => Err(bundle_error!(
            Some(name),
            InvalidValue,
            field,
            "expected \"standard\" or both \"scale\" and \"bias\"",
        )),
    }
}

/// A normalization entry: either a standard range or a scale with
/// per-channel biases.
enum PixelTransform {
    Standard(StandardRange),
    Affine { scale: f32, bias: [f32; 3] },
}

/// Parse a `normalize` or `denormalize` entry.
///
/// `scale` defaults to 1 and biases to 0. `bias` sets all channels, and `r`,
/// `g` and `b` override individual channels. An entry with none of these
/// keys has no effect.
fn parse_pixel_transform(
    name: &str,
    field: &'static str,
    raw: &RawTransform,
) -> Result<Option<PixelTransform>, BundleFormatError> {
    if let Some(standard) = raw.standard.as_deref() {
        return parse_standard(name, field, standard).map(|s| Some(PixelTransform::Standard(s)));
    }

    let channels = [raw.r, raw.g, raw.b];
    if raw.scale.is_none() && raw.bias.is_none() && channels.iter().all(Option::is_none) {
        return Ok(None);
    }

    let scale = raw.scale.unwrap_or(1.);
    let default_bias = raw.bias.unwrap_or(0.);
    let bias = channels.map(|b| b.unwrap_or(default_bias));
    Ok(Some(PixelTransform::Affine { scale, bias }))
}

fn read_labels(
    name: &str,
    path: &str,
    assets: &dyn AssetSource,
) -> Result<Vec<String>, BundleFormatError> {
    let contents = assets.read_text(path).map_err(|error| {
        BundleFormatError::for_layer(
            Some(name),
            BundleErrorImpl::Asset {
                name: path.to_string(),
                error,
            },
        )
    })?;
    Ok(contents.trim().lines().map(|l| l.to_string()).collect())
}

fn parse_vector(
    name: &str,
    raw: &RawLayer,
    mode: Mode,
    quantized: bool,
    assets: &dyn AssetSource,
) -> Result<VectorDescription, BundleFormatError> {
    let shape = parse_shape(name, raw)?;
    let mut desc = VectorDescription::new(shape, quantized);

    if let Some(dtype) = raw.dtype.as_deref() {
        desc = desc.with_dtype(parse_dtype(name, dtype)?);
    }
    check_byte_len(name, shape, desc.storage_dtype().size())?;

    if let Some(path) = raw.labels.as_deref() {
        let labels = read_labels(name, path, assets)?;
        if labels.len() != desc.length() {
            warn!(
                layer = name,
                labels = labels.len(),
                length = desc.length(),
                "label count differs from vector length"
            );
        }
        desc = desc.with_labels(labels);
    }

    if mode.is_input() {
        if let Some(entry) = &raw.quantize {
            desc = desc.with_quantizer(match parse_scalar_transform(name, "quantize", entry)? {
                ScalarTransform::Standard(range) => Quantizer::standard(range),
                ScalarTransform::Affine { scale, bias } => Quantizer::affine(scale, bias),
            });
        }
    } else if let Some(entry) = &raw.dequantize {
        desc = desc.with_dequantizer(match parse_scalar_transform(name, "dequantize", entry)? {
            ScalarTransform::Standard(range) => Dequantizer::standard(range),
            ScalarTransform::Affine { scale, bias } => Dequantizer::affine(scale, bias),
        });
    }

    Ok(desc)
}

/// Convert an image layer shape into an image volume and batch flag.
///
/// Accepts `[height, width, channels]`, or a four element shape with a batch
/// dimension of -1 first or last.
fn image_volume(name: &str, shape: &[i32]) -> Result<(ImageVolume, bool), BundleFormatError> {
    let (dims, batched) = match shape {
        [h, w, c] => ([*h, *w, *c], false),
        [-1, h, w, c] => ([*h, *w, *c], true),
        [h, w, c, -1] => ([*h, *w, *c], false),
        [_, _, _, _] => {
            return Err(bundle_error!(
                Some(name),
                InvalidShape,
                "either the first or last element of {:?} must be -1",
                shape
            ))
        }
        _ => {
            return Err(bundle_error!(
                Some(name),
                InvalidShape,
                "expected 3 elements, found {}",
                shape.len()
            ))
        }
    };

    if dims.iter().any(|&d| d <= 0) {
        return Err(bundle_error!(
            Some(name),
            InvalidShape,
            "dimensions of {:?} must be positive",
            shape
        ));
    }
    check_byte_len(name, &dims, DataType::Float32.size())?;
    let [height, width, channels] = dims.map(|d| d as usize);
    if channels != 3 {
        return Err(bundle_error!(
            Some(name),
            InvalidShape,
            "expected 3 channels, found {}",
            channels
        ));
    }

    Ok((ImageVolume::new(height, width), batched))
}

fn parse_image(
    name: &str,
    raw: &RawLayer,
    mode: Mode,
    quantized: bool,
) -> Result<PixelBufferDescription, BundleFormatError> {
    let shape = raw
        .shape
        .as_deref()
        .ok_or_else(|| bundle_error!(Some(name), MissingField, "shape"))?;
    let (volume, batched) = image_volume(name, shape)?;

    let format = raw
        .format
        .as_deref()
        .ok_or_else(|| bundle_error!(Some(name), MissingField, "format"))?;
    let format = PixelFormat::from_name(format).ok_or_else(|| {
        bundle_error!(
            Some(name),
            InvalidValue,
            "format",
            "expected \"RGB\" or \"BGR\", found \"{}\"",
            format
        )
    })?;

    let mut desc = PixelBufferDescription::new(volume, format, quantized).with_batched(batched);

    if mode.is_input() {
        if let Some(entry) = &raw.normalize {
            if let Some(transform) = parse_pixel_transform(name, "normalize", entry)? {
                desc = desc.with_normalizer(match transform {
                    PixelTransform::Standard(range) => PixelNormalizer::standard(range),
                    PixelTransform::Affine { scale, bias } => PixelNormalizer::affine(scale, bias),
                });
            }
        }
    } else if let Some(entry) = &raw.denormalize {
        if let Some(transform) = parse_pixel_transform(name, "denormalize", entry)? {
            desc = desc.with_denormalizer(match transform {
                PixelTransform::Standard(range) => PixelDenormalizer::standard(range),
                PixelTransform::Affine { scale, bias } => PixelDenormalizer::affine(scale, bias),
            });
        }
    }

    Ok(desc)
}

fn parse_string(
    name: &str,
    raw: &RawLayer,
    quantized: bool,
) -> Result<StringDescription, BundleFormatError> {
    let shape = parse_shape(name, raw)?;
    let dtype = raw
        .dtype
        .as_deref()
        .ok_or_else(|| bundle_error!(Some(name), MissingField, "dtype"))?;
    let dtype = parse_dtype(name, dtype)?;
    check_byte_len(name, shape, dtype.size())?;
    Ok(StringDescription::new(shape, dtype).with_quantized(quantized))
}
