use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

use tracing::{debug, info};

use crate::batch::Batch;
use crate::buffer::{BufferCache, TensorBuffer};
use crate::bundle::ModelBundle;
use crate::convert::{ConvertError, LayerCodec, PixelLayout};
use crate::env::{env_flag, CACHE_BUFFERS_VAR};
use crate::io_list::IoList;
use crate::layer::{LayerDescription, LayerInterface, Mode};
use crate::value::{LabeledValues, Value, ValueView};

mod registry;

pub use registry::{BackendFactory, BackendRegistry, RegistryError};

/// Error type returned by backends.
pub type BackendError = Box<dyn Error + Send + Sync>;

/// Encoded data for an input or placeholder layer.
pub struct Binding<'a> {
    pub layer: &'a LayerInterface,
    pub data: &'a [u8],
}

/// Buffer that a backend fills with the data for an output layer.
pub struct OutputBinding<'a> {
    pub layer: &'a LayerInterface,
    pub data: &'a mut [u8],
}

/// The buffers passed to a backend for one inference call.
///
/// Each list is in the declaration order of the bundle's layers. When
/// `batch_size` is greater than one, every buffer holds `batch_size`
/// consecutive items.
pub struct Bindings<'a> {
    pub batch_size: usize,
    pub inputs: Vec<Binding<'a>>,

    /// Placeholder buffers. Empty if the caller did not supply placeholders.
    pub placeholders: Vec<Binding<'a>>,

    pub outputs: Vec<OutputBinding<'a>>,
}

/// A native inference runtime that executes a model on encoded buffers.
pub trait Backend: Send {
    /// Prepare the backend to run, eg. by reading the model file.
    fn load(&mut self) -> Result<(), BackendError> {
        Ok(())
    }

    /// Release resources acquired by [`load`](Backend::load).
    fn unload(&mut self) {}

    /// Return the layout that this backend expects for image tensors.
    fn pixel_layout(&self) -> PixelLayout {
        PixelLayout::Interleaved
    }

    /// Run inference, reading from the input bindings and writing every
    /// output binding.
    fn run(&mut self, bindings: &mut Bindings) -> Result<(), BackendError>;
}

/// A decoded model output.
#[derive(Clone, Debug, PartialEq)]
pub enum Output {
    Value(Value),

    /// Output of a vector layer that has labels.
    Labeled(LabeledValues),
}

impl Output {
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Output::Value(value) => Some(value),
            Output::Labeled(_) => None,
        }
    }

    pub fn as_labeled(&self) -> Option<&LabeledValues> {
        match self {
            Output::Labeled(labeled) => Some(labeled),
            Output::Value(_) => None,
        }
    }
}

/// The outputs of a model run, in the declaration order of output layers.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Outputs {
    entries: Vec<(String, Output)>,
}

impl Outputs {
    /// Return the output for the layer called `name`.
    pub fn get(&self, name: &str) -> Option<&Output> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, out)| out)
    }

    /// Remove and return the output for the layer called `name`.
    pub fn remove(&mut self, name: &str) -> Option<Output> {
        let index = self.entries.iter().position(|(n, _)| n == name)?;
        Some(self.entries.remove(index).1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Output)> {
        self.entries.iter().map(|(name, out)| (name.as_str(), out))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn into_vec(self) -> Vec<(String, Output)> {
        self.entries
    }

    fn push(&mut self, name: &str, output: Output) {
        self.entries.push((name.to_string(), output));
    }
}

/// Errors that occur when running a model.
#[derive(Debug)]
pub enum RunError {
    /// The number of inputs supplied does not match the number of input
    /// layers.
    InputCountMismatch { expected: usize, actual: usize },

    /// No value was supplied for an input layer.
    MissingInput(String),

    /// A value was supplied for a layer that the model does not have.
    UnexpectedInput(String),

    /// Some, but not all, placeholders were supplied.
    PlaceholderCountMismatch { expected: usize, actual: usize },

    /// No value was supplied for a placeholder layer.
    MissingPlaceholder(String),

    /// A value could not be encoded, or an output could not be decoded.
    Convert { layer: String, error: ConvertError },

    /// The backend failed.
    Backend(BackendError),

    /// The bundle does not declare the "predict" mode.
    ModeNotSupported,

    /// The model has not been loaded.
    NotLoaded,

    /// The bundle describes a placeholder model with no model file.
    PlaceholderModel,
}

impl Display for RunError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InputCountMismatch { expected, actual } => {
                write!(f, "expected {} inputs but got {}", expected, actual)
            }
            Self::MissingInput(name) => write!(f, "missing input \"{}\"", name),
            Self::UnexpectedInput(name) => write!(f, "model has no input named \"{}\"", name),
            Self::PlaceholderCountMismatch { expected, actual } => {
                write!(f, "expected {} placeholders but got {}", expected, actual)
            }
            Self::MissingPlaceholder(name) => write!(f, "missing placeholder \"{}\"", name),
            Self::Convert { layer, error } => write!(f, "layer \"{}\": {}", layer, error),
            Self::Backend(e) => write!(f, "backend error: {}", e),
            Self::ModeNotSupported => write!(f, "model does not support prediction"),
            Self::NotLoaded => write!(f, "model is not loaded"),
            Self::PlaceholderModel => write!(f, "placeholder models cannot be run"),
        }
    }
}

impl Error for RunError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Convert { error, .. } => Some(error),
            Self::Backend(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

/// Options which customize how a [`Model`] is created.
pub struct ModelOptions {
    registry: BackendRegistry,
    cache_buffers: bool,
    pixel_layout: Option<PixelLayout>,
}

impl Default for ModelOptions {
    fn default() -> Self {
        Self::with_backends(BackendRegistry::new())
    }
}

impl ModelOptions {
    /// Create a set of options which selects backends from `registry`.
    ///
    /// Buffer caching is enabled unless the `TENSORIO_CACHE_BUFFERS`
    /// environment variable disables it.
    pub fn with_backends(registry: BackendRegistry) -> ModelOptions {
        ModelOptions {
            registry,
            cache_buffers: env_flag(CACHE_BUFFERS_VAR, true),
            pixel_layout: None,
        }
    }

    /// Set whether loaded models keep preallocated buffers between runs.
    pub fn cache_buffers(&mut self, enable: bool) -> &mut Self {
        self.cache_buffers = enable;
        self
    }

    /// Override the image tensor layout declared by the backend.
    pub fn pixel_layout(&mut self, layout: PixelLayout) -> &mut Self {
        self.pixel_layout = Some(layout);
        self
    }

    pub fn registry(&self) -> &BackendRegistry {
        &self.registry
    }

    /// Create a model for `bundle` using the backend the bundle selects.
    ///
    /// The model is returned unloaded. See [`Model::load`].
    pub fn create(&self, bundle: Arc<ModelBundle>) -> Result<Model, RegistryError> {
        let backend = self.registry.create_backend(&bundle)?;
        Ok(self.build(bundle, backend))
    }

    /// Create a model for `bundle` which runs on `backend`.
    pub fn build(&self, bundle: Arc<ModelBundle>, backend: Box<dyn Backend>) -> Model {
        let layout = self.pixel_layout.unwrap_or_else(|| backend.pixel_layout());
        Model {
            bundle,
            backend,
            codec: LayerCodec::new(layout),
            cache_buffers: self.cache_buffers,
            cache: None,
            loaded: false,
        }
    }
}

/// A model bundle paired with the backend that runs it.
///
/// A model encodes application values into tensor buffers as described by
/// the bundle's layers, runs the backend on them and decodes the results.
///
/// Models are not thread safe. Calls to [`run`](Model::run) take `&mut self`,
/// so a model shared between threads needs external locking.
pub struct Model {
    bundle: Arc<ModelBundle>,
    backend: Box<dyn Backend>,
    codec: LayerCodec,
    cache_buffers: bool,

    /// Buffers reused across runs. Present only while loaded.
    cache: Option<BufferCache>,

    loaded: bool,
}

impl Model {
    /// Create a model with default options.
    pub fn new(bundle: Arc<ModelBundle>, backend: Box<dyn Backend>) -> Model {
        ModelOptions::default().build(bundle, backend)
    }

    pub fn bundle(&self) -> &ModelBundle {
        &self.bundle
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn pixel_layout(&self) -> PixelLayout {
        self.codec.pixel_layout()
    }

    /// Return the buffer cache, if the model is loaded with caching enabled.
    pub fn buffer_cache(&self) -> Option<&BufferCache> {
        self.cache.as_ref()
    }

    /// Load the backend and allocate buffers.
    ///
    /// Does nothing if the model is already loaded.
    pub fn load(&mut self) -> Result<(), RunError> {
        if self.loaded {
            return Ok(());
        }
        self.backend.load().map_err(RunError::Backend)?;
        if self.cache_buffers {
            self.cache = Some(BufferCache::new(self.bundle.io()));
        }
        self.loaded = true;

        info!(
            model = self.bundle.id(),
            cached_bytes = self.cache.as_ref().map(|c| c.total_bytes()).unwrap_or(0),
            "loaded model"
        );
        Ok(())
    }

    /// Unload the backend and free buffers.
    pub fn unload(&mut self) {
        if !self.loaded {
            return;
        }
        self.backend.unload();
        self.cache = None;
        self.loaded = false;
        info!(model = self.bundle.id(), "unloaded model");
    }

    /// Unload and load the model, recreating its buffers.
    pub fn reload(&mut self) -> Result<(), RunError> {
        self.unload();
        self.load()
    }

    fn check_runnable(&self) -> Result<(), RunError> {
        if self.bundle.model().placeholder() {
            return Err(RunError::PlaceholderModel);
        }
        if !self.bundle.modes().predicts() {
            return Err(RunError::ModeNotSupported);
        }
        if !self.loaded {
            return Err(RunError::NotLoaded);
        }
        Ok(())
    }

    /// Run the model.
    ///
    /// `inputs` must contain exactly one value for each input layer.
    /// `placeholders` may be empty, in which case no placeholder buffers are
    /// passed to the backend, or contain exactly one value per placeholder
    /// layer.
    pub fn run(
        &mut self,
        inputs: &[(&str, ValueView)],
        placeholders: &[(&str, ValueView)],
    ) -> Result<Outputs, RunError> {
        self.check_runnable()?;

        let bundle = Arc::clone(&self.bundle);
        let io = bundle.io();

        let input_names: Vec<&str> = inputs.iter().map(|(name, _)| *name).collect();
        check_inputs(&io.inputs, &input_names)?;

        let with_placeholders = !placeholders.is_empty();
        if with_placeholders {
            let names: Vec<&str> = placeholders.iter().map(|(name, _)| *name).collect();
            check_placeholders(&io.placeholders, &names)?;
        }

        let cached = self.cache.is_some();
        let mut scratch = None;
        let buffers = match self.cache.as_mut() {
            Some(cache) => cache,
            None => scratch.insert(BufferCache::new(io)),
        };

        encode_layers(&self.codec, &io.inputs, inputs, &mut buffers.inputs)?;
        if with_placeholders {
            encode_layers(
                &self.codec,
                &io.placeholders,
                placeholders,
                &mut buffers.placeholders,
            )?;
        }

        let mut bindings = Bindings {
            batch_size: 1,
            inputs: bind(&io.inputs, buffers.inputs.iter().map(|b| b.as_bytes())),
            placeholders: if with_placeholders {
                bind(
                    &io.placeholders,
                    buffers.placeholders.iter().map(|b| b.as_bytes()),
                )
            } else {
                Vec::new()
            },
            outputs: bind_mut(
                &io.outputs,
                buffers.outputs.iter_mut().map(|b| b.as_bytes_mut()),
            ),
        };

        debug!(
            model = bundle.id(),
            inputs = bindings.inputs.len(),
            placeholders = bindings.placeholders.len(),
            outputs = bindings.outputs.len(),
            cached,
            "running model"
        );
        self.backend.run(&mut bindings).map_err(RunError::Backend)?;

        let mut outputs = Outputs::default();
        for (layer, buffer) in io.outputs.iter().zip(&buffers.outputs) {
            outputs.push(layer.name(), decode_output(&self.codec, layer, buffer)?);
        }
        Ok(outputs)
    }

    /// Run a model that has a single input layer.
    pub fn run_single(&mut self, value: ValueView) -> Result<Outputs, RunError> {
        let bundle = Arc::clone(&self.bundle);
        let inputs = bundle.inputs();
        if inputs.len() != 1 {
            return Err(RunError::InputCountMismatch {
                expected: inputs.len(),
                actual: 1,
            });
        }
        self.run(&[(inputs[0].name(), value)], &[])
    }

    /// Run the model on every item in `batch` with a single backend call.
    ///
    /// Each input layer's values are encoded one after another into a buffer
    /// of `batch.len()` items, and each output buffer is split into one
    /// output per item. Batch runs use their own buffers rather than the
    /// cache, and don't pass placeholders.
    pub fn run_batch(&mut self, batch: &Batch) -> Result<Vec<Outputs>, RunError> {
        self.check_runnable()?;

        let bundle = Arc::clone(&self.bundle);
        let io = bundle.io();

        let keys: Vec<&str> = batch.keys().collect();
        check_inputs(&io.inputs, &keys)?;

        let batch_size = batch.len();
        if batch_size == 0 {
            return Ok(Vec::new());
        }

        let mut input_data = Vec::with_capacity(io.inputs.len());
        for layer in &io.inputs {
            let column = batch
                .column(layer.name())
                .ok_or_else(|| RunError::MissingInput(layer.name().to_string()))?;
            let mut data = Vec::with_capacity(layer.byte_len() * batch_size);
            for value in column {
                let buffer = self
                    .codec
                    .encode(value.view(), layer.description())
                    .map_err(|error| convert_error(layer, error))?;
                data.extend_from_slice(buffer.as_bytes());
            }
            input_data.push(data);
        }

        let mut output_data: Vec<Vec<u8>> = io
            .outputs
            .iter()
            .map(|layer| vec![0; layer.byte_len() * batch_size])
            .collect();

        let mut bindings = Bindings {
            batch_size,
            inputs: bind(&io.inputs, input_data.iter().map(|d| d.as_slice())),
            placeholders: Vec::new(),
            outputs: bind_mut(
                &io.outputs,
                output_data.iter_mut().map(|d| d.as_mut_slice()),
            ),
        };

        debug!(model = bundle.id(), batch_size, "running batch");
        self.backend.run(&mut bindings).map_err(RunError::Backend)?;

        let mut results = vec![Outputs::default(); batch_size];
        for (layer, data) in io.outputs.iter().zip(&output_data) {
            for (outputs, item) in results.iter_mut().zip(data.chunks(layer.byte_len())) {
                let buffer = TensorBuffer::from_bytes(item.to_vec());
                outputs.push(layer.name(), decode_output(&self.codec, layer, &buffer)?);
            }
        }
        Ok(results)
    }
}

fn convert_error(layer: &LayerInterface, error: ConvertError) -> RunError {
    RunError::Convert {
        layer: layer.name().to_string(),
        error,
    }
}

fn check_inputs(layers: &IoList, names: &[&str]) -> Result<(), RunError> {
    if names.len() != layers.len() {
        return Err(RunError::InputCountMismatch {
            expected: layers.len(),
            actual: names.len(),
        });
    }
    if let Some(name) = names.iter().find(|name| !layers.contains(name)) {
        return Err(RunError::UnexpectedInput(name.to_string()));
    }
    if let Some(layer) = layers.iter().find(|layer| !names.contains(&layer.name())) {
        return Err(RunError::MissingInput(layer.name().to_string()));
    }
    Ok(())
}

fn check_placeholders(layers: &IoList, names: &[&str]) -> Result<(), RunError> {
    if names.len() != layers.len() {
        return Err(RunError::PlaceholderCountMismatch {
            expected: layers.len(),
            actual: names.len(),
        });
    }
    if let Some(layer) = layers.iter().find(|layer| !names.contains(&layer.name())) {
        return Err(RunError::MissingPlaceholder(layer.name().to_string()));
    }
    Ok(())
}

fn encode_layers(
    codec: &LayerCodec,
    layers: &IoList,
    values: &[(&str, ValueView)],
    buffers: &mut [TensorBuffer],
) -> Result<(), RunError> {
    for (layer, buffer) in layers.iter().zip(buffers.iter_mut()) {
        let value = values
            .iter()
            .find(|(name, _)| *name == layer.name())
            .map(|(_, value)| *value)
            .ok_or_else(|| match layer.mode() {
                Mode::Placeholder => RunError::MissingPlaceholder(layer.name().to_string()),
                _ => RunError::MissingInput(layer.name().to_string()),
            })?;
        codec
            .encode_into(value, layer.description(), buffer)
            .map_err(|error| convert_error(layer, error))?;
    }
    Ok(())
}

fn decode_output(
    codec: &LayerCodec,
    layer: &LayerInterface,
    buffer: &TensorBuffer,
) -> Result<Output, RunError> {
    let value = codec
        .decode(buffer, layer.description())
        .map_err(|error| convert_error(layer, error))?;

    if let (LayerDescription::Vector(desc), Value::Float32(values)) = (layer.description(), &value) {
        let labeled = desc
            .labeled_values(values)
            .map_err(|error| convert_error(layer, error))?;
        if let Some(labeled) = labeled {
            return Ok(Output::Labeled(labeled));
        }
    }

    Ok(Output::Value(value))
}

fn bind<'a>(layers: &'a IoList, data: impl Iterator<Item = &'a [u8]>) -> Vec<Binding<'a>> {
    layers
        .iter()
        .zip(data)
        .map(|(layer, data)| Binding { layer, data })
        .collect()
}

fn bind_mut<'a>(
    layers: &'a IoList,
    data: impl Iterator<Item = &'a mut [u8]>,
) -> Vec<OutputBinding<'a>> {
    layers
        .iter()
        .zip(data)
        .map(|(layer, data)| OutputBinding { layer, data })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use rustc_hash::FxHashMap;

    use super::{Backend, BackendError, Bindings, Model, ModelOptions, Output, RunError};
    use crate::batch::Batch;
    use crate::bundle::{MemoryAssets, ModelBundle};
    use crate::convert::ConvertError;
    use crate::value::{Value, ValueView};

    /// Backend which copies each input to the output at the same position,
    /// and fills outputs with no matching input with a constant.
    struct CopyBackend {
        runs: Arc<AtomicUsize>,
    }

    impl Backend for CopyBackend {
        fn run(&mut self, bindings: &mut Bindings) -> Result<(), BackendError> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            for (i, output) in bindings.outputs.iter_mut().enumerate() {
                match bindings.inputs.get(i) {
                    Some(input) if input.data.len() == output.data.len() => {
                        output.data.copy_from_slice(input.data)
                    }
                    _ => output.data.fill(0),
                }
            }
            Ok(())
        }
    }

    struct FailingBackend;

    impl Backend for FailingBackend {
        fn run(&mut self, _bindings: &mut Bindings) -> Result<(), BackendError> {
            Err("interpreter crashed".into())
        }
    }

    fn bundle(model: &str, placeholders: &str) -> Arc<ModelBundle> {
        let json = format!(
            r#"{{
                "id": "test", "name": "test", "version": "1", "details": "", "author": "", "license": "",
                "model": {},
                "inputs": [
                    {{ "name": "x", "type": "array", "shape": [3] }},
                    {{ "name": "y", "type": "array", "shape": [2] }}
                ],
                "outputs": [
                    {{ "name": "scores", "type": "array", "shape": [3], "labels": "labels.txt" }},
                    {{ "name": "z", "type": "array", "shape": [2] }}
                ],
                "placeholders": {}
            }}"#,
            model, placeholders
        );
        let mut assets = MemoryAssets::new();
        assets.insert("labels.txt", "cat\ndog\nbird\n");
        Arc::new(ModelBundle::from_json(&json, &assets).unwrap())
    }

    fn default_bundle() -> Arc<ModelBundle> {
        bundle(r#"{ "file": "m.bin", "quantized": false }"#, "[]")
    }

    fn copy_model(bundle: Arc<ModelBundle>, cache: bool) -> (Model, Arc<AtomicUsize>) {
        let runs = Arc::new(AtomicUsize::new(0));
        let backend = CopyBackend { runs: runs.clone() };
        let model = ModelOptions::default()
            .cache_buffers(cache)
            .build(bundle, Box::new(backend));
        (model, runs)
    }

    #[test]
    fn test_run() {
        for cache in [true, false] {
            let (mut model, runs) = copy_model(default_bundle(), cache);
            model.load().unwrap();
            assert_eq!(model.buffer_cache().is_some(), cache);

            let x = [0.5, 0.25, 0.125];
            let y = [1., 2.];
            let outputs = model
                .run(&[("y", y[..].into()), ("x", x[..].into())], &[])
                .unwrap();

            assert_eq!(runs.load(Ordering::SeqCst), 1);
            assert_eq!(outputs.len(), 2);

            let scores = outputs.get("scores").and_then(|o| o.as_labeled()).unwrap();
            assert_eq!(scores.get("cat"), Some(0.5));
            assert_eq!(scores.get("bird"), Some(0.125));

            let z = outputs.get("z").and_then(|o| o.as_value()).unwrap();
            assert_eq!(z, &Value::Float32(vec![1., 2.]));
        }
    }

    #[test]
    fn test_run_reuses_cached_buffers() {
        let (mut model, runs) = copy_model(default_bundle(), true);
        model.load().unwrap();
        let bytes = model.buffer_cache().unwrap().total_bytes();
        assert_eq!(bytes, (3 + 2 + 3 + 2) * 4);

        for i in 0..3 {
            let x = [i as f32; 3];
            let outputs = model
                .run(&[("x", x[..].into()), ("y", [0.; 2][..].into())], &[])
                .unwrap();
            let scores = outputs.get("scores").and_then(|o| o.as_labeled()).unwrap();
            assert_eq!(scores.get("dog"), Some(i as f32));
        }
        assert_eq!(runs.load(Ordering::SeqCst), 3);
        assert_eq!(model.buffer_cache().unwrap().total_bytes(), bytes);
    }

    #[test]
    fn test_lifecycle() {
        let (mut model, _) = copy_model(default_bundle(), true);
        let x = [0.; 3];
        let y = [0.; 2];
        let inputs = [("x", ValueView::from(&x[..])), ("y", ValueView::from(&y[..]))];

        assert!(!model.is_loaded());
        assert!(matches!(model.run(&inputs, &[]), Err(RunError::NotLoaded)));

        model.load().unwrap();
        model.load().unwrap();
        assert!(model.is_loaded());
        assert!(model.run(&inputs, &[]).is_ok());

        model.unload();
        assert!(!model.is_loaded());
        assert!(model.buffer_cache().is_none());
        assert!(matches!(model.run(&inputs, &[]), Err(RunError::NotLoaded)));

        model.reload().unwrap();
        assert!(model.buffer_cache().is_some());
        assert!(model.run(&inputs, &[]).is_ok());
    }

    #[test]
    fn test_input_validation() {
        let (mut model, runs) = copy_model(default_bundle(), true);
        model.load().unwrap();

        let x = [0.; 3];
        let x = ValueView::from(&x[..]);

        let err = model.run(&[("x", x)], &[]).err().unwrap();
        assert!(matches!(
            err,
            RunError::InputCountMismatch {
                expected: 2,
                actual: 1
            }
        ));

        let err = model.run(&[("x", x), ("w", x)], &[]).err().unwrap();
        assert!(matches!(err, RunError::UnexpectedInput(ref name) if name == "w"));

        let err = model.run(&[("x", x), ("x", x)], &[]).err().unwrap();
        assert!(matches!(err, RunError::MissingInput(ref name) if name == "y"));

        let err = model.run(&[("x", x), ("y", x)], &[]).err().unwrap();
        assert!(matches!(
            err,
            RunError::Convert {
                ref layer,
                error: ConvertError::LengthMismatch {
                    expected: 2,
                    actual: 3
                }
            } if layer == "y"
        ));
        assert_eq!(
            err.to_string(),
            "layer \"y\": expected 2 elements but value has 3"
        );

        assert_eq!(runs.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_placeholders() {
        let placeholders = r#"[
            { "name": "lr", "type": "array", "shape": [1] },
            { "name": "steps", "type": "array", "shape": [1] }
        ]"#;
        let bundle = bundle(r#"{ "file": "m.bin", "quantized": false }"#, placeholders);
        let (mut model, _) = copy_model(bundle, true);
        model.load().unwrap();

        let x = [0.; 3];
        let y = [0.; 2];
        let one = [1.];
        let inputs = [("x", ValueView::from(&x[..])), ("y", ValueView::from(&y[..]))];

        // Placeholders may be omitted entirely.
        assert!(model.run(&inputs, &[]).is_ok());

        let err = model.run(&inputs, &[("lr", one[..].into())]).err().unwrap();
        assert!(matches!(
            err,
            RunError::PlaceholderCountMismatch {
                expected: 2,
                actual: 1
            }
        ));

        let err = model
            .run(&inputs, &[("lr", one[..].into()), ("epochs", one[..].into())])
            .err()
            .unwrap();
        assert!(matches!(err, RunError::MissingPlaceholder(ref name) if name == "steps"));

        assert!(model
            .run(&inputs, &[("steps", one[..].into()), ("lr", one[..].into())])
            .is_ok());
    }

    #[test]
    fn test_unrunnable_bundles() {
        let x = [0.; 3];
        let y = [0.; 2];
        let inputs = [("x", ValueView::from(&x[..])), ("y", ValueView::from(&y[..]))];

        let placeholder = bundle(r#"{ "quantized": false, "placeholder": true }"#, "[]");
        let (mut model, _) = copy_model(placeholder, true);
        model.load().unwrap();
        assert!(matches!(
            model.run(&inputs, &[]),
            Err(RunError::PlaceholderModel)
        ));

        let train_only = bundle(
            r#"{ "file": "m.bin", "quantized": false, "modes": ["train"] }"#,
            "[]",
        );
        let (mut model, _) = copy_model(train_only, true);
        model.load().unwrap();
        assert!(matches!(
            model.run(&inputs, &[]),
            Err(RunError::ModeNotSupported)
        ));
    }

    #[test]
    fn test_backend_error() {
        let mut model = ModelOptions::default().build(default_bundle(), Box::new(FailingBackend));
        model.load().unwrap();

        let x = [0.; 3];
        let y = [0.; 2];
        let err = model
            .run(&[("x", x[..].into()), ("y", y[..].into())], &[])
            .err()
            .unwrap();
        assert!(matches!(err, RunError::Backend(_)));
        assert_eq!(err.to_string(), "backend error: interpreter crashed");
    }

    #[test]
    fn test_run_single() {
        let json = r#"{
            "id": "single", "name": "single", "version": "1", "details": "", "author": "", "license": "",
            "model": { "file": "m.bin", "quantized": false },
            "inputs": [{ "name": "in", "type": "array", "shape": [2] }],
            "outputs": [{ "name": "out", "type": "array", "shape": [2] }]
        }"#;
        let bundle = Arc::new(ModelBundle::from_json(json, &MemoryAssets::new()).unwrap());
        let (mut model, _) = copy_model(bundle, false);
        model.load().unwrap();

        let outputs = model.run_single([3., 4.][..].into()).unwrap();
        assert_eq!(
            outputs.get("out"),
            Some(&Output::Value(Value::Float32(vec![3., 4.])))
        );

        let (mut model, _) = copy_model(default_bundle(), false);
        model.load().unwrap();
        let err = model.run_single([3., 4.][..].into()).err().unwrap();
        assert!(matches!(err, RunError::InputCountMismatch { expected: 2, .. }));
    }

    #[test]
    fn test_run_batch() {
        let (mut model, runs) = copy_model(default_bundle(), true);
        model.load().unwrap();

        let items = (0..3)
            .map(|i| {
                let mut item = FxHashMap::default();
                let i = i as f32;
                item.insert("x".to_string(), Value::Float32(vec![i, i + 0.5, i + 0.25]));
                item.insert("y".to_string(), Value::Float32(vec![0., 0.]));
                item
            })
            .collect();
        let batch = Batch::from_items(items).unwrap();

        let results = model.run_batch(&batch).unwrap();
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert_eq!(results.len(), 3);

        for (i, outputs) in results.iter().enumerate() {
            let scores = outputs.get("scores").and_then(|o| o.as_labeled()).unwrap();
            assert_eq!(scores.get("cat"), Some(i as f32));
            assert_eq!(scores.get("dog"), Some(i as f32 + 0.5));
        }

        let empty = Batch::new(&["x", "y"]);
        assert!(model.run_batch(&empty).unwrap().is_empty());

        let wrong_keys = Batch::new(&["x"]);
        assert!(matches!(
            model.run_batch(&wrong_keys),
            Err(RunError::InputCountMismatch { .. })
        ));
    }
}
