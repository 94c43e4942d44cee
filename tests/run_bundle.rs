use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use image::{DynamicImage, GenericImageView, Rgb, RgbImage};
use tensorio::classification::top_n;
use tensorio::{
    Backend, BackendError, BackendRegistry, Bindings, ModelBundle, ModelOptions, Output,
    PixelLayout, Value, ValueView,
};
use tensorio_testing::expect_all_close;

/// Backend which copies each input buffer to the output at the same position.
struct IdentityBackend;

impl Backend for IdentityBackend {
    fn run(&mut self, bindings: &mut Bindings) -> Result<(), BackendError> {
        for (input, output) in bindings.inputs.iter().zip(bindings.outputs.iter_mut()) {
            if input.data.len() != output.data.len() {
                return Err(format!(
                    "cannot copy {} bytes from \"{}\" to {} bytes of \"{}\"",
                    input.data.len(),
                    input.layer.name(),
                    output.data.len(),
                    output.layer.name()
                )
                .into());
            }
            output.data.copy_from_slice(input.data);
        }
        Ok(())
    }
}

fn create_identity(_: &ModelBundle) -> Result<Box<dyn Backend>, BackendError> {
    Ok(Box::new(IdentityBackend))
}

/// Backend which records its inputs and writes fixed bytes to each output.
struct RecordingBackend {
    inputs: Arc<Mutex<Vec<Vec<u8>>>>,
    output: Vec<u8>,
}

impl Backend for RecordingBackend {
    fn run(&mut self, bindings: &mut Bindings) -> Result<(), BackendError> {
        let mut inputs = self.inputs.lock().map_err(|e| e.to_string())?;
        *inputs = bindings.inputs.iter().map(|b| b.data.to_vec()).collect();
        for output in bindings.outputs.iter_mut() {
            output.data.copy_from_slice(&self.output[..output.data.len()]);
        }
        Ok(())
    }
}

/// Temporary bundle directory, deleted on drop.
struct TempBundle {
    dir: PathBuf,
}

impl TempBundle {
    fn new(name: &str, descriptor: &str, assets: &[(&str, &str)]) -> TempBundle {
        let dir = std::env::temp_dir().join(format!(
            "tensorio-test-{}-{}.tiobundle",
            std::process::id(),
            name
        ));
        std::fs::create_dir_all(dir.join("assets")).unwrap();
        std::fs::write(dir.join("model.json"), descriptor).unwrap();
        for (file, contents) in assets {
            std::fs::write(dir.join("assets").join(file), contents).unwrap();
        }
        TempBundle { dir }
    }

    fn path(&self) -> &Path {
        &self.dir
    }
}

impl Drop for TempBundle {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.dir);
    }
}

const CLASSIFIER: &str = r#"{
    "id": "ai.test.classifier",
    "name": "Test Classifier",
    "version": "1",
    "details": "Quantized image classifier",
    "author": "test",
    "license": "MIT",
    "model": { "file": "model.tflite", "quantized": true, "backend": "recording" },
    "inputs": [
        { "name": "image", "type": "image", "shape": [-1, 2, 2, 3], "format": "RGB" }
    ],
    "outputs": [
        {
            "name": "classification",
            "type": "array",
            "shape": [-1, 3],
            "labels": "labels.txt",
            "dequantize": { "standard": "[0,1]" }
        }
    ]
}"#;

#[test]
fn test_quantized_classifier() {
    let bundle = TempBundle::new("classifier", CLASSIFIER, &[("labels.txt", "cat\ndog\nbird\n")]);
    let bundle = Arc::new(ModelBundle::load_dir(bundle.path()).unwrap());
    assert_eq!(bundle.id(), "ai.test.classifier");
    assert!(bundle.quantized());
    assert_eq!(
        bundle.model_file_path(),
        bundle.dir().map(|d| d.join("model.tflite"))
    );

    let recorded = Arc::new(Mutex::new(Vec::new()));
    let backend = RecordingBackend {
        inputs: recorded.clone(),
        output: vec![51, 255, 0],
    };
    let mut model = ModelOptions::default().build(bundle, Box::new(backend));
    model.load().unwrap();

    let image = DynamicImage::ImageRgb8(RgbImage::from_fn(2, 2, |x, y| {
        Rgb([x as u8 * 10, y as u8 * 10, 5])
    }));
    let outputs = model.run(&[("image", ValueView::from(&image))], &[]).unwrap();

    // Quantized images are passed as interleaved RGB bytes.
    assert_eq!(
        recorded.lock().unwrap()[0],
        [0u8, 0, 5, 10, 0, 5, 0, 10, 5, 10, 10, 5]
    );

    let scores = outputs
        .get("classification")
        .and_then(|o| o.as_labeled())
        .unwrap();
    let top = top_n(scores, 2, 0.1);
    assert_eq!(top[0].0, "dog");
    assert_eq!(top[1].0, "cat");
    assert!((top[1].1 - 0.2).abs() < 1e-6);
}

const IMAGE_TO_IMAGE: &str = r#"{
    "id": "ai.test.identity",
    "name": "Identity",
    "version": "1",
    "details": "",
    "author": "test",
    "license": "MIT",
    "model": { "file": "model.pt", "quantized": false, "backend": "identity" },
    "inputs": [
        {
            "name": "image",
            "type": "image",
            "shape": [3, 4, 3],
            "format": "BGR",
            "normalize": { "standard": "[-1,1]" }
        },
        { "name": "features", "type": "array", "shape": [2], "dtype": "int32" }
    ],
    "outputs": [
        {
            "name": "image",
            "type": "image",
            "shape": [3, 4, 3],
            "format": "BGR",
            "denormalize": { "standard": "[-1,1]" }
        },
        { "name": "features", "type": "array", "shape": [2], "dtype": "int32" }
    ]
}"#;

#[test]
fn test_identity_round_trip() {
    let dir = TempBundle::new("identity", IMAGE_TO_IMAGE, &[]);
    let bundle = Arc::new(ModelBundle::load_dir(dir.path()).unwrap());

    for layout in [PixelLayout::Interleaved, PixelLayout::Planar] {
        let mut registry = BackendRegistry::new();
        registry.register("identity", create_identity);

        let mut options = ModelOptions::with_backends(registry);
        options.pixel_layout(layout);
        let mut model = options.create(bundle.clone()).unwrap();
        assert_eq!(model.pixel_layout(), layout);
        model.load().unwrap();

        let image = tensorio_testing::gradient_image(4, 3);
        let features = [7i32, -3];
        let outputs = model
            .run(
                &[
                    ("image", ValueView::from(&image)),
                    ("features", ValueView::from(&features[..])),
                ],
                &[],
            )
            .unwrap();

        let Some(Output::Value(Value::Image(decoded))) = outputs.get("image") else {
            panic!("expected image output");
        };
        assert_eq!(decoded.dimensions(), (4, 3));
        for (x, y, pixel) in decoded.pixels() {
            let expected = image.get_pixel(x, y);
            for c in 0..3 {
                let diff = (pixel.0[c] as i32 - expected.0[c] as i32).abs();
                assert!(diff <= 1, "pixel ({}, {}) channel {} differs", x, y, c);
            }
            assert_eq!(pixel.0[3], 255);
        }

        assert_eq!(
            outputs.get("features"),
            Some(&Output::Value(Value::Int32(vec![7, -3])))
        );
    }
}

const STRINGS: &str = r#"{
    "id": "ai.test.strings",
    "name": "Strings",
    "version": "1",
    "details": "",
    "author": "test",
    "license": "MIT",
    "model": { "file": "model.bin", "quantized": false },
    "inputs": [{ "name": "bytes", "type": "string", "shape": [8], "dtype": "uint8" }],
    "outputs": [{ "name": "values", "type": "string", "shape": [2], "dtype": "float32" }]
}"#;

#[test]
fn test_string_layers() {
    let dir = TempBundle::new("strings", STRINGS, &[]);
    let bundle = Arc::new(ModelBundle::load_dir(dir.path()).unwrap());
    let mut model = ModelOptions::default().build(bundle, Box::new(IdentityBackend));
    model.load().unwrap();

    let values = [1.5f32, -2.25];
    let bytes: Vec<u8> = values.iter().flat_map(|v| v.to_ne_bytes()).collect();
    let outputs = model.run_single(ValueView::from(bytes.as_slice())).unwrap();

    let decoded = outputs
        .get("values")
        .and_then(|o| o.as_value())
        .and_then(|v| v.as_f32())
        .unwrap();
    expect_all_close(decoded, &values, 0.).unwrap();
}

#[test]
fn test_missing_descriptor() {
    let dir = std::env::temp_dir().join("tensorio-test-does-not-exist");
    let err = ModelBundle::load_dir(&dir).err().unwrap();
    assert_eq!(err.kind(), tensorio::BundleErrorKind::Asset);
}
