//! Raw structure of the bundle descriptor document.
//!
//! These types mirror the JSON closely. Most fields are optional here so that
//! missing fields are reported by validation with the name of the layer, not
//! by serde.

use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub(super) struct RawBundle {
    pub id: Option<String>,
    pub name: Option<String>,
    pub version: Option<String>,
    pub details: Option<String>,
    pub author: Option<String>,
    pub license: Option<String>,
    #[serde(default)]
    pub options: RawOptions,
    pub model: Option<RawModel>,
    pub inputs: Option<Vec<RawLayer>>,
    pub outputs: Option<Vec<RawLayer>>,
    #[serde(default)]
    pub placeholders: Vec<RawLayer>,
}

#[derive(Debug, Default, Deserialize)]
pub(super) struct RawOptions {
    pub device_position: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct RawModel {
    pub file: Option<String>,
    pub quantized: Option<bool>,
    #[serde(rename = "type")]
    pub model_type: Option<String>,
    pub backend: Option<String>,
    #[serde(default)]
    pub placeholder: bool,
    #[serde(default)]
    pub modes: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct RawLayer {
    #[serde(rename = "type")]
    pub layer_type: Option<String>,
    pub name: Option<String>,
    pub shape: Option<Vec<i32>>,
    pub labels: Option<String>,
    pub dtype: Option<String>,
    pub format: Option<String>,
    pub quantize: Option<RawTransform>,
    pub dequantize: Option<RawTransform>,
    pub normalize: Option<RawTransform>,
    pub denormalize: Option<RawTransform>,
}

/// A `quantize`, `dequantize`, `normalize` or `denormalize` entry.
#[derive(Debug, Default, Deserialize)]
pub(super) struct RawTransform {
    pub standard: Option<String>,
    pub scale: Option<f32>,
    pub bias: Option<f32>,
    pub r: Option<f32>,
    pub g: Option<f32>,
    pub b: Option<f32>,
}
