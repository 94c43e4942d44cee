use std::error::Error;
use std::fmt;
use std::ops::Index;

use rustc_hash::FxHashMap;

use crate::layer::LayerInterface;

/// Error returned when constructing an [`IoList`] with two layers that share
/// a name.
#[derive(Clone, Debug, PartialEq)]
pub struct DuplicateNameError(pub String);

impl fmt::Display for DuplicateNameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "duplicate layer name \"{}\"", self.0)
    }
}

impl Error for DuplicateNameError {}

/// An ordered list of layers which can also be looked up by name.
///
/// The order is the declaration order in the bundle descriptor, which is the
/// order in which tensors are passed to and returned from the backend.
#[derive(Clone, Debug, Default)]
pub struct IoList {
    layers: Vec<LayerInterface>,
    index: FxHashMap<String, usize>,
}

impl IoList {
    /// Create a list from layers in declaration order.
    ///
    /// Fails if two layers have the same name.
    pub fn new(layers: Vec<LayerInterface>) -> Result<IoList, DuplicateNameError> {
        let mut index = FxHashMap::default();
        index.reserve(layers.len());
        for (i, layer) in layers.iter().enumerate() {
            if index.insert(layer.name().to_string(), i).is_some() {
                return Err(DuplicateNameError(layer.name().to_string()));
            }
        }
        Ok(IoList { layers, index })
    }

    /// Return the layer at position `index`.
    pub fn get(&self, index: usize) -> Option<&LayerInterface> {
        self.layers.get(index)
    }

    /// Return the layer called `name`.
    pub fn get_by_name(&self, name: &str) -> Option<&LayerInterface> {
        self.index_for(name).map(|i| &self.layers[i])
    }

    /// Return the declaration position of the layer called `name`.
    pub fn index_for(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Return the layer names in declaration order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.layers.iter().map(|l| l.name())
    }

    pub fn all(&self) -> &[LayerInterface] {
        &self.layers
    }

    pub fn iter(&self) -> std::slice::Iter<'_, LayerInterface> {
        self.layers.iter()
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }
}

impl Index<usize> for IoList {
    type Output = LayerInterface;

    fn index(&self, index: usize) -> &LayerInterface {
        &self.layers[index]
    }
}

impl<'a> IntoIterator for &'a IoList {
    type Item = &'a LayerInterface;
    type IntoIter = std::slice::Iter<'a, LayerInterface>;

    fn into_iter(self) -> Self::IntoIter {
        self.layers.iter()
    }
}

/// The inputs, outputs and placeholders of a model.
#[derive(Clone, Debug, Default)]
pub struct Io {
    pub inputs: IoList,
    pub outputs: IoList,
    pub placeholders: IoList,
}
