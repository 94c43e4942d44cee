use std::error::Error;
use std::fmt::{Display, Formatter};

use rustc_hash::FxHashMap;

use crate::value::Value;

/// A single item in a batch, mapping layer names to values.
pub type Item = FxHashMap<String, Value>;

/// Error when an item's keys differ from the other items in a batch.
#[derive(Clone, Debug, PartialEq)]
pub struct KeyMismatch {
    /// Position of the offending item.
    pub index: usize,
}

impl Display for KeyMismatch {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "item {} has different keys to the rest of the batch", self.index)
    }
}

impl Error for KeyMismatch {}

/// A columnar collection of items that share the same set of keys.
///
/// Values are stored per key, so that all values for one input layer can be
/// encoded into a single batch buffer.
#[derive(Clone, Debug, Default)]
pub struct Batch {
    keys: Vec<String>,
    columns: FxHashMap<String, Vec<Value>>,
    len: usize,
}

impl Batch {
    /// Create an empty batch whose items will have the given keys.
    pub fn new<S: AsRef<str>>(keys: &[S]) -> Batch {
        let keys: Vec<String> = keys.iter().map(|k| k.as_ref().to_string()).collect();
        let columns = keys.iter().map(|k| (k.clone(), Vec::new())).collect();
        Batch {
            keys,
            columns,
            len: 0,
        }
    }

    /// Create a batch from a list of items.
    ///
    /// The first item determines the key set.
    pub fn from_items(items: Vec<Item>) -> Result<Batch, KeyMismatch> {
        let mut keys: Vec<&String> = items.first().map(|i| i.keys().collect()).unwrap_or_default();
        keys.sort();
        let mut batch = Batch::new(&keys);
        for item in items {
            batch.push(item)?;
        }
        Ok(batch)
    }

    /// Append an item to the batch.
    pub fn push(&mut self, mut item: Item) -> Result<(), KeyMismatch> {
        let index = self.len;
        if item.len() != self.keys.len() || !self.keys.iter().all(|k| item.contains_key(k)) {
            return Err(KeyMismatch { index });
        }
        for (key, column) in self.columns.iter_mut() {
            if let Some(value) = item.remove(key) {
                column.push(value);
            }
        }
        self.len += 1;
        Ok(())
    }

    /// Number of items in the batch.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Return the keys shared by every item, in the order they were given.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.keys.iter().map(|k| k.as_str())
    }

    /// Return all values for `key`, one per item.
    pub fn column(&self, key: &str) -> Option<&[Value]> {
        self.columns.get(key).map(|c| c.as_slice())
    }

    /// Return the values of the item at `index`.
    pub fn get(&self, index: usize) -> Option<FxHashMap<&str, &Value>> {
        if index >= self.len {
            return None;
        }
        self.columns
            .iter()
            .map(|(key, column)| column.get(index).map(|v| (key.as_str(), v)))
            .collect()
    }
}
