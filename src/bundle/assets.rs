use std::io;
use std::path::{Path, PathBuf};

use rustc_hash::FxHashMap;

/// Source of auxiliary files referenced by a bundle descriptor, such as
/// classification label lists.
pub trait AssetSource {
    /// Read the text file called `name`.
    fn read_text(&self, name: &str) -> io::Result<String>;
}

/// Reads assets from the `assets` directory of a bundle on disk.
#[derive(Clone, Debug)]
pub struct DirAssets {
    dir: PathBuf,
}

impl DirAssets {
    /// Create a source for the bundle directory `bundle_dir`.
    pub fn new(bundle_dir: impl AsRef<Path>) -> DirAssets {
        DirAssets {
            dir: bundle_dir.as_ref().join("assets"),
        }
    }

    /// Return the path of the asset called `name`.
    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }
}

impl AssetSource for DirAssets {
    fn read_text(&self, name: &str) -> io::Result<String> {
        std::fs::read_to_string(self.path(name))
    }
}

/// Assets held in memory.
#[derive(Clone, Debug, Default)]
pub struct MemoryAssets {
    files: FxHashMap<String, String>,
}

impl MemoryAssets {
    pub fn new() -> MemoryAssets {
        MemoryAssets::default()
    }

    /// Add or replace the asset called `name`.
    pub fn insert(&mut self, name: impl Into<String>, contents: impl Into<String>) -> &mut Self {
        self.files.insert(name.into(), contents.into());
        self
    }
}

impl AssetSource for MemoryAssets {
    fn read_text(&self, name: &str) -> io::Result<String> {
        self.files.get(name).cloned().ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, format!("no asset named {}", name))
        })
    }
}
