use std::error::Error;
use std::fmt::{Display, Formatter};

use super::{Backend, BackendError};
use crate::bundle::ModelBundle;

/// Function that creates a backend for a bundle.
pub type BackendFactory = fn(&ModelBundle) -> Result<Box<dyn Backend>, BackendError>;

/// Registry of the backends that can run models.
///
/// Backends are identified by a name such as "tflite". A bundle selects a
/// backend with the `backend` field of its `model` object. Bundles that don't
/// specify one use the first registered backend.
#[derive(Default)]
pub struct BackendRegistry {
    factories: Vec<(String, BackendFactory)>,
}

impl BackendRegistry {
    /// Create a new empty registry.
    pub fn new() -> BackendRegistry {
        BackendRegistry::default()
    }

    /// Register a backend factory under `name`, replacing any existing
    /// factory with that name.
    pub fn register(&mut self, name: &str, factory: BackendFactory) -> &mut Self {
        match self.factories.iter_mut().find(|(n, _)| n == name) {
            Some(entry) => entry.1 = factory,
            None => self.factories.push((name.to_string(), factory)),
        }
        self
    }

    /// Return the names of registered backends in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.factories.iter().map(|(name, _)| name.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.iter().any(|(n, _)| n == name)
    }

    /// Create the backend for `bundle`.
    pub fn create_backend(&self, bundle: &ModelBundle) -> Result<Box<dyn Backend>, RegistryError> {
        let factory = match bundle.backend() {
            Some(name) => self
                .factories
                .iter()
                .find(|(n, _)| n == name)
                .map(|(_, f)| f)
                .ok_or_else(|| RegistryError::UnknownBackend(name.to_string()))?,
            None => self
                .factories
                .first()
                .map(|(_, f)| f)
                .ok_or(RegistryError::NoBackends)?,
        };
        factory(bundle).map_err(RegistryError::Factory)
    }
}

/// Errors that occur when creating a backend from a registry.
#[derive(Debug)]
pub enum RegistryError {
    /// The bundle names a backend that is not registered.
    UnknownBackend(String),
    /// The bundle names no backend and the registry is empty.
    NoBackends,
    /// The backend factory failed.
    Factory(BackendError),
}

impl Display for RegistryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownBackend(name) => write!(f, "unknown backend \"{}\"", name),
            Self::NoBackends => write!(f, "no backends registered"),
            Self::Factory(e) => write!(f, "failed to create backend: {}", e),
        }
    }
}

impl Error for RegistryError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Factory(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}
