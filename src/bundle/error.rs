use std::error::Error;
use std::fmt::{Display, Formatter};

/// Errors that occur when parsing a bundle descriptor.
#[derive(Debug)]
pub struct BundleFormatError {
    inner: BundleErrorImpl,
    layer: Option<String>,
}

impl BundleFormatError {
    pub(crate) fn new(kind: BundleErrorImpl) -> Self {
        Self {
            inner: kind,
            layer: None,
        }
    }

    pub(crate) fn for_layer(layer: Option<&str>, kind: BundleErrorImpl) -> Self {
        Self {
            inner: kind,
            layer: layer.map(|n| n.to_string()),
        }
    }

    /// The name of the layer that this error relates to.
    ///
    /// This is `None` if the error is not about a specific layer, or if the
    /// layer has no name.
    pub fn layer(&self) -> Option<&str> {
        self.layer.as_deref()
    }

    /// Return the category of error.
    pub fn kind(&self) -> BundleErrorKind {
        self.inner.kind()
    }
}

impl Display for BundleFormatError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if let Some(layer) = self.layer.as_deref() {
            write!(f, "in layer \"{}\": {}", layer, self.inner)
        } else {
            self.inner.fmt(f)
        }
    }
}

impl Error for BundleFormatError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.inner.source()
    }
}

impl From<BundleErrorImpl> for BundleFormatError {
    fn from(val: BundleErrorImpl) -> Self {
        Self::new(val)
    }
}

/// Categories of error when parsing a bundle descriptor.
///
/// See [`BundleFormatError::kind`].
#[derive(Clone, Debug, PartialEq)]
#[non_exhaustive]
pub enum BundleErrorKind {
    /// The descriptor is not valid JSON or a field has the wrong JSON type.
    Json,

    /// A required field is absent.
    MissingField,

    /// A field has an unsupported value.
    InvalidValue,

    /// A layer's shape is invalid.
    InvalidShape,

    /// Two layers in the same list have the same name.
    DuplicateName,

    /// An asset referenced by the descriptor could not be read.
    Asset,
}

/// The internal implementation of [`BundleFormatError`].
#[derive(Debug)]
pub(crate) enum BundleErrorImpl {
    Json(serde_json::Error),
    MissingField(&'static str),
    InvalidValue {
        field: &'static str,
        message: String,
    },
    InvalidShape(String),
    DuplicateName(String),
    Asset {
        name: String,
        error: std::io::Error,
    },
}

impl BundleErrorImpl {
    fn kind(&self) -> BundleErrorKind {
        type Kind = BundleErrorKind;

        match self {
            Self::Json(_) => Kind::Json,
            Self::MissingField(_) => Kind::MissingField,
            Self::InvalidValue { .. } => Kind::InvalidValue,
            Self::InvalidShape(_) => Kind::InvalidShape,
            Self::DuplicateName(_) => Kind::DuplicateName,
            Self::Asset { .. } => Kind::Asset,
        }
    }

    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Json(err) => Some(err),
            Self::Asset { error, .. } => Some(error),
            _ => None,
        }
    }
}

impl Display for BundleErrorImpl {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Json(e) => write!(f, "json error: {e}"),
            Self::MissingField(field) => write!(f, "missing field \"{field}\""),
            Self::InvalidValue { field, message } => {
                write!(f, "invalid value for \"{field}\": {message}")
            }
            Self::InvalidShape(msg) => write!(f, "invalid shape: {msg}"),
            Self::DuplicateName(name) => write!(f, "duplicate layer name \"{name}\""),
            Self::Asset { name, error } => write!(f, "failed to read asset \"{name}\": {error}"),
        }
    }
}

/// Create a [`BundleFormatError`] that relates to a specific layer.
macro_rules! bundle_error {
    ($layer:expr, InvalidValue, $field:expr, $format_str:literal, $($arg:tt)*) => {{
        let message = format!($format_str, $($arg)*);
        BundleFormatError::for_layer(
            $layer,
            BundleErrorImpl::InvalidValue { field: $field, message },
        )
    }};

    ($layer:expr, InvalidShape, $format_str:literal, $($arg:tt)*) => {{
        let message = format!($format_str, $($arg)*);
        BundleFormatError::for_layer($layer, BundleErrorImpl::InvalidShape(message))
    }};

    ($layer:expr, MissingField, $field:expr) => {{
        BundleFormatError::for_layer($layer, BundleErrorImpl::MissingField($field))
    }};
}

pub(crate) use bundle_error;

#[cfg(test)]
mod tests {
    use std::error::Error;

    use super::{BundleErrorImpl, BundleErrorKind, BundleFormatError};

    #[test]
    fn test_error_display() {
        let err = bundle_error!(Some("image"), InvalidShape, "expected {} dims", 3);
        assert_eq!(err.to_string(), "in layer \"image\": invalid shape: expected 3 dims");
        assert_eq!(err.layer(), Some("image"));
        assert_eq!(err.kind(), BundleErrorKind::InvalidShape);

        let err = bundle_error!(None, MissingField, "inputs");
        assert_eq!(err.to_string(), "missing field \"inputs\"");
        assert!(err.source().is_none());
    }

    #[test]
    fn test_error_source() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").err().unwrap();
        let err = BundleFormatError::from(BundleErrorImpl::Json(json_err));
        assert_eq!(err.kind(), BundleErrorKind::Json);
        assert!(err.source().is_some());
    }
}
