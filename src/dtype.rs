use std::fmt;

/// Enum specifying the element type of a tensor slot.
#[derive(Copy, Clone, Debug, Eq, Hash, PartialEq)]
pub enum DataType {
    UInt8,
    Int32,
    Int64,
    Float32,
}

impl DataType {
    /// Return the size of elements of this type in bytes.
    pub fn size(self) -> usize {
        match self {
            DataType::UInt8 => 1,
            DataType::Int32 | DataType::Float32 => 4,
            DataType::Int64 => 8,
        }
    }

    /// Parse the `dtype` string used in bundle descriptors.
    pub fn from_name(name: &str) -> Option<DataType> {
        match name {
            "uint8" => Some(DataType::UInt8),
            "int32" => Some(DataType::Int32),
            "int64" => Some(DataType::Int64),
            "float32" => Some(DataType::Float32),
            _ => None,
        }
    }

    /// Return the name of this type as it appears in bundle descriptors.
    pub fn name(self) -> &'static str {
        match self {
            DataType::UInt8 => "uint8",
            DataType::Int32 => "int32",
            DataType::Int64 => "int64",
            DataType::Float32 => "float32",
        }
    }
}

impl fmt::Display for DataType {
    /// Format this enum value in the style of the corresponding Rust type (eg.
    /// "i32" for `DataType::Int32`).
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}",
            match self {
                DataType::UInt8 => "u8",
                DataType::Int32 => "i32",
                DataType::Int64 => "i64",
                DataType::Float32 => "f32",
            }
        )
    }
}

/// Element types which can be written to and read from tensor buffers.
///
/// Values are stored in native byte order, which is what the native
/// inference backends expect.
pub trait Element: Copy + Default {
    /// The [`DataType`] that corresponds to the `Self` type.
    const DTYPE: DataType;

    /// Size of the encoded value in bytes.
    const SIZE: usize;

    /// Write `self` into `out`, which has length [`Self::SIZE`].
    fn write_ne(self, out: &mut [u8]);

    /// Read a value from `bytes`, which has length [`Self::SIZE`].
    fn read_ne(bytes: &[u8]) -> Self;
}

macro_rules! impl_element {
    ($type:ty, $dtype:ident) => {
        impl Element for $type {
            const DTYPE: DataType = DataType::$dtype;
            const SIZE: usize = std::mem::size_of::<$type>();

            fn write_ne(self, out: &mut [u8]) {
                out.copy_from_slice(&self.to_ne_bytes());
            }

            fn read_ne(bytes: &[u8]) -> Self {
                let mut buf = [0u8; std::mem::size_of::<$type>()];
                buf.copy_from_slice(bytes);
                <$type>::from_ne_bytes(buf)
            }
        }
    };
}

impl_element!(u8, UInt8);
impl_element!(i32, Int32);
impl_element!(i64, Int64);
impl_element!(f32, Float32);
