use super::{check_buffer_len, ConvertError, Converter};
use crate::buffer::TensorBuffer;
use crate::dtype::{DataType, Element};
use crate::layer::StringDescription;
use crate::value::{Value, ValueView};

/// Pass-through converter for raw tensors.
///
/// Values are copied without quantization or normalization. Encoding accepts
/// either raw bytes of exactly the layer's byte length, or a slice whose
/// element type matches the layer's dtype.
#[derive(Copy, Clone, Debug, Default)]
pub struct StringConverter;

fn copy_elements<T: Element>(
    values: &[T],
    desc: &StringDescription,
    buffer: &mut TensorBuffer,
) -> Result<(), ConvertError> {
    // Raw bytes are accepted for any dtype.
    if T::DTYPE != DataType::UInt8 && T::DTYPE != desc.dtype() {
        return Err(ConvertError::TypeMismatch {
            expected: desc.dtype().name(),
            actual: T::DTYPE.name(),
        });
    }
    if values.len() * T::SIZE != desc.byte_len() {
        return Err(ConvertError::LengthMismatch {
            expected: desc.byte_len() / T::SIZE,
            actual: values.len(),
        });
    }
    check_buffer_len(buffer, desc.byte_len())?;
    buffer.rewind();
    buffer.put_slice(values);
    Ok(())
}

impl Converter for StringConverter {
    type Description = StringDescription;

    fn create_backing_buffer(&self, desc: &StringDescription) -> TensorBuffer {
        TensorBuffer::new(desc.byte_len())
    }

    fn encode_into(
        &self,
        value: ValueView,
        desc: &StringDescription,
        buffer: &mut TensorBuffer,
    ) -> Result<(), ConvertError> {
        match value {
            ValueView::UInt8(bytes) => copy_elements(bytes, desc, buffer),
            ValueView::Float32(values) => copy_elements(values, desc, buffer),
            ValueView::Int32(values) => copy_elements(values, desc, buffer),
            ValueView::Int64(values) => copy_elements(values, desc, buffer),
            ValueView::Image(_) => Err(ConvertError::TypeMismatch {
                expected: desc.dtype().name(),
                actual: value.type_name(),
            }),
        }
    }

    /// Decode the buffer as a value of the layer's dtype.
    fn decode(
        &self,
        buffer: &TensorBuffer,
        desc: &StringDescription,
    ) -> Result<Value, ConvertError> {
        check_buffer_len(buffer, desc.byte_len())?;
        let len = desc.length();
        let value = match desc.dtype() {
            DataType::UInt8 => Value::UInt8(buffer.as_bytes().to_vec()),
            DataType::Int32 => Value::Int32(buffer.read_vec(len)),
            DataType::Int64 => Value::Int64(buffer.read_vec(len)),
            DataType::Float32 => Value::Float32(buffer.read_vec(len)),
        };
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use tensorio_testing::TestCases;

    use super::StringConverter;
    use crate::convert::{ConvertError, Converter};
    use crate::dtype::DataType;
    use crate::layer::StringDescription;
    use crate::value::{Value, ValueView};

    #[test]
    fn test_encode_typed_values() {
        #[derive(Debug)]
        struct Case {
            dtype: DataType,
            value: Value,
            byte_len: usize,
        }

        let cases = [
            Case {
                dtype: DataType::UInt8,
                value: Value::UInt8(vec![1, 2, 3, 4]),
                byte_len: 4,
            },
            Case {
                dtype: DataType::Int32,
                value: Value::Int32(vec![-1, 2, 3, 4]),
                byte_len: 16,
            },
            Case {
                dtype: DataType::Int64,
                value: Value::Int64(vec![1, 2, -3, 4]),
                byte_len: 32,
            },
            Case {
                dtype: DataType::Float32,
                value: Value::Float32(vec![0.5, 1.5, 2.5, -1.]),
                byte_len: 16,
            },
        ];

        cases.test_each(|case| {
            let desc = StringDescription::new(&[2, 2], case.dtype);
            let buf = StringConverter.encode(case.value.view(), &desc).unwrap();
            assert_eq!(buf.len(), case.byte_len);
            assert_eq!(StringConverter.decode(&buf, &desc).unwrap(), case.value);
        });
    }

    #[test]
    fn test_encode_raw_bytes() {
        let desc = StringDescription::new(&[2], DataType::Int32);
        let mut bytes = Vec::new();
        bytes.extend(7i32.to_ne_bytes());
        bytes.extend((-9i32).to_ne_bytes());

        let buf = StringConverter
            .encode(ValueView::UInt8(&bytes), &desc)
            .unwrap();
        assert_eq!(buf.as_bytes(), bytes.as_slice());
        assert_eq!(
            StringConverter.decode(&buf, &desc).unwrap(),
            Value::Int32(vec![7, -9])
        );

        let err = StringConverter
            .encode(ValueView::UInt8(&bytes[..6]), &desc)
            .err();
        assert_eq!(
            err,
            Some(ConvertError::LengthMismatch {
                expected: 8,
                actual: 6
            })
        );
    }

    #[test]
    fn test_encode_errors() {
        let desc = StringDescription::new(&[3], DataType::Int64);

        assert_eq!(
            StringConverter
                .encode(ValueView::Int32(&[1, 2, 3]), &desc)
                .err(),
            Some(ConvertError::TypeMismatch {
                expected: "int64",
                actual: "int32"
            })
        );
        assert_eq!(
            StringConverter
                .encode(ValueView::Float32(&[1., 2., 3.]), &desc)
                .err(),
            Some(ConvertError::TypeMismatch {
                expected: "int64",
                actual: "float32"
            })
        );
        let image = image::DynamicImage::new_rgb8(3, 1);
        assert_eq!(
            StringConverter.encode(ValueView::from(&image), &desc).err(),
            Some(ConvertError::TypeMismatch {
                expected: "int64",
                actual: "image"
            })
        );
        assert_eq!(
            StringConverter.encode(ValueView::Int64(&[1, 2]), &desc).err(),
            Some(ConvertError::LengthMismatch {
                expected: 3,
                actual: 2
            })
        );
    }
}
