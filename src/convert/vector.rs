use super::{check_buffer_len, ConvertError, Converter};
use crate::buffer::TensorBuffer;
use crate::dtype::{DataType, Element};
use crate::layer::VectorDescription;
use crate::value::{Value, ValueView};

/// Converter for flattened numeric vectors.
///
/// Elements are written in index order with no reordering. Quantized layers
/// store one unsigned byte per element.
#[derive(Copy, Clone, Debug, Default)]
pub struct VectorConverter;

/// Return a description of the value types `desc` accepts.
fn accepted_types(desc: &VectorDescription) -> &'static str {
    if desc.quantized() {
        return "float32 or uint8";
    }
    desc.dtype().name()
}

fn check_len(expected: usize, actual: usize) -> Result<(), ConvertError> {
    if expected != actual {
        return Err(ConvertError::LengthMismatch { expected, actual });
    }
    Ok(())
}

fn write_elements<T: Element>(
    values: &[T],
    desc: &VectorDescription,
    buffer: &mut TensorBuffer,
) -> Result<(), ConvertError> {
    check_len(desc.length(), values.len())?;
    check_buffer_len(buffer, desc.byte_len())?;
    buffer.rewind();
    buffer.put_slice(values);
    Ok(())
}

impl Converter for VectorConverter {
    type Description = VectorDescription;

    fn create_backing_buffer(&self, desc: &VectorDescription) -> TensorBuffer {
        TensorBuffer::new(desc.byte_len())
    }

    fn encode_into(
        &self,
        value: ValueView,
        desc: &VectorDescription,
        buffer: &mut TensorBuffer,
    ) -> Result<(), ConvertError> {
        let type_mismatch = || ConvertError::TypeMismatch {
            expected: accepted_types(desc),
            actual: value.type_name(),
        };

        match value {
            ValueView::Float32(values) if desc.quantized() => {
                check_len(desc.length(), values.len())?;
                let quantizer = desc.quantizer().ok_or(ConvertError::MissingQuantizer)?;
                check_buffer_len(buffer, desc.byte_len())?;
                buffer.rewind();
                for &x in values {
                    buffer.put(quantizer.quantize_to_byte(x));
                }
                Ok(())
            }
            ValueView::UInt8(values) if desc.quantized() => write_elements(values, desc, buffer),
            _ if desc.quantized() => Err(type_mismatch()),
            ValueView::Float32(values) if desc.dtype() == DataType::Float32 => {
                write_elements(values, desc, buffer)
            }
            ValueView::UInt8(values) if desc.dtype() == DataType::UInt8 => {
                write_elements(values, desc, buffer)
            }
            ValueView::Int32(values) if desc.dtype() == DataType::Int32 => {
                write_elements(values, desc, buffer)
            }
            ValueView::Int64(values) if desc.dtype() == DataType::Int64 => {
                write_elements(values, desc, buffer)
            }
            _ => Err(type_mismatch()),
        }
    }

    /// Decode a vector.
    ///
    /// Quantized vectors are dequantized to float32 if the layer has a
    /// dequantizer, and otherwise returned as raw bytes. Unquantized vectors
    /// are returned with the layer's element type.
    fn decode(
        &self,
        buffer: &TensorBuffer,
        desc: &VectorDescription,
    ) -> Result<Value, ConvertError> {
        check_buffer_len(buffer, desc.byte_len())?;
        let len = desc.length();

        if desc.quantized() {
            let bytes = buffer.read_vec::<u8>(len);
            return Ok(match desc.dequantizer() {
                Some(dequantizer) => Value::Float32(
                    bytes
                        .into_iter()
                        .map(|b| dequantizer.dequantize_byte(b))
                        .collect(),
                ),
                None => Value::UInt8(bytes),
            });
        }

        let value = match desc.dtype() {
            DataType::Float32 => Value::Float32(buffer.read_vec(len)),
            DataType::UInt8 => Value::UInt8(buffer.read_vec(len)),
            DataType::Int32 => Value::Int32(buffer.read_vec(len)),
            DataType::Int64 => Value::Int64(buffer.read_vec(len)),
        };
        Ok(value)
    }
}

impl VectorConverter {
    /// Decode a quantized vector as floats.
    ///
    /// Unlike [`decode`](Converter::decode), this fails with
    /// [`ConvertError::MissingDequantizer`] if a quantized layer has no
    /// dequantizer.
    pub fn decode_f32(
        &self,
        buffer: &TensorBuffer,
        desc: &VectorDescription,
    ) -> Result<Vec<f32>, ConvertError> {
        if desc.quantized() && desc.dequantizer().is_none() {
            return Err(ConvertError::MissingDequantizer);
        }
        match self.decode(buffer, desc)? {
            Value::Float32(values) => Ok(values),
            other => Err(ConvertError::TypeMismatch {
                expected: "float32",
                actual: other.view().type_name(),
            }),
        }
    }
}
