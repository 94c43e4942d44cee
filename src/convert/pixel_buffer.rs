use std::borrow::Cow;

use image::{Rgba, RgbaImage};
use rten_tensor::prelude::*;
use rten_tensor::NdTensorView;

use super::{check_buffer_len, ConvertError, Converter};
use crate::buffer::TensorBuffer;
use crate::layer::PixelBufferDescription;
use crate::value::{Value, ValueView};

/// Order in which channel values of an image are laid out in a tensor.
///
/// This is a property of the inference backend, not of the layer.
#[derive(Copy, Clone, Debug, Default, Eq, Hash, PartialEq)]
pub enum PixelLayout {
    /// Channel values of each pixel are adjacent (HWC), eg. `RGBRGB...`.
    #[default]
    Interleaved,

    /// Each channel is stored as a separate plane (CHW), eg. `RR...GG...BB...`.
    Planar,
}

impl PixelLayout {
    pub fn from_name(name: &str) -> Option<PixelLayout> {
        match name {
            "interleaved" | "hwc" => Some(PixelLayout::Interleaved),
            "planar" | "chw" => Some(PixelLayout::Planar),
            _ => None,
        }
    }
}

/// Converter for RGB images.
///
/// Pixels are visited in row-major order. Quantized layers store each channel
/// as a byte. Unquantized layers store each channel as a float32, normalized
/// if the layer has a normalizer. The alpha channel of the input is ignored.
///
/// Images must match the layer's width and height exactly. Resizing, if
/// needed, is the caller's responsibility.
#[derive(Copy, Clone, Debug, Default)]
pub struct PixelBufferConverter {
    layout: PixelLayout,
}

impl PixelBufferConverter {
    pub fn new(layout: PixelLayout) -> PixelBufferConverter {
        PixelBufferConverter { layout }
    }

    pub fn layout(&self) -> PixelLayout {
        self.layout
    }

    /// Call `f` with each stored channel value of `hwc` and its colour
    /// channel index, in the order they appear in the tensor.
    fn visit_channels(
        &self,
        hwc: NdTensorView<u8, 3>,
        order: [usize; 3],
        mut f: impl FnMut(u8, usize),
    ) {
        let [height, width, _] = hwc.shape();
        match self.layout {
            PixelLayout::Interleaved => {
                for y in 0..height {
                    for x in 0..width {
                        for c in order {
                            f(hwc[[y, x, c]], c);
                        }
                    }
                }
            }
            PixelLayout::Planar => {
                let chw = hwc.permuted([2, 0, 1]);
                for c in order {
                    for y in 0..height {
                        for x in 0..width {
                            f(chw[[c, y, x]], c);
                        }
                    }
                }
            }
        }
    }

    /// Read stored channel values from `data` into an RGBA image.
    ///
    /// `convert` maps a stored value and its colour channel index to a byte.
    fn to_image<T: Copy>(
        &self,
        data: &[T],
        desc: &PixelBufferDescription,
        convert: impl Fn(T, usize) -> u8,
    ) -> RgbaImage {
        let volume = desc.volume();
        let (height, width) = (volume.height, volume.width);
        let order = desc.pixel_format().channel_order();

        // View with indices `[y, x, storage channel]`.
        let hwc = match self.layout {
            PixelLayout::Interleaved => NdTensorView::from_data([height, width, 3], data),
            PixelLayout::Planar => {
                NdTensorView::from_data([3, height, width], data).permuted([1, 2, 0])
            }
        };

        RgbaImage::from_fn(width as u32, height as u32, |x, y| {
            let (x, y) = (x as usize, y as usize);
            let mut pixel = [0, 0, 0, 0xFF];
            for (s, c) in order.into_iter().enumerate() {
                pixel[c] = convert(hwc[[y, x, s]], c);
            }
            Rgba(pixel)
        })
    }
}

impl Converter for PixelBufferConverter {
    type Description = PixelBufferDescription;

    fn create_backing_buffer(&self, desc: &PixelBufferDescription) -> TensorBuffer {
        TensorBuffer::new(desc.byte_len())
    }

    fn encode_into(
        &self,
        value: ValueView,
        desc: &PixelBufferDescription,
        buffer: &mut TensorBuffer,
    ) -> Result<(), ConvertError> {
        let ValueView::Image(image) = value else {
            return Err(ConvertError::TypeMismatch {
                expected: "image",
                actual: value.type_name(),
            });
        };

        let volume = desc.volume();
        let actual = [image.height() as usize, image.width() as usize];
        if actual != [volume.height, volume.width] {
            return Err(ConvertError::ShapeMismatch {
                expected: [volume.height, volume.width],
                actual,
            });
        }
        check_buffer_len(buffer, desc.byte_len())?;

        let rgb = match image.as_rgb8() {
            Some(rgb) => Cow::Borrowed(rgb),
            None => Cow::Owned(image.to_rgb8()),
        };
        let len = volume.height * volume.width * 3;
        let hwc = NdTensorView::from_data(
            [volume.height, volume.width, 3],
            &rgb.as_raw().as_slice()[..len],
        );
        let order = desc.pixel_format().channel_order();

        buffer.rewind();
        if desc.quantized() {
            self.visit_channels(hwc, order, |v, _| buffer.put(v));
        } else {
            match desc.normalizer() {
                Some(normalizer) => {
                    self.visit_channels(hwc, order, |v, c| buffer.put(normalizer.normalize(v, c)))
                }
                None => self.visit_channels(hwc, order, |v, _| buffer.put(v as f32)),
            }
        }

        Ok(())
    }

    /// Decode an image tensor into an RGBA image with an opaque alpha
    /// channel.
    ///
    /// Float values are denormalized if the layer has a denormalizer, and
    /// are otherwise truncated to bytes.
    fn decode(
        &self,
        buffer: &TensorBuffer,
        desc: &PixelBufferDescription,
    ) -> Result<Value, ConvertError> {
        check_buffer_len(buffer, desc.byte_len())?;
        let len = desc.volume().len();

        let image = if desc.quantized() {
            let data = buffer.read_vec::<u8>(len);
            self.to_image(&data, desc, |v, _| v)
        } else {
            let data = buffer.read_vec::<f32>(len);
            match desc.denormalizer() {
                Some(denormalizer) => {
                    self.to_image(&data, desc, |v, c| denormalizer.denormalize(v, c))
                }
                None => self.to_image(&data, desc, |v, _| v as u8),
            }
        };

        Ok(Value::from(image))
    }
}

#[cfg(test)]
mod tests {
    use image::{DynamicImage, Rgb, RgbImage, Rgba, RgbaImage};
    use tensorio_testing::TestCases;

    use super::{PixelBufferConverter, PixelLayout};
    use crate::convert::{ConvertError, Converter};
    use crate::layer::{ImageVolume, PixelBufferDescription, PixelFormat};
    use crate::normalize::{PixelDenormalizer, PixelNormalizer};
    use crate::value::ValueView;

    /// Create a 3x2 test image where every channel value is distinct.
    fn test_image() -> DynamicImage {
        let image = RgbImage::from_fn(3, 2, |x, y| {
            let base = (y * 3 + x) as u8 * 10;
            Rgb([base, base + 1, base + 2])
        });
        DynamicImage::ImageRgb8(image)
    }

    fn desc(format: PixelFormat, quantized: bool) -> PixelBufferDescription {
        PixelBufferDescription::new(ImageVolume::new(2, 3), format, quantized)
    }

    #[test]
    fn test_encode_layouts() {
        #[derive(Debug)]
        struct Case {
            layout: PixelLayout,
            format: PixelFormat,
            expected: Vec<u8>,
        }

        let cases = [
            Case {
                layout: PixelLayout::Interleaved,
                format: PixelFormat::Rgb,
                expected: vec![
                    0, 1, 2, 10, 11, 12, 20, 21, 22, 30, 31, 32, 40, 41, 42, 50, 51, 52,
                ],
            },
            Case {
                layout: PixelLayout::Interleaved,
                format: PixelFormat::Bgr,
                expected: vec![
                    2, 1, 0, 12, 11, 10, 22, 21, 20, 32, 31, 30, 42, 41, 40, 52, 51, 50,
                ],
            },
            Case {
                layout: PixelLayout::Planar,
                format: PixelFormat::Rgb,
                expected: vec![
                    0, 10, 20, 30, 40, 50, 1, 11, 21, 31, 41, 51, 2, 12, 22, 32, 42, 52,
                ],
            },
            Case {
                layout: PixelLayout::Planar,
                format: PixelFormat::Bgr,
                expected: vec![
                    2, 12, 22, 32, 42, 52, 1, 11, 21, 31, 41, 51, 0, 10, 20, 30, 40, 50,
                ],
            },
        ];

        cases.test_each(|case| {
            let image = test_image();
            let converter = PixelBufferConverter::new(case.layout);
            let desc = desc(case.format, true);

            let buf = converter.encode(ValueView::Image(&image), &desc).unwrap();
            assert_eq!(buf.as_bytes(), case.expected.as_slice());

            let decoded = converter.decode(&buf, &desc).unwrap().into_image().unwrap();
            assert_eq!(decoded, image.to_rgba8());
        });
    }

    #[test]
    fn test_float_identity() {
        for layout in [PixelLayout::Interleaved, PixelLayout::Planar] {
            for format in [PixelFormat::Rgb, PixelFormat::Bgr] {
                let image = test_image();
                let converter = PixelBufferConverter::new(layout);
                let desc = desc(format, false);

                let buf = converter.encode(ValueView::Image(&image), &desc).unwrap();
                assert_eq!(buf.len(), 2 * 3 * 3 * 4);

                let decoded = converter.decode(&buf, &desc).unwrap().into_image().unwrap();
                assert_eq!(decoded, image.to_rgba8(), "{:?} {:?}", layout, format);
            }
        }
    }

    #[test]
    fn test_encode_normalized_uniform_image() {
        let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(224, 224, Rgb([89, 0, 84])));
        let desc = PixelBufferDescription::new(ImageVolume::new(224, 224), PixelFormat::Rgb, false)
            .with_normalizer(PixelNormalizer::ZeroToOne);

        let buf = PixelBufferConverter::default()
            .encode(ValueView::Image(&image), &desc)
            .unwrap();

        let floats = buf.read_vec::<f32>(224 * 224 * 3);
        assert_eq!(floats.len(), 224 * 224 * 3);
        for pixel in floats.chunks(3) {
            assert_eq!(pixel, &[89. / 255., 0. / 255., 84. / 255.]);
        }
    }

    #[test]
    fn test_alpha_is_ignored() {
        let image = DynamicImage::ImageRgba8(RgbaImage::from_pixel(3, 2, Rgba([5, 6, 7, 0])));
        let converter = PixelBufferConverter::default();
        let desc = desc(PixelFormat::Rgb, true);

        let buf = converter.encode(ValueView::Image(&image), &desc).unwrap();
        assert!(buf.as_bytes().chunks(3).all(|px| px == [5, 6, 7]));

        let decoded = converter.decode(&buf, &desc).unwrap().into_image().unwrap();
        assert!(decoded.pixels().all(|px| *px == Rgba([5, 6, 7, 255])));
    }

    #[test]
    fn test_normalize_round_trip() {
        let image = test_image();
        let converter = PixelBufferConverter::new(PixelLayout::Planar);
        let input = desc(PixelFormat::Rgb, false)
            .with_normalizer(PixelNormalizer::affine(1. / 255., [0.5, 0.25, 0.]));
        let output = desc(PixelFormat::Rgb, false)
            .with_denormalizer(PixelDenormalizer::affine(255., [-0.5, -0.25, 0.]));

        let buf = converter.encode(ValueView::Image(&image), &input).unwrap();
        let floats = buf.read_vec::<f32>(18);
        assert!((floats[0] - 0.5).abs() < 1e-6);
        assert!((floats[6] - (1. / 255. + 0.25)).abs() < 1e-6);

        let decoded = converter.decode(&buf, &output).unwrap().into_image().unwrap();
        for (a, b) in decoded.pixels().zip(image.to_rgba8().pixels()) {
            for c in 0..3 {
                assert!((a[c] as i32 - b[c] as i32).abs() <= 1, "{:?} != {:?}", a, b);
            }
        }
    }

    #[test]
    fn test_encode_errors() {
        let converter = PixelBufferConverter::default();
        let desc = desc(PixelFormat::Rgb, false);

        let wrong_size = DynamicImage::new_rgb8(2, 3);
        assert_eq!(
            converter
                .encode(ValueView::Image(&wrong_size), &desc)
                .err(),
            Some(ConvertError::ShapeMismatch {
                expected: [2, 3],
                actual: [3, 2],
            })
        );

        assert_eq!(
            converter.encode(ValueView::Float32(&[0.; 18]), &desc).err(),
            Some(ConvertError::TypeMismatch {
                expected: "image",
                actual: "float32",
            })
        );
    }

    #[test]
    fn test_pixel_layout_names() {
        assert_eq!(
            PixelLayout::from_name("planar"),
            Some(PixelLayout::Planar)
        );
        assert_eq!(
            PixelLayout::from_name("hwc"),
            Some(PixelLayout::Interleaved)
        );
        assert_eq!(PixelLayout::from_name("nchw"), None);
    }
}
