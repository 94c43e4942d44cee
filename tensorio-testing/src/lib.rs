//! Internal testing utilities for the tensorio crates.

use std::fmt::Debug;
use std::panic::{RefUnwindSafe, UnwindSafe};

use image::{DynamicImage, Rgb, RgbImage};

/// Utility for creating table-driven tests.
///
/// Create a `Debug` struct, conventionally named `Case`, holding the data for
/// one test case, build a collection of cases and call `test_each` with the
/// test function. Every case is run, with panics caught. If any case fails,
/// `test_each` panics afterwards with the count and debug representations of
/// the failing cases.
///
/// ```
/// use tensorio_testing::TestCases;
///
/// fn test_byte_len() {
///   #[derive(Debug)]
///   struct Case {
///     length: usize,
///     elem_size: usize,
///     expected: usize,
///   }
///
///   let cases = [
///     Case { length: 10, elem_size: 4, expected: 40 },
///     Case { length: 10, elem_size: 1, expected: 10 },
///   ];
///
///   cases.test_each(|&Case { length, elem_size, expected }| {
///     assert_eq!(length * elem_size, expected);
///   });
/// }
/// # test_byte_len();
/// ```
///
/// `test_each` passes cases by reference. `test_each_clone` and
/// `test_each_value` pass owned cases instead.
///
/// Cases and values captured by the test function must be
/// [unwind safe](https://doc.rust-lang.org/std/panic/fn.catch_unwind.html).
/// Types with interior mutability can be created inside the test function,
/// or wrapped with [`AssertUnwindSafe`](std::panic::AssertUnwindSafe).
pub trait TestCases {
    /// The data for a single test case.
    type Case;

    /// Call `test` with a reference to each case, catching any panics.
    fn test_each(self, test: impl Fn(&Self::Case) + RefUnwindSafe)
    where
        Self::Case: Debug + RefUnwindSafe;

    /// Call `test` with a clone of each case.
    fn test_each_clone(self, test: impl Fn(Self::Case) + RefUnwindSafe)
    where
        Self::Case: Debug + Clone + UnwindSafe;

    /// Call `test` with each case by value.
    ///
    /// Each case is formatted before the test function runs, so that it can
    /// be reported if the test fails.
    fn test_each_value(self, test: impl Fn(Self::Case) + RefUnwindSafe)
    where
        Self::Case: Debug + UnwindSafe;
}

fn report_failures<T: Debug>(failures: &[T]) {
    assert_eq!(
        failures.len(),
        0,
        "{} test cases failed: {:?}",
        failures.len(),
        failures
    );
}

impl<I: IntoIterator> TestCases for I {
    type Case = I::Item;

    fn test_each(self, test: impl Fn(&I::Item) + RefUnwindSafe)
    where
        Self::Case: Debug + RefUnwindSafe,
    {
        let failures: Vec<_> = self
            .into_iter()
            .filter(|case| std::panic::catch_unwind(|| test(case)).is_err())
            .collect();
        report_failures(&failures);
    }

    fn test_each_clone(self, test: impl Fn(I::Item) + RefUnwindSafe)
    where
        Self::Case: Clone + Debug + UnwindSafe,
    {
        let test = &test;
        let failures: Vec<_> = self
            .into_iter()
            .filter(|case| {
                let value = case.clone();
                std::panic::catch_unwind(move || test(value)).is_err()
            })
            .collect();
        report_failures(&failures);
    }

    fn test_each_value(self, test: impl Fn(I::Item) + RefUnwindSafe)
    where
        Self::Case: Debug + UnwindSafe,
    {
        let test = &test;
        let failures: Vec<String> = self
            .into_iter()
            .filter_map(|case| {
                let case_str = format!("{:?}", case);
                std::panic::catch_unwind(move || test(case))
                    .is_err()
                    .then_some(case_str)
            })
            .collect();
        report_failures(&failures);
    }
}

/// Return true if `a` and `b` differ by at most `tolerance`.
pub fn approx_eq(a: f32, b: f32, tolerance: f32) -> bool {
    (a - b).abs() <= tolerance
}

/// Check that two float slices have the same length and approximately equal
/// elements.
///
/// Returns an error describing the first mismatch otherwise.
pub fn expect_all_close(actual: &[f32], expected: &[f32], tolerance: f32) -> Result<(), String> {
    if actual.len() != expected.len() {
        return Err(format!(
            "length {} does not match expected length {}",
            actual.len(),
            expected.len()
        ));
    }
    match actual
        .iter()
        .zip(expected)
        .position(|(a, e)| !approx_eq(*a, *e, tolerance))
    {
        Some(i) => Err(format!(
            "element {} is {} but expected {}",
            i, actual[i], expected[i]
        )),
        None => Ok(()),
    }
}

/// Create an RGB image filled with a single color.
pub fn solid_image(width: u32, height: u32, color: [u8; 3]) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb(color)))
}

/// Create an RGB image where every pixel has distinct channel values.
///
/// The pixel at `(x, y)` is `[x, y, x + y]`, truncated to bytes.
pub fn gradient_image(width: u32, height: u32) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
        Rgb([x as u8, y as u8, (x + y) as u8])
    }))
}
