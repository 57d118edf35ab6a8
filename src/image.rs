// image.rs — Runtime-sized image container, generic over pixel type.
//
// Row-major, contiguous, no stride padding: the GPU path uploads into
// storage buffers (not textures), so `as_slice()` can be handed to
// `bytemuck::cast_slice` directly without per-row alignment fixups.
//
// One channel per image. The encompassing system splits an RGB frame into
// three channels and transforms each independently; that iteration lives
// outside this crate.

use std::fmt;

/// Trait for types that can serve as pixel values in an [`Image`].
///
/// `u8` covers the acquisition side (decoded image channels); `f32` is the
/// working type of the transform. Both are `Copy + Default`, so images can
/// be zero-initialized and pixels passed by value.
pub trait Pixel: Copy + Default + Send + Sync + PartialOrd + 'static {
    /// Raw cast to f32 (255u8 → 255.0, not normalized).
    fn to_f32(self) -> f32;

    /// Construct a pixel from an f32 value, clamping/rounding as needed.
    fn from_f32(v: f32) -> Self;
}

impl Pixel for u8 {
    #[inline]
    fn to_f32(self) -> f32 {
        self as f32
    }

    #[inline]
    fn from_f32(v: f32) -> Self {
        v.clamp(0.0, 255.0).round() as u8
    }
}

impl Pixel for f32 {
    #[inline]
    fn to_f32(self) -> f32 {
        self
    }

    #[inline]
    fn from_f32(v: f32) -> Self {
        v
    }
}

/// A 2D image with runtime dimensions, generic over pixel type `T`.
///
/// Dimensions follow the wavelet literature: `height` is the number of
/// rows M, `width` the number of columns N. Pixel (x, y) is column x of
/// row y, stored at index `y * width + x`.
pub struct Image<T: Pixel> {
    /// Pixel data in row-major order. Length = width * height.
    data: Vec<T>,
    width: usize,
    height: usize,
}

// Manual Clone to make the deep copy of heap data explicit at call sites.
impl<T: Pixel> Clone for Image<T> {
    fn clone(&self) -> Self {
        Image {
            data: self.data.clone(),
            width: self.width,
            height: self.height,
        }
    }
}

impl<T: Pixel> Image<T> {
    /// Create a zero-initialized image.
    pub fn new(width: usize, height: usize) -> Self {
        Image {
            data: vec![T::default(); width * height],
            width,
            height,
        }
    }

    /// Create an image from an existing pixel vector (row-major).
    ///
    /// # Panics
    /// Panics if `data.len() != width * height`.
    pub fn from_vec(width: usize, height: usize, data: Vec<T>) -> Self {
        assert_eq!(
            data.len(),
            width * height,
            "data length ({}) must equal width * height ({})",
            data.len(),
            width * height,
        );
        Image { data, width, height }
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    /// Get the pixel value at (x, y). x is column, y is row.
    ///
    /// # Panics
    /// Panics if (x, y) is out of bounds.
    #[inline]
    pub fn get(&self, x: usize, y: usize) -> T {
        self.bounds_check(x, y);
        self.data[y * self.width + x]
    }

    /// Set the pixel at (x, y).
    ///
    /// # Panics
    /// Panics if (x, y) is out of bounds.
    #[inline]
    pub fn set(&mut self, x: usize, y: usize, value: T) {
        self.bounds_check(x, y);
        self.data[y * self.width + x] = value;
    }

    /// Borrow a single row as a slice.
    #[inline]
    pub fn row(&self, y: usize) -> &[T] {
        assert!(y < self.height, "row {y} out of bounds (height {})", self.height);
        let start = y * self.width;
        &self.data[start..start + self.width]
    }

    /// Iterate over all pixels as `(x, y, value)` tuples.
    pub fn pixels(&self) -> impl Iterator<Item = (usize, usize, T)> + '_ {
        (0..self.height).flat_map(move |y| {
            (0..self.width).map(move |x| (x, y, self.data[y * self.width + x]))
        })
    }

    /// The full pixel buffer, row-major.
    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    /// Mutable access to the pixel buffer.
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.data
    }

    /// Convert every pixel to f32 (raw cast). Used when feeding a decoded
    /// u8 channel into the transform, which works in f32 throughout.
    pub fn to_f32(&self) -> Image<f32> {
        Image {
            data: self.data.iter().map(|p| p.to_f32()).collect(),
            width: self.width,
            height: self.height,
        }
    }

    #[inline]
    fn bounds_check(&self, x: usize, y: usize) {
        assert!(
            x < self.width && y < self.height,
            "pixel ({x},{y}) out of bounds for image {}×{}",
            self.width,
            self.height,
        );
    }
}

impl<T: Pixel> std::ops::Index<(usize, usize)> for Image<T> {
    type Output = T;

    #[inline]
    fn index(&self, (x, y): (usize, usize)) -> &T {
        self.bounds_check(x, y);
        &self.data[y * self.width + x]
    }
}

impl<T: Pixel> std::ops::IndexMut<(usize, usize)> for Image<T> {
    #[inline]
    fn index_mut(&mut self, (x, y): (usize, usize)) -> &mut T {
        self.bounds_check(x, y);
        let idx = y * self.width + x;
        &mut self.data[idx]
    }
}

// Debug formatting — useful for small images in tests.
impl<T: Pixel + fmt::Debug> fmt::Debug for Image<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Image<{}> {{ {}×{} }}",
            std::any::type_name::<T>(),
            self.width,
            self.height,
        )?;
        for y in 0..self.height.min(8) {
            write!(f, "  row {y}: [")?;
            for x in 0..self.width.min(12) {
                if x > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{:?}", self.get(x, y))?;
            }
            if self.width > 12 {
                write!(f, ", ...")?;
            }
            writeln!(f, "]")?;
        }
        if self.height > 8 {
            writeln!(f, "  ...")?;
        }
        Ok(())
    }
}
