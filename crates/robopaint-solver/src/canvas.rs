//! Owned RGBA rasters addressed in instruction-language coordinates.
//!
//! The `image` crate stores rows top-down; the instruction language puts the
//! origin at the bottom-left. [`Canvas`] flips rows once on the way in and
//! once on the way out so every other module can index `(x, y)` directly.

use std::collections::HashMap;

use crate::cost::{pairwise_similarity, similarity};
use crate::geometry::{GeometryError, Shape};
use crate::types::{Color, Dimensions, RgbaImage, SolveError};

/// A raster with bottom-left origin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Canvas {
    width: u32,
    height: u32,
    /// Row-major, row 0 is the bottom row.
    pixels: Vec<Color>,
}

impl Canvas {
    /// A canvas painted entirely with `color`.
    #[must_use]
    pub fn filled(dimensions: Dimensions, color: Color) -> Self {
        let len = usize::try_from(dimensions.area()).unwrap_or(0);
        Self {
            width: dimensions.width,
            height: dimensions.height,
            pixels: vec![color; len],
        }
    }

    /// Build a canvas from pixels given in image order (top row first).
    #[must_use]
    pub fn from_rgba(image: &RgbaImage) -> Self {
        let (width, height) = image.dimensions();
        let mut pixels = Vec::with_capacity(image.as_raw().len() / 4);
        for y in (0..height).rev() {
            pixels.extend((0..width).map(|x| Color::from(*image.get_pixel(x, y))));
        }
        Self {
            width,
            height,
            pixels,
        }
    }

    /// Build a canvas with a function of bottom-left based coordinates.
    #[must_use]
    pub fn from_fn<F>(dimensions: Dimensions, mut f: F) -> Self
    where
        F: FnMut(u32, u32) -> Color,
    {
        let mut pixels = Vec::with_capacity(usize::try_from(dimensions.area()).unwrap_or(0));
        for y in 0..dimensions.height {
            pixels.extend((0..dimensions.width).map(|x| f(x, y)));
        }
        Self {
            width: dimensions.width,
            height: dimensions.height,
            pixels,
        }
    }

    /// Decode raw image bytes (PNG, JPEG, BMP, WebP) into a canvas.
    ///
    /// # Errors
    ///
    /// Returns [`SolveError::EmptyInput`] if `bytes` is empty and
    /// [`SolveError::ImageDecode`] if the format is unrecognized or the
    /// data is corrupt.
    pub fn decode(bytes: &[u8]) -> Result<Self, SolveError> {
        if bytes.is_empty() {
            return Err(SolveError::EmptyInput);
        }
        let image = image::load_from_memory(bytes)?;
        Ok(Self::from_rgba(&image.to_rgba8()))
    }

    /// Convert back to image order (top row first).
    #[must_use]
    pub fn to_rgba(&self) -> RgbaImage {
        RgbaImage::from_fn(self.width, self.height, |x, y| {
            self.pixel(x, self.height - 1 - y).into()
        })
    }

    /// Canvas dimensions.
    #[must_use]
    pub const fn dimensions(&self) -> Dimensions {
        Dimensions {
            width: self.width,
            height: self.height,
        }
    }

    /// The shape covering the whole canvas.
    ///
    /// # Errors
    ///
    /// Returns [`GeometryError::Degenerate`] for an empty canvas.
    pub const fn bounds(&self) -> Result<Shape, GeometryError> {
        Shape::new(0, 0, self.width, self.height)
    }

    /// Ensure `shape` lies on the canvas.
    ///
    /// # Errors
    ///
    /// Returns [`SolveError::OutOfCanvas`] otherwise.
    pub fn check(&self, shape: &Shape) -> Result<(), SolveError> {
        if shape.x2() <= self.width && shape.y2() <= self.height {
            Ok(())
        } else {
            Err(SolveError::OutOfCanvas {
                shape: *shape,
                dimensions: self.dimensions(),
            })
        }
    }

    /// Pixel at `(x, y)`; both coordinates must be in range.
    #[must_use]
    pub fn pixel(&self, x: u32, y: u32) -> Color {
        self.pixels[self.index(x, y)]
    }

    fn index(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }

    fn row(&self, shape: &Shape, y: u32) -> &[Color] {
        let start = self.index(shape.x(), y);
        &self.pixels[start..start + shape.width() as usize]
    }

    /// Pixels of a region, row by row from the bottom.
    ///
    /// `shape` must lie on the canvas (see [`check`](Self::check)).
    pub fn region<'a>(&'a self, shape: &'a Shape) -> impl Iterator<Item = Color> + 'a {
        (shape.y()..shape.y2()).flat_map(move |y| self.row(shape, y).iter().copied())
    }

    /// Similarity penalty of painting `shape` with `color`.
    #[must_use]
    pub fn similarity(&self, shape: &Shape, color: Color) -> f64 {
        similarity(self.region(shape), color)
    }

    /// Similarity penalty between the same region of two canvases of equal
    /// size.
    #[must_use]
    pub fn similarity_to(&self, other: &Self, shape: &Shape) -> f64 {
        pairwise_similarity(self.region(shape), other.region(shape))
    }

    /// Distinct colors of a region with their pixel counts, sorted by color
    /// so the result does not depend on hashing order.
    #[must_use]
    pub fn histogram(&self, shape: &Shape) -> Vec<(Color, u64)> {
        let mut counts: HashMap<Color, u64> = HashMap::new();
        for color in self.region(shape) {
            *counts.entry(color).or_insert(0) += 1;
        }
        let mut histogram: Vec<(Color, u64)> = counts.into_iter().collect();
        histogram.sort_unstable_by_key(|&(color, _)| color);
        histogram
    }

    /// Channel-wise mean of a region.
    #[must_use]
    pub fn mean(&self, shape: &Shape) -> [f64; 4] {
        let mut sum = [0u64; 4];
        for color in self.region(shape) {
            for (s, c) in sum.iter_mut().zip(color.0) {
                *s += u64::from(c);
            }
        }
        #[allow(clippy::cast_precision_loss)]
        let n = shape.area() as f64;
        #[allow(clippy::cast_precision_loss)]
        sum.map(|s| s as f64 / n)
    }

    /// Paint every pixel of `shape` with `color`.
    pub fn fill(&mut self, shape: &Shape, color: Color) {
        for y in shape.y()..shape.y2() {
            let start = self.index(shape.x(), y);
            self.pixels[start..start + shape.width() as usize].fill(color);
        }
    }

    /// Exchange the contents of two equal-size, non-overlapping regions.
    ///
    /// # Errors
    ///
    /// Returns [`GeometryError::SizeMismatch`] when the shapes differ in
    /// width or height.
    pub fn swap_regions(&mut self, a: &Shape, b: &Shape) -> Result<(), GeometryError> {
        if !a.same_size(b) {
            return Err(GeometryError::SizeMismatch { a: *a, b: *b });
        }
        let w = a.width() as usize;
        for dy in 0..a.height() {
            let ia = self.index(a.x(), a.y() + dy);
            let ib = self.index(b.x(), b.y() + dy);
            for dx in 0..w {
                self.pixels.swap(ia + dx, ib + dx);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn dims(width: u32, height: u32) -> Dimensions {
        Dimensions { width, height }
    }

    #[test]
    fn from_rgba_flips_rows() {
        // Top image row red, bottom image row blue.
        let img = RgbaImage::from_fn(2, 2, |_, y| {
            if y == 0 {
                image::Rgba([255, 0, 0, 255])
            } else {
                image::Rgba([0, 0, 255, 255])
            }
        });
        let canvas = Canvas::from_rgba(&img);
        assert_eq!(canvas.pixel(0, 0), Color::new(0, 0, 255, 255));
        assert_eq!(canvas.pixel(1, 1), Color::new(255, 0, 0, 255));
        assert_eq!(canvas.to_rgba(), img);
    }

    #[test]
    fn decode_empty_input() {
        assert!(matches!(Canvas::decode(&[]), Err(SolveError::EmptyInput)));
    }

    #[test]
    fn decode_corrupt_input() {
        assert!(matches!(
            Canvas::decode(&[0xFF, 0x00, 0x12]),
            Err(SolveError::ImageDecode(_))
        ));
    }

    #[test]
    fn decode_png() {
        let img = RgbaImage::from_pixel(3, 2, image::Rgba([10, 20, 30, 255]));
        let mut buf = Vec::new();
        let encoder = image::codecs::png::PngEncoder::new(&mut buf);
        image::ImageEncoder::write_image(
            encoder,
            img.as_raw(),
            img.width(),
            img.height(),
            image::ExtendedColorType::Rgba8,
        )
        .unwrap();
        let canvas = Canvas::decode(&buf).unwrap();
        assert_eq!(canvas.dimensions(), dims(3, 2));
        assert_eq!(canvas.pixel(2, 1), Color::new(10, 20, 30, 255));
    }

    #[test]
    fn region_iterates_only_the_shape() {
        let canvas = Canvas::from_fn(dims(4, 4), |x, y| {
            #[allow(clippy::cast_possible_truncation)]
            Color::new((x + 4 * y) as u8, 0, 0, 255)
        });
        let shape = Shape::new(1, 2, 2, 2).unwrap();
        let reds: Vec<u8> = canvas.region(&shape).map(|c| c.0[0]).collect();
        assert_eq!(reds, vec![9, 10, 13, 14]);
    }

    #[test]
    fn check_rejects_shapes_off_canvas() {
        let canvas = Canvas::filled(dims(10, 10), Color::WHITE);
        assert!(canvas.check(&Shape::new(5, 5, 5, 5).unwrap()).is_ok());
        assert!(matches!(
            canvas.check(&Shape::new(5, 5, 6, 5).unwrap()),
            Err(SolveError::OutOfCanvas { .. })
        ));
    }

    #[test]
    fn histogram_counts_and_sorts() {
        let canvas = Canvas::from_fn(dims(3, 1), |x, _| {
            if x == 1 { Color::BLACK } else { Color::WHITE }
        });
        let hist = canvas.histogram(&canvas.bounds().unwrap());
        assert_eq!(hist, vec![(Color::BLACK, 1), (Color::WHITE, 2)]);
    }

    #[test]
    fn fill_and_similarity_to() {
        let target = Canvas::filled(dims(4, 4), Color::BLACK);
        let mut painted = Canvas::filled(dims(4, 4), Color::BLACK);
        let all = target.bounds().unwrap();
        assert!(painted.similarity_to(&target, &all).abs() < f64::EPSILON);

        let corner = Shape::new(0, 0, 2, 2).unwrap();
        painted.fill(&corner, Color::WHITE);
        let expected = target.similarity(&corner, Color::WHITE);
        assert!((painted.similarity_to(&target, &all) - expected).abs() < 1e-9);
    }

    #[test]
    fn similarity_to_ignores_pixels_outside_the_shape() {
        let target = Canvas::from_fn(dims(6, 3), |x, _| if x < 3 { Color::BLACK } else { Color::WHITE });
        let painted = Canvas::filled(dims(6, 3), Color::WHITE);
        let right = Shape::new(3, 0, 3, 3).unwrap();
        assert!(painted.similarity_to(&target, &right).abs() < f64::EPSILON);

        let left = Shape::new(1, 1, 2, 2).unwrap();
        let expected = target.similarity(&left, Color::WHITE);
        assert!((painted.similarity_to(&target, &left) - expected).abs() < 1e-9);
    }

    #[test]
    fn swap_regions_exchanges_contents() {
        let mut canvas = Canvas::filled(dims(4, 2), Color::WHITE);
        let left = Shape::new(0, 0, 2, 2).unwrap();
        let right = Shape::new(2, 0, 2, 2).unwrap();
        canvas.fill(&left, Color::BLACK);
        canvas.swap_regions(&left, &right).unwrap();
        assert_eq!(canvas.pixel(0, 0), Color::WHITE);
        assert_eq!(canvas.pixel(3, 1), Color::BLACK);
    }

    #[test]
    fn swap_regions_rejects_size_mismatch() {
        let mut canvas = Canvas::filled(dims(4, 2), Color::WHITE);
        let a = Shape::new(0, 0, 1, 2).unwrap();
        let b = Shape::new(2, 0, 2, 2).unwrap();
        assert!(matches!(
            canvas.swap_regions(&a, &b),
            Err(GeometryError::SizeMismatch { .. })
        ));
    }

    #[test]
    fn mean_of_two_colors() {
        let canvas = Canvas::from_fn(dims(2, 1), |x, _| {
            if x == 0 { Color::BLACK } else { Color::WHITE }
        });
        let mean = canvas.mean(&canvas.bounds().unwrap());
        assert!((mean[0] - 127.5).abs() < 1e-9);
        assert!((mean[3] - 255.0).abs() < 1e-9);
    }
}
