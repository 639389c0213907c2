//! Image primitives used by the classifiers.
//!
//! | Operation | Implementation |
//! |---|---|
//! | **Decode** | `image::ImageReader`, format sniffed from content |
//! | **Grayscale** | BT.601 luma (`0.299 R + 0.587 G + 0.114 B`) |
//! | **HSV** | 8-bit convention: H in `0..180`, S and V in `0..=255` |
//! | **Edge response** | 3x3 Laplacian, reflect-101 borders, variance streamed |
//!
//! The 8-bit HSV and BT.601 conventions are the ones the classifier
//! thresholds were tuned against, so they are computed here rather than
//! taken from `image::imageops`.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::Path;

use image::{GrayImage, ImageReader, Luma, RgbImage};

use crate::error::{Result, SortError};

/// Decode a file into an RGB pixel grid. Decoder panics count as decode failures.
pub fn decode_rgb(path: &Path) -> Result<RgbImage> {
    let decoded = catch_unwind(AssertUnwindSafe(|| -> Result<RgbImage> {
        let img = ImageReader::open(path)?.with_guessed_format()?.decode()?;
        Ok(img.to_rgb8())
    }));
    decoded.unwrap_or(Err(SortError::DecoderPanicked))
}

pub fn to_gray(image: &RgbImage) -> GrayImage {
    let mut gray = GrayImage::new(image.width(), image.height());
    for (x, y, px) in image.enumerate_pixels() {
        let [r, g, b] = px.0;
        let luma = 0.299 * f32::from(r) + 0.587 * f32::from(g) + 0.114 * f32::from(b);
        gray.put_pixel(x, y, Luma([luma.round().clamp(0.0, 255.0) as u8]));
    }
    gray
}

/// A pixel in 8-bit HSV.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hsv {
    pub h: u8,
    pub s: u8,
    pub v: u8,
}

pub fn rgb_to_hsv(r: u8, g: u8, b: u8) -> Hsv {
    let (rf, gf, bf) = (f32::from(r), f32::from(g), f32::from(b));
    let max = rf.max(gf).max(bf);
    let min = rf.min(gf).min(bf);
    let diff = max - min;

    let s = if max > 0.0 { 255.0 * diff / max } else { 0.0 };

    let mut h = if diff == 0.0 {
        0.0
    } else if max == rf {
        60.0 * (gf - bf) / diff
    } else if max == gf {
        120.0 + 60.0 * (bf - rf) / diff
    } else {
        240.0 + 60.0 * (rf - gf) / diff
    };
    if h < 0.0 {
        h += 360.0;
    }

    Hsv {
        // 360 degrees halved to fit a byte; 359.x rounds to 180 and wraps to 0
        h: ((h / 2.0).round() as u16 % 180) as u8,
        s: s.round() as u8,
        v: max as u8,
    }
}

/// Inclusive HSV box.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColorRange {
    pub lower: Hsv,
    pub upper: Hsv,
}

impl ColorRange {
    pub const fn new(lower: (u8, u8, u8), upper: (u8, u8, u8)) -> Self {
        Self {
            lower: Hsv {
                h: lower.0,
                s: lower.1,
                v: lower.2,
            },
            upper: Hsv {
                h: upper.0,
                s: upper.1,
                v: upper.2,
            },
        }
    }

    pub fn contains(&self, px: Hsv) -> bool {
        (self.lower.h..=self.upper.h).contains(&px.h)
            && (self.lower.s..=self.upper.s).contains(&px.s)
            && (self.lower.v..=self.upper.v).contains(&px.v)
    }
}

/// Pixel matches summed over `ranges`: a pixel inside two ranges counts
/// twice. Converts one pixel at a time instead of materialising an HSV copy.
pub fn count_in_ranges(image: &RgbImage, ranges: &[ColorRange]) -> usize {
    image
        .pixels()
        .map(|px| {
            let hsv = rgb_to_hsv(px.0[0], px.0[1], px.0[2]);
            ranges.iter().filter(|range| range.contains(hsv)).count()
        })
        .sum()
}

fn reflect_101(i: i64, n: i64) -> u32 {
    if n == 1 {
        return 0;
    }
    let r = if i < 0 {
        -i
    } else if i >= n {
        2 * n - 2 - i
    } else {
        i
    };
    r as u32
}

/// Population variance of the response to `[[0,1,0],[1,-4,1],[0,1,0]]`.
///
/// Streams `sum` and `sum_sq` over the image; the response is never stored.
/// The sums are integers, so the variance numerator is exact.
pub fn laplacian_variance(gray: &GrayImage) -> f64 {
    let (w, h) = (i64::from(gray.width()), i64::from(gray.height()));
    if w == 0 || h == 0 {
        return 0.0;
    }
    let at = |x: i64, y: i64| {
        i64::from(gray.get_pixel(reflect_101(x, w), reflect_101(y, h)).0[0])
    };

    let mut sum = 0i64;
    let mut sum_sq = 0i64;
    for y in 0..h {
        for x in 0..w {
            let lap = at(x, y - 1) + at(x, y + 1) + at(x - 1, y) + at(x + 1, y) - 4 * at(x, y);
            sum += lap;
            sum_sq += lap * lap;
        }
    }

    let n = i128::from(w * h);
    let numerator = n * i128::from(sum_sq) - i128::from(sum) * i128::from(sum);
    numerator as f64 / (n * n) as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{checkerboard, solid};
    use image::Rgb;

    #[test]
    fn test_hsv_primaries() {
        assert_eq!(rgb_to_hsv(255, 0, 0), Hsv { h: 0, s: 255, v: 255 });
        assert_eq!(rgb_to_hsv(0, 255, 0), Hsv { h: 60, s: 255, v: 255 });
        assert_eq!(rgb_to_hsv(0, 0, 255), Hsv { h: 120, s: 255, v: 255 });
        assert_eq!(rgb_to_hsv(255, 255, 0), Hsv { h: 30, s: 255, v: 255 });
    }

    #[test]
    fn test_hsv_grays_have_no_saturation() {
        assert_eq!(rgb_to_hsv(0, 0, 0), Hsv { h: 0, s: 0, v: 0 });
        assert_eq!(rgb_to_hsv(240, 240, 240), Hsv { h: 0, s: 0, v: 240 });
    }

    #[test]
    fn test_hsv_hue_wraps_near_red() {
        // magenta-red just below 360 degrees
        let px = rgb_to_hsv(255, 0, 2);
        assert!(px.h == 0 || px.h >= 179);
    }

    #[test]
    fn test_color_range_is_inclusive() {
        let range = ColorRange::new((20, 100, 100), (40, 255, 255));
        assert!(range.contains(Hsv { h: 20, s: 100, v: 100 }));
        assert!(range.contains(Hsv { h: 40, s: 255, v: 255 }));
        assert!(!range.contains(Hsv { h: 41, s: 200, v: 200 }));
        assert!(!range.contains(Hsv { h: 30, s: 99, v: 200 }));
    }

    #[test]
    fn test_gray_uses_bt601_weights() {
        let mut img = RgbImage::new(1, 1);
        img.put_pixel(0, 0, Rgb([255, 0, 0]));
        assert_eq!(to_gray(&img).get_pixel(0, 0).0[0], 76);
    }

    #[test]
    fn test_flat_image_has_zero_variance() {
        let gray = to_gray(&solid(32, 32, [128, 128, 128]));
        assert_eq!(laplacian_variance(&gray), 0.0);
    }

    #[test]
    fn test_checkerboard_has_high_variance() {
        let gray = to_gray(&checkerboard(64, 64, 4));
        assert!(laplacian_variance(&gray) > 1000.0);
    }

    #[test]
    fn test_single_spot_variance_with_reflected_borders() {
        // responses: -1020 at the centre, 510 on the four edge midpoints
        // (reflection doubles the centre), 0 in the corners
        let mut gray = GrayImage::new(3, 3);
        gray.put_pixel(1, 1, Luma([255]));
        let expected = 17_686_800.0 / 81.0;
        assert!((laplacian_variance(&gray) - expected).abs() < 1e-6);
    }

    #[test]
    fn test_laplacian_handles_degenerate_sizes() {
        assert_eq!(laplacian_variance(&to_gray(&solid(1, 1, [10, 20, 30]))), 0.0);
        assert_eq!(laplacian_variance(&to_gray(&solid(5, 1, [10, 20, 30]))), 0.0);
        assert_eq!(laplacian_variance(&GrayImage::new(0, 0)), 0.0);
    }

    #[test]
    fn test_count_in_ranges_counts_each_match() {
        let img = solid(4, 5, [240, 220, 20]);
        let yellow = ColorRange::new((20, 100, 100), (40, 255, 255));
        let blue = ColorRange::new((100, 100, 100), (130, 255, 255));
        assert_eq!(count_in_ranges(&img, &[yellow]), 20);
        assert_eq!(count_in_ranges(&img, &[yellow, blue]), 20);
        assert_eq!(count_in_ranges(&img, &[yellow, yellow]), 40);
    }
}
