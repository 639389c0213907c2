//! Bouquet detection from colour statistics.
//!
//! Flower arrangements are photographed with a shallow depth of field, so
//! they score lower on the sharpness metric than other subjects. An image is
//! treated as bouquet-like when enough of its pixels fall into typical flower
//! colours. Ranges may overlap and a pixel is counted once per range it falls
//! into; the ratio is a deliberate over-count and may exceed 1.0.

use image::RgbImage;

use crate::imaging::{count_in_ranges, ColorRange};

/// Flower colour ranges in 8-bit HSV (H `0..180`).
pub const FLOWER_RANGES: [ColorRange; 5] = [
    // red, both sides of the hue wrap-around
    ColorRange::new((0, 100, 100), (10, 255, 255)),
    ColorRange::new((160, 100, 100), (180, 255, 255)),
    // pink / purple
    ColorRange::new((125, 50, 100), (155, 255, 255)),
    // yellow
    ColorRange::new((20, 100, 100), (40, 255, 255)),
    // white: low saturation, high value
    ColorRange::new((0, 0, 200), (180, 30, 255)),
];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BouquetVerdict {
    pub is_bouquet: bool,
    pub flower_ratio: f64,
}

/// Classify `image` as bouquet-like when its flower ratio exceeds `min_ratio`.
pub fn detect_bouquet(image: &RgbImage, min_ratio: f64) -> BouquetVerdict {
    let flower_ratio = flower_ratio(image);
    BouquetVerdict {
        is_bouquet: flower_ratio > min_ratio,
        flower_ratio,
    }
}

/// Ratio over the built-in [`FLOWER_RANGES`].
pub fn flower_ratio(image: &RgbImage) -> f64 {
    flower_ratio_in(image, &FLOWER_RANGES)
}

/// Sum of per-range matches over the pixel count.
pub fn flower_ratio_in(image: &RgbImage, ranges: &[ColorRange]) -> f64 {
    let total = u64::from(image.width()) * u64::from(image.height());
    if total == 0 {
        return 0.0;
    }
    count_in_ranges(image, ranges) as f64 / total as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{solid, split};

    #[test]
    fn test_red_is_bouquet() {
        let v = detect_bouquet(&solid(16, 16, [220, 20, 30]), 0.15);
        assert!(v.is_bouquet);
        assert!((v.flower_ratio - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_dark_green_is_not_bouquet() {
        let v = detect_bouquet(&solid(16, 16, [20, 90, 30]), 0.15);
        assert!(!v.is_bouquet);
        assert_eq!(v.flower_ratio, 0.0);
    }

    #[test]
    fn test_ratio_threshold_is_strict() {
        // 15% yellow, rest mid gray (not white, not saturated)
        let img = split(100, 1, 15, [240, 220, 20], [100, 100, 100]);
        let v = detect_bouquet(&img, 0.15);
        assert!((v.flower_ratio - 0.15).abs() < 1e-9);
        assert!(!v.is_bouquet);

        let img = split(100, 1, 16, [240, 220, 20], [100, 100, 100]);
        assert!(detect_bouquet(&img, 0.15).is_bouquet);
    }

    #[test]
    fn test_overlapping_ranges_double_count() {
        let img = solid(10, 10, [240, 220, 20]);
        let yellow = FLOWER_RANGES[3];
        let broad = ColorRange::new((0, 100, 100), (60, 255, 255));
        assert_eq!(flower_ratio_in(&img, &[yellow]), 1.0);
        assert_eq!(flower_ratio_in(&img, &[yellow, broad]), 2.0);
    }

    #[test]
    fn test_empty_image() {
        let v = detect_bouquet(&RgbImage::new(0, 0), 0.15);
        assert!(!v.is_bouquet);
        assert_eq!(v.flower_ratio, 0.0);
    }
}
