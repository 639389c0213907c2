//! Blur classification.
//!
//! The sharpness score is the variance of the Laplacian of the grayscale
//! image: in-focus edges produce strong second-derivative responses, so a
//! low variance means a soft image. Bouquet-like images are judged against a
//! lowered threshold.
//!
//! Classification fails open: anything that prevents scoring an image yields
//! a "sharp" verdict with a [`BlurDiagnostic`] saying why.

use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};

use image::RgbImage;
use tracing::{info, warn};

use crate::bouquet::{detect_bouquet, BouquetVerdict};
use crate::imaging::{decode_rgb, laplacian_variance, to_gray};
use crate::media::ImageFile;
use crate::Thresholds;

/// Why an image was not scored.
#[derive(Debug, Clone, PartialEq)]
pub enum BlurDiagnostic {
    /// Raw formats are passed through without analysis.
    RawSkipped,
    DecodeFailed(String),
    AnalysisPanicked,
}

impl fmt::Display for BlurDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlurDiagnostic::RawSkipped => write!(f, "raw file, blur analysis skipped"),
            BlurDiagnostic::DecodeFailed(e) => write!(f, "failed to load image: {e}"),
            BlurDiagnostic::AnalysisPanicked => write!(f, "blur analysis panicked"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BlurVerdict {
    pub blurry: bool,
    /// Laplacian variance, `None` when the image was not scored
    pub score: Option<f64>,
    /// Threshold the score was compared against
    pub threshold: Option<f64>,
    pub bouquet: Option<BouquetVerdict>,
    pub diagnostic: Option<BlurDiagnostic>,
}

impl BlurVerdict {
    /// Fail-open verdict: not blurry, not scored.
    pub fn unscored(diagnostic: BlurDiagnostic) -> Self {
        Self {
            blurry: false,
            score: None,
            threshold: None,
            bouquet: None,
            diagnostic: Some(diagnostic),
        }
    }

    /// Directory name for this verdict.
    pub fn status(&self) -> &'static str {
        if self.blurry {
            "blurry"
        } else {
            "sharp"
        }
    }
}

/// Threshold to apply: the base threshold, scaled down for bouquets.
pub fn effective_threshold(is_bouquet: bool, thresholds: &Thresholds) -> f64 {
    if is_bouquet {
        thresholds.laplacian * thresholds.bouquet_factor
    } else {
        thresholds.laplacian
    }
}

/// Compare a sharpness score against the bouquet-adjusted threshold.
pub fn judge(score: f64, bouquet: BouquetVerdict, thresholds: &Thresholds) -> BlurVerdict {
    let threshold = effective_threshold(bouquet.is_bouquet, thresholds);
    BlurVerdict {
        blurry: score < threshold,
        score: Some(score),
        threshold: Some(threshold),
        bouquet: Some(bouquet),
        diagnostic: None,
    }
}

/// Variance of the Laplacian of the grayscale image. Higher is sharper.
pub fn sharpness_score(image: &RgbImage) -> f64 {
    laplacian_variance(&to_gray(image))
}

pub fn classify_image(image: &RgbImage, thresholds: &Thresholds) -> BlurVerdict {
    let score = sharpness_score(image);
    let bouquet = detect_bouquet(image, thresholds.bouquet_ratio);
    judge(score, bouquet, thresholds)
}

/// Classify a file on disk. Never fails; see [`BlurDiagnostic`].
pub fn classify_file(file: &ImageFile, thresholds: &Thresholds) -> BlurVerdict {
    if file.is_raw() {
        info!("Cannot process RAW file for blur detection: {}", file.path.display());
        return BlurVerdict::unscored(BlurDiagnostic::RawSkipped);
    }

    let image = match decode_rgb(&file.path) {
        Ok(image) => image,
        Err(e) => {
            warn!("Failed to load image {}: {}", file.path.display(), e);
            return BlurVerdict::unscored(BlurDiagnostic::DecodeFailed(e.to_string()));
        }
    };

    let Ok(verdict) = catch_unwind(AssertUnwindSafe(|| classify_image(&image, thresholds))) else {
        warn!("Blur analysis panicked for {}", file.path.display());
        return BlurVerdict::unscored(BlurDiagnostic::AnalysisPanicked);
    };

    if let (Some(score), Some(threshold), Some(bouquet)) =
        (verdict.score, verdict.threshold, verdict.bouquet)
    {
        info!(
            "Image: {}, Laplacian var: {:.2}, Bouquet detected: {} (ratio {:.3}), Threshold: {}",
            file.path.display(),
            score,
            bouquet.is_bouquet,
            bouquet.flower_ratio,
            threshold
        );
    }
    verdict
}
