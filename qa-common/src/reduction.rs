//! Detector reduction statistics: overscan levels, bias gradient and dark
//! current.
//!
//! Images are `(rows, columns)` arrays in ADU. The overscan strips sit at the
//! left and right edges of each row. Overscan levels skip the first column
//! and the first four rows.

use std::ops::Range;

use ndarray::{s, Array1, Array2, ArrayView2, Axis};
use once_cell::sync::Lazy;
use qa_math::stats;
use regex::Regex;

use crate::error::{QaError, Result};

/// Clipping threshold used for every overscan and dark level.
pub const OVERSCAN_NSIGMA: f64 = 3.0;

static OVERSCAN_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\[(\d+):(\d+),(\d+):(\d+)\]").expect("overscan region pattern is valid")
});

/// Overscan region as half-open column (`x`) and row (`y`) ranges.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverscanRegion {
    pub x: Range<usize>,
    pub y: Range<usize>,
}

/// Parse a header region of the form `[x1:x2,y1:y2]`.
///
/// The bounds are used as slice limits unchanged. Anything around the
/// bracketed region is ignored.
pub fn parse_overscan_region(text: &str) -> Result<OverscanRegion> {
    let caps = OVERSCAN_REGEX
        .captures(text)
        .ok_or_else(|| QaError::Parse(format!("'{text}' is not an [x1:x2,y1:y2] region")))?;

    let mut limits = [0usize; 4];
    for (slot, limit) in limits.iter_mut().enumerate() {
        *limit = caps[slot + 1]
            .parse()
            .map_err(|e| QaError::Parse(format!("region bound '{}': {e}", &caps[slot + 1])))?;
    }
    let [xmin, xmax, ymin, ymax] = limits;

    if xmin > xmax || ymin > ymax {
        return Err(QaError::Parse(format!("region '{text}' has reversed bounds")));
    }

    Ok(OverscanRegion {
        x: xmin..xmax,
        y: ymin..ymax,
    })
}

fn require_size(image: &ArrayView2<'_, f64>, need_rows: usize, need_cols: usize) -> Result<()> {
    let (rows, cols) = image.dim();
    if rows < need_rows || cols < need_cols {
        return Err(QaError::ImageTooSmall {
            rows,
            cols,
            need_rows,
            need_cols,
        });
    }
    Ok(())
}

fn clipped_level(region: ArrayView2<'_, f64>) -> f64 {
    let values: Vec<f64> = region.iter().copied().collect();
    stats::sigma_clipped_mean(&values, OVERSCAN_NSIGMA).unwrap_or(f64::NAN)
}

/// Sigma-clipped mean of the pixels inside `region`.
pub fn region_level(image: ArrayView2<'_, f64>, region: &OverscanRegion) -> Result<f64> {
    require_size(&image, region.y.end, region.x.end)?;
    Ok(clipped_level(image.slice(s![
        region.y.start..region.y.end,
        region.x.start..region.x.end
    ])))
}

/// Left and right overscan levels of a single frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverscanLevels {
    pub left: f64,
    pub right: f64,
}

const LEVEL_SKIP_ROWS: usize = 4;
const LEFT_OVERSCAN: Range<usize> = 1..20;
const RIGHT_OVERSCAN_WIDTH: usize = 15;

/// Overscan levels from rows `4..`, columns `1..20` on the left and the last
/// 15 columns on the right.
pub fn overscan_levels(image: ArrayView2<'_, f64>) -> Result<OverscanLevels> {
    require_size(&image, LEVEL_SKIP_ROWS + 1, LEFT_OVERSCAN.end)?;
    let ncols = image.ncols();

    let left = clipped_level(image.slice(s![LEVEL_SKIP_ROWS.., LEFT_OVERSCAN]));
    let right = clipped_level(image.slice(s![LEVEL_SKIP_ROWS.., ncols - RIGHT_OVERSCAN_WIDTH..]));
    Ok(OverscanLevels { left, right })
}

/// Linear bias across `width` columns running from `left` at column 0
/// towards `right`: `left + (right - left) / width * x`.
pub fn bias_model(width: usize, left: f64, right: f64) -> Array1<f64> {
    let gradient = (right - left) / width as f64;
    Array1::from_iter((0..width).map(|x| gradient * x as f64 + left))
}

/// Dark current measured from a dark frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DarkCurrent {
    pub left: f64,
    pub right: f64,
    /// Sigma-clipped bias-subtracted level of the science columns, ADU.
    pub dark_adu: f64,
    /// `dark_adu * gain / exposure`, electrons per second.
    pub electrons_per_second: f64,
}

const DARK_STRIP: usize = 20;

/// Bias-subtract the central columns of a dark frame and measure the
/// residual level.
///
/// The overscans are columns `1..20` and the last 20; the science region is
/// `20..width-20`, with the bias gradient laid across its width.
pub fn dark_current(image: ArrayView2<'_, f64>, gain: f64, exposure_s: f64) -> Result<DarkCurrent> {
    require_size(&image, 1, 2 * DARK_STRIP + 1)?;
    if exposure_s.is_nan() || exposure_s <= 0.0 {
        return Err(QaError::Config(format!(
            "exposure time must be positive, got {exposure_s}"
        )));
    }
    let ncols = image.ncols();

    let left = clipped_level(image.slice(s![.., 1..DARK_STRIP]));
    let right = clipped_level(image.slice(s![.., ncols - DARK_STRIP..]));

    let central = image.slice(s![.., DARK_STRIP..ncols - DARK_STRIP]);
    let bias = bias_model(central.ncols(), left, right);
    let dark: Array2<f64> = &central - &bias.insert_axis(Axis(0));

    let dark_adu = clipped_level(dark.view());
    log::debug!("dark level {dark_adu:.3} ADU, gain {gain}, exposure {exposure_s}s");

    Ok(DarkCurrent {
        left,
        right,
        dark_adu,
        electrons_per_second: dark_adu * gain / exposure_s,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use rand_distr::{Distribution, Normal};

    #[test]
    fn test_parse_overscan_region() {
        let region = parse_overscan_region("[2:20,1:2048]").unwrap();
        assert_eq!(region.x, 2..20);
        assert_eq!(region.y, 1..2048);

        let padded = parse_overscan_region("  '[0:5,3:9]' ").unwrap();
        assert_eq!(padded.x, 0..5);
    }

    #[test]
    fn test_parse_overscan_region_rejects_malformed() {
        for text in ["", "2:20,1:2048", "[a:b,c:d]", "[2:20]", "[20:2,1:5]"] {
            assert!(
                matches!(parse_overscan_region(text), Err(QaError::Parse(_))),
                "{text} should not parse"
            );
        }
    }

    #[test]
    fn test_region_level() {
        let mut image = Array2::from_elem((10, 10), 5.0);
        image.slice_mut(s![0..4, 0..3]).fill(100.0);
        let region = parse_overscan_region("[0:3,0:4]").unwrap();
        assert_eq!(region_level(image.view(), &region).unwrap(), 100.0);

        let outside = parse_overscan_region("[0:30,0:4]").unwrap();
        assert!(matches!(
            region_level(image.view(), &outside),
            Err(QaError::ImageTooSmall { .. })
        ));
    }

    #[test]
    fn test_overscan_levels_skip_first_rows_and_column() {
        let mut image = Array2::from_elem((40, 64), 1000.0);
        image.slice_mut(s![.., 1..20]).fill(300.0);
        image.slice_mut(s![.., 64 - 15..]).fill(320.0);
        // Transients in the skipped rows and column 0 must not leak in.
        image.slice_mut(s![0..4, ..]).fill(5000.0);
        image.column_mut(0).fill(-5000.0);

        let levels = overscan_levels(image.view()).unwrap();
        assert_eq!(levels.left, 300.0);
        assert_eq!(levels.right, 320.0);
    }

    #[test]
    fn test_overscan_levels_clip_hot_pixel() {
        let mut rng = StdRng::seed_from_u64(7);
        let noise = Normal::new(0.0, 2.0).unwrap();
        let mut image = Array2::from_shape_fn((200, 64), |_| 400.0 + noise.sample(&mut rng));
        image[[50, 5]] = 60000.0;

        let levels = overscan_levels(image.view()).unwrap();
        assert_relative_eq!(levels.left, 400.0, epsilon = 0.5);
        assert_relative_eq!(levels.right, 400.0, epsilon = 0.5);
    }

    #[test]
    fn test_overscan_levels_small_image() {
        let image = Array2::from_elem((3, 64), 1.0);
        assert!(matches!(
            overscan_levels(image.view()),
            Err(QaError::ImageTooSmall { need_rows: 5, .. })
        ));
    }

    #[test]
    fn test_bias_model() {
        let bias = bias_model(4, 100.0, 108.0);
        assert_eq!(bias.to_vec(), vec![100.0, 102.0, 104.0, 106.0]);
        assert!(bias_model(0, 1.0, 2.0).is_empty());
    }

    #[test]
    fn test_dark_current_recovers_level() {
        let width = 100;
        let (left, right) = (500.0, 520.0);
        let mut image = Array2::zeros((30, width));
        image.slice_mut(s![.., 0..20]).fill(left);
        image.slice_mut(s![.., width - 20..]).fill(right);

        let bias = bias_model(width - 40, left, right);
        for mut row in image.rows_mut() {
            let mut central = row.slice_mut(s![20..width - 20]);
            central.assign(&bias);
            central += 12.0;
        }

        let dark = dark_current(image.view(), 2.0, 60.0).unwrap();
        assert_eq!(dark.left, left);
        assert_eq!(dark.right, right);
        assert_relative_eq!(dark.dark_adu, 12.0, epsilon = 1e-9);
        assert_relative_eq!(dark.electrons_per_second, 0.4, epsilon = 1e-9);
    }

    #[test]
    fn test_dark_current_rejects_bad_input() {
        let narrow = Array2::from_elem((10, 40), 1.0);
        assert!(matches!(
            dark_current(narrow.view(), 1.0, 1.0),
            Err(QaError::ImageTooSmall { need_cols: 41, .. })
        ));

        let image = Array2::from_elem((10, 64), 1.0);
        assert!(dark_current(image.view(), 1.0, 0.0).is_err());
    }
}
