//! Rejection of known-bad frames and objects.
//!
//! Until the pipeline flags measurements itself, light curves are cleaned
//! by removing:
//! - frames with a large registration shift (a jump in the field),
//! - frames taken at high airmass,
//! - objects whose aperture sits near the detector edge.
//!
//! Frame and object masks are computed independently: nothing on the frame
//! axis influences which objects are kept, and vice versa.

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use qa_math::stats;

use crate::config::{FilterConfig, ShiftClipConfig};
use crate::error::{check_len, QaError, Result};

/// Good/bad classification along both axes of a flux matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct MeasurementMasks {
    /// Length N, `true` for objects to keep
    pub per_object: Array1<bool>,
    /// Length M, `true` for frames to keep
    pub per_image: Array1<bool>,
}

fn true_indices(mask: &Array1<bool>) -> Vec<usize> {
    mask.iter()
        .enumerate()
        .filter_map(|(i, &keep)| keep.then_some(i))
        .collect()
}

impl MeasurementMasks {
    pub fn n_good_objects(&self) -> usize {
        self.per_object.iter().filter(|&&k| k).count()
    }

    pub fn n_good_frames(&self) -> usize {
        self.per_image.iter().filter(|&&k| k).count()
    }

    /// Keep the good rows and good columns of an N×M flux matrix.
    pub fn apply(&self, flux: ArrayView2<'_, f64>) -> Result<Array2<f64>> {
        check_len("flux rows", self.per_object.len(), flux.nrows())?;
        check_len("flux columns", self.per_image.len(), flux.ncols())?;
        Ok(flux
            .select(Axis(0), &true_indices(&self.per_object))
            .select(Axis(1), &true_indices(&self.per_image)))
    }

    /// Keep the good entries of a per-frame array.
    pub fn select_frames(&self, values: ArrayView1<'_, f64>) -> Result<Array1<f64>> {
        check_len("frame array", self.per_image.len(), values.len())?;
        Ok(values.select(Axis(0), &true_indices(&self.per_image)))
    }

    /// Keep the good entries of a per-object array.
    pub fn select_objects(&self, values: ArrayView1<'_, f64>) -> Result<Array1<f64>> {
        check_len("object array", self.per_object.len(), values.len())?;
        Ok(values.select(Axis(0), &true_indices(&self.per_object)))
    }
}

/// Flag frames whose registration shift is not an outlier.
///
/// Single-pass clip: the seed population is every shift at or below
/// `initial_threshold`; frames are kept when `shift <= median + nsigma * std`
/// of that seed. The cut is applied to the full array, and the clip is not
/// iterated to convergence.
///
/// # Errors
///
/// * `QaError::EmptySeedSet` - no shift is at or below the initial threshold
pub fn low_shift_index(
    shift: ArrayView1<'_, f64>,
    config: &ShiftClipConfig,
) -> Result<Array1<bool>> {
    let seed: Vec<f64> = shift
        .iter()
        .copied()
        .filter(|&s| s <= config.initial_threshold)
        .collect();

    let (Some(med), Some(std)) = (stats::median(&seed), stats::std_dev(&seed)) else {
        return Err(QaError::EmptySeedSet {
            threshold: config.initial_threshold,
        });
    };

    let limit = med + config.nsigma * std;
    log::debug!(
        "Shift clip: seed of {} frames, median {med:.3}, std {std:.3}, limit {limit:.3}",
        seed.len()
    );
    Ok(shift.mapv(|s| s <= limit))
}

/// Flag objects whose position lies strictly inside the detector margin.
pub fn on_chip_index(
    ccdx: ArrayView1<'_, f64>,
    ccdy: ArrayView1<'_, f64>,
    config: &FilterConfig,
) -> Result<Array1<bool>> {
    check_len("ccdy", ccdx.len(), ccdy.len())?;

    let low = config.ccd_margin;
    let high = config.detector_size - config.ccd_margin;
    let inside = |v: f64| v > low && v < high;

    Ok(ccdx
        .iter()
        .zip(ccdy.iter())
        .map(|(&x, &y)| inside(x) && inside(y))
        .collect())
}

/// Classify frames and objects as usable.
///
/// - frame mask: [`low_shift_index`] AND `airmass <= max_airmass`
/// - object mask: [`on_chip_index`]
///
/// `clouds` is checked for length but does not yet take part in the
/// decision.
///
/// # Errors
///
/// * `QaError::ShapeMismatch` - `shift`/`clouds`/`airmass` or `ccdx`/`ccdy`
///   disagree in length
/// * `QaError::EmptySeedSet` - see [`low_shift_index`]
pub fn good_measurement_indices(
    shift: ArrayView1<'_, f64>,
    clouds: ArrayView1<'_, f64>,
    airmass: ArrayView1<'_, f64>,
    ccdx: ArrayView1<'_, f64>,
    ccdy: ArrayView1<'_, f64>,
    config: &FilterConfig,
) -> Result<MeasurementMasks> {
    check_len("clouds", shift.len(), clouds.len())?;
    check_len("airmass", shift.len(), airmass.len())?;

    let good_shift = low_shift_index(shift, &config.shift)?;
    let per_image: Array1<bool> = good_shift
        .iter()
        .zip(airmass.iter())
        .map(|(&ok, &a)| ok && a <= config.max_airmass)
        .collect();
    let per_object = on_chip_index(ccdx, ccdy, config)?;

    let masks = MeasurementMasks {
        per_object,
        per_image,
    };
    log::info!(
        "Keeping {}/{} objects and {}/{} frames",
        masks.n_good_objects(),
        masks.per_object.len(),
        masks.n_good_frames(),
        masks.per_image.len()
    );
    Ok(masks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    struct Conditions {
        shift: Array1<f64>,
        clouds: Array1<f64>,
        airmass: Array1<f64>,
        ccdx: Array1<f64>,
        ccdy: Array1<f64>,
    }

    impl Conditions {
        fn all_good(n: usize) -> Self {
            Self {
                shift: Array1::zeros(n),
                clouds: Array1::zeros(n),
                airmass: Array1::ones(n),
                ccdx: Array1::from_elem(n, 1024.0),
                ccdy: Array1::from_elem(n, 1024.0),
            }
        }

        fn masks(&self) -> Result<MeasurementMasks> {
            good_measurement_indices(
                self.shift.view(),
                self.clouds.view(),
                self.airmass.view(),
                self.ccdx.view(),
                self.ccdy.view(),
                &FilterConfig::default(),
            )
        }
    }

    #[test]
    fn test_low_shift_index() {
        let shift = array![1.0, 5.0, 7.0];
        let mask = low_shift_index(shift.view(), &ShiftClipConfig::default()).unwrap();
        assert_eq!(mask, array![true, false, false]);
    }

    #[test]
    fn test_low_shift_index_raised_threshold() {
        let shift = array![1.0, 5.0, 7.0];
        let config = ShiftClipConfig {
            initial_threshold: 10.0,
            ..Default::default()
        };
        assert_eq!(
            low_shift_index(shift.view(), &config).unwrap(),
            array![true, true, true]
        );
    }

    #[test]
    fn test_empty_seed_set() {
        let shift = array![4.0, 5.0, 7.0];
        match low_shift_index(shift.view(), &ShiftClipConfig::default()) {
            Err(QaError::EmptySeedSet { threshold }) => assert_eq!(threshold, 3.0),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_low_shift_index_is_stable_on_its_own_output() {
        let shift = array![0.5, 0.6, 0.4, 8.0, 0.55, 12.0, 0.45, 2.5];
        let config = ShiftClipConfig::default();
        let first = low_shift_index(shift.view(), &config).unwrap();
        assert_eq!(
            first,
            array![true, true, true, false, true, false, true, true]
        );

        let kept: Array1<f64> = shift
            .iter()
            .zip(first.iter())
            .filter_map(|(&s, &k)| k.then_some(s))
            .collect();
        let second = low_shift_index(kept.view(), &config).unwrap();
        assert!(second.iter().all(|&k| k));

        // A tighter clip on the same subset is allowed to reject more.
        let tight = ShiftClipConfig {
            nsigma: 0.5,
            ..config
        };
        let third = low_shift_index(kept.view(), &tight).unwrap();
        assert_eq!(third, array![true, true, true, true, true, false]);
    }

    #[test]
    fn test_all_good() {
        let masks = Conditions::all_good(10).masks().unwrap();
        assert!(masks.per_object.iter().all(|&k| k));
        assert!(masks.per_image.iter().all(|&k| k));
    }

    #[test]
    fn test_bad_image_from_shift() {
        let mut conditions = Conditions::all_good(10);
        conditions.shift[5] = 100.0;
        let masks = conditions.masks().unwrap();

        let mut expected = Array1::from_elem(10, true);
        expected[5] = false;
        assert_eq!(masks.per_image, expected);
        assert!(masks.per_object.iter().all(|&k| k));
    }

    #[test]
    fn test_bad_image_from_airmass() {
        let mut conditions = Conditions::all_good(10);
        conditions.airmass[2] = 2.5;
        conditions.airmass[3] = 2.0;
        let masks = conditions.masks().unwrap();
        assert!(!masks.per_image[2]);
        assert!(masks.per_image[3]);
        assert_eq!(masks.n_good_frames(), 9);
    }

    #[test]
    fn test_bad_object_off_chip() {
        let mut conditions = Conditions::all_good(10);
        conditions.ccdx[5] = -50.0;
        let masks = conditions.masks().unwrap();

        let mut expected = Array1::from_elem(10, true);
        expected[5] = false;
        assert_eq!(masks.per_object, expected);
        assert!(masks.per_image.iter().all(|&k| k));
    }

    #[test]
    fn test_margin_bounds_are_exclusive() {
        let ccdx = array![4.0, 5.0, 2043.0, 2044.0, 1024.0];
        let ccdy = array![1024.0, 1024.0, 1024.0, 1024.0, 4.0];
        let mask = on_chip_index(ccdx.view(), ccdy.view(), &FilterConfig::default()).unwrap();
        assert_eq!(mask, array![false, true, true, false, false]);
    }

    #[test]
    fn test_object_mask_ignores_frame_axis() {
        let mut conditions = Conditions::all_good(6);
        conditions.ccdx[1] = 2.0;
        conditions.ccdy[4] = 2047.0;
        let before = conditions.masks().unwrap().per_object;

        conditions.airmass = array![2.9, 1.0, 1.7, 3.1, 1.2, 1.0];
        conditions.shift = array![0.1, 0.2, 50.0, 0.0, 0.3, 0.2];
        conditions.clouds = array![5.0, 0.0, 1.0, 0.0, 9.0, 2.0];
        let after = conditions.masks().unwrap();

        assert_eq!(before, after.per_object);
        assert_eq!(after.per_object, array![true, false, true, true, false, true]);
    }

    #[test]
    fn test_shape_mismatch() {
        let mut conditions = Conditions::all_good(4);
        conditions.airmass = Array1::ones(3);
        assert!(matches!(
            conditions.masks(),
            Err(QaError::ShapeMismatch { what: "airmass", .. })
        ));

        let mut conditions = Conditions::all_good(4);
        conditions.ccdy = Array1::ones(5);
        assert!(matches!(
            conditions.masks(),
            Err(QaError::ShapeMismatch { what: "ccdy", .. })
        ));
    }

    #[test]
    fn test_apply_selects_rows_and_columns() {
        let masks = MeasurementMasks {
            per_object: array![true, false, true],
            per_image: array![false, true, true, true],
        };
        let flux = Array2::from_shape_fn((3, 4), |(i, j)| (10 * i + j) as f64);
        let kept = masks.apply(flux.view()).unwrap();
        assert_eq!(kept, array![[1.0, 2.0, 3.0], [21.0, 22.0, 23.0]]);

        let airmass = array![1.0, 1.1, 1.2, 1.3];
        assert_eq!(
            masks.select_frames(airmass.view()).unwrap(),
            array![1.1, 1.2, 1.3]
        );
        assert!(masks.apply(flux.t()).is_err());
    }
}
