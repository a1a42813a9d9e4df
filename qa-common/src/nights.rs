//! Splitting time series into observing nights.

use ndarray::{Array1, ArrayView1};

/// Gap (days) used to mark night boundaries on time-series plots.
pub const PLOT_NIGHT_GAP_DAYS: f64 = 0.3;

/// Gap (days) separating nights when selecting data by night.
pub const NIGHT_SPLIT_GAP_DAYS: f64 = 0.5;

/// Frame indices `i` after which the time series jumps by more than `gap`,
/// i.e. `mjd[i + 1] - mjd[i] > gap`.
pub fn find_night_breaks(mjd: ArrayView1<'_, f64>, gap: f64) -> Vec<usize> {
    (1..mjd.len())
        .filter(|&i| mjd[i] - mjd[i - 1] > gap)
        .map(|i| i - 1)
        .collect()
}

/// Half-open time interval `[start, end)` covering one night.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NightRange {
    pub start: f64,
    pub end: f64,
}

impl NightRange {
    pub fn contains(&self, t: f64) -> bool {
        t >= self.start && t < self.end
    }
}

/// One range per night: a night starts at the first frame and at every
/// frame following a jump larger than `gap`. The last night is open-ended.
pub fn night_ranges(time: ArrayView1<'_, f64>, gap: f64) -> Vec<NightRange> {
    let Some(&first) = time.first() else {
        return Vec::new();
    };

    let mut starts = vec![first];
    starts.extend(
        (1..time.len())
            .filter(|&i| time[i] - time[i - 1] > gap)
            .map(|i| time[i]),
    );

    let mut ranges: Vec<NightRange> = starts
        .windows(2)
        .map(|w| NightRange {
            start: w[0],
            end: w[1],
        })
        .collect();
    ranges.push(NightRange {
        start: starts[starts.len() - 1],
        end: f64::INFINITY,
    });
    ranges
}

/// Flag the frames falling inside any of the given nights.
pub fn select_nights(time: ArrayView1<'_, f64>, ranges: &[NightRange]) -> Array1<bool> {
    time.mapv(|t| ranges.iter().any(|r| r.contains(t)))
}
