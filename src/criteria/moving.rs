//! Sliding-window driver shared by the criteria.
//!
//! Windows are trailing: the value for row `i` covers rows `i + 1 - window ..= i`.
//! Rows are evaluated at `0, stride, 2 * stride, ...`; rows whose window is not yet
//! fully populated, or holds fewer than `min_valid` finite values, are NaN.

use crate::core::Series;
use crate::criteria::{CriterionSeries, MovingConfig};
use crate::error::{AnalogError, Result};

/// Rows at which the window is evaluated.
pub fn placement_rows(n: usize, stride: usize) -> Vec<usize> {
    (0..n).step_by(stride.max(1)).collect()
}

/// Minimum number of finite values for a window of `window` rows.
pub fn min_valid_count(window: usize, fraction: f64) -> usize {
    (fraction * window as f64).floor() as usize
}

/// Apply `f(start, end)` (end exclusive) at every placement row whose window is full
/// and has at least `min_valid` finite entries in `validity`.
pub fn rolling_apply<F>(
    validity: &[f64],
    window: usize,
    stride: usize,
    min_valid: usize,
    mut f: F,
) -> Vec<f64>
where
    F: FnMut(usize, usize) -> f64,
{
    let n = validity.len();
    let rows = placement_rows(n, stride);
    if window == 0 {
        return vec![f64::NAN; rows.len()];
    }

    // prefix[i] = finite values among the first i rows
    let mut prefix = Vec::with_capacity(n + 1);
    prefix.push(0usize);
    for v in validity {
        let last = prefix[prefix.len() - 1];
        prefix.push(last + usize::from(v.is_finite()));
    }

    rows.into_iter()
        .map(|row| {
            if row + 1 < window {
                return f64::NAN;
            }
            let (start, end) = (row + 1 - window, row + 1);
            if prefix[end] - prefix[start] < min_valid {
                return f64::NAN;
            }
            f(start, end)
        })
        .collect()
}

/// Column names to score: the configured ones, else all columns of the reference.
pub fn target_columns(config: &MovingConfig, reference: &Series) -> Vec<String> {
    config
        .columns
        .clone()
        .unwrap_or_else(|| reference.columns().to_vec())
}

/// Slide `score(candidate_window, reference_column)` independently over each column.
///
/// The window length is the number of reference rows. Output columns are named
/// after the scored columns.
pub fn per_column<F>(
    criterion: &str,
    series: &Series,
    reference: Option<&Series>,
    config: &MovingConfig,
    score: F,
) -> Result<CriterionSeries>
where
    F: Fn(&[f64], &[f64]) -> f64,
{
    config.validate()?;
    let reference = reference.ok_or(AnalogError::MissingReference)?;
    let window = reference.len();
    if window == 0 {
        return Err(AnalogError::EmptyData);
    }
    let stride = config.effective_stride(window);
    let min_valid = min_valid_count(window, config.min_valid_fraction);

    let columns = target_columns(config, reference);
    let mut values = Vec::with_capacity(columns.len());
    for name in &columns {
        let candidate = series.column(name)?;
        let ref_values = reference.column(name)?;
        values.push(rolling_apply(candidate, window, stride, min_valid, |s, e| {
            score(&candidate[s..e], ref_values)
        }));
    }

    let timestamps = placement_rows(series.len(), stride)
        .into_iter()
        .map(|i| series.timestamps()[i])
        .collect();
    CriterionSeries::new(criterion, timestamps, columns, values)
}
