//! NaN-aware statistical helpers.
//!
//! Missing observations are NaN throughout the crate, so most reductions here
//! skip non-finite values instead of propagating them.

use std::cmp::Ordering;

/// Calculate the mean of a slice.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Calculate the median of a slice.
pub fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    let n = sorted.len();
    if n % 2 == 0 {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    } else {
        sorted[n / 2]
    }
}

/// Finite values of a slice.
pub fn finite(values: &[f64]) -> Vec<f64> {
    values.iter().copied().filter(|v| v.is_finite()).collect()
}

/// Number of finite values.
pub fn count_finite(values: &[f64]) -> usize {
    values.iter().filter(|v| v.is_finite()).count()
}

/// Mean ignoring NaN; NaN when nothing is left.
pub fn nanmean(values: &[f64]) -> f64 {
    let mut sum = 0.0;
    let mut n = 0usize;
    for &v in values {
        if v.is_finite() {
            sum += v;
            n += 1;
        }
    }
    if n == 0 {
        f64::NAN
    } else {
        sum / n as f64
    }
}

/// Median ignoring NaN.
pub fn nanmedian(values: &[f64]) -> f64 {
    median(&finite(values))
}

/// Sample standard deviation (n-1 denominator) ignoring NaN.
pub fn nanstd(values: &[f64]) -> f64 {
    let kept = finite(values);
    if kept.len() < 2 {
        return f64::NAN;
    }
    let m = mean(&kept);
    let ss: f64 = kept.iter().map(|x| (x - m).powi(2)).sum();
    (ss / (kept.len() - 1) as f64).sqrt()
}

/// Largest absolute value ignoring NaN.
pub fn nanmax_abs(values: &[f64]) -> f64 {
    values
        .iter()
        .filter(|v| v.is_finite())
        .map(|v| v.abs())
        .fold(f64::NAN, f64::max)
}

/// Linear-interpolated quantile (`q` in `[0, 1]`) ignoring NaN.
pub fn nanquantile(values: &[f64], q: f64) -> f64 {
    let mut sorted = finite(values);
    if sorted.is_empty() || !(0.0..=1.0).contains(&q) {
        return f64::NAN;
    }
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

/// Average ranks (1-based, ties share the mean rank); NaN inputs keep a NaN rank.
pub fn average_ranks(values: &[f64]) -> Vec<f64> {
    let mut order: Vec<usize> = (0..values.len())
        .filter(|&i| values[i].is_finite())
        .collect();
    order.sort_by(|&a, &b| {
        values[a]
            .partial_cmp(&values[b])
            .unwrap_or(Ordering::Equal)
    });

    let mut ranks = vec![f64::NAN; values.len()];
    let mut i = 0;
    while i < order.len() {
        let mut j = i;
        while j + 1 < order.len() && values[order[j + 1]] == values[order[i]] {
            j += 1;
        }
        // ranks i+1 ..= j+1 averaged
        let rank = (i + j) as f64 / 2.0 + 1.0;
        for &idx in &order[i..=j] {
            ranks[idx] = rank;
        }
        i = j + 1;
    }
    ranks
}

/// Fill NaN gaps by linear interpolation between finite neighbours.
///
/// Leading and trailing gaps take the nearest finite value. A slice with no finite
/// value is returned unchanged.
pub fn interpolate_nan(values: &[f64]) -> Vec<f64> {
    let known: Vec<usize> = (0..values.len())
        .filter(|&i| values[i].is_finite())
        .collect();
    let (first, last) = match (known.first(), known.last()) {
        (Some(&f), Some(&l)) => (f, l),
        _ => return values.to_vec(),
    };

    let mut out = values.to_vec();
    for v in out.iter_mut().take(first) {
        *v = values[first];
    }
    for v in out.iter_mut().skip(last + 1) {
        *v = values[last];
    }
    for pair in known.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        if b - a > 1 {
            let step = (values[b] - values[a]) / (b - a) as f64;
            for (k, v) in out.iter_mut().enumerate().take(b).skip(a + 1) {
                *v = values[a] + step * (k - a) as f64;
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn mean_and_median_basic() {
        assert_relative_eq!(mean(&[1.0, 2.0, 3.0, 4.0]), 2.5, epsilon = 1e-10);
        assert_relative_eq!(median(&[3.0, 1.0, 2.0]), 2.0, epsilon = 1e-10);
        assert_relative_eq!(median(&[4.0, 1.0, 3.0, 2.0]), 2.5, epsilon = 1e-10);
        assert!(mean(&[]).is_nan());
        assert!(median(&[]).is_nan());
    }

    #[test]
    fn nan_reductions_skip_missing() {
        let v = [1.0, f64::NAN, 3.0, 5.0];
        assert_relative_eq!(nanmean(&v), 3.0, epsilon = 1e-10);
        assert_relative_eq!(nanmedian(&v), 3.0, epsilon = 1e-10);
        assert_relative_eq!(nanstd(&v), 2.0, epsilon = 1e-10);
        assert_eq!(count_finite(&v), 3);
        assert!(nanmean(&[f64::NAN]).is_nan());
    }

    #[test]
    fn nanmax_abs_uses_magnitude() {
        assert_relative_eq!(nanmax_abs(&[1.0, -7.0, f64::NAN, 3.0]), 7.0, epsilon = 1e-10);
        assert!(nanmax_abs(&[f64::NAN]).is_nan());
    }

    #[test]
    fn quantile_interpolates() {
        let v = [4.0, 1.0, 3.0, 2.0, f64::NAN];
        assert_relative_eq!(nanquantile(&v, 0.0), 1.0, epsilon = 1e-10);
        assert_relative_eq!(nanquantile(&v, 0.5), 2.5, epsilon = 1e-10);
        assert_relative_eq!(nanquantile(&v, 1.0), 4.0, epsilon = 1e-10);
        assert!(nanquantile(&v, 1.5).is_nan());
    }

    #[test]
    fn ranks_average_ties() {
        let r = average_ranks(&[10.0, 20.0, 10.0, f64::NAN, 30.0]);
        assert_relative_eq!(r[0], 1.5, epsilon = 1e-10);
        assert_relative_eq!(r[2], 1.5, epsilon = 1e-10);
        assert_relative_eq!(r[1], 3.0, epsilon = 1e-10);
        assert!(r[3].is_nan());
        assert_relative_eq!(r[4], 4.0, epsilon = 1e-10);
    }

    #[test]
    fn interpolation_fills_gaps() {
        let filled = interpolate_nan(&[f64::NAN, 1.0, f64::NAN, f64::NAN, 4.0, f64::NAN]);
        assert_eq!(filled, vec![1.0, 1.0, 2.0, 3.0, 4.0, 4.0]);

        let empty = interpolate_nan(&[f64::NAN, f64::NAN]);
        assert!(empty.iter().all(|v| v.is_nan()));
    }
}
