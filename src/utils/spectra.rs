//! Power spectral density and log-log spectral slope.
//!
//! The PSD is one-sided: `|rfft(y)|^2 * dt / n * 2`, with the zero-frequency bin
//! not doubled. Frequencies are `k / (n * dt)`.

use crate::utils::stats::{count_finite, interpolate_nan, nanmean};
use rustfft::{num_complex::Complex64, FftPlanner};

/// FFT of a real signal, positive frequencies only (`0..=n/2`).
pub fn fft_real(signal: &[f64]) -> Vec<Complex64> {
    let n = signal.len();
    if n == 0 {
        return Vec::new();
    }

    let mut buffer: Vec<Complex64> = signal.iter().map(|&x| Complex64::new(x, 0.0)).collect();
    let mut planner = FftPlanner::new();
    let fft = planner.plan_fft_forward(n);
    fft.process(&mut buffer);

    buffer.truncate(n / 2 + 1);
    buffer
}

/// Frequencies and one-sided power of `signal` sampled every `dt` seconds.
///
/// The mean is removed and NaN gaps are linearly interpolated before the
/// transform. When fewer than two finite samples remain every bin is NaN.
pub fn psd(signal: &[f64], dt: f64) -> (Vec<f64>, Vec<f64>) {
    let n = signal.len();
    if n == 0 {
        return (Vec::new(), Vec::new());
    }
    let n_bins = n / 2 + 1;
    let freq: Vec<f64> = (0..n_bins).map(|k| k as f64 / (n as f64 * dt)).collect();

    if count_finite(signal) < 2 {
        return (freq, vec![f64::NAN; n_bins]);
    }

    let m = nanmean(signal);
    let centered: Vec<f64> = signal.iter().map(|v| v - m).collect();
    let filled = interpolate_nan(&centered);

    let mut power: Vec<f64> = fft_real(&filled)
        .iter()
        .map(|c| c.norm_sqr() * dt / n as f64 * 2.0)
        .collect();
    power[0] /= 2.0;

    (freq, power)
}

/// Sum of the PSDs of several equally long signals (vector quantities).
pub fn psd_sum<S: AsRef<[f64]>>(signals: &[S], dt: f64) -> (Vec<f64>, Vec<f64>) {
    let mut iter = signals.iter();
    let (freq, mut total) = match iter.next() {
        Some(first) => psd(first.as_ref(), dt),
        None => return (Vec::new(), Vec::new()),
    };
    for signal in iter {
        let (_, power) = psd(signal.as_ref(), dt);
        for (t, p) in total.iter_mut().zip(power) {
            *t += p;
        }
    }
    (freq, total)
}

/// Least-squares line through the finite `(x, y)` pairs, as `(slope, intercept)`.
///
/// NaN when fewer than two finite pairs exist or `x` is constant.
pub fn linear_fit(x: &[f64], y: &[f64]) -> (f64, f64) {
    let pairs: Vec<(f64, f64)> = x
        .iter()
        .zip(y)
        .filter(|(a, b)| a.is_finite() && b.is_finite())
        .map(|(&a, &b)| (a, b))
        .collect();
    if pairs.len() < 2 {
        return (f64::NAN, f64::NAN);
    }

    let n = pairs.len() as f64;
    let mx = pairs.iter().map(|p| p.0).sum::<f64>() / n;
    let my = pairs.iter().map(|p| p.1).sum::<f64>() / n;
    let sxx: f64 = pairs.iter().map(|p| (p.0 - mx).powi(2)).sum();
    let sxy: f64 = pairs.iter().map(|p| (p.0 - mx) * (p.1 - my)).sum();
    if sxx == 0.0 {
        return (f64::NAN, f64::NAN);
    }
    let slope = sxy / sxx;
    (slope, my - slope * mx)
}

/// Log-log slope of a summed PSD, skipping the zero-frequency bin.
///
/// NaN when the spectrum has fewer than 3 bins or more than `max_nan_bins`
/// NaN bins above zero frequency.
pub fn spectral_slope<S: AsRef<[f64]>>(signals: &[S], dt: f64, max_nan_bins: usize) -> f64 {
    let (freq, power) = psd_sum(signals, dt);
    if power.len() < 3 {
        return f64::NAN;
    }
    let nan_bins = power[1..].iter().filter(|p| p.is_nan()).count();
    if nan_bins > max_nan_bins {
        return f64::NAN;
    }
    let log_f: Vec<f64> = freq[1..].iter().map(|f| f.ln()).collect();
    let log_p: Vec<f64> = power[1..].iter().map(|p| p.ln()).collect();
    linear_fit(&log_f, &log_p).0
}
