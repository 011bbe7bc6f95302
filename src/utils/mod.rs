//! Numeric helpers shared by the criteria and standardizers.

pub mod spectra;
pub mod stats;

pub use spectra::{fft_real, linear_fit, psd, psd_sum, spectral_slope};
pub use stats::{
    average_ranks, count_finite, interpolate_nan, mean, median, nanmax_abs, nanmean, nanmedian,
    nanquantile, nanstd,
};
