//! Spectral slope deviation.

use crate::core::Series;
use crate::criteria::moving::{min_valid_count, placement_rows, rolling_apply};
use crate::criteria::{Criterion, CriterionSeries, MovingConfig};
use crate::error::{AnalogError, Result};
use crate::utils::spectral_slope;

/// Log-log slope of the window's power spectrum minus the slope of the reference.
///
/// Multi-column windows (vector quantities) use the sum of the per-column spectra.
/// Analogs are ranked by the absolute deviation.
#[derive(Debug, Clone, Copy)]
pub struct SpectralSlope {
    /// Sampling interval used by [`Criterion::compute`].
    pub sample_spacing: f64,
    pub max_nan_bins: usize,
}

impl Default for SpectralSlope {
    fn default() -> Self {
        Self {
            sample_spacing: 1.0,
            max_nan_bins: 2,
        }
    }
}

impl SpectralSlope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sample_spacing(mut self, seconds: f64) -> Self {
        self.sample_spacing = seconds;
        self
    }

    pub fn with_max_nan_bins(mut self, bins: usize) -> Self {
        self.max_nan_bins = bins;
        self
    }
}

impl Criterion for SpectralSlope {
    fn name(&self) -> &str {
        "spectral_slope"
    }

    fn compute(&self, candidate: &[f64], reference: Option<&[f64]>) -> Result<f64> {
        let slope = spectral_slope(&[candidate], self.sample_spacing, self.max_nan_bins);
        let reference_slope = match reference {
            Some(r) => spectral_slope(&[r], self.sample_spacing, self.max_nan_bins),
            None => 0.0,
        };
        Ok(slope - reference_slope)
    }

    fn moving_application(
        &self,
        series: &Series,
        reference: Option<&Series>,
        config: &MovingConfig,
    ) -> Result<CriterionSeries> {
        config.validate()?;
        let columns: Vec<String> = match (&config.columns, reference) {
            (Some(c), _) => c.clone(),
            (None, Some(r)) => r.columns().to_vec(),
            (None, None) => series.columns().to_vec(),
        };
        let first = columns.first().ok_or(AnalogError::EmptyData)?;

        let window = match (reference, config.length) {
            (Some(r), _) => r.len(),
            (None, Some(length)) => length,
            (None, None) => {
                return Err(AnalogError::Configuration(
                    "spectral slope needs a reference window or a window length".to_string(),
                ))
            }
        };
        if window == 0 {
            return Err(AnalogError::EmptyData);
        }

        let dt = match config.sample_spacing {
            Some(dt) => dt,
            None => series.resolution_seconds()?,
        };

        let reference_slope = match reference {
            Some(r) => {
                let signals = columns
                    .iter()
                    .map(|c| r.column(c))
                    .collect::<Result<Vec<_>>>()?;
                spectral_slope(&signals, dt, config.max_nan_bins)
            }
            None => 0.0,
        };

        let candidates = columns
            .iter()
            .map(|c| series.column(c))
            .collect::<Result<Vec<_>>>()?;
        let stride = config.effective_stride(window);
        let min_valid = min_valid_count(window, config.min_valid_fraction);

        let slopes = rolling_apply(series.column(first)?, window, stride, min_valid, |s, e| {
            let windows: Vec<&[f64]> = candidates.iter().map(|c| &c[s..e]).collect();
            spectral_slope(&windows, dt, config.max_nan_bins) - reference_slope
        });

        let timestamps = placement_rows(series.len(), stride)
            .into_iter()
            .map(|i| series.timestamps()[i])
            .collect();
        let name = config
            .output_name
            .clone()
            .unwrap_or_else(|| "slope".to_string());
        CriterionSeries::new(self.name(), timestamps, vec![name], vec![slopes])
    }

    fn ranking_score(&self, score: f64) -> f64 {
        score.abs()
    }
}
