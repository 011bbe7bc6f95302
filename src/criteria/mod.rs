//! Similarity criteria between candidate windows and a reference pattern.
//!
//! Every criterion scores a single candidate against a reference with
//! [`Criterion::compute`] and slides over a whole series with
//! [`Criterion::moving_application`], producing a [`CriterionSeries`] whose rows
//! are anchored at the right edge of each window. Lower ranking scores are better.

pub mod mdse;
pub mod moving;
pub mod mse;
pub mod prod_mse;
pub mod registry;
pub mod spectral_slope;

pub use mdse::MdSE;
pub use mse::MSE;
pub use prod_mse::ProdMSE;
pub use registry::{CriterionRegistry, CriterionSpec};
pub use spectral_slope::SpectralSlope;

use crate::core::serde_ext::nan_matrix;
use crate::core::Series;
use crate::error::{AnalogError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Common interface of all criteria. Object safe.
pub trait Criterion: Send + Sync {
    /// Registry name of the criterion.
    fn name(&self) -> &str;

    /// Score one candidate window against a reference (zeros when `None`).
    fn compute(&self, candidate: &[f64], reference: Option<&[f64]>) -> Result<f64>;

    /// Score every window of `series` against `reference`.
    fn moving_application(
        &self,
        series: &Series,
        reference: Option<&Series>,
        config: &MovingConfig,
    ) -> Result<CriterionSeries>;

    /// Value minimised when ranking analogs.
    fn ranking_score(&self, score: f64) -> f64 {
        score
    }
}

/// Type alias for boxed criterion trait objects.
pub type BoxedCriterion = Box<dyn Criterion>;

/// How a criterion treats candidate and reference windows of different lengths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LengthPolicy {
    /// The score is NaN.
    Lenient,
    /// The score is an [`AnalogError::LengthMismatch`].
    Strict,
}

impl LengthPolicy {
    /// Squared differences, or `None` when a lenient mismatch should yield NaN.
    pub fn squared_errors(
        self,
        candidate: &[f64],
        reference: Option<&[f64]>,
    ) -> Result<Option<Vec<f64>>> {
        let reference = match reference {
            Some(r) => r,
            None => return Ok(Some(candidate.iter().map(|c| c * c).collect())),
        };
        if reference.len() != candidate.len() {
            return match self {
                LengthPolicy::Lenient => Ok(None),
                LengthPolicy::Strict => Err(AnalogError::LengthMismatch {
                    candidate: candidate.len(),
                    reference: reference.len(),
                }),
            };
        }
        Ok(Some(
            candidate
                .iter()
                .zip(reference)
                .map(|(c, r)| (c - r) * (c - r))
                .collect(),
        ))
    }
}

/// Options of a sliding criterion evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MovingConfig {
    /// Columns to score; all reference columns when `None`.
    pub columns: Option<Vec<String>>,
    /// Windows with fewer than `floor(fraction * window)` finite values are NaN.
    pub min_valid_fraction: f64,
    /// Distance in rows between evaluated windows.
    pub stride: usize,
    /// When set, the stride is `window / steps_per_window`.
    pub steps_per_window: Option<usize>,
    /// Window length for criteria that accept no reference.
    pub length: Option<usize>,
    /// Sampling interval in seconds for spectral criteria; series resolution when `None`.
    pub sample_spacing: Option<f64>,
    /// Output column name for criteria producing a single column.
    pub output_name: Option<String>,
    /// Spectra with more NaN bins than this are discarded.
    pub max_nan_bins: usize,
}

impl Default for MovingConfig {
    fn default() -> Self {
        Self {
            columns: None,
            min_valid_fraction: 0.8,
            stride: 1,
            steps_per_window: None,
            length: None,
            sample_spacing: None,
            output_name: None,
            max_nan_bins: 2,
        }
    }
}

impl MovingConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_columns<S: Into<String>>(mut self, columns: impl IntoIterator<Item = S>) -> Self {
        self.columns = Some(columns.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_min_valid_fraction(mut self, fraction: f64) -> Self {
        self.min_valid_fraction = fraction;
        self
    }

    pub fn with_stride(mut self, stride: usize) -> Self {
        self.stride = stride;
        self
    }

    pub fn with_steps_per_window(mut self, steps: usize) -> Self {
        self.steps_per_window = Some(steps);
        self
    }

    pub fn with_length(mut self, length: usize) -> Self {
        self.length = Some(length);
        self
    }

    pub fn with_sample_spacing(mut self, seconds: f64) -> Self {
        self.sample_spacing = Some(seconds);
        self
    }

    pub fn with_output_name(mut self, name: impl Into<String>) -> Self {
        self.output_name = Some(name.into());
        self
    }

    pub fn with_max_nan_bins(mut self, bins: usize) -> Self {
        self.max_nan_bins = bins;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.min_valid_fraction) {
            return Err(AnalogError::InvalidParameter(format!(
                "min_valid_fraction must be in [0, 1], got {}",
                self.min_valid_fraction
            )));
        }
        if self.stride == 0 || self.steps_per_window == Some(0) {
            return Err(AnalogError::InvalidParameter(
                "stride and steps_per_window must be at least 1".to_string(),
            ));
        }
        if let Some(dt) = self.sample_spacing {
            if !(dt.is_finite() && dt > 0.0) {
                return Err(AnalogError::InvalidParameter(format!(
                    "sample_spacing must be positive, got {}",
                    dt
                )));
            }
        }
        Ok(())
    }

    /// Stride for a window of `window` rows.
    pub fn effective_stride(&self, window: usize) -> usize {
        match self.steps_per_window {
            Some(steps) => (window / steps.max(1)).max(1),
            None => self.stride.max(1),
        }
    }
}

/// Scores of a criterion, one row per evaluated window, keyed by the window's last timestamp.
///
/// Values are column-major. Series built from several training segments are
/// concatenated, so timestamps are not required to be monotonic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawCriterionSeries")]
pub struct CriterionSeries {
    criterion: String,
    timestamps: Vec<DateTime<Utc>>,
    columns: Vec<String>,
    #[serde(with = "nan_matrix")]
    values: Vec<Vec<f64>>,
}

#[derive(Deserialize)]
struct RawCriterionSeries {
    criterion: String,
    timestamps: Vec<DateTime<Utc>>,
    columns: Vec<String>,
    #[serde(with = "nan_matrix")]
    values: Vec<Vec<f64>>,
}

impl TryFrom<RawCriterionSeries> for CriterionSeries {
    type Error = AnalogError;

    fn try_from(raw: RawCriterionSeries) -> Result<Self> {
        CriterionSeries::new(raw.criterion, raw.timestamps, raw.columns, raw.values)
    }
}

impl CriterionSeries {
    pub fn new(
        criterion: impl Into<String>,
        timestamps: Vec<DateTime<Utc>>,
        columns: Vec<String>,
        values: Vec<Vec<f64>>,
    ) -> Result<Self> {
        if columns.len() != values.len() {
            return Err(AnalogError::DimensionMismatch {
                expected: values.len(),
                got: columns.len(),
            });
        }
        for column in &values {
            if column.len() != timestamps.len() {
                return Err(AnalogError::DimensionMismatch {
                    expected: timestamps.len(),
                    got: column.len(),
                });
            }
        }
        Ok(Self {
            criterion: criterion.into(),
            timestamps,
            columns,
            values,
        })
    }

    /// Stack several score series with identical columns, in order.
    pub fn concat(parts: &[CriterionSeries]) -> Result<Self> {
        let first = parts.first().ok_or(AnalogError::EmptyData)?;
        let mut timestamps = Vec::new();
        let mut values = vec![Vec::new(); first.columns.len()];
        for part in parts {
            if part.columns != first.columns {
                return Err(AnalogError::InvalidParameter(format!(
                    "cannot concatenate score columns {:?} with {:?}",
                    part.columns, first.columns
                )));
            }
            timestamps.extend_from_slice(&part.timestamps);
            for (acc, col) in values.iter_mut().zip(&part.values) {
                acc.extend_from_slice(col);
            }
        }
        Self::new(first.criterion.clone(), timestamps, first.columns.clone(), values)
    }

    /// Name of the criterion that produced the scores.
    pub fn criterion(&self) -> &str {
        &self.criterion
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn timestamps(&self) -> &[DateTime<Utc>] {
        &self.timestamps
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn values_by_column(&self) -> &[Vec<f64>] {
        &self.values
    }

    pub fn column(&self, name: &str) -> Result<&[f64]> {
        self.columns
            .iter()
            .position(|c| c == name)
            .map(|i| self.values[i].as_slice())
            .ok_or_else(|| AnalogError::UnknownColumn(name.to_string()))
    }

    /// Number of finite scores in a column.
    pub fn finite_count(&self, name: &str) -> Result<usize> {
        Ok(crate::utils::count_finite(self.column(name)?))
    }
}
