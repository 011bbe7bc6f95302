//! Z-score standardization.

use crate::core::Series;
use crate::error::Result;
use crate::standardize::affine::{AffineParams, ColumnScale};
use crate::standardize::{fit_columns, ConversionMatrix, Standardizer};
use crate::utils::{nanmean, nanstd};

/// `(x - mean) / std` per column.
///
/// Means and standard deviations are either supplied (globally or per column)
/// or estimated by [`Standardizer::fit`], skipping NaN. A standard deviation
/// below 1e-10 is replaced by 1.
#[derive(Debug, Clone, Default)]
pub struct MeanStd {
    params: AffineParams,
    conversion: Option<ConversionMatrix>,
}

impl MeanStd {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use the same mean and standard deviation for every column.
    pub fn with_global(mut self, mean: f64, std: f64) -> Self {
        self.params.global = Some(ColumnScale::new(mean, std));
        self
    }

    pub fn with_column(mut self, name: impl Into<String>, mean: f64, std: f64) -> Self {
        self.params
            .explicit
            .insert(name.into(), ColumnScale::new(mean, std));
        self
    }

    /// Parameters in effect for `column`.
    pub fn column_scale(&self, column: &str) -> Option<ColumnScale> {
        self.params.get(column)
    }
}

impl Standardizer for MeanStd {
    fn name(&self) -> &str {
        "mean_std"
    }

    fn fit(&mut self, physical: &Series, columns: Option<&[String]>) -> Result<()> {
        let columns = fit_columns(physical, columns)?;
        self.params.refit(physical, &columns, |values| {
            ColumnScale::new(nanmean(values), nanstd(values))
        })
    }

    fn standardize(&self, physical: &Series) -> Result<Series> {
        self.params
            .apply(self.name(), physical, ColumnScale::transform)
    }

    fn unstandardize(&self, standard: &Series) -> Result<Series> {
        self.params
            .apply(self.name(), standard, ColumnScale::inverse)
    }

    fn set_conversion_matrix(&mut self, physical: &Series, standard: &Series) -> Result<()> {
        self.conversion = Some(ConversionMatrix::from_series(physical, standard, None)?);
        Ok(())
    }

    fn load_conversion_matrix(&mut self, matrix: ConversionMatrix) {
        self.conversion = Some(matrix);
    }

    fn conversion_matrix(&self) -> Option<&ConversionMatrix> {
        self.conversion.as_ref()
    }
}
