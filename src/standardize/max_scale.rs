//! Scaling by the largest magnitude.

use crate::core::Series;
use crate::error::Result;
use crate::standardize::affine::{AffineParams, ColumnScale};
use crate::standardize::{fit_columns, ConversionMatrix, Standardizer};
use crate::utils::nanmax_abs;

/// `x / max|x|` per column, so values land in `[-1, 1]`.
#[derive(Debug, Clone, Default)]
pub struct MaxScale {
    params: AffineParams,
    conversion: Option<ConversionMatrix>,
}

impl MaxScale {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_global(mut self, max: f64) -> Self {
        self.params.global = Some(ColumnScale::new(0.0, max));
        self
    }

    pub fn with_column(mut self, name: impl Into<String>, max: f64) -> Self {
        self.params
            .explicit
            .insert(name.into(), ColumnScale::new(0.0, max));
        self
    }

    pub fn column_max(&self, column: &str) -> Option<f64> {
        self.params.get(column).map(|p| p.scale)
    }
}

impl Standardizer for MaxScale {
    fn name(&self) -> &str {
        "max"
    }

    fn fit(&mut self, physical: &Series, columns: Option<&[String]>) -> Result<()> {
        let columns = fit_columns(physical, columns)?;
        self.params.refit(physical, &columns, |values| {
            ColumnScale::new(0.0, nanmax_abs(values))
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
