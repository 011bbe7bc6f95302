//! Percentile-rank standardization.

use crate::core::Series;
use crate::error::{AnalogError, Result};
use crate::standardize::{fit_columns, ConversionMatrix, Standardizer};
use crate::utils::{average_ranks, count_finite};

/// Percentile rank of every value within its column, in `[0, 100]`.
///
/// Ties share their average rank and NaN stays NaN. The transform has no
/// closed-form inverse, so [`Standardizer::fit`] records the physical to
/// percentile tables and `unstandardize` interpolates in them.
#[derive(Debug, Clone, Default)]
pub struct Percentile {
    columns: Option<Vec<String>>,
    conversion: Option<ConversionMatrix>,
}

/// Average-rank percentile of the finite values of `values`.
pub fn percentile_ranks(values: &[f64]) -> Vec<f64> {
    let n = count_finite(values) as f64;
    average_ranks(values)
        .into_iter()
        .map(|r| r / n * 100.0)
        .collect()
}

impl Percentile {
    pub fn new() -> Self {
        Self::default()
    }

    fn target_columns(&self, series: &Series) -> Vec<String> {
        match &self.columns {
            Some(columns) => columns
                .iter()
                .filter(|c| series.has_column(c))
                .cloned()
                .collect(),
            None => series.columns().to_vec(),
        }
    }
}

impl Standardizer for Percentile {
    fn name(&self) -> &str {
        "percentile"
    }

    fn fit(&mut self, physical: &Series, columns: Option<&[String]>) -> Result<()> {
        let columns = fit_columns(physical, columns)?;
        self.columns = Some(columns.clone());
        let standard = self.standardize(physical)?;
        self.conversion = Some(ConversionMatrix::from_series(
            physical,
            &standard,
            Some(columns.as_slice()),
        )?);
        Ok(())
    }

    fn standardize(&self, physical: &Series) -> Result<Series> {
        let mut out = physical.clone();
        for name in self.target_columns(physical) {
            let ranks = percentile_ranks(physical.column(&name)?);
            out.replace_column(&name, ranks)?;
        }
        Ok(out)
    }

    fn unstandardize(&self, standard: &Series) -> Result<Series> {
        self.conversion
            .as_ref()
            .ok_or_else(|| {
                AnalogError::Configuration(
                    "percentile standardizer needs a conversion matrix, fit it first".to_string(),
                )
            })?
            .unstandardize(standard)
    }

    fn set_conversion_matrix(&mut self, physical: &Series, standard: &Series) -> Result<()> {
        self.conversion = Some(ConversionMatrix::from_series(
            physical,
            standard,
            self.columns.as_deref(),
        )?);
        Ok(())
    }

    fn load_conversion_matrix(&mut self, matrix: ConversionMatrix) {
        self.columns = Some(matrix.columns().into_iter().map(String::from).collect());
        self.conversion = Some(matrix);
    }

    fn conversion_matrix(&self) -> Option<&ConversionMatrix> {
        self.conversion.as_ref()
    }
}
