//! Median squared error.

use crate::core::Series;
use crate::criteria::{moving, Criterion, CriterionSeries, LengthPolicy, MovingConfig};
use crate::error::Result;
use crate::utils::nanmedian;

/// Median of squared differences, ignoring NaN.
///
/// Unlike [`MSE`](crate::criteria::MSE), windows of different lengths are an error.
#[derive(Debug, Clone, Copy, Default)]
pub struct MdSE;

impl MdSE {
    pub fn new() -> Self {
        Self
    }
}

impl Criterion for MdSE {
    fn name(&self) -> &str {
        "mdse"
    }

    fn compute(&self, candidate: &[f64], reference: Option<&[f64]>) -> Result<f64> {
        Ok(LengthPolicy::Strict
            .squared_errors(candidate, reference)?
            .map_or(f64::NAN, |sq| nanmedian(&sq)))
    }

    fn moving_application(
        &self,
        series: &Series,
        reference: Option<&Series>,
        config: &MovingConfig,
    ) -> Result<CriterionSeries> {
        // windows are always as long as the reference here
        moving::per_column(self.name(), series, reference, config, |c, r| {
            self.compute(c, Some(r)).unwrap_or(f64::NAN)
        })
    }
}
