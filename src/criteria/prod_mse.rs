//! Product of per-column mean squared errors.

use crate::core::Series;
use crate::criteria::{moving, Criterion, CriterionSeries, MovingConfig, MSE};
use crate::error::Result;

/// Scores each column with [`MSE`] and multiplies the columns row by row.
///
/// Used when several quantities have to match at the same time. A row is NaN
/// as soon as one column is NaN.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProdMSE;

impl ProdMSE {
    pub fn new() -> Self {
        Self
    }
}

impl Criterion for ProdMSE {
    fn name(&self) -> &str {
        "prod_mse"
    }

    fn compute(&self, candidate: &[f64], reference: Option<&[f64]>) -> Result<f64> {
        MSE::score(candidate, reference)
    }

    fn moving_application(
        &self,
        series: &Series,
        reference: Option<&Series>,
        config: &MovingConfig,
    ) -> Result<CriterionSeries> {
        let per_column = moving::per_column(self.name(), series, reference, config, |c, r| {
            MSE::score(c, Some(r)).unwrap_or(f64::NAN)
        })?;

        let product: Vec<f64> = (0..per_column.len())
            .map(|row| {
                per_column
                    .values_by_column()
                    .iter()
                    .map(|col| col[row])
                    .product()
            })
            .collect();

        let name = config
            .output_name
            .clone()
            .unwrap_or_else(|| "prod_MSE".to_string());
        CriterionSeries::new(
            self.name(),
            per_column.timestamps().to_vec(),
            vec![name],
            vec![product],
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::{Duration, TimeZone, Utc};

    fn two_columns() -> Series {
        let base = Utc.with_ymd_and_hms(2003, 6, 1, 0, 0, 0).unwrap();
        Series::builder()
            .timestamps((0..6).map(|i| base + Duration::hours(i)).collect())
            .column("V", vec![1.0, 2.0, 3.0, 1.0, 2.0, 4.0])
            .column("N", vec![5.0, 5.0, 5.0, 6.0, f64::NAN, 7.0])
            .build()
            .unwrap()
    }

    #[test]
    fn product_of_column_scores() {
        let series = two_columns();
        let reference = series.slice(0, 2).unwrap();
        let scores = ProdMSE::new()
            .moving_application(&series, Some(&reference), &MovingConfig::default())
            .unwrap();

        assert_eq!(scores.columns(), &["prod_MSE"]);
        let col = scores.column("prod_MSE").unwrap();
        assert!(col[0].is_nan());
        assert_relative_eq!(col[1], 0.0, epsilon = 1e-12);
        // rows 2..=3: V squared errors 4, 1 -> 2.5; N squared errors 0, 1 -> 0.5
        assert_relative_eq!(col[3], 1.25, epsilon = 1e-12);
    }

    #[test]
    fn nan_column_makes_row_nan() {
        let series = two_columns();
        let reference = series.slice(0, 2).unwrap();
        let config = MovingConfig::new().with_min_valid_fraction(1.0);
        let scores = ProdMSE::new()
            .moving_application(&series, Some(&reference), &config)
            .unwrap();
        let col = scores.column("prod_MSE").unwrap();
        // N has a NaN at row 4, so windows ending at 4 and 5 are incomplete
        assert!(col[4].is_nan());
        assert!(col[5].is_nan());
    }

    #[test]
    fn output_name_override() {
        let series = two_columns();
        let reference = series.slice(0, 2).unwrap();
        let config = MovingConfig::new().with_output_name("joint");
        let scores = ProdMSE::new()
            .moving_application(&series, Some(&reference), &config)
            .unwrap();
        assert_eq!(scores.columns(), &["joint"]);
    }
}
