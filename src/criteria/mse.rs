//! Mean squared error.

use crate::core::Series;
use crate::criteria::{moving, Criterion, CriterionSeries, LengthPolicy, MovingConfig};
use crate::error::Result;
use crate::utils::nanmean;

/// Mean of squared differences, ignoring NaN.
///
/// Candidate and reference windows of different lengths score NaN.
#[derive(Debug, Clone, Copy, Default)]
pub struct MSE;

impl MSE {
    pub fn new() -> Self {
        Self
    }

    pub(crate) fn score(candidate: &[f64], reference: Option<&[f64]>) -> Result<f64> {
        Ok(LengthPolicy::Lenient
            .squared_errors(candidate, reference)?
            .map_or(f64::NAN, |sq| nanmean(&sq)))
    }
}

impl Criterion for MSE {
    fn name(&self) -> &str {
        "mse"
    }

    fn compute(&self, candidate: &[f64], reference: Option<&[f64]>) -> Result<f64> {
        Self::score(candidate, reference)
    }

    fn moving_application(
        &self,
        series: &Series,
        reference: Option<&Series>,
        config: &MovingConfig,
    ) -> Result<CriterionSeries> {
        moving::per_column(self.name(), series, reference, config, |c, r| {
            Self::score(c, Some(r)).unwrap_or(f64::NAN)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AnalogError;
    use approx::assert_relative_eq;
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn stamps(n: usize) -> Vec<DateTime<Utc>> {
        let base = Utc.with_ymd_and_hms(2003, 6, 1, 0, 0, 0).unwrap();
        (0..n).map(|i| base + Duration::hours(i as i64)).collect()
    }

    #[test]
    fn mse_compute_basic() {
        let mse = MSE::new();
        let y = [1.0, 2.0, 3.0];
        assert_relative_eq!(mse.compute(&y, Some(&y[..])).unwrap(), 0.0, epsilon = 1e-12);
        assert_relative_eq!(
            mse.compute(&y, Some(&[0.0, 0.0, 0.0][..])).unwrap(),
            14.0 / 3.0,
            epsilon = 1e-12
        );
        assert_relative_eq!(mse.compute(&y, None).unwrap(), 14.0 / 3.0, epsilon = 1e-12);
    }

    #[test]
    fn mse_ignores_nan_and_tolerates_length_mismatch() {
        let mse = MSE::new();
        let v = mse
            .compute(&[1.0, f64::NAN, 3.0], Some(&[0.0, 0.0, 0.0][..]))
            .unwrap();
        assert_relative_eq!(v, 5.0, epsilon = 1e-12);
        assert!(mse.compute(&[1.0, 2.0], Some(&[1.0][..])).unwrap().is_nan());
    }

    #[test]
    fn mse_moving_finds_exact_match() {
        let values: Vec<f64> = (0..20).map(|i| ((i * 7) % 5) as f64).collect();
        let series = Series::univariate(stamps(20), "V", values.clone()).unwrap();
        let reference = series.slice(10, 14).unwrap();

        let scores = MSE::new()
            .moving_application(&series, Some(&reference), &MovingConfig::default())
            .unwrap();
        let col = scores.column("V").unwrap();

        assert_eq!(scores.len(), 20);
        assert_eq!(scores.timestamps()[13], series.timestamp(13).unwrap());
        assert!(col[..3].iter().all(|v| v.is_nan()));
        assert_relative_eq!(col[13], 0.0, epsilon = 1e-12);
        // period 5 repeats the same window
        assert_relative_eq!(col[8], 0.0, epsilon = 1e-12);
    }

    #[test]
    fn mse_moving_requires_reference() {
        let series = Series::univariate(stamps(5), "V", vec![1.0; 5]).unwrap();
        let err = MSE::new()
            .moving_application(&series, None, &MovingConfig::default())
            .unwrap_err();
        assert_eq!(err, AnalogError::MissingReference);
        assert!(err.to_string().contains("length mismatch"));
    }

    #[test]
    fn mse_moving_unknown_column() {
        let series = Series::univariate(stamps(5), "V", vec![1.0; 5]).unwrap();
        let reference = series.slice(0, 2).unwrap();
        let config = MovingConfig::new().with_columns(["B"]);
        let result = MSE::new().moving_application(&series, Some(&reference), &config);
        assert!(matches!(result, Err(AnalogError::UnknownColumn(_))));
    }
}
