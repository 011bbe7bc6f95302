//! Per-column `(x - center) / scale` transforms shared by the affine standardizers.

use crate::core::Series;
use crate::error::{AnalogError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Center and scale of one column.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColumnScale {
    pub center: f64,
    pub scale: f64,
}

impl ColumnScale {
    /// Degenerate scales (zero, tiny or non-finite) are replaced by 1.
    pub fn new(center: f64, scale: f64) -> Self {
        let scale = if !scale.is_finite() || scale.abs() < 1e-10 {
            1.0
        } else {
            scale
        };
        let center = if center.is_finite() { center } else { 0.0 };
        Self { center, scale }
    }

    pub fn transform(&self, x: f64) -> f64 {
        (x - self.center) / self.scale
    }

    pub fn inverse(&self, x: f64) -> f64 {
        x * self.scale + self.center
    }
}

/// Explicit parameters take precedence over fitted ones; a column with
/// neither passes through unchanged.
#[derive(Debug, Clone, Default)]
pub(crate) struct AffineParams {
    pub global: Option<ColumnScale>,
    pub explicit: BTreeMap<String, ColumnScale>,
    pub fitted: BTreeMap<String, ColumnScale>,
}

impl AffineParams {
    pub fn explicit_for(&self, column: &str) -> Option<ColumnScale> {
        self.explicit.get(column).copied().or(self.global)
    }

    pub fn get(&self, column: &str) -> Option<ColumnScale> {
        self.explicit_for(column)
            .or_else(|| self.fitted.get(column).copied())
    }

    pub fn is_ready(&self) -> bool {
        self.global.is_some() || !self.explicit.is_empty() || !self.fitted.is_empty()
    }

    /// Replace the fitted parameters of `columns` without explicit ones.
    pub fn refit(
        &mut self,
        series: &Series,
        columns: &[String],
        estimate: impl Fn(&[f64]) -> ColumnScale,
    ) -> Result<()> {
        self.fitted.clear();
        for name in columns {
            if self.explicit_for(name).is_none() {
                let scale = estimate(series.column(name)?);
                self.fitted.insert(name.clone(), scale);
            }
        }
        Ok(())
    }

    pub fn apply(
        &self,
        kind: &str,
        series: &Series,
        f: impl Fn(&ColumnScale, f64) -> f64,
    ) -> Result<Series> {
        if !self.is_ready() {
            return Err(AnalogError::Configuration(format!(
                "{} standardizer has no parameters, fit it first",
                kind
            )));
        }
        let mut out = series.clone();
        for (index, name) in series.columns().iter().enumerate() {
            if let Some(params) = self.get(name) {
                let values = series.column_at(index)?.iter().map(|&x| f(&params, x)).collect();
                out.replace_column(name, values)?;
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn degenerate_scale_becomes_one() {
        assert_eq!(ColumnScale::new(3.0, 0.0).scale, 1.0);
        assert_eq!(ColumnScale::new(3.0, f64::NAN).scale, 1.0);
        assert_eq!(ColumnScale::new(f64::NAN, 2.0).center, 0.0);
    }

    #[test]
    fn explicit_wins_over_fitted() {
        let mut params = AffineParams::default();
        params.fitted.insert("V".into(), ColumnScale::new(1.0, 1.0));
        params.explicit.insert("V".into(), ColumnScale::new(2.0, 1.0));
        assert_eq!(params.get("V").map(|p| p.center), Some(2.0));
        assert!(params.get("B").is_none());
    }
}
