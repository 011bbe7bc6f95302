//! Lookup-table conversion between physical and standard values.

use crate::core::Series;
use crate::error::{AnalogError, Result};
use crate::standardize::Standardizer;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// One column's association between physical and standard values.
///
/// Built from aligned samples, keeping the first physical value seen for each
/// standard value. Lookups are exact on known keys, linear between neighbouring
/// keys, and clamped to the table ends outside its range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawTable", into = "RawTable")]
pub struct ConversionTable {
    // (physical, standard), sorted on physical
    by_physical: Vec<(f64, f64)>,
    // (standard, physical), sorted on standard
    by_standard: Vec<(f64, f64)>,
}

#[derive(Serialize, Deserialize)]
struct RawTable {
    physical: Vec<f64>,
    standard: Vec<f64>,
}

impl From<RawTable> for ConversionTable {
    fn from(raw: RawTable) -> Self {
        ConversionTable::from_pairs(&raw.physical, &raw.standard)
    }
}

impl From<ConversionTable> for RawTable {
    fn from(table: ConversionTable) -> Self {
        let (standard, physical) = table.by_standard.into_iter().unzip();
        RawTable { physical, standard }
    }
}

fn sorted_unique(mut pairs: Vec<(f64, f64)>) -> Vec<(f64, f64)> {
    // stable sort keeps the first occurrence of equal keys in front
    pairs.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal));
    pairs.dedup_by(|b, a| a.0 == b.0);
    pairs
}

fn lookup(table: &[(f64, f64)], key: f64) -> f64 {
    if !key.is_finite() || table.is_empty() {
        return f64::NAN;
    }
    let i = table.partition_point(|(k, _)| *k < key);
    if i < table.len() && table[i].0 == key {
        return table[i].1;
    }
    if i == 0 {
        return table[0].1;
    }
    if i == table.len() {
        return table[table.len() - 1].1;
    }
    let (k0, v0) = table[i - 1];
    let (k1, v1) = table[i];
    v0 + (v1 - v0) * (key - k0) / (k1 - k0)
}

impl ConversionTable {
    /// Build from aligned samples; pairs with a NaN on either side are skipped.
    pub fn from_pairs(physical: &[f64], standard: &[f64]) -> Self {
        let mut seen: Vec<(f64, f64)> = Vec::new();
        for (&p, &s) in physical.iter().zip(standard) {
            if p.is_finite() && s.is_finite() {
                seen.push((p, s));
            }
        }
        let by_standard = sorted_unique(seen.iter().map(|&(p, s)| (s, p)).collect());
        let by_physical = sorted_unique(by_standard.iter().map(|&(s, p)| (p, s)).collect());
        Self {
            by_physical,
            by_standard,
        }
    }

    pub fn len(&self) -> usize {
        self.by_standard.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_standard.is_empty()
    }

    pub fn to_standard(&self, physical: f64) -> f64 {
        lookup(&self.by_physical, physical)
    }

    pub fn to_physical(&self, standard: f64) -> f64 {
        lookup(&self.by_standard, standard)
    }
}

/// Per-column conversion tables.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversionMatrix {
    tables: BTreeMap<String, ConversionTable>,
}

impl ConversionMatrix {
    pub fn new() -> Self {
        Self::default()
    }

    /// Associate aligned physical and standard series, column by column.
    ///
    /// Uses the standard series' columns when `columns` is `None`.
    pub fn from_series(
        physical: &Series,
        standard: &Series,
        columns: Option<&[String]>,
    ) -> Result<Self> {
        if physical.len() != standard.len() {
            return Err(AnalogError::DimensionMismatch {
                expected: physical.len(),
                got: standard.len(),
            });
        }
        let columns = columns.unwrap_or(standard.columns());
        let mut tables = BTreeMap::new();
        for name in columns {
            let table = ConversionTable::from_pairs(physical.column(name)?, standard.column(name)?);
            tables.insert(name.clone(), table);
        }
        Ok(Self { tables })
    }

    pub fn insert(&mut self, column: impl Into<String>, table: ConversionTable) {
        self.tables.insert(column.into(), table);
    }

    pub fn table(&self, column: &str) -> Option<&ConversionTable> {
        self.tables.get(column)
    }

    pub fn columns(&self) -> Vec<&str> {
        self.tables.keys().map(|k| k.as_str()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    fn convert(&self, series: &Series, f: impl Fn(&ConversionTable, f64) -> f64) -> Result<Series> {
        let mut out = series.clone();
        for (name, table) in &self.tables {
            if let Ok(values) = series.column(name) {
                let converted = values.iter().map(|&v| f(table, v)).collect();
                out.replace_column(name, converted)?;
            }
        }
        Ok(out)
    }

    /// Replace physical values of every tabulated column present in `series`.
    pub fn standardize(&self, series: &Series) -> Result<Series> {
        self.convert(series, ConversionTable::to_standard)
    }

    /// Replace standard values of every tabulated column present in `series`.
    pub fn unstandardize(&self, series: &Series) -> Result<Series> {
        self.convert(series, ConversionTable::to_physical)
    }
}

/// Standardizer that only applies a conversion matrix.
#[derive(Debug, Clone, Default)]
pub struct Conversion {
    matrix: Option<ConversionMatrix>,
}

impl Conversion {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_matrix(matrix: ConversionMatrix) -> Self {
        Self {
            matrix: Some(matrix),
        }
    }

    fn matrix(&self) -> Result<&ConversionMatrix> {
        self.matrix.as_ref().ok_or_else(|| {
            AnalogError::Configuration(
                "conversion standardizer needs a conversion matrix".to_string(),
            )
        })
    }
}

impl Standardizer for Conversion {
    fn name(&self) -> &str {
        "conversion"
    }

    fn fit(&mut self, _physical: &Series, _columns: Option<&[String]>) -> Result<()> {
        self.matrix().map(|_| ())
    }

    fn standardize(&self, physical: &Series) -> Result<Series> {
        self.matrix()?.standardize(physical)
    }

    fn unstandardize(&self, standard: &Series) -> Result<Series> {
        self.matrix()?.unstandardize(standard)
    }

    fn set_conversion_matrix(&mut self, physical: &Series, standard: &Series) -> Result<()> {
        self.matrix = Some(ConversionMatrix::from_series(physical, standard, None)?);
        Ok(())
    }

    fn load_conversion_matrix(&mut self, matrix: ConversionMatrix) {
        self.matrix = Some(matrix);
    }

    fn conversion_matrix(&self) -> Option<&ConversionMatrix> {
        self.matrix.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::{Duration, TimeZone, Utc};

    fn series(name: &str, values: Vec<f64>) -> Series {
        let base = Utc.with_ymd_and_hms(2001, 1, 1, 0, 0, 0).unwrap();
        let ts = (0..values.len())
            .map(|i| base + Duration::hours(i as i64))
            .collect();
        Series::univariate(ts, name, values).unwrap()
    }

    #[test]
    fn table_exact_and_interpolated() {
        let table = ConversionTable::from_pairs(&[300.0, 400.0, 500.0], &[0.0, 50.0, 100.0]);
        assert_eq!(table.len(), 3);
        assert_relative_eq!(table.to_standard(400.0), 50.0, epsilon = 1e-12);
        assert_relative_eq!(table.to_standard(450.0), 75.0, epsilon = 1e-12);
        assert_relative_eq!(table.to_physical(25.0), 350.0, epsilon = 1e-12);
        // clamped outside the table
        assert_relative_eq!(table.to_physical(120.0), 500.0, epsilon = 1e-12);
        assert!(table.to_physical(f64::NAN).is_nan());
    }

    #[test]
    fn table_keeps_first_duplicate_standard() {
        let table = ConversionTable::from_pairs(&[1.0, 2.0, 3.0], &[10.0, 10.0, 20.0]);
        assert_eq!(table.len(), 2);
        assert_relative_eq!(table.to_physical(10.0), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn table_skips_nan_pairs() {
        let table = ConversionTable::from_pairs(&[1.0, f64::NAN, 3.0], &[10.0, 15.0, f64::NAN]);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn conversion_round_trip() {
        let physical = series("V", vec![300.0, 500.0, 400.0]);
        let standard = series("V", vec![0.0, 100.0, 50.0]);
        let mut conversion = Conversion::new();
        assert!(conversion.standardize(&physical).is_err());

        conversion.set_conversion_matrix(&physical, &standard).unwrap();
        let s = conversion.standardize(&physical).unwrap();
        assert_eq!(s.column("V").unwrap(), &[0.0, 100.0, 50.0]);
        let back = conversion.unstandardize(&s).unwrap();
        assert_eq!(back.column("V").unwrap(), &[300.0, 500.0, 400.0]);
    }

    #[test]
    fn matrix_survives_json() {
        let physical = series("V", vec![300.0, 500.0, 400.0]);
        let standard = series("V", vec![0.0, 100.0, 50.0]);
        let matrix = ConversionMatrix::from_series(&physical, &standard, None).unwrap();
        let json = serde_json::to_string(&matrix).unwrap();
        let back: ConversionMatrix = serde_json::from_str(&json).unwrap();
        assert_eq!(back, matrix);
        assert_eq!(back.columns(), vec!["V"]);
    }
}
