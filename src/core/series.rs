//! Series data structure: named numeric columns over a strictly increasing time index.

use crate::core::serde_ext::nan_matrix;
use crate::core::Window;
use crate::error::{AnalogError, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// A table of numeric columns indexed by strictly increasing timestamps.
///
/// Values are stored column-major: `values[column][row]`. Missing observations are NaN.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawSeries")]
pub struct Series {
    timestamps: Vec<DateTime<Utc>>,
    columns: Vec<String>,
    #[serde(with = "nan_matrix")]
    values: Vec<Vec<f64>>,
}

#[derive(Deserialize)]
struct RawSeries {
    timestamps: Vec<DateTime<Utc>>,
    columns: Vec<String>,
    #[serde(with = "nan_matrix")]
    values: Vec<Vec<f64>>,
}

impl TryFrom<RawSeries> for Series {
    type Error = AnalogError;

    fn try_from(raw: RawSeries) -> Result<Self> {
        Series::new(raw.timestamps, raw.columns, raw.values)
    }
}

/// Builder for constructing a [`Series`] column by column.
#[derive(Debug, Clone, Default)]
pub struct SeriesBuilder {
    timestamps: Vec<DateTime<Utc>>,
    columns: Vec<String>,
    values: Vec<Vec<f64>>,
}

impl SeriesBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn timestamps(mut self, timestamps: Vec<DateTime<Utc>>) -> Self {
        self.timestamps = timestamps;
        self
    }

    /// Append a named column.
    pub fn column(mut self, name: impl Into<String>, values: Vec<f64>) -> Self {
        self.columns.push(name.into());
        self.values.push(values);
        self
    }

    pub fn build(self) -> Result<Series> {
        Series::new(self.timestamps, self.columns, self.values)
    }
}

impl Series {
    /// Create a series, validating the index and column shapes.
    pub fn new(
        timestamps: Vec<DateTime<Utc>>,
        columns: Vec<String>,
        values: Vec<Vec<f64>>,
    ) -> Result<Self> {
        for i in 1..timestamps.len() {
            if timestamps[i] <= timestamps[i - 1] {
                return Err(AnalogError::TimestampError(
                    "timestamps must be strictly increasing".to_string(),
                ));
            }
        }

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

        for (i, name) in columns.iter().enumerate() {
            if columns[..i].contains(name) {
                return Err(AnalogError::InvalidParameter(format!(
                    "duplicate column name '{}'",
                    name
                )));
            }
        }

        Ok(Self {
            timestamps,
            columns,
            values,
        })
    }

    /// Create a single-column series.
    pub fn univariate(
        timestamps: Vec<DateTime<Utc>>,
        name: impl Into<String>,
        values: Vec<f64>,
    ) -> Result<Self> {
        Self::new(timestamps, vec![name.into()], vec![values])
    }

    pub fn builder() -> SeriesBuilder {
        SeriesBuilder::new()
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn n_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn timestamps(&self) -> &[DateTime<Utc>] {
        &self.timestamps
    }

    pub fn values_by_column(&self) -> &[Vec<f64>] {
        &self.values
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Values of a named column.
    pub fn column(&self, name: &str) -> Result<&[f64]> {
        self.column_index(name)
            .map(|i| self.values[i].as_slice())
            .ok_or_else(|| AnalogError::UnknownColumn(name.to_string()))
    }

    /// Values of the column at position `index`.
    pub fn column_at(&self, index: usize) -> Result<&[f64]> {
        self.values
            .get(index)
            .map(|v| v.as_slice())
            .ok_or(AnalogError::IndexOutOfBounds {
                index,
                size: self.values.len(),
            })
    }

    /// Timestamp of row `index`.
    pub fn timestamp(&self, index: usize) -> Result<DateTime<Utc>> {
        self.timestamps
            .get(index)
            .copied()
            .ok_or(AnalogError::IndexOutOfBounds {
                index,
                size: self.len(),
            })
    }

    pub fn first_timestamp(&self) -> Option<DateTime<Utc>> {
        self.timestamps.first().copied()
    }

    pub fn last_timestamp(&self) -> Option<DateTime<Utc>> {
        self.timestamps.last().copied()
    }

    /// Sampling step, always `index[1] - index[0]`.
    pub fn resolution(&self) -> Result<Duration> {
        if self.len() < 2 {
            return Err(AnalogError::InsufficientData {
                needed: 2,
                got: self.len(),
            });
        }
        Ok(self.timestamps[1] - self.timestamps[0])
    }

    /// Sampling step in seconds.
    pub fn resolution_seconds(&self) -> Result<f64> {
        self.resolution().map(duration_seconds)
    }

    /// Row position of an exact timestamp.
    pub fn position(&self, timestamp: DateTime<Utc>) -> Option<usize> {
        self.timestamps.binary_search(&timestamp).ok()
    }

    /// Number of rows whose timestamp is at or before `timestamp`.
    pub fn count_at_or_before(&self, timestamp: DateTime<Utc>) -> usize {
        self.timestamps.partition_point(|t| *t <= timestamp)
    }

    /// Number of rows between two dates, both included, in either order.
    pub fn count_between(&self, a: DateTime<Utc>, b: DateTime<Utc>) -> usize {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        let start = self.timestamps.partition_point(|t| *t < lo);
        let end = self.timestamps.partition_point(|t| *t <= hi);
        end.saturating_sub(start)
    }

    /// Extract rows `start..end` (end exclusive).
    pub fn slice(&self, start: usize, end: usize) -> Result<Series> {
        if start > end {
            return Err(AnalogError::InvalidParameter(
                "start must be <= end".to_string(),
            ));
        }
        if end > self.len() {
            return Err(AnalogError::IndexOutOfBounds {
                index: end,
                size: self.len(),
            });
        }

        Ok(Series {
            timestamps: self.timestamps[start..end].to_vec(),
            columns: self.columns.clone(),
            values: self
                .values
                .iter()
                .map(|col| col[start..end].to_vec())
                .collect(),
        })
    }

    /// Extract the rows covered by a closed window.
    pub fn window(&self, window: &Window) -> Result<Series> {
        self.slice(window.start, window.end + 1)
    }

    /// Copy holding only the named columns, in the requested order.
    pub fn select_columns<S: AsRef<str>>(&self, names: &[S]) -> Result<Series> {
        let mut columns = Vec::with_capacity(names.len());
        let mut values = Vec::with_capacity(names.len());
        for name in names {
            let name = name.as_ref();
            values.push(self.column(name)?.to_vec());
            columns.push(name.to_string());
        }
        Series::new(self.timestamps.clone(), columns, values)
    }

    /// Copy without the named columns; names that are absent are ignored.
    pub fn drop_columns<S: AsRef<str>>(&self, names: &[S]) -> Series {
        let keep: Vec<usize> = (0..self.columns.len())
            .filter(|&i| !names.iter().any(|n| n.as_ref() == self.columns[i]))
            .collect();
        Series {
            timestamps: self.timestamps.clone(),
            columns: keep.iter().map(|&i| self.columns[i].clone()).collect(),
            values: keep.iter().map(|&i| self.values[i].clone()).collect(),
        }
    }

    /// Replace the values of an existing column.
    pub fn replace_column(&mut self, name: &str, values: Vec<f64>) -> Result<()> {
        if values.len() != self.len() {
            return Err(AnalogError::DimensionMismatch {
                expected: self.len(),
                got: values.len(),
            });
        }
        let index = self
            .column_index(name)
            .ok_or_else(|| AnalogError::UnknownColumn(name.to_string()))?;
        self.values[index] = values;
        Ok(())
    }

    /// Check if any value is NaN or infinite.
    pub fn has_missing_values(&self) -> bool {
        self.values
            .iter()
            .any(|col| col.iter().any(|v| !v.is_finite()))
    }
}

/// Convert a duration to fractional seconds.
pub fn duration_seconds(duration: Duration) -> f64 {
    match duration.num_nanoseconds() {
        Some(ns) => ns as f64 / 1e9,
        None => duration.num_milliseconds() as f64 / 1e3,
    }
}

/// `resolution * count`, failing instead of overflowing.
pub fn scaled_duration(resolution: Duration, count: usize) -> Result<Duration> {
    let overflow = || {
        AnalogError::InvalidParameter(format!(
            "{} steps of {} overflow a duration",
            count, resolution
        ))
    };
    let factor = i64::try_from(count).map_err(|_| overflow())?;
    resolution
        .num_nanoseconds()
        .and_then(|ns| ns.checked_mul(factor))
        .map(Duration::nanoseconds)
        .or_else(|| {
            resolution
                .num_milliseconds()
                .checked_mul(factor)
                .and_then(Duration::try_milliseconds)
        })
        .ok_or_else(overflow)
}

/// Ratio of two durations, `numerator / denominator`.
pub fn duration_ratio(numerator: Duration, denominator: Duration) -> f64 {
    duration_seconds(numerator) / duration_seconds(denominator)
}
