//! Building a time index from explicit calendar and unit columns.
//!
//! Tabular space-weather products often carry the time as separate columns
//! (`year`, `doy`, `hour`, ...). These are folded into a UTC index and removed
//! from the value columns.

use crate::core::Series;
use crate::error::{AnalogError, Result};
use chrono::{DateTime, Duration, NaiveDate, Utc};

const YEAR: &[&str] = &["year", "years"];
const MONTH: &[&str] = &["month", "months"];
const DAY: &[&str] = &["day", "days"];
const DOY: &[&str] = &["doy", "doys"];

/// Time-offset columns and their length in milliseconds.
const UNITS: &[(&[&str], f64)] = &[
    (&["hours", "hour", "hr", "h"], 3_600_000.0),
    (&["minutes", "minute", "min", "m"], 60_000.0),
    (&["seconds", "second", "sec", "S"], 1_000.0),
    (
        &["milliseconds", "millisecond", "ms", "milli", "millis"],
        1.0,
    ),
];

fn find(columns: &[String], names: &[&str]) -> Option<usize> {
    columns.iter().position(|c| names.contains(&c.as_str()))
}

fn as_int(value: f64, what: &str, row: usize) -> Result<i64> {
    if !value.is_finite() || value.fract() != 0.0 {
        return Err(AnalogError::TimestampError(format!(
            "{} at row {} is not an integer: {}",
            what, row, value
        )));
    }
    Ok(value as i64)
}

/// Build a [`Series`] whose index is derived from calendar/unit columns.
///
/// A `year` column is mandatory. The day is taken from `doy` if present, otherwise
/// from `month` + `day`, otherwise `day` is read as a day of year. Hour, minute,
/// second and millisecond columns are added as offsets and may be fractional.
/// All time columns are removed from the returned series.
pub fn series_from_unit_columns(columns: Vec<String>, values: Vec<Vec<f64>>) -> Result<Series> {
    if columns.len() != values.len() {
        return Err(AnalogError::DimensionMismatch {
            expected: values.len(),
            got: columns.len(),
        });
    }
    let year_col = find(&columns, YEAR).ok_or_else(|| {
        AnalogError::Configuration("a year column is required to build a time index".into())
    })?;
    let month_col = find(&columns, MONTH);
    let day_col = find(&columns, DAY);
    let doy_col = find(&columns, DOY);
    let unit_cols: Vec<(usize, f64)> = UNITS
        .iter()
        .filter_map(|(names, ms)| find(&columns, names).map(|i| (i, *ms)))
        .collect();

    let n = values[year_col].len();
    let mut timestamps: Vec<DateTime<Utc>> = Vec::with_capacity(n);
    for row in 0..n {
        let year = as_int(values[year_col][row], "year", row)? as i32;
        let date = match (doy_col, month_col, day_col) {
            (Some(d), _, _) => {
                NaiveDate::from_yo_opt(year, as_int(values[d][row], "doy", row)? as u32)
            }
            (None, Some(m), Some(d)) => NaiveDate::from_ymd_opt(
                year,
                as_int(values[m][row], "month", row)? as u32,
                as_int(values[d][row], "day", row)? as u32,
            ),
            (None, Some(m), None) => {
                NaiveDate::from_ymd_opt(year, as_int(values[m][row], "month", row)? as u32, 1)
            }
            (None, None, Some(d)) => {
                NaiveDate::from_yo_opt(year, as_int(values[d][row], "day", row)? as u32)
            }
            (None, None, None) => NaiveDate::from_yo_opt(year, 1),
        }
        .ok_or_else(|| AnalogError::TimestampError(format!("invalid calendar date at row {}", row)))?;

        let mut offset_ms = 0.0;
        for &(col, unit_ms) in &unit_cols {
            let v = values[col][row];
            if !v.is_finite() {
                return Err(AnalogError::TimestampError(format!(
                    "non-finite time offset in column '{}' at row {}",
                    columns[col], row
                )));
            }
            offset_ms += v * unit_ms;
        }

        let midnight = date
            .and_hms_opt(0, 0, 0)
            .ok_or_else(|| AnalogError::TimestampError(format!("invalid date at row {}", row)))?
            .and_utc();
        timestamps.push(midnight + Duration::milliseconds(offset_ms.round() as i64));
    }

    let mut time_cols: Vec<usize> = vec![year_col];
    time_cols.extend(month_col);
    time_cols.extend(day_col);
    time_cols.extend(doy_col);
    time_cols.extend(unit_cols.iter().map(|(i, _)| *i));

    let (names, data): (Vec<String>, Vec<Vec<f64>>) = columns
        .into_iter()
        .zip(values)
        .enumerate()
        .filter(|(i, _)| !time_cols.contains(i))
        .map(|(_, pair)| pair)
        .unzip();

    Series::new(timestamps, names, data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn year_doy_hour_index() {
        let columns = vec![
            "year".to_string(),
            "doy".to_string(),
            "hour".to_string(),
            "V_bulk".to_string(),
        ];
        let values = vec![
            vec![2003.0, 2003.0, 2003.0],
            vec![163.0, 163.0, 163.0],
            vec![0.0, 1.0, 2.5],
            vec![400.0, 410.0, 420.0],
        ];
        let s = series_from_unit_columns(columns, values).unwrap();

        assert_eq!(s.columns(), &["V_bulk"]);
        assert_eq!(
            s.timestamp(0).unwrap(),
            Utc.with_ymd_and_hms(2003, 6, 12, 0, 0, 0).unwrap()
        );
        assert_eq!(
            s.timestamp(2).unwrap(),
            Utc.with_ymd_and_hms(2003, 6, 12, 2, 30, 0).unwrap()
        );
    }

    #[test]
    fn month_day_minutes_index() {
        let columns = vec![
            "year".to_string(),
            "month".to_string(),
            "day".to_string(),
            "minutes".to_string(),
            "B".to_string(),
        ];
        let values = vec![
            vec![2022.0, 2022.0],
            vec![1.0, 2.0],
            vec![10.0, 15.0],
            vec![30.0, 45.0],
            vec![5.0, 6.0],
        ];
        let s = series_from_unit_columns(columns, values).unwrap();
        assert_eq!(
            s.timestamp(1).unwrap(),
            Utc.with_ymd_and_hms(2022, 2, 15, 0, 45, 0).unwrap()
        );
        assert_eq!(s.column("B").unwrap(), &[5.0, 6.0]);
    }

    #[test]
    fn missing_year_is_a_configuration_error() {
        let result = series_from_unit_columns(vec!["doy".into()], vec![vec![1.0]]);
        assert!(matches!(result, Err(AnalogError::Configuration(_))));
    }

    #[test]
    fn fractional_day_is_rejected() {
        let result = series_from_unit_columns(
            vec!["year".into(), "doy".into()],
            vec![vec![2020.0], vec![1.5]],
        );
        assert!(matches!(result, Err(AnalogError::TimestampError(_))));
    }
}
