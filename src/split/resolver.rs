//! Window length resolution.
//!
//! A window length can be given as a pair of dates, a row count, a duration or a
//! fraction of the whole series. [`resolve`] turns any of these into a row count,
//! a duration and the series resolution, in that order of precedence.

use crate::core::serde_ext::option_duration_ms;
use crate::core::{scaled_duration, Series};
use crate::error::{AnalogError, Result};
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// A point in time given as a row offset, a date string or a timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DateSpec {
    /// Row offset; negative values count from the end of the series.
    Row(i64),
    Time(DateTime<Utc>),
    Text(String),
}

impl From<DateTime<Utc>> for DateSpec {
    fn from(t: DateTime<Utc>) -> Self {
        DateSpec::Time(t)
    }
}

impl From<i64> for DateSpec {
    fn from(row: i64) -> Self {
        DateSpec::Row(row)
    }
}

impl From<&str> for DateSpec {
    fn from(s: &str) -> Self {
        DateSpec::Text(s.to_string())
    }
}

impl DateSpec {
    /// Resolve to a timestamp, indexing `series` for row offsets.
    pub fn to_timestamp(&self, series: &Series) -> Result<DateTime<Utc>> {
        match self {
            DateSpec::Time(t) => Ok(*t),
            DateSpec::Text(s) => parse_date(s),
            DateSpec::Row(row) => {
                let n = series.len() as i64;
                let index = if *row < 0 { n + row } else { *row };
                if index < 0 || index >= n {
                    return Err(AnalogError::IndexOutOfBounds {
                        index: row.unsigned_abs() as usize,
                        size: series.len(),
                    });
                }
                series.timestamp(index as usize)
            }
        }
    }
}

/// Parse RFC 3339 or one of the plain `%Y-%m-%d[ %H:%M:%S]` forms as UTC.
pub fn parse_date(text: &str) -> Result<DateTime<Utc>> {
    let text = text.trim();
    if let Ok(t) = DateTime::parse_from_rfc3339(text) {
        return Ok(t.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(t) = NaiveDateTime::parse_from_str(text, format) {
            return Ok(t.and_utc());
        }
    }
    if let Ok(d) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        if let Some(t) = d.and_hms_opt(0, 0, 0) {
            return Ok(t.and_utc());
        }
    }
    Err(AnalogError::InvalidDate(text.to_string()))
}

/// Every way a window length may be described. Unset fields are ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LengthSpec {
    pub start: Option<DateSpec>,
    pub end: Option<DateSpec>,
    pub count: Option<usize>,
    #[serde(with = "option_duration_ms")]
    pub duration: Option<Duration>,
    pub portion: Option<f64>,
}

impl LengthSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_start(mut self, start: impl Into<DateSpec>) -> Self {
        self.start = Some(start.into());
        self
    }

    pub fn with_end(mut self, end: impl Into<DateSpec>) -> Self {
        self.end = Some(end.into());
        self
    }

    pub fn with_count(mut self, count: usize) -> Self {
        self.count = Some(count);
        self
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }

    pub fn with_portion(mut self, portion: f64) -> Self {
        self.portion = Some(portion);
        self
    }
}

/// What [`resolve`] does when no representation is usable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Unresolved {
    /// Return `Ok(None)` so the caller can decide.
    #[default]
    Signal,
    /// Use the length of the whole series.
    WholeSeries,
}

/// A resolved window length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedLength {
    pub duration: Duration,
    pub count: usize,
    pub resolution: Duration,
}

impl ResolvedLength {
    fn from_count(count: usize, resolution: Duration) -> Result<Self> {
        Ok(Self {
            duration: scaled_duration(resolution, count)?,
            count,
            resolution,
        })
    }
}

/// Resolve a length spec against a series.
///
/// Precedence: start/end pair, count, duration, portion, then `on_unresolved`.
/// A date pair counts the rows between both dates inclusive, in either order.
/// A duration `d` gives `floor(d / resolution)` rows; a portion `p` gives
/// `floor(len * p)` rows.
pub fn resolve(
    series: &Series,
    spec: &LengthSpec,
    on_unresolved: Unresolved,
) -> Result<Option<ResolvedLength>> {
    let resolution = series.resolution()?;

    if let (Some(start), Some(end)) = (&spec.start, &spec.end) {
        let a = start.to_timestamp(series)?;
        let b = end.to_timestamp(series)?;
        let count = series.count_between(a, b);
        return ResolvedLength::from_count(count, resolution).map(Some);
    }

    if let Some(count) = spec.count {
        return ResolvedLength::from_count(count, resolution).map(Some);
    }

    if let Some(duration) = spec.duration {
        if duration < Duration::zero() {
            return Err(AnalogError::InvalidParameter(format!(
                "window duration must be non-negative, got {}",
                duration
            )));
        }
        let count = match (duration.num_nanoseconds(), resolution.num_nanoseconds()) {
            (Some(d), Some(r)) => (d / r) as usize,
            _ => (duration.num_milliseconds() / resolution.num_milliseconds().max(1)) as usize,
        };
        return ResolvedLength::from_count(count, resolution).map(Some);
    }

    if let Some(portion) = spec.portion {
        if !portion.is_finite() || portion < 0.0 {
            return Err(AnalogError::InvalidParameter(format!(
                "window portion must be a non-negative fraction, got {}",
                portion
            )));
        }
        let count = (series.len() as f64 * portion) as usize;
        return ResolvedLength::from_count(count, resolution).map(Some);
    }

    match on_unresolved {
        Unresolved::Signal => Ok(None),
        Unresolved::WholeSeries => ResolvedLength::from_count(series.len(), resolution).map(Some),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn hourly(n: usize) -> Series {
        let base = Utc.with_ymd_and_hms(2010, 1, 1, 0, 0, 0).unwrap();
        let ts = (0..n).map(|i| base + Duration::hours(i as i64)).collect();
        Series::univariate(ts, "V", vec![0.0; n]).unwrap()
    }

    #[test]
    fn count_gives_duration() {
        let s = hourly(48);
        let r = resolve(&s, &LengthSpec::new().with_count(5), Unresolved::Signal)
            .unwrap()
            .unwrap();
        assert_eq!(r.count, 5);
        assert_eq!(r.duration, Duration::hours(5));
        assert_eq!(r.resolution, Duration::hours(1));
    }

    #[test]
    fn duration_floors_to_rows() {
        let s = hourly(48);
        let spec = LengthSpec::new().with_duration(Duration::minutes(150));
        let r = resolve(&s, &spec, Unresolved::Signal).unwrap().unwrap();
        assert_eq!(r.count, 2);
        assert_eq!(r.duration, Duration::hours(2));
    }

    #[test]
    fn portion_truncates() {
        let s = hourly(48);
        let spec = LengthSpec::new().with_portion(0.1);
        let r = resolve(&s, &spec, Unresolved::Signal).unwrap().unwrap();
        assert_eq!(r.count, 4);
    }

    #[test]
    fn date_pair_counts_inclusive_rows_in_any_order() {
        let s = hourly(48);
        let spec = LengthSpec::new()
            .with_start("2010-01-01 10:00:00")
            .with_end("2010-01-01T05:00:00Z");
        let r = resolve(&s, &spec, Unresolved::Signal).unwrap().unwrap();
        assert_eq!(r.count, 6);
    }

    #[test]
    fn date_pair_takes_precedence_over_count() {
        let s = hourly(48);
        let spec = LengthSpec::new()
            .with_start(DateSpec::Row(0))
            .with_end(DateSpec::Row(9))
            .with_count(3)
            .with_portion(0.5);
        let r = resolve(&s, &spec, Unresolved::Signal).unwrap().unwrap();
        assert_eq!(r.count, 10);
    }

    #[test]
    fn count_takes_precedence_over_duration() {
        let s = hourly(48);
        let spec = LengthSpec::new()
            .with_count(3)
            .with_duration(Duration::hours(10));
        let r = resolve(&s, &spec, Unresolved::Signal).unwrap().unwrap();
        assert_eq!(r.count, 3);
    }

    #[test]
    fn oversized_count_is_rejected() {
        let s = hourly(48);
        for spec in [
            LengthSpec::new().with_count(usize::MAX),
            LengthSpec::new().with_portion(1e30),
        ] {
            let r = resolve(&s, &spec, Unresolved::Signal);
            assert!(matches!(r, Err(AnalogError::InvalidParameter(_))), "{:?}", r);
        }

        // past i32 but still a representable duration
        let count = i32::MAX as usize + 1;
        let r = resolve(&s, &LengthSpec::new().with_count(count), Unresolved::Signal)
            .unwrap()
            .unwrap();
        assert_eq!(r.duration, Duration::hours(count as i64));
    }

    #[test]
    fn unresolved_policy() {
        let s = hourly(48);
        let spec = LengthSpec::new().with_start(DateSpec::Row(3));
        assert_eq!(resolve(&s, &spec, Unresolved::Signal).unwrap(), None);
        let whole = resolve(&s, &spec, Unresolved::WholeSeries).unwrap().unwrap();
        assert_eq!(whole.count, 48);
    }

    #[test]
    fn negative_rows_count_from_end() {
        let s = hourly(10);
        let last = DateSpec::Row(-1).to_timestamp(&s).unwrap();
        assert_eq!(last, s.timestamp(9).unwrap());
        assert!(DateSpec::Row(10).to_timestamp(&s).is_err());
        assert!(DateSpec::Row(-11).to_timestamp(&s).is_err());
    }

    #[test]
    fn malformed_date_is_an_error() {
        let s = hourly(10);
        let spec = LengthSpec::new().with_start("yesterday").with_end(DateSpec::Row(3));
        assert!(matches!(
            resolve(&s, &spec, Unresolved::Signal),
            Err(AnalogError::InvalidDate(_))
        ));
    }

    #[test]
    fn parse_date_formats() {
        let expected = Utc.with_ymd_and_hms(2004, 5, 3, 12, 30, 0).unwrap();
        assert_eq!(parse_date("2004-05-03T12:30:00Z").unwrap(), expected);
        assert_eq!(parse_date("2004-05-03 12:30:00").unwrap(), expected);
        assert_eq!(parse_date("2004-05-03T12:30:00").unwrap(), expected);
        assert_eq!(
            parse_date("2004-05-03").unwrap(),
            Utc.with_ymd_and_hms(2004, 5, 3, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn length_spec_from_json() {
        let rows: LengthSpec = serde_json::from_str(r#"{"start": -10, "count": 4}"#).unwrap();
        assert_eq!(rows.start, Some(DateSpec::Row(-10)));
        assert_eq!(rows.count, Some(4));

        let spec: LengthSpec =
            serde_json::from_str(r#"{"end": "2004-05-03", "duration": 3600000}"#).unwrap();
        assert_eq!(spec.end, Some(DateSpec::Text("2004-05-03".to_string())));
        assert_eq!(spec.duration, Some(Duration::hours(1)));
        assert_eq!(spec.count, None);
    }
}
