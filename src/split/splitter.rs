//! Pattern / test / training split of a series.
//!
//! The pattern window is the reference to match, the test window directly follows
//! it, and training covers everything else except a guard band of `test_count`
//! rows after the test window and the last `test_count` rows of the series.

use crate::core::serde_ext::option_duration_ms;
use crate::core::{Series, Window};
use crate::error::{AnalogError, Result};
use crate::split::resolver::{resolve, DateSpec, LengthSpec, Unresolved};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Pattern and test window descriptions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitConfig {
    pub pattern: LengthSpec,
    pub test: LengthSpec,
}

impl SplitConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pattern(mut self, pattern: LengthSpec) -> Self {
        self.pattern = pattern;
        self
    }

    pub fn with_test(mut self, test: LengthSpec) -> Self {
        self.test = test;
        self
    }

    pub fn with_pattern_start(mut self, start: impl Into<DateSpec>) -> Self {
        self.pattern.start = Some(start.into());
        self
    }

    pub fn with_pattern_end(mut self, end: impl Into<DateSpec>) -> Self {
        self.pattern.end = Some(end.into());
        self
    }

    pub fn with_pattern_count(mut self, count: usize) -> Self {
        self.pattern.count = Some(count);
        self
    }

    pub fn with_pattern_duration(mut self, duration: Duration) -> Self {
        self.pattern.duration = Some(duration);
        self
    }

    pub fn with_pattern_portion(mut self, portion: f64) -> Self {
        self.pattern.portion = Some(portion);
        self
    }

    pub fn with_test_start(mut self, start: impl Into<DateSpec>) -> Self {
        self.test.start = Some(start.into());
        self
    }

    pub fn with_test_end(mut self, end: impl Into<DateSpec>) -> Self {
        self.test.end = Some(end.into());
        self
    }

    pub fn with_test_count(mut self, count: usize) -> Self {
        self.test.count = Some(count);
        self
    }

    pub fn with_test_duration(mut self, duration: Duration) -> Self {
        self.test.duration = Some(duration);
        self
    }

    pub fn with_test_portion(mut self, portion: f64) -> Self {
        self.test.portion = Some(portion);
        self
    }
}

/// Row windows produced by [`split`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitResult {
    pub pattern: Window,
    pub test: Window,
    /// Rows before the pattern window.
    pub train_past: Option<Window>,
    /// Rows after the guard band, excluding the trailing `test_count` rows.
    pub train_future: Option<Window>,
    pub pattern_count: usize,
    pub test_count: usize,
    #[serde(with = "option_duration_ms")]
    pub resolution: Option<Duration>,
}

impl SplitResult {
    /// Present training windows, past first.
    pub fn train_windows(&self) -> Vec<Window> {
        self.train_past.into_iter().chain(self.train_future).collect()
    }
}

/// Series slices for a [`SplitResult`].
#[derive(Debug, Clone)]
pub struct SplitData {
    /// Past and future training slices that exist, followed by the extra series unsplit.
    pub train: Vec<Series>,
    pub pattern: Series,
    pub test: Series,
}

/// Start/end timestamps after making pattern and test consecutive.
struct Bounds {
    pattern_start: Option<DateTime<Utc>>,
    pattern_end: Option<DateTime<Utc>>,
    test_start: Option<DateTime<Utc>>,
    test_end: Option<DateTime<Utc>>,
}

fn to_time(series: &Series, spec: &Option<DateSpec>) -> Result<Option<DateTime<Utc>>> {
    spec.as_ref().map(|d| d.to_timestamp(series)).transpose()
}

fn consecutive_bounds(series: &Series, config: &SplitConfig, resolution: Duration) -> Result<Bounds> {
    let mut bounds = Bounds {
        pattern_start: to_time(series, &config.pattern.start)?,
        pattern_end: to_time(series, &config.pattern.end)?,
        test_start: to_time(series, &config.test.start)?,
        test_end: to_time(series, &config.test.end)?,
    };
    match (bounds.pattern_end, bounds.test_start) {
        (None, Some(ts)) => bounds.pattern_end = Some(ts - resolution),
        (Some(pe), None) => bounds.test_start = Some(pe + resolution),
        _ => {}
    }
    Ok(bounds)
}

/// Row index of `t`, or the number of rows at or before it when `t` is not in the index.
fn locate(series: &Series, t: DateTime<Utc>, what: &str) -> usize {
    match series.position(t) {
        Some(i) => i,
        None => {
            let fallback = series.count_at_or_before(t);
            tracing::warn!(
                date = %t,
                fallback,
                "{} not in index, considering the nearest previous date",
                what
            );
            fallback
        }
    }
}

fn with_dates(spec: &LengthSpec, start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> LengthSpec {
    LengthSpec {
        start: start.map(DateSpec::Time),
        end: end.map(DateSpec::Time),
        ..spec.clone()
    }
}

/// Compute pattern, test and training windows for `series`.
pub fn split(series: &Series, config: &SplitConfig) -> Result<SplitResult> {
    let n = series.len();
    let resolution = series.resolution()?;
    let bounds = consecutive_bounds(series, config, resolution)?;

    let pattern_spec = with_dates(&config.pattern, bounds.pattern_start, bounds.pattern_end);
    let test_spec = with_dates(&config.test, bounds.test_start, bounds.test_end);
    let pattern_len = resolve(series, &pattern_spec, Unresolved::Signal)?;
    let test_len = resolve(series, &test_spec, Unresolved::Signal)?;

    let (pattern_count, test_count) = match (pattern_len, test_len) {
        (Some(p), Some(t)) => (p.count, t.count),
        (Some(p), None) => (p.count, p.count),
        (None, Some(t)) => (t.count, t.count),
        (None, None) => {
            return Err(AnalogError::Configuration(
                "not enough information to split the series".to_string(),
            ))
        }
    };
    if pattern_count == 0 || test_count == 0 {
        return Err(AnalogError::InvalidParameter(format!(
            "pattern and test windows must be non-empty (pattern {}, test {})",
            pattern_count, test_count
        )));
    }

    let p = pattern_count as i64;
    let t = test_count as i64;
    let test_start = if let Some(ts) = bounds.test_start {
        locate(series, ts, "test_start") as i64
    } else if let Some(ps) = bounds.pattern_start {
        locate(series, ps, "pattern_start") as i64 + p
    } else if let Some(te) = bounds.test_end {
        match series.position(te) {
            Some(i) => i as i64 - t + 1,
            None => locate(series, te, "test_end") as i64 - t,
        }
    } else {
        n as i64 - t
    };
    let pattern_start = match bounds.pattern_start {
        Some(ps) => locate(series, ps, "pattern_start") as i64,
        None => test_start - p,
    };

    let in_bounds = |start: i64, len: i64| start >= 0 && start + len <= n as i64;
    if !in_bounds(pattern_start, p) || !in_bounds(test_start, t) {
        return Err(AnalogError::InvalidParameter(format!(
            "pattern rows {}..{} or test rows {}..{} fall outside a series of {} rows",
            pattern_start,
            pattern_start + p,
            test_start,
            test_start + t,
            n
        )));
    }

    let pattern = Window::new(pattern_start as usize, (pattern_start + p - 1) as usize)?;
    let test = Window::new(test_start as usize, (test_start + t - 1) as usize)?;
    if pattern.overlaps(&test) {
        return Err(AnalogError::InvalidParameter(format!(
            "pattern window {:?} overlaps test window {:?}",
            pattern, test
        )));
    }

    let first = pattern.start.min(test.start);
    let last = pattern.end.max(test.end);
    let train_past = if first > 0 {
        Some(Window::new(0, first - 1)?)
    } else {
        None
    };
    let future_start = last + 1 + test_count;
    let train_future = match n.checked_sub(1 + test_count) {
        Some(future_end) if future_start <= future_end => Some(Window::new(future_start, future_end)?),
        _ => None,
    };

    tracing::debug!(
        pattern = ?pattern,
        test = ?test,
        train_past = ?train_past,
        train_future = ?train_future,
        "split computed"
    );

    Ok(SplitResult {
        pattern,
        test,
        train_past,
        train_future,
        pattern_count,
        test_count,
        resolution: Some(resolution),
    })
}

/// Slice a series according to a [`SplitResult`]; `extra` series are appended to the
/// training list untouched.
pub fn slice_split(series: &Series, result: &SplitResult, extra: &[Series]) -> Result<SplitData> {
    let mut train = Vec::with_capacity(2 + extra.len());
    for window in result.train_windows() {
        train.push(series.window(&window)?);
    }
    train.extend(extra.iter().cloned());
    Ok(SplitData {
        train,
        pattern: series.window(&result.pattern)?,
        test: series.window(&result.test)?,
    })
}

/// [`split`] followed by [`slice_split`].
pub fn split_data(
    series: &Series,
    config: &SplitConfig,
    extra: &[Series],
) -> Result<(SplitResult, SplitData)> {
    let result = split(series, config)?;
    let data = slice_split(series, &result, extra)?;
    Ok((result, data))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn minutes(n: usize) -> Series {
        let base = Utc.with_ymd_and_hms(2004, 5, 3, 0, 0, 0).unwrap();
        let ts = (0..n).map(|i| base + Duration::minutes(i as i64)).collect();
        Series::univariate(ts, "V", (0..n).map(|i| i as f64).collect()).unwrap()
    }

    // ==================== guard band ====================

    #[test]
    fn pattern_end_with_counts() {
        let s = minutes(100);
        let config = SplitConfig::new()
            .with_pattern_end(DateSpec::Row(49))
            .with_pattern_count(10)
            .with_test_count(10);
        let r = split(&s, &config).unwrap();

        assert_eq!(r.pattern, Window::new(40, 49).unwrap());
        assert_eq!(r.test, Window::new(50, 59).unwrap());
        assert_eq!(r.train_past, Some(Window::new(0, 39).unwrap()));
        assert_eq!(r.train_future, Some(Window::new(70, 89).unwrap()));
    }

    #[test]
    fn default_test_is_at_series_end() {
        let s = minutes(100);
        let config = SplitConfig::new().with_pattern_count(10);
        let r = split(&s, &config).unwrap();

        assert_eq!(r.test, Window::new(90, 99).unwrap());
        assert_eq!(r.pattern, Window::new(80, 89).unwrap());
        assert_eq!(r.train_past, Some(Window::new(0, 79).unwrap()));
        assert_eq!(r.train_future, None);
    }

    #[test]
    fn pattern_at_series_start_has_no_past() {
        let s = minutes(100);
        let config = SplitConfig::new()
            .with_pattern_start(DateSpec::Row(0))
            .with_pattern_count(5);
        let r = split(&s, &config).unwrap();
        assert_eq!(r.pattern, Window::new(0, 4).unwrap());
        assert_eq!(r.test, Window::new(5, 9).unwrap());
        assert_eq!(r.train_past, None);
        assert_eq!(r.train_future, Some(Window::new(15, 94).unwrap()));
    }

    // ==================== precedence ====================

    #[test]
    fn mirrored_test_length() {
        let s = minutes(100);
        let config = SplitConfig::new()
            .with_test_start(DateSpec::Row(30))
            .with_test_duration(Duration::minutes(7));
        let r = split(&s, &config).unwrap();
        assert_eq!(r.test_count, 7);
        assert_eq!(r.pattern_count, 7);
        assert_eq!(r.pattern, Window::new(23, 29).unwrap());
    }

    #[test]
    fn explicit_dates_for_both_windows() {
        let s = minutes(100);
        let config = SplitConfig::new()
            .with_pattern_start("2004-05-03 00:10:00")
            .with_pattern_end("2004-05-03 00:19:00")
            .with_test_end("2004-05-03 00:24:00");
        let r = split(&s, &config).unwrap();
        assert_eq!(r.pattern, Window::new(10, 19).unwrap());
        assert_eq!(r.test, Window::new(20, 24).unwrap());
        assert_eq!(r.test_count, 5);
    }

    #[test]
    fn test_end_only() {
        let s = minutes(100);
        let config = SplitConfig::new()
            .with_test_end(DateSpec::Row(59))
            .with_test_count(10);
        let r = split(&s, &config).unwrap();
        assert_eq!(r.test, Window::new(50, 59).unwrap());
        assert_eq!(r.pattern, Window::new(40, 49).unwrap());
    }

    #[test]
    fn date_off_index_falls_back() {
        let s = minutes(100);
        // 30 seconds after row 20
        let config = SplitConfig::new()
            .with_test_start("2004-05-03 00:20:30")
            .with_test_count(5);
        let r = split(&s, &config).unwrap();
        assert_eq!(r.test.start, 21);
        assert_eq!(r.pattern, Window::new(16, 20).unwrap());
    }

    // ==================== errors ====================

    #[test]
    fn missing_lengths_is_a_configuration_error() {
        let s = minutes(100);
        let config = SplitConfig::new().with_test_start(DateSpec::Row(30));
        let err = split(&s, &config).unwrap_err();
        assert!(err.is_configuration());
        assert!(matches!(err, AnalogError::Configuration(_)));
    }

    #[test]
    fn window_beyond_series_is_rejected() {
        let s = minutes(20);
        let config = SplitConfig::new()
            .with_pattern_end(DateSpec::Row(3))
            .with_pattern_count(10);
        assert!(split(&s, &config).is_err());
    }

    #[test]
    fn overlapping_windows_are_rejected() {
        let s = minutes(100);
        let config = SplitConfig::new()
            .with_pattern_start(DateSpec::Row(10))
            .with_pattern_end(DateSpec::Row(19))
            .with_test_start(DateSpec::Row(15))
            .with_test_count(10);
        assert!(split(&s, &config).is_err());
    }

    // ==================== data ====================

    #[test]
    fn split_data_appends_extras() {
        let s = minutes(100);
        let extra = minutes(30);
        let config = SplitConfig::new()
            .with_pattern_end(DateSpec::Row(49))
            .with_pattern_count(10);
        let (result, data) = split_data(&s, &config, std::slice::from_ref(&extra)).unwrap();

        assert_eq!(data.train.len(), 3);
        assert_eq!(data.train[0].len(), 40);
        assert_eq!(data.train[1].len(), result.train_future.unwrap().len());
        assert_eq!(data.train[2].len(), 30);
        assert_eq!(data.pattern.column("V").unwrap()[0], 40.0);
        assert_eq!(data.test.column("V").unwrap()[9], 59.0);
    }
}
