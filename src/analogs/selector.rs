//! Greedy selection of the best-scoring, mutually distant timestamps.

use crate::core::serde_ext::duration_ms;
use crate::criteria::{Criterion, CriterionSeries};
use crate::error::{AnalogError, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Time radius around a selected analog in which no other analog may be picked.
///
/// The excluded range `[picked - before, picked + after]` is closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlindWindow {
    #[serde(with = "duration_ms")]
    pub before: Duration,
    #[serde(with = "duration_ms")]
    pub after: Duration,
}

impl BlindWindow {
    pub fn new(before: Duration, after: Duration) -> Self {
        Self { before, after }
    }

    /// Same radius on both sides.
    pub fn symmetric(radius: Duration) -> Self {
        Self::new(radius, radius)
    }

    pub fn contains(&self, picked: DateTime<Utc>, t: DateTime<Utc>) -> bool {
        t >= picked - self.before && t <= picked + self.after
    }
}

/// Selection parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionConfig {
    /// Maximum number of analogs per set.
    pub nb_analogs: usize,
    /// One selection run per window; no window selects the best scores outright.
    pub blind_windows: Vec<BlindWindow>,
    /// Score columns selected independently; the first column when `None`.
    pub columns: Option<Vec<String>>,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            nb_analogs: 1000,
            blind_windows: vec![BlindWindow::symmetric(Duration::hours(24))],
            columns: None,
        }
    }
}

impl SelectionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_nb_analogs(mut self, nb: usize) -> Self {
        self.nb_analogs = nb;
        self
    }

    pub fn with_blind_window(mut self, window: BlindWindow) -> Self {
        self.blind_windows = vec![window];
        self
    }

    pub fn with_blind_windows(mut self, windows: Vec<BlindWindow>) -> Self {
        self.blind_windows = windows;
        self
    }

    /// Disable exclusion: pick the `nb_analogs` best scores.
    pub fn without_blind_window(mut self) -> Self {
        self.blind_windows.clear();
        self
    }

    pub fn with_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = Some(columns.into_iter().map(Into::into).collect());
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.nb_analogs == 0 {
            return Err(AnalogError::InvalidParameter(
                "nb_analogs must be at least 1".to_string(),
            ));
        }
        for window in &self.blind_windows {
            if window.before < Duration::zero() || window.after < Duration::zero() {
                return Err(AnalogError::InvalidParameter(
                    "blind window bounds must not be negative".to_string(),
                ));
            }
        }
        if matches!(&self.columns, Some(c) if c.is_empty()) {
            return Err(AnalogError::Configuration(
                "analog selection needs at least one score column".to_string(),
            ));
        }
        Ok(())
    }
}

/// A selected timestamp and its raw criterion score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Analog {
    pub timestamp: DateTime<Utc>,
    pub score: f64,
}

/// Analogs picked from one score column under one blind window, best first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalogSet {
    pub column: String,
    pub blind_window: Option<BlindWindow>,
    analogs: Vec<Analog>,
}

impl AnalogSet {
    pub fn new(
        column: impl Into<String>,
        blind_window: Option<BlindWindow>,
        analogs: Vec<Analog>,
    ) -> Self {
        Self {
            column: column.into(),
            blind_window,
            analogs,
        }
    }

    pub fn len(&self) -> usize {
        self.analogs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.analogs.is_empty()
    }

    pub fn analogs(&self) -> &[Analog] {
        &self.analogs
    }

    pub fn timestamps(&self) -> Vec<DateTime<Utc>> {
        self.analogs.iter().map(|a| a.timestamp).collect()
    }

    pub fn scores(&self) -> Vec<f64> {
        self.analogs.iter().map(|a| a.score).collect()
    }

    /// The `n` best analogs.
    pub fn truncated(&self, n: usize) -> AnalogSet {
        Self {
            column: self.column.clone(),
            blind_window: self.blind_window,
            analogs: self.analogs.iter().take(n).copied().collect(),
        }
    }
}

/// All analog sets of one selection, keyed by `(column, blind_window)`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalogSelection {
    sets: Vec<AnalogSet>,
}

impl AnalogSelection {
    pub fn new(sets: Vec<AnalogSet>) -> Self {
        Self { sets }
    }

    pub fn sets(&self) -> &[AnalogSet] {
        &self.sets
    }

    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    pub fn get(&self, column: &str, blind_window: Option<BlindWindow>) -> Option<&AnalogSet> {
        self.sets
            .iter()
            .find(|s| s.column == column && s.blind_window == blind_window)
    }

    /// The only set, when the selection was not swept.
    pub fn single(&self) -> Option<&AnalogSet> {
        match self.sets.as_slice() {
            [set] => Some(set),
            _ => None,
        }
    }
}

/// Greedy analog listing over one score column.
///
/// Finite scores are ordered by `ranking` (stable, so ties keep series order).
/// Without a blind window the first `nb_analogs` are returned. Otherwise each
/// pick removes every candidate inside its blind window, the pick included,
/// before the next best remaining candidate is taken.
///
/// The exclusion only runs forward: a later pick never lies inside the blind
/// window of an earlier one, but with `before != after` an earlier pick may lie
/// inside the window of a later one. A symmetric window separates every pair.
pub fn list_analogs(
    timestamps: &[DateTime<Utc>],
    scores: &[f64],
    ranking: impl Fn(f64) -> f64,
    nb_analogs: usize,
    blind_window: Option<BlindWindow>,
) -> Result<Vec<Analog>> {
    if timestamps.len() != scores.len() {
        return Err(AnalogError::DimensionMismatch {
            expected: timestamps.len(),
            got: scores.len(),
        });
    }

    let ranked: Vec<(usize, f64)> = scores
        .iter()
        .enumerate()
        .filter(|(_, s)| s.is_finite())
        .map(|(i, &s)| (i, ranking(s)))
        .filter(|(_, r)| !r.is_nan())
        .collect();
    let mut order: Vec<usize> = (0..ranked.len()).collect();
    order.sort_by(|&a, &b| {
        ranked[a]
            .1
            .partial_cmp(&ranked[b].1)
            .unwrap_or(Ordering::Equal)
    });

    let pick = |slot: usize| {
        let i = ranked[slot].0;
        Analog {
            timestamp: timestamps[i],
            score: scores[i],
        }
    };

    let window = match blind_window {
        Some(w) => w,
        None => return Ok(order.into_iter().take(nb_analogs).map(pick).collect()),
    };

    // candidate slots along the time axis, for range removal by binary search
    let mut by_time: Vec<(DateTime<Utc>, usize)> = (0..ranked.len())
        .map(|slot| (timestamps[ranked[slot].0], slot))
        .collect();
    by_time.sort_by(|a, b| a.0.cmp(&b.0));

    let mut removed = vec![false; ranked.len()];
    let mut analogs = Vec::with_capacity(nb_analogs.min(ranked.len()));
    for slot in order {
        if analogs.len() >= nb_analogs {
            break;
        }
        if removed[slot] {
            continue;
        }
        let analog = pick(slot);
        let lo = by_time.partition_point(|(t, _)| *t < analog.timestamp - window.before);
        let hi = by_time.partition_point(|(t, _)| *t <= analog.timestamp + window.after);
        for &(_, excluded) in &by_time[lo..hi] {
            removed[excluded] = true;
        }
        analogs.push(analog);
    }
    Ok(analogs)
}

/// Run [`list_analogs`] for every requested column and blind window.
pub fn select_analogs(
    scores: &CriterionSeries,
    criterion: &dyn Criterion,
    config: &SelectionConfig,
) -> Result<AnalogSelection> {
    config.validate()?;
    let columns: Vec<String> = match &config.columns {
        Some(columns) => columns.clone(),
        None => scores
            .columns()
            .first()
            .cloned()
            .into_iter()
            .collect(),
    };
    if columns.is_empty() {
        return Err(AnalogError::EmptyData);
    }

    let windows: Vec<Option<BlindWindow>> = if config.blind_windows.is_empty() {
        vec![None]
    } else {
        config.blind_windows.iter().copied().map(Some).collect()
    };

    let mut sets = Vec::with_capacity(windows.len() * columns.len());
    for window in &windows {
        for column in &columns {
            let values = scores.column(column)?;
            let analogs = list_analogs(
                scores.timestamps(),
                values,
                |s| criterion.ranking_score(s),
                config.nb_analogs,
                *window,
            )?;
            tracing::debug!(
                column = %column,
                blind_window = ?window,
                selected = analogs.len(),
                "analogs selected"
            );
            sets.push(AnalogSet::new(column.clone(), *window, analogs));
        }
    }
    Ok(AnalogSelection::new(sets))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::criteria::{SpectralSlope, MSE};
    use chrono::TimeZone;

    fn hours(n: usize) -> Vec<DateTime<Utc>> {
        let base = Utc.with_ymd_and_hms(2003, 10, 29, 0, 0, 0).unwrap();
        (0..n).map(|i| base + Duration::hours(i as i64)).collect()
    }

    // ==================== list_analogs ====================

    #[test]
    fn blind_window_skips_neighbour() {
        let ts = hours(3);
        let picks = list_analogs(
            &ts,
            &[0.1, 0.2, 0.15],
            |s| s,
            2,
            Some(BlindWindow::symmetric(Duration::hours(1))),
        )
        .unwrap();
        let picked: Vec<_> = picks.iter().map(|a| a.timestamp).collect();
        assert_eq!(picked, vec![ts[0], ts[2]]);
        assert_eq!(picks[1].score, 0.15);
    }

    #[test]
    fn no_blind_window_is_best_scores() {
        let ts = hours(5);
        let picks = list_analogs(&ts, &[0.3, 0.1, f64::NAN, 0.1, 0.2], |s| s, 3, None).unwrap();
        let picked: Vec<_> = picks.iter().map(|a| a.timestamp).collect();
        // ties keep series order, NaN never selected
        assert_eq!(picked, vec![ts[1], ts[3], ts[4]]);
    }

    #[test]
    fn pool_exhaustion_stops_early() {
        let ts = hours(10);
        let scores: Vec<f64> = (0..10).map(|i| i as f64).collect();
        let picks = list_analogs(
            &ts,
            &scores,
            |s| s,
            100,
            Some(BlindWindow::new(Duration::hours(0), Duration::hours(4))),
        )
        .unwrap();
        let picked: Vec<_> = picks.iter().map(|a| a.timestamp).collect();
        assert_eq!(picked, vec![ts[0], ts[5]]);
    }

    #[test]
    fn exclusion_only_runs_forward() {
        let ts = hours(6);
        let blind = BlindWindow::new(Duration::zero(), Duration::hours(4));
        let picks = list_analogs(&ts, &[0.9, 0.2, 0.8, 0.1, 0.7, 0.6], |s| s, 2, Some(blind))
            .unwrap();
        let picked: Vec<_> = picks.iter().map(|a| a.timestamp).collect();
        assert_eq!(picked, vec![ts[3], ts[1]]);
        assert!(!blind.contains(ts[3], ts[1]));
        assert!(blind.contains(ts[1], ts[3]));
    }

    #[test]
    fn asymmetric_window() {
        let ts = hours(6);
        let picks = list_analogs(
            &ts,
            &[0.5, 0.4, 0.3, 0.0, 0.6, 0.7],
            |s| s,
            6,
            Some(BlindWindow::new(Duration::hours(2), Duration::hours(1))),
        )
        .unwrap();
        let picked: Vec<_> = picks.iter().map(|a| a.timestamp).collect();
        // 3 removes 1..=4, then 0 and 5 remain
        assert_eq!(picked, vec![ts[3], ts[0], ts[5]]);
    }

    #[test]
    fn unsorted_timestamps_are_supported() {
        let mut ts = hours(4);
        ts.swap(0, 3);
        let picks = list_analogs(
            &ts,
            &[0.0, 0.1, 0.2, 0.3],
            |s| s,
            4,
            Some(BlindWindow::symmetric(Duration::hours(1))),
        )
        .unwrap();
        // ts[0] is hour 3, removes hour 2 (ts[2]) and itself
        let picked: Vec<_> = picks.iter().map(|a| a.timestamp).collect();
        assert_eq!(picked, vec![ts[0], ts[1]]);
    }

    #[test]
    fn ranking_function_applies() {
        let ts = hours(3);
        let picks = list_analogs(&ts, &[-0.9, 0.5, -0.1], f64::abs, 1, None).unwrap();
        assert_eq!(picks[0].timestamp, ts[2]);
        assert_eq!(picks[0].score, -0.1);
    }

    #[test]
    fn mismatched_lengths() {
        let ts = hours(3);
        assert!(list_analogs(&ts, &[0.0], |s| s, 1, None).is_err());
    }

    // ==================== select_analogs ====================

    fn scores() -> CriterionSeries {
        CriterionSeries::new(
            "mse",
            hours(6),
            vec!["V".into(), "N".into()],
            vec![
                vec![f64::NAN, 0.4, 0.1, 0.3, 0.2, 0.5],
                vec![0.9, 0.1, 0.8, 0.7, 0.6, 0.05],
            ],
        )
        .unwrap()
    }

    #[test]
    fn first_column_by_default() {
        let config = SelectionConfig::new()
            .with_nb_analogs(2)
            .with_blind_window(BlindWindow::symmetric(Duration::hours(1)));
        let selection = select_analogs(&scores(), &MSE::new(), &config).unwrap();
        let set = selection.single().unwrap();
        assert_eq!(set.column, "V");
        let ts = hours(6);
        assert_eq!(set.timestamps(), vec![ts[2], ts[4]]);
    }

    #[test]
    fn columns_and_windows_are_independent() {
        let windows = vec![
            BlindWindow::symmetric(Duration::hours(1)),
            BlindWindow::symmetric(Duration::hours(10)),
        ];
        let config = SelectionConfig::new()
            .with_nb_analogs(3)
            .with_blind_windows(windows.clone())
            .with_columns(["V", "N"]);
        let selection = select_analogs(&scores(), &MSE::new(), &config).unwrap();
        assert_eq!(selection.len(), 4);
        assert!(selection.single().is_none());

        let ts = hours(6);
        let n_narrow = selection.get("N", Some(windows[0])).unwrap();
        assert_eq!(n_narrow.timestamps(), vec![ts[5], ts[1], ts[3]]);
        let v_wide = selection.get("V", Some(windows[1])).unwrap();
        assert_eq!(v_wide.timestamps(), vec![ts[2]]);
    }

    #[test]
    fn spectral_slope_ranks_by_magnitude() {
        let series = CriterionSeries::new(
            "spectral_slope",
            hours(3),
            vec!["slope".into()],
            vec![vec![-0.8, 0.3, -0.05]],
        )
        .unwrap();
        let config = SelectionConfig::new().without_blind_window().with_nb_analogs(2);
        let selection = select_analogs(&series, &SpectralSlope::new(), &config).unwrap();
        let ts = hours(3);
        assert_eq!(selection.single().unwrap().timestamps(), vec![ts[2], ts[1]]);
    }

    #[test]
    fn unknown_column_is_configuration_error() {
        let config = SelectionConfig::new().with_columns(["Bz"]);
        let err = select_analogs(&scores(), &MSE::new(), &config).unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn invalid_config() {
        assert!(SelectionConfig::new().with_nb_analogs(0).validate().is_err());
        let negative = BlindWindow::new(Duration::hours(-1), Duration::hours(1));
        assert!(SelectionConfig::new()
            .with_blind_window(negative)
            .validate()
            .is_err());
        let empty: Vec<String> = Vec::new();
        assert!(SelectionConfig::new().with_columns(empty).validate().is_err());
    }

    #[test]
    fn truncated_set() {
        let ts = hours(3);
        let set = AnalogSet::new(
            "V",
            None,
            ts.iter()
                .map(|&t| Analog {
                    timestamp: t,
                    score: 0.0,
                })
                .collect(),
        );
        assert_eq!(set.truncated(2).len(), 2);
        assert_eq!(set.truncated(10).len(), 3);
    }
}
