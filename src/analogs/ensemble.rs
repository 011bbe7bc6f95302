//! Stacked analog windows on a shared relative axis.

use crate::analogs::BlindWindow;
use crate::core::serde_ext::nan_matrix;
use crate::error::{AnalogError, Result};
use crate::utils::{nanmean, nanquantile};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One extracted window, rows `0..pattern_len + forecast_len`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawMember")]
pub struct EnsembleMember {
    /// Timestamp the analog was selected at.
    pub analog: DateTime<Utc>,
    pub score: f64,
    /// Source timestamp of every relative row; `None` where the window was padded.
    pub timestamps: Vec<Option<DateTime<Utc>>>,
    #[serde(with = "nan_matrix")]
    values: Vec<Vec<f64>>,
}

#[derive(Deserialize)]
struct RawMember {
    analog: DateTime<Utc>,
    score: f64,
    timestamps: Vec<Option<DateTime<Utc>>>,
    #[serde(with = "nan_matrix")]
    values: Vec<Vec<f64>>,
}

impl TryFrom<RawMember> for EnsembleMember {
    type Error = AnalogError;

    fn try_from(raw: RawMember) -> Result<Self> {
        EnsembleMember::new(raw.analog, raw.score, raw.timestamps, raw.values)
    }
}

impl EnsembleMember {
    pub fn new(
        analog: DateTime<Utc>,
        score: f64,
        timestamps: Vec<Option<DateTime<Utc>>>,
        values: Vec<Vec<f64>>,
    ) -> Result<Self> {
        for column in &values {
            if column.len() != timestamps.len() {
                return Err(AnalogError::DimensionMismatch {
                    expected: timestamps.len(),
                    got: column.len(),
                });
            }
        }
        Ok(Self {
            analog,
            score,
            timestamps,
            values,
        })
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn values_by_column(&self) -> &[Vec<f64>] {
        &self.values
    }

    pub fn column_at(&self, index: usize) -> Option<&[f64]> {
        self.values.get(index).map(|v| v.as_slice())
    }
}

/// Windows extracted around a set of analogs.
///
/// Relative row `pattern_len - 1` is the anchor; rows from `pattern_len` on are
/// the forecast horizon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawEnsemble")]
pub struct Ensemble {
    columns: Vec<String>,
    pattern_len: usize,
    forecast_len: usize,
    members: Vec<EnsembleMember>,
}

#[derive(Deserialize)]
struct RawEnsemble {
    columns: Vec<String>,
    pattern_len: usize,
    forecast_len: usize,
    members: Vec<EnsembleMember>,
}

impl TryFrom<RawEnsemble> for Ensemble {
    type Error = AnalogError;

    fn try_from(raw: RawEnsemble) -> Result<Self> {
        let mut ensemble = Ensemble::new(raw.columns, raw.pattern_len, raw.forecast_len);
        for member in raw.members {
            ensemble.push(member)?;
        }
        Ok(ensemble)
    }
}

impl Ensemble {
    pub fn new(columns: Vec<String>, pattern_len: usize, forecast_len: usize) -> Self {
        Self {
            columns,
            pattern_len,
            forecast_len,
            members: Vec::new(),
        }
    }

    pub fn push(&mut self, member: EnsembleMember) -> Result<()> {
        if member.len() != self.window_len() {
            return Err(AnalogError::DimensionMismatch {
                expected: self.window_len(),
                got: member.len(),
            });
        }
        if member.values.len() != self.columns.len() {
            return Err(AnalogError::DimensionMismatch {
                expected: self.columns.len(),
                got: member.values.len(),
            });
        }
        self.members.push(member);
        Ok(())
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn pattern_len(&self) -> usize {
        self.pattern_len
    }

    pub fn forecast_len(&self) -> usize {
        self.forecast_len
    }

    /// Rows of every member.
    pub fn window_len(&self) -> usize {
        self.pattern_len + self.forecast_len
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn members(&self) -> &[EnsembleMember] {
        &self.members
    }

    pub fn member(&self, analog: DateTime<Utc>) -> Option<&EnsembleMember> {
        self.members.iter().find(|m| m.analog == analog)
    }

    pub fn analogs(&self) -> Vec<DateTime<Utc>> {
        self.members.iter().map(|m| m.analog).collect()
    }

    /// The first `n` members.
    pub fn truncated(&self, n: usize) -> Ensemble {
        Self {
            columns: self.columns.clone(),
            pattern_len: self.pattern_len,
            forecast_len: self.forecast_len,
            members: self.members.iter().take(n).cloned().collect(),
        }
    }

    fn column_index(&self, name: &str) -> Result<usize> {
        self.columns
            .iter()
            .position(|c| c == name)
            .ok_or_else(|| AnalogError::UnknownColumn(name.to_string()))
    }

    /// One slice per member for column `name`.
    pub fn column_matrix(&self, name: &str) -> Result<Vec<&[f64]>> {
        let index = self.column_index(name)?;
        Ok(self
            .members
            .iter()
            .map(|m| m.values[index].as_slice())
            .collect())
    }

    fn per_step(&self, name: &str, f: impl Fn(&[f64]) -> f64) -> Result<Vec<f64>> {
        let matrix = self.column_matrix(name)?;
        let mut across = Vec::with_capacity(matrix.len());
        Ok((0..self.window_len())
            .map(|step| {
                across.clear();
                across.extend(matrix.iter().map(|m| m[step]));
                f(&across)
            })
            .collect())
    }

    /// Member mean at every relative row, ignoring NaN.
    pub fn mean(&self, name: &str) -> Result<Vec<f64>> {
        self.per_step(name, nanmean)
    }

    /// Member quantile at every relative row, ignoring NaN.
    pub fn quantile(&self, name: &str, q: f64) -> Result<Vec<f64>> {
        if !(0.0..=1.0).contains(&q) {
            return Err(AnalogError::InvalidParameter(format!(
                "quantile must be within [0, 1], got {}",
                q
            )));
        }
        self.per_step(name, |values| nanquantile(values, q))
    }
}

/// Sweep coordinates of one ensemble.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EnsembleKey {
    pub column: String,
    pub blind_window: Option<BlindWindow>,
    pub nb_extracted: Option<usize>,
}

/// Ensembles tagged by the swept parameters, in sweep order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KeyedEnsemble {
    entries: Vec<(EnsembleKey, Ensemble)>,
}

impl KeyedEnsemble {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, key: EnsembleKey, ensemble: Ensemble) {
        self.entries.push((key, ensemble));
    }

    pub fn get(&self, key: &EnsembleKey) -> Option<&Ensemble> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, e)| e)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&EnsembleKey, &Ensemble)> {
        self.entries.iter().map(|(k, e)| (k, e))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The only ensemble, when nothing was swept.
    pub fn single(&self) -> Option<&Ensemble> {
        match self.entries.as_slice() {
            [(_, ensemble)] => Some(ensemble),
            _ => None,
        }
    }
}
