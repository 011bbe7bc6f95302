//! Slicing of fixed-size windows around selected analogs.

use crate::analogs::{Analog, Ensemble, EnsembleMember};
use crate::core::Series;
use crate::error::{AnalogError, Result};
use serde::{Deserialize, Serialize};

/// Window geometry of an extraction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Known-history rows, up to and including the anchor. Taken from the
    /// pattern window by the pipeline when `None`.
    pub pattern_len: Option<usize>,
    /// Rows after the anchor; the pattern length when `None`.
    pub forecast_len: Option<usize>,
    /// Shift of the anchor from the analog row; 0 anchors the pattern end on it.
    pub anchor_offset: i64,
    /// Extract only the first analogs.
    pub nb_extracted: Option<usize>,
}

impl ExtractionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pattern_len(mut self, rows: usize) -> Self {
        self.pattern_len = Some(rows);
        self
    }

    pub fn with_forecast_len(mut self, rows: usize) -> Self {
        self.forecast_len = Some(rows);
        self
    }

    pub fn with_anchor_offset(mut self, rows: i64) -> Self {
        self.anchor_offset = rows;
        self
    }

    pub fn with_nb_extracted(mut self, nb: usize) -> Self {
        self.nb_extracted = Some(nb);
        self
    }

    /// `(pattern_len, forecast_len)`.
    pub fn window_sizes(&self) -> Result<(usize, usize)> {
        let pattern_len = self.pattern_len.ok_or_else(|| {
            AnalogError::Configuration("extraction needs a pattern length".to_string())
        })?;
        let forecast_len = self.forecast_len.unwrap_or(pattern_len);
        if pattern_len + forecast_len == 0 {
            return Err(AnalogError::InvalidParameter(
                "extraction window is empty".to_string(),
            ));
        }
        Ok((pattern_len, forecast_len))
    }
}

/// Stack the windows around `analogs` into an [`Ensemble`].
///
/// Each analog timestamp is looked up in the first of `sources` that holds it,
/// so extra datasets can contribute analogs found in them. Analogs absent
/// from every source are skipped. Rows falling outside the source are
/// NaN-padded, and columns the source lacks are NaN, so every member spans
/// exactly `pattern_len + forecast_len` rows over the first source's columns.
pub fn extract_analogs(
    sources: &[&Series],
    analogs: &[Analog],
    config: &ExtractionConfig,
) -> Result<Ensemble> {
    let primary = sources.first().ok_or(AnalogError::EmptyData)?;
    let (pattern_len, forecast_len) = config.window_sizes()?;
    let columns = primary.columns().to_vec();
    let mut ensemble = Ensemble::new(columns.clone(), pattern_len, forecast_len);

    let take = config.nb_extracted.unwrap_or(analogs.len());
    for analog in analogs.iter().take(take) {
        let found = sources
            .iter()
            .find_map(|s| s.position(analog.timestamp).map(|row| (*s, row)));
        let (source, row) = match found {
            Some(hit) => hit,
            None => {
                tracing::warn!(analog = %analog.timestamp, "analog not found in any source, skipped");
                continue;
            }
        };

        let anchor = row as i64 + config.anchor_offset;
        let first = anchor - pattern_len as i64 + 1;
        let rows: Vec<Option<usize>> = (0..(pattern_len + forecast_len) as i64)
            .map(|k| {
                let r = first + k;
                (r >= 0 && (r as usize) < source.len()).then_some(r as usize)
            })
            .collect();

        let timestamps = rows
            .iter()
            .map(|r| r.map(|i| source.timestamps()[i]))
            .collect();
        let values = columns
            .iter()
            .map(|name| match source.column(name) {
                Ok(col) => rows
                    .iter()
                    .map(|r| r.map_or(f64::NAN, |i| col[i]))
                    .collect(),
                Err(_) => vec![f64::NAN; rows.len()],
            })
            .collect();
        ensemble.push(EnsembleMember::new(
            analog.timestamp,
            analog.score,
            timestamps,
            values,
        )?)?;
    }

    tracing::debug!(
        members = ensemble.len(),
        pattern_len,
        forecast_len,
        "ensemble extracted"
    );
    Ok(ensemble)
}
