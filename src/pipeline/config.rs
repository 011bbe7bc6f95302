//! Typed configuration of a pipeline run.

use crate::analogs::{ExtractionConfig, SelectionConfig};
use crate::criteria::MovingConfig;
use crate::error::{AnalogError, Result};
use crate::split::SplitConfig;
use crate::standardize::ConversionMatrix;
use serde::{Deserialize, Serialize};

/// Which criterion to slide over the training data, and how.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CriterionConfig {
    /// Registry name.
    pub name: String,
    pub moving: MovingConfig,
}

impl Default for CriterionConfig {
    fn default() -> Self {
        Self {
            name: "mse".to_string(),
            moving: MovingConfig::default(),
        }
    }
}

impl CriterionConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_moving(mut self, moving: MovingConfig) -> Self {
        self.moving = moving;
        self
    }

    /// Shortcut for the scored columns.
    pub fn with_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.moving = self.moving.with_columns(columns);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(AnalogError::Configuration(
                "a criterion name is required".to_string(),
            ));
        }
        self.moving.validate()
    }
}

/// Standardizer applied before splitting.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StandardizationConfig {
    /// Registry name.
    pub name: String,
    /// Columns to transform; all of them when `None`.
    pub columns: Option<Vec<String>>,
    /// Lookup tables installed before fitting.
    pub conversion_matrix: Option<ConversionMatrix>,
}

impl StandardizationConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = Some(columns.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_conversion_matrix(mut self, matrix: ConversionMatrix) -> Self {
        self.conversion_matrix = Some(matrix);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(AnalogError::Configuration(
                "a standardizer name is required".to_string(),
            ));
        }
        Ok(())
    }
}

/// Extraction geometry plus an optional sweep over the number of extracted analogs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionSweepConfig {
    pub extraction: ExtractionConfig,
    /// One ensemble per entry; `extraction.nb_extracted` alone when empty.
    pub nb_extracted: Vec<usize>,
}

impl ExtractionSweepConfig {
    pub fn new(extraction: ExtractionConfig) -> Self {
        Self {
            extraction,
            nb_extracted: Vec::new(),
        }
    }

    pub fn with_nb_extracted(mut self, counts: Vec<usize>) -> Self {
        self.nb_extracted = counts;
        self
    }

    pub fn is_sweep(&self) -> bool {
        !self.nb_extracted.is_empty()
    }

    /// Concrete extraction runs, tagged by the swept count.
    pub fn runs(&self) -> Vec<(Option<usize>, ExtractionConfig)> {
        if self.nb_extracted.is_empty() {
            return vec![(None, self.extraction.clone())];
        }
        self.nb_extracted
            .iter()
            .map(|&n| (Some(n), self.extraction.clone().with_nb_extracted(n)))
            .collect()
    }
}

/// Parameters of every pipeline stage.
///
/// # Example
///
/// ```
/// use analog_forecast::pipeline::PipelineConfig;
///
/// let config = PipelineConfig::from_json_str(
///     r#"{
///         "split": {"pattern": {"end": "2003-06-12 00:00:00", "duration": 86400000}},
///         "criterion": {"name": "mse", "moving": {"columns": ["V"]}},
///         "selection": {"nb_analogs": 50, "blind_windows": [{"before": 86400000, "after": 86400000}]},
///         "extraction": {"nb_extracted": [5, 10]}
///     }"#,
/// )
/// .unwrap();
/// assert_eq!(config.selection.nb_analogs, 50);
/// assert_eq!(config.extraction.runs().len(), 2);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub standardization: Option<StandardizationConfig>,
    pub split: SplitConfig,
    pub criterion: CriterionConfig,
    pub selection: SelectionConfig,
    pub extraction: ExtractionSweepConfig,
}

impl PipelineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse and validate a JSON parameter document.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn with_standardization(mut self, standardization: StandardizationConfig) -> Self {
        self.standardization = Some(standardization);
        self
    }

    pub fn with_split(mut self, split: SplitConfig) -> Self {
        self.split = split;
        self
    }

    pub fn with_criterion(mut self, criterion: CriterionConfig) -> Self {
        self.criterion = criterion;
        self
    }

    pub fn with_selection(mut self, selection: SelectionConfig) -> Self {
        self.selection = selection;
        self
    }

    pub fn with_extraction(mut self, extraction: ExtractionSweepConfig) -> Self {
        self.extraction = extraction;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(standardization) = &self.standardization {
            standardization.validate()?;
        }
        self.criterion.validate()?;
        self.selection.validate()?;
        if self.extraction.nb_extracted.contains(&0) {
            return Err(AnalogError::InvalidParameter(
                "nb_extracted entries must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
