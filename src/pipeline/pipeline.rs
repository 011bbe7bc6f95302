//! Staged analog-forecast pipeline.

use crate::analogs::{
    extract_analogs, select_analogs, AnalogSelection, Ensemble, EnsembleKey, EnsembleMember,
    KeyedEnsemble, SelectionConfig,
};
use crate::core::Series;
use crate::criteria::{CriterionRegistry, CriterionSeries};
use crate::error::{AnalogError, Result};
use crate::pipeline::config::{
    CriterionConfig, ExtractionSweepConfig, PipelineConfig, StandardizationConfig,
};
use crate::split::{split_data, SplitConfig, SplitData, SplitResult};
use crate::standardize::{BoxedStandardizer, StandardizerRegistry};
use crate::store::{ArtifactKey, ArtifactStore, ArtifactStoreExt};
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;

/// Progress of a pipeline, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    DataLoaded,
    Standardized,
    Split,
    CriterionComputed,
    AnalogsSelected,
    EnsembleExtracted,
}

impl Stage {
    pub fn name(self) -> &'static str {
        match self {
            Stage::DataLoaded => "data-loaded",
            Stage::Standardized => "standardized",
            Stage::Split => "split",
            Stage::CriterionComputed => "criterion-computed",
            Stage::AnalogsSelected => "analogs-selected",
            Stage::EnsembleExtracted => "ensemble-extracted",
        }
    }
}

/// Where the primary series comes from.
pub enum DataSource {
    Series(Series),
    Stored {
        store: Arc<dyn ArtifactStore>,
        key: ArtifactKey,
    },
}

/// Builder for [`Pipeline`]; exactly one data source must be given.
#[derive(Default)]
pub struct PipelineBuilder {
    series: Option<Series>,
    stored: Option<(Arc<dyn ArtifactStore>, ArtifactKey)>,
    extra: Vec<Series>,
    config: PipelineConfig,
    criteria: Option<CriterionRegistry>,
    standardizers: Option<StandardizerRegistry>,
}

impl PipelineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn series(mut self, series: Series) -> Self {
        self.series = Some(series);
        self
    }

    /// Load the primary series from `store` at build time.
    pub fn load(mut self, store: Arc<dyn ArtifactStore>, key: ArtifactKey) -> Self {
        self.stored = Some((store, key));
        self
    }

    pub fn source(self, source: DataSource) -> Self {
        match source {
            DataSource::Series(series) => self.series(series),
            DataSource::Stored { store, key } => self.load(store, key),
        }
    }

    /// Auxiliary datasets searched for analogs alongside the primary series.
    pub fn extra_series(mut self, extra: Vec<Series>) -> Self {
        self.extra = extra;
        self
    }

    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn criteria(mut self, registry: CriterionRegistry) -> Self {
        self.criteria = Some(registry);
        self
    }

    pub fn standardizers(mut self, registry: StandardizerRegistry) -> Self {
        self.standardizers = Some(registry);
        self
    }

    pub fn build(self) -> Result<Pipeline> {
        self.config.validate()?;
        let data = match (self.series, self.stored) {
            (Some(series), None) => series,
            (None, Some((store, key))) => {
                tracing::debug!(key = %key, "loading series");
                store.load::<Series>(&key)?
            }
            (Some(_), Some(_)) => {
                return Err(AnalogError::Configuration(
                    "provide either a series or a load key, not both".to_string(),
                ))
            }
            (None, None) => {
                return Err(AnalogError::Configuration(
                    "a series or a load key is required".to_string(),
                ))
            }
        };
        if data.is_empty() {
            return Err(AnalogError::EmptyData);
        }

        Ok(Pipeline {
            config: self.config,
            criteria: self.criteria.unwrap_or_default(),
            standardizers: self.standardizers.unwrap_or_default(),
            original: data.clone(),
            original_extra: self.extra.clone(),
            data,
            extra: self.extra,
            standardizer: None,
            stage: Stage::DataLoaded,
            split: None,
            criterion: None,
            selection: None,
            ensembles: None,
        })
    }
}

/// Splitting, criterion, selection and extraction over one series.
///
/// Every stage can be re-run on its own, with the stored configuration or an
/// override; re-running a stage discards the results of the stages after it.
///
/// # Example
///
/// ```
/// use analog_forecast::core::Series;
/// use analog_forecast::pipeline::{Pipeline, PipelineConfig, Stage};
/// use analog_forecast::split::{DateSpec, SplitConfig};
/// use chrono::{Duration, TimeZone, Utc};
///
/// let base = Utc.with_ymd_and_hms(2003, 6, 1, 0, 0, 0).unwrap();
/// let ts = (0..200).map(|i| base + Duration::hours(i)).collect();
/// let values = (0..200).map(|i| ((i % 24) as f64).sin()).collect();
/// let series = Series::univariate(ts, "V", values).unwrap();
///
/// let config = PipelineConfig::new().with_split(
///     SplitConfig::new()
///         .with_pattern_end(DateSpec::Row(149))
///         .with_pattern_count(12),
/// );
/// let mut pipeline = Pipeline::builder().series(series).config(config).build().unwrap();
/// pipeline.run().unwrap();
///
/// assert_eq!(pipeline.stage(), Stage::EnsembleExtracted);
/// let ensemble = pipeline.ensemble().unwrap();
/// assert!(ensemble.len() > 0);
/// assert_eq!(ensemble.window_len(), 24);
/// ```
pub struct Pipeline {
    config: PipelineConfig,
    criteria: CriterionRegistry,
    standardizers: StandardizerRegistry,
    original: Series,
    original_extra: Vec<Series>,
    data: Series,
    extra: Vec<Series>,
    standardizer: Option<BoxedStandardizer>,
    stage: Stage,
    split: Option<(SplitResult, SplitData)>,
    criterion: Option<CriterionSeries>,
    selection: Option<AnalogSelection>,
    ensembles: Option<KeyedEnsemble>,
}

impl Pipeline {
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::new()
    }

    /// Run every stage with the stored configuration; standardization only
    /// when configured.
    pub fn run(&mut self) -> Result<()> {
        if self.config.standardization.is_some() {
            self.standardize()?;
        }
        self.split()?;
        self.compute_criterion()?;
        self.select_analogs()?;
        self.extract_ensemble()?;
        Ok(())
    }

    fn require(&self, stage: Stage, requires: Stage) -> Result<()> {
        if self.stage < requires {
            return Err(AnalogError::StageOrder {
                stage: stage.name(),
                requires: requires.name(),
            });
        }
        Ok(())
    }

    // results past `stage` no longer match their inputs
    fn reach(&mut self, stage: Stage) {
        if stage < Stage::Split {
            self.split = None;
        }
        if stage < Stage::CriterionComputed {
            self.criterion = None;
        }
        if stage < Stage::AnalogsSelected {
            self.selection = None;
        }
        if stage < Stage::EnsembleExtracted {
            self.ensembles = None;
        }
        self.stage = stage;
        tracing::debug!(stage = stage.name(), "pipeline stage complete");
    }

    // ==================== standardization ====================

    pub fn standardize(&mut self) -> Result<()> {
        let config = self.config.standardization.clone().ok_or_else(|| {
            AnalogError::Configuration("no standardization configured".to_string())
        })?;
        self.standardize_with(config)
    }

    pub fn standardize_with(&mut self, config: StandardizationConfig) -> Result<()> {
        config.validate()?;
        let mut standardizer = self.standardizers.create(&config.name)?;
        if let Some(matrix) = config.conversion_matrix.clone() {
            standardizer.load_conversion_matrix(matrix);
        }
        standardizer.fit(&self.original, config.columns.as_deref())?;
        self.config.standardization = Some(config);
        self.apply_standardizer(standardizer)
    }

    /// Standardize with a prepared (already fitted or explicitly parametrised) transform.
    pub fn standardize_using(&mut self, standardizer: BoxedStandardizer) -> Result<()> {
        self.apply_standardizer(standardizer)
    }

    fn apply_standardizer(&mut self, standardizer: BoxedStandardizer) -> Result<()> {
        self.data = standardizer.standardize(&self.original)?;
        self.extra = self
            .original_extra
            .iter()
            .map(|s| standardizer.standardize(s))
            .collect::<Result<_>>()?;
        tracing::info!(standardizer = standardizer.name(), "series standardized");
        self.standardizer = Some(standardizer);
        self.reach(Stage::Standardized);
        Ok(())
    }

    /// Map a standardized series back to physical values.
    pub fn unstandardize(&self, series: &Series) -> Result<Series> {
        match &self.standardizer {
            Some(standardizer) => standardizer.unstandardize(series),
            None => Ok(series.clone()),
        }
    }

    /// Map every member of a standardized ensemble back to physical values.
    pub fn unstandardize_ensemble(&self, ensemble: &Ensemble) -> Result<Ensemble> {
        let standardizer = match &self.standardizer {
            Some(s) => s,
            None => return Ok(ensemble.clone()),
        };
        let mut out = Ensemble::new(
            ensemble.columns().to_vec(),
            ensemble.pattern_len(),
            ensemble.forecast_len(),
        );
        // members may be padded, so they travel on a synthetic index
        let index: Vec<DateTime<Utc>> = (0..ensemble.window_len() as i64)
            .map(|i| DateTime::<Utc>::UNIX_EPOCH + Duration::seconds(i))
            .collect();
        for member in ensemble.members() {
            let standard = Series::new(
                index.clone(),
                ensemble.columns().to_vec(),
                member.values_by_column().to_vec(),
            )?;
            let physical = standardizer.unstandardize(&standard)?;
            out.push(EnsembleMember::new(
                member.analog,
                member.score,
                member.timestamps.clone(),
                physical.values_by_column().to_vec(),
            )?)?;
        }
        Ok(out)
    }

    // ==================== split ====================

    pub fn split(&mut self) -> Result<()> {
        let config = self.config.split.clone();
        self.split_with(config)
    }

    pub fn split_with(&mut self, config: SplitConfig) -> Result<()> {
        let (result, data) = split_data(&self.data, &config, &self.extra)?;
        tracing::info!(
            pattern_start = result.pattern.start,
            pattern_count = result.pattern_count,
            test_count = result.test_count,
            train_segments = data.train.len(),
            "series split"
        );
        self.config.split = config;
        self.split = Some((result, data));
        self.reach(Stage::Split);
        Ok(())
    }

    // ==================== criterion ====================

    pub fn compute_criterion(&mut self) -> Result<()> {
        let config = self.config.criterion.clone();
        self.compute_criterion_with(config)
    }

    /// Slide the criterion over every training segment against the pattern.
    pub fn compute_criterion_with(&mut self, config: CriterionConfig) -> Result<()> {
        self.require(Stage::CriterionComputed, Stage::Split)?;
        config.validate()?;
        let criterion = self.criteria.create(&config.name)?;
        let (_, data) = self.split.as_ref().ok_or(AnalogError::StageOrder {
            stage: Stage::CriterionComputed.name(),
            requires: Stage::Split.name(),
        })?;

        let window = data.pattern.len();
        let mut parts = Vec::with_capacity(data.train.len());
        for train in &data.train {
            if train.len() < window.max(2) {
                tracing::debug!(rows = train.len(), window, "training segment too short, skipped");
                continue;
            }
            parts.push(criterion.moving_application(train, Some(&data.pattern), &config.moving)?);
        }
        if parts.is_empty() {
            return Err(AnalogError::InsufficientData {
                needed: window,
                got: data.train.iter().map(Series::len).max().unwrap_or(0),
            });
        }
        let scores = CriterionSeries::concat(&parts)?;
        tracing::info!(criterion = %config.name, rows = scores.len(), "criterion computed");

        self.config.criterion = config;
        self.criterion = Some(scores);
        self.reach(Stage::CriterionComputed);
        Ok(())
    }

    /// Use previously computed scores instead of recomputing them.
    pub fn restore_criterion(&mut self, scores: CriterionSeries) -> Result<()> {
        self.require(Stage::CriterionComputed, Stage::Split)?;
        if !self.criteria.contains(scores.criterion()) {
            return Err(AnalogError::UnknownComponent {
                kind: "criterion",
                name: scores.criterion().to_string(),
            });
        }
        self.config.criterion.name = scores.criterion().to_string();
        self.criterion = Some(scores);
        self.reach(Stage::CriterionComputed);
        Ok(())
    }

    // ==================== analogs ====================

    pub fn select_analogs(&mut self) -> Result<()> {
        let config = self.config.selection.clone();
        self.select_analogs_with(config)
    }

    pub fn select_analogs_with(&mut self, config: SelectionConfig) -> Result<()> {
        self.require(Stage::AnalogsSelected, Stage::CriterionComputed)?;
        let scores = self.criterion.as_ref().ok_or(AnalogError::StageOrder {
            stage: Stage::AnalogsSelected.name(),
            requires: Stage::CriterionComputed.name(),
        })?;
        let criterion = self.criteria.create(scores.criterion())?;
        let selection = select_analogs(scores, criterion.as_ref(), &config)?;

        self.config.selection = config;
        self.selection = Some(selection);
        self.reach(Stage::AnalogsSelected);
        Ok(())
    }

    pub fn extract_ensemble(&mut self) -> Result<()> {
        let config = self.config.extraction.clone();
        self.extract_ensemble_with(config)
    }

    /// Extract one ensemble per analog set and swept extraction count.
    ///
    /// Window sizes default to the pattern and test lengths of the split.
    pub fn extract_ensemble_with(&mut self, config: ExtractionSweepConfig) -> Result<()> {
        self.require(Stage::EnsembleExtracted, Stage::AnalogsSelected)?;
        let selection = self.selection.as_ref().ok_or(AnalogError::StageOrder {
            stage: Stage::EnsembleExtracted.name(),
            requires: Stage::AnalogsSelected.name(),
        })?;
        let (split, _) = self.split.as_ref().ok_or(AnalogError::StageOrder {
            stage: Stage::EnsembleExtracted.name(),
            requires: Stage::Split.name(),
        })?;

        let mut sources = Vec::with_capacity(1 + self.extra.len());
        sources.push(&self.data);
        sources.extend(self.extra.iter());

        let mut ensembles = KeyedEnsemble::new();
        for set in selection.sets() {
            for (nb_extracted, mut extraction) in config.runs() {
                extraction.pattern_len = extraction.pattern_len.or(Some(split.pattern_count));
                extraction.forecast_len = extraction.forecast_len.or(Some(split.test_count));
                let ensemble = extract_analogs(&sources, set.analogs(), &extraction)?;
                ensembles.push(
                    EnsembleKey {
                        column: set.column.clone(),
                        blind_window: set.blind_window,
                        nb_extracted,
                    },
                    ensemble,
                );
            }
        }
        tracing::info!(ensembles = ensembles.len(), "ensembles extracted");

        self.config.extraction = config;
        self.ensembles = Some(ensembles);
        self.reach(Stage::EnsembleExtracted);
        Ok(())
    }

    // ==================== accessors ====================

    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Configuration in effect, overrides included.
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Working data, standardized when a standardizer ran.
    pub fn data(&self) -> &Series {
        &self.data
    }

    pub fn original_data(&self) -> &Series {
        &self.original
    }

    pub fn extra_series(&self) -> &[Series] {
        &self.extra
    }

    pub fn standardizer(&self) -> Option<&BoxedStandardizer> {
        self.standardizer.as_ref()
    }

    pub fn split_result(&self) -> Option<&SplitResult> {
        self.split.as_ref().map(|(r, _)| r)
    }

    pub fn split_data(&self) -> Option<&SplitData> {
        self.split.as_ref().map(|(_, d)| d)
    }

    pub fn criterion(&self) -> Option<&CriterionSeries> {
        self.criterion.as_ref()
    }

    pub fn selection(&self) -> Option<&AnalogSelection> {
        self.selection.as_ref()
    }

    pub fn ensembles(&self) -> Option<&KeyedEnsemble> {
        self.ensembles.as_ref()
    }

    /// The ensemble of an unswept run.
    pub fn ensemble(&self) -> Option<&Ensemble> {
        self.ensembles.as_ref().and_then(KeyedEnsemble::single)
    }
}
