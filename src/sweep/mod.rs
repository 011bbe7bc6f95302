//! Many independent pipeline runs over quantities, pattern lengths and dates.
//!
//! Each job splits the data around its pattern end, records its parameters,
//! computes (or reloads) its criterion and records its analogs. Artifacts
//! already present in the store are not recomputed, so an interrupted sweep
//! can simply be restarted.

use crate::analogs::{AnalogSelection, SelectionConfig};
use crate::core::{scaled_duration, Series};
use crate::criteria::CriterionSeries;
use crate::error::{AnalogError, Result};
use crate::pipeline::{CriterionConfig, Pipeline, PipelineConfig};
use crate::split::{DateSpec, SplitConfig};
use crate::store::{describe, ArtifactKey, ArtifactStore, ArtifactStoreExt};
use chrono::{DateTime, Duration, Utc};
use rayon::prelude::*;
use rayon::ThreadPoolBuilder;
use serde::{Deserialize, Serialize};

/// One `(quantity, pattern length, pattern end)` combination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepJob {
    pub quantity: String,
    pub pattern_len: usize,
    pub pattern_end: DateTime<Utc>,
    pub name: String,
}

impl SweepJob {
    pub fn new(quantity: impl Into<String>, pattern_len: usize, pattern_end: DateTime<Utc>) -> Self {
        let quantity = quantity.into();
        let name = job_name(&quantity, pattern_len, pattern_end);
        Self {
            quantity,
            pattern_len,
            pattern_end,
            name,
        }
    }
}

/// `<quantity>_LP<len>_<yyyymmddHHMMSS>`.
pub fn job_name(quantity: &str, pattern_len: usize, pattern_end: DateTime<Utc>) -> String {
    format!(
        "{}_LP{}_{}",
        quantity,
        pattern_len,
        pattern_end.format("%Y%m%d%H%M%S")
    )
}

/// Cartesian product of the sweep axes, quantity-major.
pub fn job_grid(
    quantities: &[String],
    pattern_lengths: &[usize],
    pattern_ends: &[DateTime<Utc>],
) -> Vec<SweepJob> {
    let mut jobs = Vec::with_capacity(quantities.len() * pattern_lengths.len() * pattern_ends.len());
    for quantity in quantities {
        for &len in pattern_lengths {
            for &end in pattern_ends {
                jobs.push(SweepJob::new(quantity.clone(), len, end));
            }
        }
    }
    jobs
}

/// Settings shared by every job of a sweep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepConfig {
    /// Store location under which `<quantity>/<job name>/` is created.
    pub location: String,
    pub workers: usize,
    /// Persist computed criterion series for later reuse.
    pub save_criterion: bool,
    /// Row spacing used to turn a pattern length into a duration; the pattern
    /// length is a row count when `None`.
    #[serde(with = "crate::core::serde_ext::option_duration_ms")]
    pub pattern_resolution: Option<Duration>,
    /// Criterion settings; the scored columns are set to the job's quantity.
    pub criterion: CriterionConfig,
    pub selection: SelectionConfig,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            location: "forecast".to_string(),
            workers: 8,
            save_criterion: false,
            pattern_resolution: None,
            criterion: CriterionConfig::default(),
            selection: SelectionConfig::default(),
        }
    }
}

impl SweepConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = location.into();
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_save_criterion(mut self, save: bool) -> Self {
        self.save_criterion = save;
        self
    }

    pub fn with_pattern_resolution(mut self, resolution: Duration) -> Self {
        self.pattern_resolution = Some(resolution);
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

    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(AnalogError::InvalidParameter(
                "a sweep needs at least one worker".to_string(),
            ));
        }
        self.criterion.validate()?;
        self.selection.validate()
    }

    fn split_for(&self, job: &SweepJob) -> Result<SplitConfig> {
        let split = SplitConfig::new().with_pattern_end(DateSpec::Time(job.pattern_end));
        Ok(match self.pattern_resolution {
            Some(resolution) => {
                split.with_pattern_duration(scaled_duration(resolution, job.pattern_len)?)
            }
            None => split.with_pattern_count(job.pattern_len),
        })
    }

    fn pipeline_for(&self, job: &SweepJob) -> Result<PipelineConfig> {
        let mut criterion = self.criterion.clone();
        criterion.moving.columns = Some(vec![job.quantity.clone()]);
        Ok(PipelineConfig::new()
            .with_split(self.split_for(job)?)
            .with_criterion(criterion)
            .with_selection(self.selection.clone()))
    }
}

/// Artifact keys of a job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobKeys {
    pub params: ArtifactKey,
    pub criterion: ArtifactKey,
    pub analogues: ArtifactKey,
}

impl JobKeys {
    pub fn new(config: &SweepConfig, job: &SweepJob) -> Self {
        let location = format!("{}/{}/{}", config.location, job.quantity, job.name);
        Self {
            params: ArtifactKey::json(&location, format!("params_pipeline_{}", job.name)),
            criterion: ArtifactKey::json(&location, format!("criterion_{}", job.name)),
            analogues: ArtifactKey::json(&location, format!("analogues_{}", job.name)),
        }
    }
}

/// First and last timestamp of a window.
pub type Span = [DateTime<Utc>; 2];

/// What a job records about its split and configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordedParams {
    pub quantity: String,
    pub data: Span,
    pub pattern: Span,
    pub test: Span,
    pub train: Vec<Span>,
    pub config: PipelineConfig,
}

/// A criterion series with the settings that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordedCriterion {
    pub criterion: CriterionSeries,
    pub config: CriterionConfig,
}

/// What a job did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobOutcome {
    pub name: String,
    pub criterion_reused: bool,
    pub analogues_recorded: bool,
}

fn span(series: &Series, window: &crate::core::Window) -> Result<Span> {
    Ok([series.timestamp(window.start)?, series.timestamp(window.end)?])
}

/// Run one job against `store`.
pub fn record_analogs(
    job: &SweepJob,
    primary: &Series,
    extra: &[Series],
    config: &SweepConfig,
    store: &dyn ArtifactStore,
) -> Result<JobOutcome> {
    let keys = JobKeys::new(config, job);
    let columns = [job.quantity.clone()];
    let data = primary.select_columns(&columns)?;
    let extra = extra
        .iter()
        .map(|s| s.select_columns(&columns))
        .collect::<Result<Vec<_>>>()?;

    let mut pipeline = Pipeline::builder()
        .series(data)
        .extra_series(extra)
        .config(config.pipeline_for(job)?)
        .build()?;
    pipeline.split()?;

    let split = pipeline
        .split_result()
        .ok_or_else(|| AnalogError::Configuration("split did not run".to_string()))?;
    let series = pipeline.data();
    let full = crate::core::Window::new(0, series.len() - 1)?;
    let params = RecordedParams {
        quantity: job.quantity.clone(),
        data: span(series, &full)?,
        pattern: span(series, &split.pattern)?,
        test: span(series, &split.test)?,
        train: split
            .train_windows()
            .iter()
            .map(|w| span(series, w))
            .collect::<Result<_>>()?,
        config: pipeline.config().clone(),
    };
    if store.exists(&keys.params) {
        tracing::warn!(key = %keys.params, "parameters already recorded, overwriting");
    }
    store.save(
        &keys.params,
        &params,
        describe(format!(
            "Parameters of the forecast of {} for pattern end date = {} with pattern length {}.",
            job.quantity, job.pattern_end, job.pattern_len
        )),
    )?;

    let criterion_reused = store.exists(&keys.criterion);
    if criterion_reused {
        tracing::info!(key = %keys.criterion, "using recorded criterion");
        let recorded: RecordedCriterion = store.load(&keys.criterion)?;
        pipeline.restore_criterion(recorded.criterion)?;
    } else {
        pipeline.compute_criterion()?;
        if config.save_criterion {
            let recorded = RecordedCriterion {
                criterion: pipeline
                    .criterion()
                    .cloned()
                    .ok_or(AnalogError::EmptyData)?,
                config: pipeline.config().criterion.clone(),
            };
            let mut metadata = describe(format!(
                "Criterion of the forecast of {} for pattern end date = {} with pattern length {}.",
                job.quantity, job.pattern_end, job.pattern_len
            ));
            metadata.insert("params".to_string(), keys.params.to_string().into());
            store.save(&keys.criterion, &recorded, metadata)?;
        }
    }

    let analogues_recorded = !store.exists(&keys.analogues);
    if analogues_recorded {
        pipeline.select_analogs()?;
        let selection: &AnalogSelection = pipeline.selection().ok_or(AnalogError::EmptyData)?;
        let mut metadata = describe(format!(
            "Analogues of the forecast of {} for pattern end date = {} with pattern length {}.",
            job.quantity, job.pattern_end, job.pattern_len
        ));
        metadata.insert("params".to_string(), keys.params.to_string().into());
        metadata.insert("criterion".to_string(), keys.criterion.to_string().into());
        store.save(&keys.analogues, selection, metadata)?;
    } else {
        tracing::info!(key = %keys.analogues, "analogues already recorded");
    }

    Ok(JobOutcome {
        name: job.name.clone(),
        criterion_reused,
        analogues_recorded,
    })
}

/// Outcome of a whole sweep.
#[derive(Debug, Default)]
pub struct SweepReport {
    pub completed: Vec<JobOutcome>,
    /// Job names with the error that stopped them.
    pub failed: Vec<(String, AnalogError)>,
}

impl SweepReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Run every job on a pool of `config.workers` threads.
///
/// A failing job is logged and reported; the others are unaffected.
pub fn run_sweep(
    jobs: &[SweepJob],
    primary: &Series,
    extra: &[Series],
    config: &SweepConfig,
    store: &dyn ArtifactStore,
) -> Result<SweepReport> {
    config.validate()?;
    let pool = ThreadPoolBuilder::new()
        .num_threads(config.workers)
        .build()
        .map_err(|err| AnalogError::Configuration(format!("failed to build worker pool: {}", err)))?;

    tracing::info!(jobs = jobs.len(), workers = config.workers, "sweep started");
    let results: Vec<(String, Result<JobOutcome>)> = pool.install(|| {
        jobs.par_iter()
            .map(|job| {
                let started = std::time::Instant::now();
                let result = record_analogs(job, primary, extra, config, store);
                tracing::debug!(
                    job = %job.name,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "job finished"
                );
                (job.name.clone(), result)
            })
            .collect()
    });

    let mut report = SweepReport::default();
    for (name, result) in results {
        match result {
            Ok(outcome) => report.completed.push(outcome),
            Err(err) => {
                tracing::warn!(job = %name, error = %err, "job failed, skipped");
                report.failed.push((name, err));
            }
        }
    }
    tracing::info!(
        completed = report.completed.len(),
        failed = report.failed.len(),
        "sweep finished"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analogs::BlindWindow;
    use crate::store::MemoryStore;
    use chrono::TimeZone;

    fn solar_wind(n: usize) -> Series {
        let base = Utc.with_ymd_and_hms(2004, 5, 3, 0, 0, 0).unwrap();
        Series::builder()
            .timestamps((0..n).map(|i| base + Duration::hours(i as i64)).collect())
            .column(
                "V",
                (0..n)
                    .map(|i| 450.0 + 80.0 * (i as f64 * std::f64::consts::PI / 12.0).cos())
                    .collect(),
            )
            .column("N", (0..n).map(|i| 4.0 + (i % 5) as f64).collect())
            .build()
            .unwrap()
    }

    fn hour(h: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2004, 5, 3, 0, 0, 0).unwrap() + Duration::hours(h)
    }

    fn config() -> SweepConfig {
        SweepConfig::new().with_workers(2).with_selection(
            SelectionConfig::new()
                .with_nb_analogs(5)
                .with_blind_window(BlindWindow::symmetric(Duration::hours(6))),
        )
    }

    #[test]
    fn names_and_grid() {
        assert_eq!(job_name("V", 24, hour(13)), "V_LP24_20040503130000");
        let jobs = job_grid(&["V".into(), "N".into()], &[12, 24], &[hour(100), hour(150)]);
        assert_eq!(jobs.len(), 8);
        assert_eq!(jobs[0].name, "V_LP12_20040507040000");
        assert_eq!(jobs[7].quantity, "N");
    }

    #[test]
    fn job_records_artifacts_and_memoizes() {
        let store = MemoryStore::new();
        let series = solar_wind(300);
        let config = config().with_save_criterion(true);
        let job = SweepJob::new("V", 24, hour(150));
        let keys = JobKeys::new(&config, &job);

        let first = record_analogs(&job, &series, &[], &config, &store).unwrap();
        assert!(!first.criterion_reused);
        assert!(first.analogues_recorded);
        assert!(store.exists(&keys.params));
        assert!(store.exists(&keys.criterion));

        let params: RecordedParams = store.load(&keys.params).unwrap();
        assert_eq!(params.pattern, [hour(127), hour(150)]);
        assert_eq!(params.config.criterion.moving.columns, Some(vec!["V".to_string()]));

        let selection: AnalogSelection = store.load(&keys.analogues).unwrap();
        assert_eq!(selection.single().unwrap().len(), 5);

        let second = record_analogs(&job, &series, &[], &config, &store).unwrap();
        assert!(second.criterion_reused);
        assert!(!second.analogues_recorded);
    }

    #[test]
    fn criterion_not_saved_by_default() {
        let store = MemoryStore::new();
        let config = config();
        let job = SweepJob::new("N", 10, hour(200));
        record_analogs(&job, &solar_wind(300), &[], &config, &store).unwrap();
        let keys = JobKeys::new(&config, &job);
        assert!(!store.exists(&keys.criterion));
        assert!(store.exists(&keys.analogues));
    }

    #[test]
    fn duration_pattern_length() {
        let store = MemoryStore::new();
        let config = config().with_pattern_resolution(Duration::hours(1));
        let job = SweepJob::new("V", 6, hour(100));
        record_analogs(&job, &solar_wind(300), &[], &config, &store).unwrap();
        let params: RecordedParams = store.load(&JobKeys::new(&config, &job).params).unwrap();
        assert_eq!(params.pattern, [hour(95), hour(100)]);
    }

    #[test]
    fn oversized_pattern_duration_fails_the_job() {
        let store = MemoryStore::new();
        let config = config().with_pattern_resolution(Duration::hours(1));
        let job = SweepJob::new("V", usize::MAX, hour(100));
        let err = record_analogs(&job, &solar_wind(300), &[], &config, &store).unwrap_err();
        assert!(matches!(err, AnalogError::InvalidParameter(_)));
        assert!(!store.exists(&JobKeys::new(&config, &job).analogues));
    }

    #[test]
    fn failing_jobs_do_not_stop_the_sweep() {
        let store = MemoryStore::new();
        let series = solar_wind(300);
        let jobs = vec![
            SweepJob::new("V", 12, hour(100)),
            SweepJob::new("Bz", 12, hour(100)),
            SweepJob::new("N", 12, hour(200)),
        ];
        let report = run_sweep(&jobs, &series, &[], &config(), &store).unwrap();
        assert_eq!(report.completed.len(), 2);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, "Bz_LP12_20040507040000");
        assert!(report.failed[0].1.is_configuration());
        assert!(!report.is_success());
    }

    #[test]
    fn zero_workers_rejected() {
        let store = MemoryStore::new();
        let result = run_sweep(&[], &solar_wind(10), &[], &config().with_workers(0), &store);
        assert!(result.is_err());
    }
}
