//! # analog-forecast
//!
//! Analog-ensemble forecasting of multivariate time series.
//!
//! A recent window of data (the pattern) is compared against every window of
//! the history with a similarity criterion. The best-scoring, mutually distant
//! windows (the analogs) are then followed forward in time, and what happened
//! after them forms an ensemble forecast.
//!
//! The building blocks are usable on their own:
//!
//! - [`split`] resolves window lengths and carves a series into pattern, test
//!   and training windows.
//! - [`criteria`] scores candidate windows against the pattern (MSE, MdSE,
//!   product of MSEs, spectral slope).
//! - [`analogs`] selects analogs under a blind window and extracts ensembles.
//! - [`standardize`] maps physical values to a comparable scale and back.
//! - [`pipeline`] chains all of the above with stage checks.
//! - [`store`] and [`sweep`] persist artifacts and run many pipelines in parallel.

#![allow(clippy::too_many_arguments)]
#![allow(clippy::type_complexity)]
#![allow(clippy::needless_range_loop)]

pub mod analogs;
pub mod core;
pub mod criteria;
pub mod error;
pub mod pipeline;
pub mod split;
pub mod standardize;
pub mod store;
pub mod sweep;
pub mod utils;

pub use error::{AnalogError, Result};

pub mod prelude {
    pub use crate::analogs::{
        extract_analogs, select_analogs, Analog, AnalogSelection, BlindWindow, Ensemble,
        ExtractionConfig, SelectionConfig,
    };
    pub use crate::core::{Series, Window};
    pub use crate::criteria::{Criterion, CriterionRegistry, CriterionSeries, MovingConfig};
    pub use crate::error::{AnalogError, Result};
    pub use crate::pipeline::{Pipeline, PipelineConfig, Stage};
    pub use crate::split::{split, DateSpec, LengthSpec, SplitConfig, SplitResult};
    pub use crate::standardize::{Standardizer, StandardizerRegistry};
    pub use crate::store::{ArtifactKey, ArtifactStore, ArtifactStoreExt, FileStore, MemoryStore};
}
