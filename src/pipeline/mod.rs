//! Orchestration of split, criterion, selection and extraction.

mod config;
#[allow(clippy::module_inception)]
mod pipeline;

pub use config::{CriterionConfig, ExtractionSweepConfig, PipelineConfig, StandardizationConfig};
pub use pipeline::{DataSource, Pipeline, PipelineBuilder, Stage};
