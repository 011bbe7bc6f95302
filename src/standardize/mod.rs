//! Reversible standardization of series before criterion computation.
//!
//! A [`Standardizer`] maps physical values to a unit-free scale and back.
//! Affine transforms ([`MeanStd`], [`MaxScale`]) invert analytically; rank
//! based ones ([`Percentile`]) invert through a [`ConversionMatrix`] learned
//! from aligned physical and standard samples.

mod affine;
mod conversion;
mod max_scale;
mod mean_std;
mod percentile;

pub use affine::ColumnScale;
pub use conversion::{Conversion, ConversionMatrix, ConversionTable};
pub use max_scale::MaxScale;
pub use mean_std::MeanStd;
pub use percentile::{percentile_ranks, Percentile};

use crate::core::Series;
use crate::error::{AnalogError, Result};

/// Common interface of standardization transforms.
pub trait Standardizer: Send + Sync {
    fn name(&self) -> &str;

    /// Learn the transform parameters from physical data.
    ///
    /// Only `columns` are transformed when given; other columns pass through.
    fn fit(&mut self, physical: &Series, columns: Option<&[String]>) -> Result<()>;

    fn standardize(&self, physical: &Series) -> Result<Series>;

    fn unstandardize(&self, standard: &Series) -> Result<Series>;

    /// Build the lookup tables relating two aligned series.
    fn set_conversion_matrix(&mut self, physical: &Series, standard: &Series) -> Result<()>;

    /// Install previously built lookup tables.
    fn load_conversion_matrix(&mut self, matrix: ConversionMatrix);

    fn conversion_matrix(&self) -> Option<&ConversionMatrix>;
}

pub type BoxedStandardizer = Box<dyn Standardizer>;

/// A named standardizer factory.
pub struct StandardizerSpec {
    pub name: String,
    factory: Box<dyn Fn() -> BoxedStandardizer + Send + Sync>,
}

impl StandardizerSpec {
    pub fn new<F>(name: impl Into<String>, factory: F) -> Self
    where
        F: Fn() -> BoxedStandardizer + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            factory: Box::new(factory),
        }
    }

    pub fn create(&self) -> BoxedStandardizer {
        (self.factory)()
    }
}

/// Explicitly constructed set of available standardizers.
pub struct StandardizerRegistry {
    specs: Vec<StandardizerSpec>,
}

impl StandardizerRegistry {
    pub fn new() -> Self {
        Self { specs: Vec::new() }
    }

    /// Registry holding `mean_std`, `max`, `percentile` and `conversion`.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(StandardizerSpec::new("mean_std", || Box::new(MeanStd::new())));
        registry.register(StandardizerSpec::new("max", || Box::new(MaxScale::new())));
        registry.register(StandardizerSpec::new("percentile", || {
            Box::new(Percentile::new())
        }));
        registry.register(StandardizerSpec::new("conversion", || {
            Box::new(Conversion::new())
        }));
        registry
    }

    /// Register a standardizer, replacing any previous one with the same name.
    pub fn register(&mut self, spec: StandardizerSpec) {
        self.specs.retain(|s| s.name != spec.name);
        self.specs.push(spec);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.specs.iter().any(|s| s.name == name)
    }

    pub fn create(&self, name: &str) -> Result<BoxedStandardizer> {
        self.specs
            .iter()
            .find(|s| s.name == name)
            .map(StandardizerSpec::create)
            .ok_or_else(|| AnalogError::UnknownComponent {
                kind: "standardizer",
                name: name.to_string(),
            })
    }

    pub fn names(&self) -> Vec<&str> {
        self.specs.iter().map(|s| s.name.as_str()).collect()
    }
}

impl Default for StandardizerRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// Columns a fit applies to: the requested ones, else every column of `series`.
pub(crate) fn fit_columns(series: &Series, columns: Option<&[String]>) -> Result<Vec<String>> {
    match columns {
        Some(columns) => {
            for name in columns {
                if !series.has_column(name) {
                    return Err(AnalogError::UnknownColumn(name.clone()));
                }
            }
            Ok(columns.to_vec())
        }
        None => Ok(series.columns().to_vec()),
    }
}
