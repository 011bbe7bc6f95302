//! Name-to-constructor registry of criteria.

use crate::criteria::{BoxedCriterion, MdSE, ProdMSE, SpectralSlope, MSE};
use crate::error::{AnalogError, Result};

/// A named criterion factory.
pub struct CriterionSpec {
    pub name: String,
    factory: Box<dyn Fn() -> BoxedCriterion + Send + Sync>,
}

impl CriterionSpec {
    pub fn new<F>(name: impl Into<String>, factory: F) -> Self
    where
        F: Fn() -> BoxedCriterion + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            factory: Box::new(factory),
        }
    }

    /// Create a new criterion instance.
    pub fn create(&self) -> BoxedCriterion {
        (self.factory)()
    }
}

/// Explicitly constructed set of available criteria.
///
/// # Example
///
/// ```
/// use analog_forecast::criteria::CriterionRegistry;
///
/// let registry = CriterionRegistry::with_defaults();
/// let mse = registry.create("mse").unwrap();
/// assert_eq!(mse.name(), "mse");
/// assert!(registry.create("rmse").is_err());
/// ```
pub struct CriterionRegistry {
    specs: Vec<CriterionSpec>,
}

impl CriterionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self { specs: Vec::new() }
    }

    /// Registry holding `mse`, `mdse`, `prod_mse` and `spectral_slope`.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(CriterionSpec::new("mse", || Box::new(MSE::new())));
        registry.register(CriterionSpec::new("mdse", || Box::new(MdSE::new())));
        registry.register(CriterionSpec::new("prod_mse", || Box::new(ProdMSE::new())));
        registry.register(CriterionSpec::new("spectral_slope", || {
            Box::new(SpectralSlope::new())
        }));
        registry
    }

    /// Register a criterion, replacing any previous one with the same name.
    pub fn register(&mut self, spec: CriterionSpec) {
        self.specs.retain(|s| s.name != spec.name);
        self.specs.push(spec);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.specs.iter().any(|s| s.name == name)
    }

    /// Instantiate the criterion registered under `name`.
    pub fn create(&self, name: &str) -> Result<BoxedCriterion> {
        self.specs
            .iter()
            .find(|s| s.name == name)
            .map(CriterionSpec::create)
            .ok_or_else(|| AnalogError::UnknownComponent {
                kind: "criterion",
                name: name.to_string(),
            })
    }

    pub fn names(&self) -> Vec<&str> {
        self.specs.iter().map(|s| s.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }
}

impl Default for CriterionRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}
