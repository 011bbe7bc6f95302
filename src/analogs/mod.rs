//! Analog selection from criterion scores and extraction of ensembles.

mod ensemble;
mod extractor;
mod selector;

pub use ensemble::{Ensemble, EnsembleKey, EnsembleMember, KeyedEnsemble};
pub use extractor::{extract_analogs, ExtractionConfig};
pub use selector::{
    list_analogs, select_analogs, Analog, AnalogSelection, AnalogSet, BlindWindow,
    SelectionConfig,
};
