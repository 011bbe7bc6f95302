//! Core data structures: the time-indexed series and row windows over it.

pub mod serde_ext;
mod series;
mod time_index;
mod window;

pub use series::{duration_ratio, duration_seconds, scaled_duration, Series, SeriesBuilder};
pub use time_index::series_from_unit_columns;
pub use window::Window;
