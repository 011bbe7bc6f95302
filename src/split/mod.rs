//! Window length resolution and the pattern / test / training split.

pub mod resolver;
pub mod splitter;

pub use resolver::{parse_date, resolve, DateSpec, LengthSpec, ResolvedLength, Unresolved};
pub use splitter::{slice_split, split, split_data, SplitConfig, SplitData, SplitResult};
