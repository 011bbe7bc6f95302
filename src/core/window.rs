//! Closed row ranges over a series.

use crate::core::Series;
use crate::error::{AnalogError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A closed index range `[start, end]` over the rows of a series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Window {
    pub start: usize,
    pub end: usize,
}

impl Window {
    pub fn new(start: usize, end: usize) -> Result<Self> {
        if start > end {
            return Err(AnalogError::InvalidParameter(format!(
                "window start {} is after end {}",
                start, end
            )));
        }
        Ok(Self { start, end })
    }

    /// Window of `len` rows starting at `start`; `None` when `len` is zero.
    pub fn from_start_len(start: usize, len: usize) -> Option<Self> {
        if len == 0 {
            return None;
        }
        Some(Self {
            start,
            end: start + len - 1,
        })
    }

    /// Number of rows covered.
    pub fn len(&self) -> usize {
        self.end - self.start + 1
    }

    /// A closed window always covers at least one row.
    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn contains(&self, index: usize) -> bool {
        index >= self.start && index <= self.end
    }

    pub fn overlaps(&self, other: &Window) -> bool {
        self.start <= other.end && other.start <= self.end
    }

    /// First and last timestamps of the window in `series`.
    pub fn bounds(&self, series: &Series) -> Result<(DateTime<Utc>, DateTime<Utc>)> {
        Ok((series.timestamp(self.start)?, series.timestamp(self.end)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_length_is_inclusive() {
        let w = Window::new(40, 49).unwrap();
        assert_eq!(w.len(), 10);
        assert!(w.contains(40));
        assert!(w.contains(49));
        assert!(!w.contains(50));
    }

    #[test]
    fn window_from_start_len() {
        assert_eq!(Window::from_start_len(5, 3), Some(Window { start: 5, end: 7 }));
        assert_eq!(Window::from_start_len(5, 0), None);
    }

    #[test]
    fn window_rejects_reversed_bounds() {
        assert!(Window::new(3, 2).is_err());
    }

    #[test]
    fn overlap_detection() {
        let a = Window::new(0, 9).unwrap();
        let b = Window::new(9, 12).unwrap();
        let c = Window::new(10, 12).unwrap();
        assert!(a.overlaps(&b));
        assert!(!a.overlaps(&c));
    }
}
