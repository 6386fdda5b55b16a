use serde::{Deserialize, Serialize};

/// A closed element count bound `[min, max]`, defaulting to `[0, unbounded)`.
///
/// The constructor does not validate; `min > max` is rejected by the
/// decomposer before any search starts.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interval {
    pub min: i64,
    pub max: i64,
}

impl Interval {
    pub fn new(min: i64, max: i64) -> Self {
        Interval { min, max }
    }

    /// `[0, max]`
    pub fn up_to(max: i64) -> Self {
        Interval { min: 0, max }
    }

    pub fn is_valid(&self) -> bool {
        self.min <= self.max && self.min >= 0
    }

    pub fn contains(&self, value: i64) -> bool {
        value >= self.min && value <= self.max
    }
}

impl Default for Interval {
    fn default() -> Self {
        Interval { min: 0, max: i64::MAX }
    }
}
