use serde::{Deserialize, Serialize};

/// Mass tolerance expressed as a relative (ppm) and an absolute (Da) part.
///
/// The effective window at a given mass is the larger of the two, so the
/// absolute part acts as a floor for small masses.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Deviation {
    pub ppm: f64,
    pub absolute: f64,
}

impl Deviation {
    pub fn new(ppm: f64, absolute: f64) -> Self {
        Deviation { ppm, absolute }
    }

    pub fn from_ppm(ppm: f64) -> Self {
        Deviation { ppm, absolute: 0.0 }
    }

    /// Effective absolute tolerance at the given mass.
    ///
    /// # Examples
    ///
    /// ```
    /// use decomp::data::deviation::Deviation;
    ///
    /// let dev = Deviation::new(10.0, 1e-4);
    /// assert_eq!(dev.absolute_for(500.0), 0.005);
    /// assert_eq!(dev.absolute_for(1.0), 1e-4);
    /// ```
    pub fn absolute_for(&self, mass: f64) -> f64 {
        (self.ppm * mass * 1e-6).max(self.absolute)
    }

    /// Closed mass window `[mass - d, mass + d]` at the given mass.
    pub fn window(&self, mass: f64) -> (f64, f64) {
        let d = self.absolute_for(mass);
        (mass - d, mass + d)
    }

    /// Whether an observed mass lies within the tolerance of a target mass.
    pub fn matches(&self, target: f64, observed: f64) -> bool {
        (observed - target).abs() <= self.absolute_for(target)
    }
}

impl Default for Deviation {
    fn default() -> Self {
        Deviation { ppm: 10.0, absolute: 1e-3 }
    }
}
