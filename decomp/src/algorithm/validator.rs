use serde::{Deserialize, Serialize};

use crate::chemistry::alphabet::ChemicalAlphabet;

/// A chemical plausibility check applied to every compomer before it is
/// returned. The compomer is given in alphabet order.
pub trait DecompositionValidator: Send + Sync {
    fn validate(&self, compomer: &[i32], alphabet: &ChemicalAlphabet) -> bool;
}

/// Accepts a compomer when its ring/double-bond equivalent is at least
/// `min_rdbe`. The default of -0.5 keeps protonated even-electron species
/// while rejecting chemically impossible over-saturated formulas.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct ValenceValidator {
    pub min_rdbe: f64,
}

impl Default for ValenceValidator {
    fn default() -> Self {
        ValenceValidator { min_rdbe: -0.5 }
    }
}

impl DecompositionValidator for ValenceValidator {
    fn validate(&self, compomer: &[i32], alphabet: &ChemicalAlphabet) -> bool {
        let mut sum = 0i64;
        for (i, &count) in compomer.iter().enumerate() {
            sum += count as i64 * (alphabet.get(i).valence as i64 - 2);
        }
        1.0 + sum as f64 / 2.0 >= self.min_rdbe
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn water_passes_and_h4_fails() {
        let alphabet = ChemicalAlphabet::from_symbols(&["C", "H", "N", "O"]).unwrap();
        let validator = ValenceValidator::default();
        // H2O: rdbe 0
        assert!(validator.validate(&[0, 2, 0, 1], &alphabet));
        // H4: rdbe -1
        assert!(!validator.validate(&[0, 4, 0, 0], &alphabet));
    }

    #[test]
    fn threshold_is_configurable() {
        let alphabet = ChemicalAlphabet::from_symbols(&["C", "H"]).unwrap();
        let strict = ValenceValidator { min_rdbe: 2.0 };
        // benzene, rdbe 4
        assert!(strict.validate(&[6, 6], &alphabet));
        // methane, rdbe 0
        assert!(!strict.validate(&[1, 4], &alphabet));
    }
}
