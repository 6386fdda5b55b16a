use std::collections::HashMap;
use std::fmt;

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::chemistry::alphabet::ChemicalAlphabet;
use crate::chemistry::elements::{atomic_weights_mono_isotopic, element_valences};

/// A molecular formula as a symbol to count map.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MolecularFormula {
    pub elements: HashMap<String, i32>,
}

impl MolecularFormula {
    pub fn new(elements: HashMap<String, i32>) -> Self {
        MolecularFormula { elements }
    }

    /// Turn a compomer (one count per alphabet element, in alphabet order)
    /// into a formula. Zero counts are dropped.
    pub fn from_compomer(alphabet: &ChemicalAlphabet, compomer: &[i32]) -> Self {
        let mut elements = HashMap::new();
        for (i, &count) in compomer.iter().enumerate() {
            if count != 0 {
                elements.insert(alphabet.get(i).symbol.clone(), count);
            }
        }
        MolecularFormula { elements }
    }

    pub fn monoisotopic_mass(&self) -> f64 {
        let atomic_weights = atomic_weights_mono_isotopic();
        self.elements.iter().fold(0.0, |acc, (element, count)| {
            acc + atomic_weights[element.as_str()] * *count as f64
        })
    }

    /// Ring/double-bond equivalent, `1 + sum(count * (valence - 2)) / 2`.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::collections::HashMap;
    /// use decomp::chemistry::formula::MolecularFormula;
    ///
    /// let glucose = MolecularFormula::new(HashMap::from([
    ///     ("C".to_string(), 6), ("H".to_string(), 12), ("O".to_string(), 6),
    /// ]));
    /// assert_eq!(glucose.rdbe(), 1.0);
    /// assert!((glucose.monoisotopic_mass() - 180.06339).abs() < 1e-5);
    /// ```
    pub fn rdbe(&self) -> f64 {
        let valences = element_valences();
        let sum: i32 = self
            .elements
            .iter()
            .map(|(element, count)| count * (valences[element.as_str()] - 2))
            .sum();
        1.0 + sum as f64 / 2.0
    }

    /// Formula string in Hill order: C first, H second, all others
    /// alphabetically.
    pub fn formula_string(&self) -> String {
        let hill_rank = |symbol: &str| match symbol {
            "C" => (0, String::new()),
            "H" => (1, String::new()),
            other => (2, other.to_string()),
        };
        let mut out = String::new();
        for (symbol, count) in self
            .elements
            .iter()
            .filter(|(_, &count)| count != 0)
            .sorted_by_key(|(symbol, _)| hill_rank(symbol))
        {
            out.push_str(symbol);
            if *count != 1 {
                out.push_str(&count.to_string());
            }
        }
        out
    }
}

impl fmt::Display for MolecularFormula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.formula_string())
    }
}
