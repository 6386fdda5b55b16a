use std::cmp::Ordering;
use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Monoisotopic masses of the elements supported by the decomposer
pub fn atomic_weights_mono_isotopic() -> HashMap<&'static str, f64> {
    let mut map = HashMap::new();
    map.insert("H", 1.00782503207);
    map.insert("B", 11.0093054);
    map.insert("C", 12.0);
    map.insert("N", 14.0030740048);
    map.insert("O", 15.9949146196);
    map.insert("F", 18.99840322);
    map.insert("Na", 22.9897692809);
    map.insert("Si", 27.9769265325);
    map.insert("P", 30.97376163);
    map.insert("S", 31.97207100);
    map.insert("Cl", 34.96885268);
    map.insert("K", 38.96370668);
    map.insert("Fe", 55.9349375);
    map.insert("Se", 73.9224764);
    map.insert("Br", 78.9183371);
    map.insert("I", 126.904473);
    map
}

/// Valences used for ring/double-bond-equivalent filtering
pub fn element_valences() -> HashMap<&'static str, i32> {
    let mut map = HashMap::new();
    map.insert("H", 1);
    map.insert("B", 3);
    map.insert("C", 4);
    map.insert("N", 3);
    map.insert("O", 2);
    map.insert("F", 1);
    map.insert("Na", 1);
    map.insert("Si", 4);
    map.insert("P", 3);
    map.insert("S", 2);
    map.insert("Cl", 1);
    map.insert("K", 1);
    map.insert("Fe", 3);
    map.insert("Se", 2);
    map.insert("Br", 1);
    map.insert("I", 1);
    map
}

/// A chemical element as seen by the decomposer: symbol, monoisotopic mass
/// and valence. Identity and ordering are defined by the symbol alone.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Element {
    pub symbol: String,
    pub mass: f64,
    pub valence: i32,
}

impl Element {
    pub fn new(symbol: &str, mass: f64, valence: i32) -> Self {
        Element { symbol: symbol.to_string(), mass, valence }
    }

    /// Look up an element in the built-in tables by symbol.
    ///
    /// # Examples
    ///
    /// ```
    /// use decomp::chemistry::elements::Element;
    ///
    /// let carbon = Element::from_symbol("C").unwrap();
    /// assert_eq!(carbon.mass, 12.0);
    /// assert_eq!(carbon.valence, 4);
    /// assert!(Element::from_symbol("Xx").is_none());
    /// ```
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        let masses = atomic_weights_mono_isotopic();
        let valences = element_valences();
        let mass = masses.get(symbol)?;
        let valence = valences.get(symbol)?;
        Some(Element::new(symbol, *mass, *valence))
    }
}

impl PartialEq for Element {
    fn eq(&self, other: &Self) -> bool {
        self.symbol == other.symbol
    }
}

impl Eq for Element {}

impl PartialOrd for Element {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Element {
    fn cmp(&self, other: &Self) -> Ordering {
        self.symbol.cmp(&other.symbol)
    }
}

impl std::hash::Hash for Element {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.symbol.hash(state);
    }
}
