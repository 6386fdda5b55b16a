use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::chemistry::elements::Element;
use crate::error::DecompError;

/// An ordered, deduplicated set of elements a mass is decomposed over.
///
/// The order is canonical (elements sorted by symbol), so two alphabets built
/// from the same element set in any input order compare equal. The
/// `selection_id` ties an alphabet to the element table it was built against;
/// alphabets from distinct selections never compare equal and therefore never
/// share a decomposer cache slot.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChemicalAlphabet {
    elements: Vec<Element>,
    index: HashMap<String, usize>,
    selection_id: u64,
}

impl ChemicalAlphabet {
    pub fn new(mut elements: Vec<Element>) -> Result<Self, DecompError> {
        if elements.is_empty() {
            return Err(DecompError::EmptyAlphabet);
        }
        elements.sort();
        elements.dedup();
        let index = elements
            .iter()
            .enumerate()
            .map(|(i, e)| (e.symbol.clone(), i))
            .collect();
        Ok(ChemicalAlphabet { elements, index, selection_id: 0 })
    }

    /// Build an alphabet from symbols, resolved against the built-in tables.
    ///
    /// # Examples
    ///
    /// ```
    /// use decomp::chemistry::alphabet::ChemicalAlphabet;
    ///
    /// let alphabet = ChemicalAlphabet::from_symbols(&["C", "H", "N", "O"]).unwrap();
    /// assert_eq!(alphabet.size(), 4);
    /// assert_eq!(alphabet.get(0).symbol, "C");
    /// assert_eq!(alphabet.index_of("O"), Some(3));
    /// ```
    pub fn from_symbols(symbols: &[&str]) -> Result<Self, DecompError> {
        let mut elements = Vec::with_capacity(symbols.len());
        for symbol in symbols {
            match Element::from_symbol(symbol) {
                Some(e) => elements.push(e),
                None => return Err(DecompError::UnknownElement(symbol.to_string())),
            }
        }
        ChemicalAlphabet::new(elements)
    }

    pub fn with_selection_id(mut self, selection_id: u64) -> Self {
        self.selection_id = selection_id;
        self
    }

    pub fn size(&self) -> usize {
        self.elements.len()
    }

    /// Largest element index, used to size compomer buffers.
    pub fn max_index(&self) -> usize {
        self.elements.len() - 1
    }

    pub fn get(&self, index: usize) -> &Element {
        &self.elements[index]
    }

    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    pub fn index_of(&self, symbol: &str) -> Option<usize> {
        self.index.get(symbol).copied()
    }

    pub fn weight_of(&self, index: usize) -> f64 {
        self.elements[index].mass
    }

    pub fn selection_id(&self) -> u64 {
        self.selection_id
    }
}

impl PartialEq for ChemicalAlphabet {
    fn eq(&self, other: &Self) -> bool {
        self.selection_id == other.selection_id && self.elements == other.elements
    }
}

impl Eq for ChemicalAlphabet {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_of_input_symbols_does_not_matter() {
        let a = ChemicalAlphabet::from_symbols(&["O", "C", "H"]).unwrap();
        let b = ChemicalAlphabet::from_symbols(&["H", "O", "C"]).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn duplicates_are_removed() {
        let a = ChemicalAlphabet::from_symbols(&["C", "C", "H"]).unwrap();
        assert_eq!(a.size(), 2);
    }

    #[test]
    fn distinct_selection_ids_never_compare_equal() {
        let a = ChemicalAlphabet::from_symbols(&["C", "H"]).unwrap();
        let b = ChemicalAlphabet::from_symbols(&["C", "H"]).unwrap().with_selection_id(1);
        assert_ne!(a, b);
    }

    #[test]
    fn empty_alphabet_is_rejected() {
        assert!(ChemicalAlphabet::new(vec![]).is_err());
    }
}
