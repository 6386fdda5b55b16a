use std::sync::Arc;

use crate::algorithm::decomposer::{DecomposerConfig, MassDecomposer};
use crate::chemistry::alphabet::ChemicalAlphabet;

/// Bounded pool of decomposers keyed by alphabet.
///
/// Datasets tend to reuse a handful of alphabets, so a linear scan over a
/// small slot array beats hashing. Each hit bumps a use counter; when the
/// pool is full, the slot with the smallest counter is replaced (first found
/// wins ties). The cache is not synchronized; concurrent callers must guard
/// it, see [`crate::algorithm::service::DecompositionService`].
pub struct DecomposerCache {
    entries: Vec<CacheEntry>,
    capacity: usize,
    config: DecomposerConfig,
}

struct CacheEntry {
    alphabet: ChemicalAlphabet,
    decomposer: Arc<MassDecomposer>,
    use_count: u64,
}

impl DecomposerCache {
    pub fn new(capacity: usize) -> Self {
        DecomposerCache::with_config(capacity, DecomposerConfig::default())
    }

    pub fn with_config(capacity: usize, config: DecomposerConfig) -> Self {
        assert!(capacity > 0, "cache capacity must be positive");
        DecomposerCache { entries: Vec::with_capacity(capacity), capacity, config }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the decomposer for the given alphabet, constructing one on a
    /// miss. Construction is cheap here; the expensive residue table is
    /// only built when the decomposer first decomposes.
    pub fn get_decomposer(&mut self, alphabet: &ChemicalAlphabet) -> Arc<MassDecomposer> {
        if let Some(entry) = self.entries.iter_mut().find(|e| &e.alphabet == alphabet) {
            entry.use_count += 1;
            return Arc::clone(&entry.decomposer);
        }
        let decomposer =
            Arc::new(MassDecomposer::with_config(alphabet.clone(), self.config));
        let entry = CacheEntry {
            alphabet: alphabet.clone(),
            decomposer: Arc::clone(&decomposer),
            use_count: 1,
        };
        if self.entries.len() < self.capacity {
            self.entries.push(entry);
        } else {
            // evict the least used slot
            let victim = self
                .entries
                .iter()
                .enumerate()
                .min_by_key(|(_, e)| e.use_count)
                .map(|(i, _)| i)
                .unwrap_or(0);
            self.entries[victim] = entry;
        }
        decomposer
    }

    #[cfg(test)]
    fn cached_alphabets(&self) -> Vec<&ChemicalAlphabet> {
        self.entries.iter().map(|e| &e.alphabet).collect()
    }
}

impl Default for DecomposerCache {
    fn default() -> Self {
        DecomposerCache::new(10)
    }
}
