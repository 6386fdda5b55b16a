use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use rayon::prelude::*;
use rayon::ThreadPoolBuilder;

use crate::algorithm::cache::DecomposerCache;
use crate::algorithm::decomposer::{Compomer, DecomposerConfig, MassDecomposer};
use crate::algorithm::validator::DecompositionValidator;
use crate::chemistry::alphabet::ChemicalAlphabet;
use crate::data::deviation::Deviation;
use crate::data::interval::Interval;
use crate::error::DecompError;

/// Dataset-level decomposition entry point.
///
/// Wraps the unsynchronized [`DecomposerCache`] in a mutex, so lookups and
/// evictions never race, while the actual decomposition runs outside the
/// lock on the shared, read-only decomposer.
pub struct DecompositionService {
    cache: Mutex<DecomposerCache>,
}

impl DecompositionService {
    pub fn new(cache_capacity: usize, config: DecomposerConfig) -> Self {
        DecompositionService {
            cache: Mutex::new(DecomposerCache::with_config(cache_capacity, config)),
        }
    }

    pub fn decomposer_for(&self, alphabet: &ChemicalAlphabet) -> Arc<MassDecomposer> {
        let mut cache = self.cache.lock().expect("decomposer cache lock poisoned");
        cache.get_decomposer(alphabet)
    }

    pub fn decompose(
        &self,
        alphabet: &ChemicalAlphabet,
        mass: f64,
        deviation: Deviation,
        bounds: &HashMap<String, Interval>,
        validator: Option<&dyn DecompositionValidator>,
    ) -> Result<Vec<Compomer>, DecompError> {
        let decomposer = self.decomposer_for(alphabet);
        decomposer.decompose_filtered(mass, deviation, bounds, validator)
    }

    /// Decomposes a batch of masses over one alphabet in parallel. Queries
    /// are independent and the residue table is shared read-only, so this
    /// scales with the thread count.
    pub fn decompose_all(
        &self,
        alphabet: &ChemicalAlphabet,
        masses: &[f64],
        deviation: Deviation,
        bounds: &HashMap<String, Interval>,
        num_threads: usize,
    ) -> Vec<Result<Vec<Compomer>, DecompError>> {
        let decomposer = self.decomposer_for(alphabet);
        let pool = ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .build()
            .expect("failed to build decomposition thread pool");
        pool.install(|| {
            masses
                .par_iter()
                .map(|&mass| decomposer.decompose(mass, deviation, bounds))
                .collect()
        })
    }
}

impl Default for DecompositionService {
    fn default() -> Self {
        DecompositionService::new(10, DecomposerConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn parallel_batches_match_sequential_results() {
        let service = DecompositionService::default();
        let alphabet = ChemicalAlphabet::from_symbols(&["C", "H", "N", "O"]).unwrap();
        let deviation = Deviation::from_ppm(10.0);
        let masses = vec![180.0634, 342.1162, 255.0899, 128.0949];

        let parallel = service.decompose_all(&alphabet, &masses, deviation, &HashMap::new(), 4);
        for (mass, result) in masses.iter().zip(parallel) {
            let sequential: HashSet<Compomer> = service
                .decompose(&alphabet, *mass, deviation, &HashMap::new(), None)
                .unwrap()
                .into_iter()
                .collect();
            let parallel: HashSet<Compomer> = result.unwrap().into_iter().collect();
            assert_eq!(sequential, parallel);
        }
    }
}
