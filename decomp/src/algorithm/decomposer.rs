use std::collections::HashMap;
use std::sync::OnceLock;

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

use crate::algorithm::validator::DecompositionValidator;
use crate::chemistry::alphabet::ChemicalAlphabet;
use crate::chemistry::formula::MolecularFormula;
use crate::data::deviation::Deviation;
use crate::data::interval::Interval;
use crate::error::DecompError;

/// One integer count per alphabet element, in alphabet order.
pub type Compomer = Vec<i32>;

/// Configuration of the mass decomposition search.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct DecomposerConfig {
    /// Width of the integer discretization grid in Dalton. Must be fine
    /// enough that no decomposition inside the tolerance window is missed;
    /// the default is fine enough for sub-ppm work on small molecules.
    pub precision: f64,
}

impl Default for DecomposerConfig {
    fn default() -> Self {
        DecomposerConfig { precision: 1.0 / 5963.337687 }
    }
}

/// Per-element weight after sorting by mass. The integer fields are filled
/// in during residue table construction.
#[derive(Clone, Debug)]
struct Weight {
    /// index of the element in the alphabet
    element_index: usize,
    mass: f64,
    integer_mass: i64,
}

/// The extended residue table (ERT) plus everything derived from the
/// discretization. Built once per decomposer, immutable afterwards, shared
/// across threads without locking.
#[derive(Debug)]
struct ResidueTable {
    /// ert[residue][weight index]: smallest decomposable integer mass in
    /// that residue class using the first `index + 1` weights, i64::MAX if
    /// the class is not reachable
    ert: Vec<Vec<i64>>,
    weights: Vec<Weight>,
    /// grid width after the gcd blowup
    precision: f64,
    /// relative rounding error band of the discretization
    min_error: f64,
    max_error: f64,
}

/// Decomposes a mass over a chemical alphabet, returning all element count
/// vectors whose mass lies within a tolerance window, after the
/// money-changing-problem decomposer of Böcker and Lipták.
///
/// The expensive part, the extended residue table, is built lazily on first
/// use and at most once; `decompose` takes `&self` and is safe to call from
/// multiple threads in parallel.
pub struct MassDecomposer {
    alphabet: ChemicalAlphabet,
    config: DecomposerConfig,
    table: OnceLock<Result<ResidueTable, DecompError>>,
}

impl MassDecomposer {
    pub fn new(alphabet: ChemicalAlphabet) -> Self {
        MassDecomposer::with_config(alphabet, DecomposerConfig::default())
    }

    pub fn with_config(alphabet: ChemicalAlphabet, config: DecomposerConfig) -> Self {
        MassDecomposer { alphabet, config, table: OnceLock::new() }
    }

    pub fn alphabet(&self) -> &ChemicalAlphabet {
        &self.alphabet
    }

    /// Computes all decompositions of `mass` within `deviation`. Counts are
    /// constrained to the intervals in `bounds`, keyed by element symbol;
    /// symbols outside the alphabet are ignored. An empty result is a valid
    /// outcome, not an error.
    pub fn decompose(
        &self,
        mass: f64,
        deviation: Deviation,
        bounds: &HashMap<String, Interval>,
    ) -> Result<Vec<Compomer>, DecompError> {
        self.decompose_filtered(mass, deviation, bounds, None)
    }

    /// Like [`MassDecomposer::decompose`], but additionally drops every
    /// compomer the validator rejects.
    pub fn decompose_filtered(
        &self,
        mass: f64,
        deviation: Deviation,
        bounds: &HashMap<String, Interval>,
        validator: Option<&dyn DecompositionValidator>,
    ) -> Result<Vec<Compomer>, DecompError> {
        if !mass.is_finite() || mass <= 0.0 {
            return Err(DecompError::InvalidMass(mass));
        }
        for (symbol, interval) in bounds {
            if !interval.is_valid() {
                return Err(DecompError::InvalidBounds {
                    symbol: symbol.clone(),
                    min: interval.min,
                    max: interval.max,
                });
            }
        }
        let table = self.table()?;
        let k = table.weights.len();
        let abs_error = deviation.absolute_for(mass);

        // shift lower bounds out of the query, search with shifted uppers
        let mut min_values = vec![0i64; k];
        let mut bounds_array = vec![i64::MAX; k];
        let mut min_all_zero = true;
        let mut calc_mass = mass;
        for (i, weight) in table.weights.iter().enumerate() {
            let symbol = &self.alphabet.get(weight.element_index).symbol;
            if let Some(interval) = bounds.get(symbol) {
                bounds_array[i] = interval.max.saturating_sub(interval.min);
                min_values[i] = interval.min;
                if interval.min > 0 {
                    min_all_zero = false;
                    calc_mass -= weight.mass * interval.min as f64;
                }
            }
        }

        // when the lower bounds alone already hit the window, the integer
        // window starts at 0 and the search itself yields the zero vector,
        // so no explicit seeding is needed and duplicates cannot occur
        let mut results: Vec<Compomer> = Vec::new();
        let (int_min, int_max) = integer_bound(table, calc_mass, abs_error);
        for m in int_min..=int_max {
            for mut decomp in integer_decompose(table, m, &bounds_array) {
                if !min_all_zero {
                    for (value, min) in decomp.iter_mut().zip(min_values.iter()) {
                        *value += min;
                    }
                }
                let exact_mass: f64 = decomp
                    .iter()
                    .zip(table.weights.iter())
                    .map(|(&count, weight)| count as f64 * weight.mass)
                    .sum();
                if !deviation.matches(mass, exact_mass) {
                    continue;
                }
                let compomer = self.to_alphabet_order(table, &decomp);
                if validator.map_or(true, |v| v.validate(&compomer, &self.alphabet)) {
                    results.push(compomer);
                }
            }
        }
        Ok(results)
    }

    /// Convenience entry point turning decompositions directly into
    /// molecular formulas.
    pub fn decompose_to_formulas(
        &self,
        mass: f64,
        deviation: Deviation,
        bounds: &HashMap<String, Interval>,
        validator: Option<&dyn DecompositionValidator>,
    ) -> Result<Vec<MolecularFormula>, DecompError> {
        let compomers = self.decompose_filtered(mass, deviation, bounds, validator)?;
        Ok(compomers
            .iter()
            .map(|c| MolecularFormula::from_compomer(&self.alphabet, c))
            .collect())
    }

    /// Checks in O(window size) whether any decomposition of `mass` can
    /// exist, without enumerating. A `true` answer does not imply a
    /// decomposition survives bounds or validation.
    pub fn maybe_decomposable(
        &self,
        mass: f64,
        deviation: Deviation,
    ) -> Result<bool, DecompError> {
        if !mass.is_finite() || mass <= 0.0 {
            return Err(DecompError::InvalidMass(mass));
        }
        let table = self.table()?;
        let abs_error = deviation.absolute_for(mass);
        let (int_min, int_max) = integer_bound(table, mass, abs_error);
        let a = table.weights[0].integer_mass;
        let last = table.weights.len() - 1;
        for m in int_min..=int_max {
            let r = (m % a) as usize;
            if table.ert[r][last] <= m {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// permute a compomer from internal weight order back to alphabet order
    fn to_alphabet_order(&self, table: &ResidueTable, decomp: &[i64]) -> Compomer {
        let mut compomer = vec![0i32; self.alphabet.max_index() + 1];
        for (count, weight) in decomp.iter().zip(table.weights.iter()) {
            compomer[weight.element_index] = *count as i32;
        }
        compomer
    }

    fn table(&self) -> Result<&ResidueTable, DecompError> {
        let entry = self
            .table
            .get_or_init(|| build_table(&self.alphabet, self.config.precision));
        match entry {
            Ok(table) => Ok(table),
            Err(e) => Err(e.clone()),
        }
    }
}

/// Discretizes the element masses on the precision grid and builds the
/// extended residue table over residues modulo the smallest integer mass.
fn build_table(alphabet: &ChemicalAlphabet, precision: f64) -> Result<ResidueTable, DecompError> {
    let mut weights: Vec<Weight> = alphabet
        .elements()
        .iter()
        .enumerate()
        .map(|(i, element)| Weight { element_index: i, mass: element.mass, integer_mass: 0 })
        .collect();
    weights.sort_by_key(|w| OrderedFloat(w.mass));

    // discretize, then divide by the common gcd to shrink the table
    let mut precision = precision;
    for weight in weights.iter_mut() {
        weight.integer_mass = (weight.mass / precision) as i64;
    }
    let mut d = weights[0].integer_mass;
    for weight in weights.iter().skip(1) {
        d = gcd(d, weight.integer_mass);
        if d == 1 {
            break;
        }
    }
    if d > 1 {
        precision *= d as f64;
        for weight in weights.iter_mut() {
            weight.integer_mass /= d;
        }
    }

    let ert = calc_ert(&weights)?;

    let mut min_error = 0.0f64;
    let mut max_error = 0.0f64;
    for weight in &weights {
        let error = (precision * weight.integer_mass as f64 - weight.mass) / weight.mass;
        min_error = min_error.min(error);
        max_error = max_error.max(error);
    }

    Ok(ResidueTable { ert, weights, precision, min_error, max_error })
}

/// ert[r][j] holds the smallest integer mass congruent to r modulo the
/// smallest weight that is decomposable over the first j + 1 weights.
fn calc_ert(weights: &[Weight]) -> Result<Vec<Vec<i64>>, DecompError> {
    let a = weights[0].integer_mass;
    if a <= 0 {
        return Err(DecompError::Overflow);
    }
    let n = weights.len();
    let rows = a as usize;
    let mut ert = vec![vec![0i64; n]; rows];

    ert[0][0] = 0;
    for row in ert.iter_mut().skip(1) {
        row[0] = i64::MAX;
    }

    for j in 1..n {
        ert[0][j] = 0;
        let aj = weights[j].integer_mass;
        let d = gcd(a, aj);
        // d round robin loops over the residue classes modulo d
        for p in 0..d {
            let mut value: i64;
            if p == 0 {
                value = 0;
            } else {
                value = i64::MAX;
                let mut argmin = p;
                let mut i = p;
                while i < a {
                    if ert[i as usize][j - 1] < value {
                        value = ert[i as usize][j - 1];
                        argmin = i;
                    }
                    i += d;
                }
                if value < i64::MAX {
                    ert[argmin as usize][j] = value;
                }
            }
            if value == i64::MAX {
                // the whole class is unreachable
                let mut i = p;
                while i < a {
                    ert[i as usize][j] = i64::MAX;
                    i += d;
                }
            } else {
                for _ in 1..(a / d) {
                    value = value.checked_add(aj).ok_or(DecompError::Overflow)?;
                    let r = (value % a) as usize;
                    if ert[r][j - 1] < value {
                        value = ert[r][j - 1];
                    }
                    ert[r][j] = value;
                }
            }
        }
    }
    Ok(ert)
}

/// translate a real mass window into an integer mass window on the grid,
/// widened by the rounding error band so no decomposition is missed
fn integer_bound(table: &ResidueTable, mass: f64, abs_error: f64) -> (i64, i64) {
    let lo = ((1.0 + table.min_error) * (mass - abs_error) / table.precision).ceil();
    let hi = ((1.0 + table.max_error) * (mass + abs_error) / table.precision).floor();
    ((lo.max(0.0)) as i64, (hi.max(0.0)) as i64)
}

fn decomposable(ert: &[Vec<i64>], i: usize, m: i64, a: i64) -> bool {
    m >= 0 && ert[(m % a) as usize][i] <= m
}

/// Iterative depth-first enumeration of all decompositions of one exact
/// integer mass, pruned through the residue table. `bounds` are upper
/// bounds per weight (already reduced by the lower bounds).
fn integer_decompose(table: &ResidueTable, mass: i64, bounds: &[i64]) -> Vec<Vec<i64>> {
    let weights = &table.weights;
    let ert = &table.ert;
    let k = weights.len() - 1;
    let a = weights[0].integer_mass;

    let mut result: Vec<Vec<i64>> = Vec::new();
    let mut c = vec![0i64; k + 1];
    let mut i = k;
    let mut m = mass;

    while i <= k {
        if !decomposable(ert, i, m, a) {
            // jump back up the search tree until a reachable branch appears
            while i <= k && !decomposable(ert, i, m, a) {
                m += c[i] * weights[i].integer_mass;
                c[i] = 0;
                i += 1;
                if i > k {
                    return result;
                }
            }
            while i <= k && c[i] >= bounds[i] {
                m += c[i] * weights[i].integer_mass;
                c[i] = 0;
                i += 1;
            }
            if i <= k {
                m -= weights[i].integer_mass;
                c[i] += 1;
            }
        } else {
            // descend as deep as possible
            while i > 0 && decomposable(ert, i - 1, m, a) {
                i -= 1;
            }
            if i == 0 {
                // the remaining mass is a multiple of the smallest weight
                c[0] = m / a;
                if c[0] <= bounds[0] {
                    result.push(c.clone());
                }
                c[0] = 0;
                i += 1;
            }
            while i <= k && c[i] >= bounds[i] {
                m += c[i] * weights[i].integer_mass;
                c[i] = 0;
                i += 1;
            }
            if i <= k {
                m -= weights[i].integer_mass;
                c[i] += 1;
            }
        }
    }
    result
}

fn gcd(mut u: i64, mut v: i64) -> i64 {
    while v != 0 {
        let r = u % v;
        u = v;
        v = r;
    }
    u
}
