use alloc::vec;
use alloc::vec::Vec;
use hashbrown::HashMap;

use crate::alphabet::Alphabet;
use crate::error::{CoreError, Result};
use crate::pmf::Pmf;
use crate::training::TrainingCorpus;

/// Per-column table of PMFs built once from a training corpus and read-only
/// thereafter (spec.md §3/§4.5).
///
/// Column 0 holds a single unconditional PMF. Every column `c >= 1` holds
/// one conditional PMF per previous-column symbol actually observed in
/// training, keyed in a `HashMap<u8, Pmf>` (design note in spec.md §9: "a
/// mapping keyed by symbol... Fetches return a borrowed reference"). A
/// context that never occurred in training simply has no entry; the
/// generator treats that as "cannot occur in test data drawn from the same
/// distribution" and skips it (spec.md §4.5), rather than inventing a
/// uniform-on-support fallback.
#[derive(Debug, Clone)]
pub struct ConditionalPmfStore {
    alphabet: Alphabet,
    columns: usize,
    unconditional_col0: Pmf,
    conditional: Vec<HashMap<u8, Pmf>>,
    marginals: Vec<Pmf>,
}

impl ConditionalPmfStore {
    /// Builds the store from a training corpus: accumulates counts column by
    /// column, normalizes every PMF, and derives the per-column marginals.
    pub fn build(corpus: &impl TrainingCorpus, alphabet: &Alphabet) -> Result<Self> {
        if corpus.line_count() == 0 || corpus.columns() == 0 {
            return Err(CoreError::TrainingCorpusEmpty);
        }

        let columns = corpus.columns();

        let mut unconditional_col0 = Pmf::zeros(alphabet);
        for line in corpus.lines() {
            unconditional_col0.increment(alphabet, line[0])?;
        }
        unconditional_col0.renormalize().map_err(|_| CoreError::EmptyDistribution {
            column: 0,
            context: None,
        })?;

        let mut conditional: Vec<HashMap<u8, Pmf>> = Vec::with_capacity(columns.saturating_sub(1));
        for c in 1..columns {
            let mut counts: HashMap<u8, Pmf> = HashMap::new();
            for line in corpus.lines() {
                let prev = line[c - 1];
                let entry = counts.entry(prev).or_insert_with(|| Pmf::zeros(alphabet));
                entry.increment(alphabet, line[c])?;
            }
            for pmf in counts.values_mut() {
                pmf.renormalize().map_err(|_| CoreError::EmptyDistribution {
                    column: c,
                    context: None,
                })?;
            }
            conditional.push(counts);
        }

        let mut marginals = Vec::with_capacity(columns);
        marginals.push(unconditional_col0.clone());
        for c in 1..columns {
            let prev_marginal = &marginals[c - 1];
            let mut marg = Pmf::zeros(alphabet);
            for (position, prev_symbol) in alphabet.iter().enumerate() {
                let prev_mass = prev_marginal.probability_at(position);
                if prev_mass <= 0.0 {
                    continue;
                }
                if let Some(cond) = conditional[c - 1].get(&prev_symbol) {
                    for (k_position, _) in alphabet.iter().enumerate() {
                        marg.components_mut()[k_position] += prev_mass * cond.probability_at(k_position);
                    }
                }
            }
            // `marg` here already sums to ~1 (a convex combination of
            // normalized rows), but route it through the same ready-flag
            // bookkeeping as every other Pmf for consistency.
            let total: f64 = marg.components().iter().sum();
            for comp in marg.components_mut() {
                *comp /= total;
            }
            marginals.push(force_ready(marg));
        }

        Ok(Self {
            alphabet: alphabet.clone(),
            columns,
            unconditional_col0,
            conditional,
            marginals,
        })
    }

    pub fn columns(&self) -> usize {
        self.columns
    }

    pub fn alphabet(&self) -> &Alphabet {
        &self.alphabet
    }

    /// `P(X_0)` if `column == 0`, else `P(X_column | X_{column-1} = prev)`.
    /// Returns `None` for an unseen context at `column >= 1`.
    pub fn cond_pmf(&self, column: usize, prev: u8) -> Option<&Pmf> {
        if column == 0 {
            Some(&self.unconditional_col0)
        } else {
            self.conditional[column - 1].get(&prev)
        }
    }

    /// Marginal distribution of column `column`, derived from the chain of
    /// conditionals (spec.md §4.5: `marg[c] = sum_s marg[c-1](s) *
    /// cond[c|s]`).
    pub fn marginal(&self, column: usize) -> &Pmf {
        &self.marginals[column]
    }

    /// Every previous-column symbol that has at least one training example
    /// at `column` (i.e. the keys of the conditional table), in ascending
    /// order. Empty for `column == 0` (there is no previous column).
    pub fn observed_contexts(&self, column: usize) -> Vec<u8> {
        if column == 0 {
            return Vec::new();
        }
        let mut keys: Vec<u8> = self.conditional[column - 1].keys().copied().collect();
        keys.sort_unstable();
        keys
    }
}

fn force_ready(mut pmf: Pmf) -> Pmf {
    // `Pmf` only exposes `renormalize` (which re-divides by the current
    // sum) as a way to flip the ready flag; since `marg`'s components
    // already sum to 1 within floating error, renormalizing is a no-op on
    // the values and exists purely to set the flag.
    let _ = pmf.renormalize();
    pmf
}
