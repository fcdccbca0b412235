use alloc::string::String;
use alloc::vec;
use alloc::vec::Vec;

use crate::alphabet::Alphabet;
use crate::bit_allocator::allocate;
use crate::cond_pmf::ConditionalPmfStore;
use crate::config::Config;
use crate::distortion::DistortionTable;
use crate::error::{CoreError, Result};
use crate::pmf::Pmf;
use crate::quantizer::{self, Quantizer};
use crate::quantizer_store::{ConditionalQuantizerStore, QuantizerPair};

/// Drives the conditional quantizer store column by column, propagating
/// `P(Q_i | X_i)` and `P(X_{i+1} | Q_i)` and invoking the quantizer
/// designer for each (column, context) pair (spec.md §4.8).
///
/// ## Resolving spec.md's Bayes-chain ambiguity
///
/// Spec.md §9 flags its own per-column propagation pseudocode as a "hint
/// only" and asks implementers to "derive the exact Bayes chain from
/// scratch." This implementation does so as follows. For column `c >= 1`,
/// write `U = domain(Q_{c-1})` for the set of values column `c-1`'s stored
/// quantizers can produce (this is `input_alphabet[c]`, per the store's own
/// invariant). The generator maintains, across iterations, `prev_qpmf[x] =
/// P(Q_{c-1} = u | X_{c-1} = x)` for every source symbol `x` and `u in U`.
/// A single joint table
///
/// ```text
/// joint[u][k] = sum_x prev_qpmf[x][u] * P(X_c = k | X_{c-1} = x) * P(X_{c-1} = x)
/// ```
///
/// (summing over `x` with an observed conditional at column `c`) serves
/// both halves of the chain by normalizing along different axes:
/// - Normalizing `joint[u][·]` over `k` gives `P(X_c = k | Q_{c-1} = u)` —
///   this is `xpmf_list`, what the designer needs to build column `c`'s
///   quantizer at context `u` (spec.md's step (c), reindexed).
/// - Normalizing `joint[·][k]` over `u` gives `P(Q_{c-1} = u | X_c = k)` —
///   the weight spec.md's step (b) calls for.
///
/// Critically, step (b)'s own per-`(u, k)` contribution term
/// (`ratio_lo*[q_lo(k)=q] + ratio_hi*[q_hi(k)=q]`) can only be evaluated
/// against the quantizers column `c` itself stores at context `u` — spec.md
/// prose says "stored at column c-1", which cannot be right, since it
/// would make `P(Q_c | X_c)` depend on quantizers that quantize a
/// *different* column's source symbol. This implementation therefore
/// computes `P(Q_c | X_c)` *after* column `c`'s quantizers are designed and
/// stored, using those quantizers and the already-computed `joint` table's
/// `k`-normalized weights. This is also why, unlike the listed step order,
/// step (b)'s computation happens after step (e) here.
///
/// The `marginal of column c-2` parenthetical in spec.md's step (b) is
/// likewise inconsistent with the formula it annotates (which sums over
/// `x`, the domain of `X_{c-1}`, and so needs `P(X_{c-1} = x)`, i.e. the
/// marginal of column `c-1`); this implementation uses `marginal(c-1)`,
/// which is the only choice that makes the sum a valid joint probability.
pub struct CodebookGenerator<'a> {
    config: &'a Config,
    pmf_store: &'a ConditionalPmfStore,
    distortion: DistortionTable,
    universe: Alphabet,
}

/// `P(Q_{c-1} | X_{c-1} = x)` for every source symbol `x`, carried between
/// column iterations.
struct Carry {
    /// Domain of `Q_{c-1}`; equals `input_alphabet[c]`.
    union: Alphabet,
    /// `qpmf[x]` is a [`Pmf`] over `union`.
    qpmf: Vec<Pmf>,
}

impl<'a> CodebookGenerator<'a> {
    pub fn new(config: &'a Config, pmf_store: &'a ConditionalPmfStore) -> Result<Self> {
        config.validate()?;
        let universe = Alphabet::trivial(config.alphabet_size);
        let distortion = DistortionTable::new(config.distortion_measure, universe.size());
        Ok(Self {
            config,
            pmf_store,
            distortion,
            universe,
        })
    }

    /// Runs the full left-to-right generation and returns the resulting
    /// store (spec.md §4.8, "Termination").
    pub fn generate(&self, seed: [u8; 128]) -> Result<ConditionalQuantizerStore> {
        let mut store = ConditionalQuantizerStore::new(seed);
        let columns = self.pmf_store.columns();

        let mut carry = self.process_column_zero(&mut store)?;

        for c in 1..columns {
            let next_carry = self.process_column(&mut store, c, &carry, c == columns - 1)?;
            if let Some(next_carry) = next_carry {
                carry = next_carry;
            }
        }

        Ok(store)
    }

    fn process_column_zero(&self, store: &mut ConditionalQuantizerStore) -> Result<Carry> {
        let p0 = self
            .pmf_store
            .cond_pmf(0, 0)
            .ok_or(CoreError::EmptyDistribution {
                column: 0,
                context: None,
            })?;

        let target_bits = p0.entropy() * self.config.comp;
        let allocation = allocate(target_bits);

        let q_lo = quantizer::design(p0, &self.universe, &self.distortion, allocation.low, allocation.ratio)?;
        let q_hi = quantizer::design(
            p0,
            &self.universe,
            &self.distortion,
            allocation.high,
            1.0 - allocation.ratio,
        )?;

        let union = q_lo.output_alphabet().union(q_hi.output_alphabet());

        store.open_column(Alphabet::duplicate(&[0]));
        store.store(
            0,
            QuantizerPair {
                lo: q_lo.clone(),
                hi: q_hi.clone(),
                ratio: allocation.ratio,
            },
        )?;

        // Seed qpmf[x] = P(Q_0 = u | X_0 = x) directly from the pair just
        // built: applying it to x lands on q_lo(x) with probability
        // `ratio`, q_hi(x) with probability `1 - ratio` (spec.md step 5).
        let mut qpmf = Vec::with_capacity(self.universe.size());
        for x in self.universe.iter() {
            let mut pmf = Pmf::zeros(&union);
            seed_point_mixture(&mut pmf, &union, q_lo.apply(x), allocation.ratio, q_hi.apply(x), 1.0 - allocation.ratio);
            qpmf.push(pmf);
        }

        Ok(Carry { union, qpmf })
    }

    /// Processes column `c >= 1`. Returns the `Carry` for column `c + 1`,
    /// or `None` at the last column (spec.md: "no next column -> xpmf_list
    /// not needed", generalized here to skip computing the *next* carry).
    fn process_column(
        &self,
        store: &mut ConditionalQuantizerStore,
        c: usize,
        carry: &Carry,
        is_last_column: bool,
    ) -> Result<Option<Carry>> {
        // Step (a): recompute the union of outputs of quantizers stored at
        // column c - 1 directly from the store, as a consistency check
        // against the carried `carry.union` (they must be the same set,
        // since the quantizers stored at c - 1 are exactly what produces
        // Q_{c-1}, whose domain `carry.union` already tracks).
        let recomputed = self.output_union_of_column(store, c - 1)?;
        if recomputed != carry.union {
            return Err(CoreError::InternalInvariantViolated {
                column: c,
                message: String::from(
                    "carried Q_{c-1} domain disagrees with the union of outputs stored at column c-1",
                ),
            });
        }

        let marginal_prev = self.pmf_store.marginal(c - 1);
        let union_size = carry.union.size();

        // joint[position_of(u)][k] = sum_x qpmf[x][u] * P(X_c=k|X_{c-1}=x) * P(X_{c-1}=x)
        let mut joint = vec![0.0f64; union_size * self.universe.size()];
        for (x_position, x) in self.universe.iter().enumerate() {
            let cond = match self.pmf_store.cond_pmf(c, x) {
                Some(cond) => cond,
                None => continue,
            };
            let p_x = marginal_prev.probability_at(x_position);
            if p_x <= 0.0 {
                continue;
            }
            let qpmf_x = &carry.qpmf[x_position];
            for u_position in 0..union_size {
                let p_u_given_x = qpmf_x.probability_at(u_position);
                if p_u_given_x <= 0.0 {
                    continue;
                }
                let weight = p_u_given_x * p_x;
                for (k_position, _k) in self.universe.iter().enumerate() {
                    joint[u_position * self.universe.size() + k_position] +=
                        weight * cond.probability_at(k_position);
                }
            }
        }

        // Design column c: one (q_lo, q_hi, ratio) per context u in
        // carry.union, using xpmf_list[u] = normalize(joint[u][*]).
        store.open_column(carry.union.clone());
        let mut pairs: Vec<QuantizerPair> = Vec::with_capacity(union_size);
        for u_position in 0..union_size {
            let row = &joint[u_position * self.universe.size()..(u_position + 1) * self.universe.size()];
            let row_total: f64 = row.iter().sum();

            let xpmf = if row_total > 0.0 {
                let mut pmf = Pmf::zeros(&self.universe);
                for (slot, &mass) in pmf.components_mut().iter_mut().zip(row.iter()) {
                    *slot = mass / row_total;
                }
                force_ready(pmf)
            } else {
                // Structurally required by the input-alphabet-union
                // invariant but statistically unreached in training (no
                // training line passes through this Q_{c-1} value at
                // column c); fall back to column c's unconditional
                // marginal rather than aborting, since the context must
                // still get *some* quantizer to keep the store's
                // invariant (input_alphabet[c] == the full union) intact.
                self.pmf_store.marginal(c).clone()
            };

            let target_bits = xpmf.entropy() * self.config.comp;
            let allocation = allocate(target_bits);
            let q_lo = quantizer::design(&xpmf, &self.universe, &self.distortion, allocation.low, allocation.ratio)?;
            let q_hi = quantizer::design(
                &xpmf,
                &self.universe,
                &self.distortion,
                allocation.high,
                1.0 - allocation.ratio,
            )?;
            pairs.push(QuantizerPair {
                lo: q_lo,
                hi: q_hi,
                ratio: allocation.ratio,
            });
        }

        for (u_position, pair) in pairs.iter().enumerate() {
            let u = carry.union.symbol_at(u_position);
            store.store(u, pair.clone())?;
        }

        if is_last_column {
            return Ok(None);
        }

        // P(Q_c = q | X_c = k) using the quantizers just stored at column
        // c and the k-normalized joint weights P(Q_{c-1}=u | X_c=k).
        let next_union = self.output_union_of_column(store, c)?;
        let mut next_qpmf = Vec::with_capacity(self.universe.size());
        for (k_position, k) in self.universe.iter().enumerate() {
            let mut column_total = 0.0;
            for u_position in 0..union_size {
                column_total += joint[u_position * self.universe.size() + k_position];
            }

            let mut pmf = Pmf::zeros(&next_union);
            if column_total > 0.0 {
                for u_position in 0..union_size {
                    let weight = joint[u_position * self.universe.size() + k_position] / column_total;
                    if weight <= 0.0 {
                        continue;
                    }
                    let pair = &pairs[u_position];
                    accumulate_mixture(&mut pmf, &next_union, pair.lo.apply(k), weight * pair.ratio);
                    accumulate_mixture(&mut pmf, &next_union, pair.hi.apply(k), weight * (1.0 - pair.ratio));
                }
            } else {
                // X_c = k never co-occurs with any reachable Q_{c-1} value
                // under this PMF store (k has zero marginal mass at column
                // c, or every cond_pmf(c, ·) contributing to it was
                // unseen); split evenly across the first pair as a
                // harmless default, since such k can never actually be
                // encoded (marginal(c)(k) == 0 as well in that case).
                if let Some(pair) = pairs.first() {
                    accumulate_mixture(&mut pmf, &next_union, pair.lo.apply(k), pair.ratio);
                    accumulate_mixture(&mut pmf, &next_union, pair.hi.apply(k), 1.0 - pair.ratio);
                }
            }
            next_qpmf.push(force_ready(pmf));
        }

        Ok(Some(Carry {
            union: next_union,
            qpmf: next_qpmf,
        }))
    }

    fn output_union_of_column(&self, store: &ConditionalQuantizerStore, column: usize) -> Result<Alphabet> {
        let input_alphabet = store.input_alphabet(column).clone();
        let mut union = Alphabet::from_sorted_unique_unchecked(Vec::new());
        for context in input_alphabet.iter() {
            let pair = store.get(column, context)?;
            union = union.union(pair.lo.output_alphabet()).union(pair.hi.output_alphabet());
        }
        Ok(union)
    }
}

fn seed_point_mixture(pmf: &mut Pmf, alphabet: &Alphabet, a: u8, weight_a: f64, b: u8, weight_b: f64) {
    let pos_a = alphabet.index_of(a);
    pmf.components_mut()[pos_a] += weight_a;
    let pos_b = alphabet.index_of(b);
    pmf.components_mut()[pos_b] += weight_b;
    let _ = pmf.renormalize();
}

fn accumulate_mixture(pmf: &mut Pmf, alphabet: &Alphabet, symbol: u8, weight: f64) {
    let position = alphabet.index_of(symbol);
    pmf.components_mut()[position] += weight;
}

fn force_ready(mut pmf: Pmf) -> Pmf {
    let _ = pmf.renormalize();
    pmf
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distortion::DistortionMeasure;
    use crate::training::VecCorpus;

    fn spec_corpus() -> VecCorpus {
        VecCorpus::new(vec![
            vec![0, 0, 0],
            vec![0, 1, 0],
            vec![1, 1, 2],
            vec![3, 2, 1],
        ])
    }

    fn base_config(comp: f64) -> Config {
        Config {
            alphabet_size: 4,
            distortion_measure: DistortionMeasure::Mse,
            comp,
            clusters: 1,
        }
    }

    #[test]
    fn lossless_target_has_zero_distortion_on_every_context() {
        let corpus = spec_corpus();
        let alphabet = Alphabet::trivial(4);
        let pmf_store = ConditionalPmfStore::build(&corpus, &alphabet).unwrap();
        let config = base_config(1.0);
        let generator = CodebookGenerator::new(&config, &pmf_store).unwrap();
        let store = generator.generate([3u8; 128]).unwrap();

        for c in 0..store.columns() {
            for context in store.input_alphabet(c).iter() {
                let pair = store.get(c, context).unwrap();
                assert_eq!(pair.lo.expected_distortion(), 0.0);
                assert_eq!(pair.hi.expected_distortion(), 0.0);
            }
        }
    }

    #[test]
    fn zero_comp_collapses_every_column_to_one_state() {
        let corpus = spec_corpus();
        let alphabet = Alphabet::trivial(4);
        let pmf_store = ConditionalPmfStore::build(&corpus, &alphabet).unwrap();
        let config = base_config(0.0);
        let generator = CodebookGenerator::new(&config, &pmf_store).unwrap();
        let store = generator.generate([5u8; 128]).unwrap();

        for c in 0..store.columns() {
            for context in store.input_alphabet(c).iter() {
                let pair = store.get(c, context).unwrap();
                assert_eq!(pair.lo.output_alphabet().size(), 1);
                assert_eq!(pair.hi.output_alphabet().size(), 1);
                assert_eq!(pair.ratio, 1.0);
            }
        }
    }

    #[test]
    fn column_one_input_alphabet_is_union_of_column_zero_outputs() {
        let corpus = spec_corpus();
        let alphabet = Alphabet::trivial(4);
        let pmf_store = ConditionalPmfStore::build(&corpus, &alphabet).unwrap();
        let config = base_config(0.5);
        let generator = CodebookGenerator::new(&config, &pmf_store).unwrap();
        let store = generator.generate([9u8; 128]).unwrap();

        let pair0 = store.get(0, 0).unwrap();
        let expected = pair0.lo.output_alphabet().union(pair0.hi.output_alphabet());
        assert_eq!(store.input_alphabet(1).symbols(), expected.symbols());
    }

    #[test]
    fn every_stored_ratio_is_in_unit_interval() {
        let corpus = spec_corpus();
        let alphabet = Alphabet::trivial(4);
        let pmf_store = ConditionalPmfStore::build(&corpus, &alphabet).unwrap();
        let config = base_config(0.5);
        let generator = CodebookGenerator::new(&config, &pmf_store).unwrap();
        let store = generator.generate([1u8; 128]).unwrap();

        for c in 0..store.columns() {
            for context in store.input_alphabet(c).iter() {
                let pair = store.get(c, context).unwrap();
                assert!(pair.ratio >= 0.0 && pair.ratio <= 1.0);
            }
        }
    }

    #[test]
    fn context_missing_from_a_column_surfaces_alphabet_lookup_miss() {
        let corpus = spec_corpus();
        let alphabet = Alphabet::trivial(4);
        let pmf_store = ConditionalPmfStore::build(&corpus, &alphabet).unwrap();
        let config = base_config(0.5);
        let generator = CodebookGenerator::new(&config, &pmf_store).unwrap();
        let store = generator.generate([1u8; 128]).unwrap();

        // Some symbol guaranteed absent from column 2's input alphabet: try
        // every symbol and confirm at least one (a) is absent and (b)
        // reports exactly the spec'd error.
        let missing = (0..4u8).find(|&s| !store.input_alphabet(2).contains(s));
        if let Some(s) = missing {
            assert_eq!(
                store.get(2, s).unwrap_err(),
                CoreError::AlphabetLookupMiss { column: 2, symbol: s }
            );
        }
    }
}
