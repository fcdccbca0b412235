use alloc::vec;
use alloc::vec::Vec;

use crate::alphabet::Alphabet;
use crate::distortion::DistortionTable;
use crate::error::{CoreError, Result};
use crate::pmf::Pmf;

/// A deterministic map `q : [0, A) -> [0, A)` plus its image alphabet,
/// expected distortion, and the design-target `ratio` it was built with.
///
/// `ratio` is record-only here (spec.md §4.4): the designer never reads it,
/// it is just carried through so that a `(q_lo, q_hi, ratio)` triple built
/// by the bit allocator can be stored and later replayed by
/// `ConditionalQuantizerStore::choose` without a separate lookup.
#[derive(Debug, Clone)]
pub struct Quantizer {
    map: Vec<u8>,
    output_alphabet: Alphabet,
    ratio: f64,
    expected_distortion: f64,
}

impl Quantizer {
    pub fn apply(&self, symbol: u8) -> u8 {
        self.map[symbol as usize]
    }

    pub fn output_alphabet(&self) -> &Alphabet {
        &self.output_alphabet
    }

    pub fn ratio(&self) -> f64 {
        self.ratio
    }

    pub fn expected_distortion(&self) -> f64 {
        self.expected_distortion
    }

    pub fn domain_size(&self) -> usize {
        self.map.len()
    }

    /// Reconstructs a quantizer from a raw `symbol -> reproduction symbol`
    /// map read back from the persisted codebook format (`crate::format`),
    /// where only the map and a ratio survive; `expected_distortion` isn't
    /// part of that format (it was always a training-time diagnostic, never
    /// data the encoder/decoder depend on), so it is reported as `0.0` here.
    pub(crate) fn from_raw_map(map: Vec<u8>, ratio: f64) -> Self {
        let mut output_symbols: Vec<u8> = map.clone();
        output_symbols.sort_unstable();
        output_symbols.dedup();
        Quantizer {
            map,
            output_alphabet: Alphabet::from_sorted_unique_unchecked(output_symbols),
            ratio,
            expected_distortion: 0.0,
        }
    }
}

/// Cost and best reproduction point (smallest symbol on ties) for
/// reproducing every support index in `[l, r]` (inclusive, indices into
/// `support`) as a single point drawn from the full alphabet.
fn cell_cost_and_point(
    support: &[(u8, f64)],
    distortion: &DistortionTable,
    alphabet_size: usize,
    l: usize,
    r: usize,
) -> (f64, u8) {
    let mut best_cost = f64::INFINITY;
    let mut best_point = 0u8;
    for candidate in 0..alphabet_size {
        let candidate = candidate as u8;
        let mut cost = 0.0;
        for &(symbol, prob) in &support[l..=r] {
            cost += prob * distortion.get(symbol, candidate);
        }
        if cost < best_cost {
            best_cost = cost;
            best_point = candidate;
        }
        // On ties, the first (smallest) candidate already won because we
        // only replace on strict improvement.
    }
    (best_cost, best_point)
}

/// Nearest reproduction point to `symbol` under `distortion`, breaking ties
/// in favor of the smallest symbol.
fn nearest_point(distortion: &DistortionTable, points: &[u8], symbol: u8) -> u8 {
    let mut best = points[0];
    let mut best_cost = distortion.get(symbol, best);
    for &p in &points[1..] {
        let cost = distortion.get(symbol, p);
        if cost < best_cost {
            best_cost = cost;
            best = p;
        }
    }
    best
}

/// Designs an optimal fixed-rate scalar quantizer for `pmf` (over
/// `alphabet`, which must match `distortion`'s size) targeting at most
/// `target_states` reproduction symbols, minimizing
/// `E[D(X, q(X))] = sum_x P(x) * D(x, q(x))`.
///
/// Implements spec.md §4.4: an exact dynamic-programming fill over
/// contiguous cells of the PMF's support, which is optimal for the convex
/// distortion measures this crate supports (MSE, Manhattan, Lorentz all
/// increase monotonically with |i - j|, so the optimal partition of an
/// ordered alphabet is always into contiguous runs). `target_states = 1`
/// collapses everything onto the single best point; `target_states >=
/// |support|` short-circuits to the identity map on the support, with zero
/// distortion.
pub fn design(
    pmf: &Pmf,
    alphabet: &Alphabet,
    distortion: &DistortionTable,
    target_states: usize,
    ratio: f64,
) -> Result<Quantizer> {
    if target_states == 0 {
        return Err(CoreError::ConfigurationInvalid {
            message: alloc::string::String::from("target_states must be >= 1"),
        });
    }
    if !pmf.is_ready() {
        return Err(CoreError::InternalInvariantViolated {
            column: usize::max_value(),
            message: alloc::string::String::from("design() called on a non-normalized Pmf"),
        });
    }

    let alphabet_size = alphabet.size();
    let support: Vec<(u8, f64)> = alphabet
        .iter()
        .enumerate()
        .filter_map(|(position, symbol)| {
            let p = pmf.probability_at(position);
            if p > 0.0 {
                Some((symbol, p))
            } else {
                None
            }
        })
        .collect();

    if support.is_empty() {
        return Err(CoreError::EmptyDistribution {
            column: usize::max_value(),
            context: None,
        });
    }

    let n = support.len();

    if target_states >= n {
        // Identity on the support: zero distortion.
        let mut map = vec![0u8; alphabet_size];
        let output_symbols: Vec<u8> = support.iter().map(|&(s, _)| s).collect();
        for &(symbol, _) in &support {
            map[symbol as usize] = symbol;
        }
        for symbol in 0..alphabet_size as u8 {
            if !support.iter().any(|&(s, _)| s == symbol) {
                map[symbol as usize] = nearest_point(distortion, &output_symbols, symbol);
            }
        }
        let output_alphabet = Alphabet::duplicate(&output_symbols);
        return Ok(Quantizer {
            map,
            output_alphabet,
            ratio,
            expected_distortion: 0.0,
        });
    }

    // cell_cost[l][r] / cell_point[l][r] for 0 <= l <= r < n.
    let mut cell_cost = vec![0.0f64; n * n];
    let mut cell_point = vec![0u8; n * n];
    for l in 0..n {
        for r in l..n {
            let (cost, point) =
                cell_cost_and_point(&support, distortion, alphabet_size, l, r);
            cell_cost[l * n + r] = cost;
            cell_point[l * n + r] = point;
        }
    }

    // dp[m][r] = min total cost partitioning support[0..=r] into m cells.
    // split[m][r] = the left endpoint of the last cell in that optimum.
    let m_max = target_states;
    let mut dp = vec![f64::INFINITY; (m_max + 1) * n];
    let mut split = vec![0usize; (m_max + 1) * n];

    for r in 0..n {
        dp[1 * n + r] = cell_cost[0 * n + r];
        split[1 * n + r] = 0;
    }
    for m in 2..=m_max {
        for r in (m - 1)..n {
            let mut best = f64::INFINITY;
            let mut best_l = m - 1;
            for l in (m - 1)..=r {
                let prev = if l == 0 { f64::INFINITY } else { dp[(m - 1) * n + l - 1] };
                let cost = prev + cell_cost[l * n + r];
                if cost < best {
                    best = cost;
                    best_l = l;
                }
            }
            dp[m * n + r] = best;
            split[m * n + r] = best_l;
        }
    }

    // Find the smallest m <= m_max that attains the global optimum cost at
    // r = n - 1 (using more cells than necessary never helps for these
    // convex distortions, but an m below the true optimum cell count simply
    // won't appear in the table as infinite, so we just take m_max itself:
    // dp is monotonically non-increasing in m, and target_states is a cap,
    // not a requirement, so we use exactly m_max cells, merging degenerate
    // empty cells away when reconstructing.)
    let mut cells = Vec::new();
    let mut r = n - 1;
    let mut m = m_max;
    while m >= 1 {
        let l = split[m * n + r];
        cells.push((l, r));
        if l == 0 {
            break;
        }
        r = l - 1;
        m -= 1;
    }
    cells.reverse();

    let mut map = vec![0u8; alphabet_size];
    let mut output_symbols: Vec<u8> = Vec::with_capacity(cells.len());
    let mut expected_distortion = 0.0;
    for &(l, r) in &cells {
        let point = cell_point[l * n + r];
        expected_distortion += cell_cost[l * n + r];
        output_symbols.push(point);
        for &(symbol, _) in &support[l..=r] {
            map[symbol as usize] = point;
        }
    }
    output_symbols.sort_unstable();
    output_symbols.dedup();

    for symbol in 0..alphabet_size as u8 {
        if !support.iter().any(|&(s, _)| s == symbol) {
            map[symbol as usize] = nearest_point(distortion, &output_symbols, symbol);
        }
    }

    if output_symbols.len() > target_states {
        return Err(CoreError::InternalInvariantViolated {
            column: usize::max_value(),
            message: alloc::string::String::from(
                "quantizer designer produced more reproduction points than the target state count",
            ),
        });
    }

    let output_alphabet = Alphabet::duplicate(&output_symbols);
    Ok(Quantizer {
        map,
        output_alphabet,
        ratio,
        expected_distortion,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distortion::DistortionMeasure;
    use proptest::prelude::*;

    fn ready_pmf(alphabet: &Alphabet, weights: &[f64]) -> Pmf {
        let mut pmf = Pmf::zeros(alphabet);
        for (position, &w) in weights.iter().enumerate() {
            let symbol = alphabet.symbol_at(position);
            for _ in 0..(w as u32) {
                pmf.increment(alphabet, symbol).unwrap();
            }
        }
        pmf.renormalize().unwrap();
        pmf
    }

    #[test]
    fn identity_when_states_cover_support() {
        let a = Alphabet::trivial(4);
        let d = DistortionTable::new(DistortionMeasure::Mse, 4);
        let pmf = ready_pmf(&a, &[1.0, 0.0, 1.0, 2.0]);
        let q = design(&pmf, &a, &d, 4, 1.0).unwrap();
        assert_eq!(q.expected_distortion(), 0.0);
        assert_eq!(q.apply(0), 0);
        assert_eq!(q.apply(2), 2);
        assert_eq!(q.apply(3), 3);
    }

    #[test]
    fn single_state_collapses_everything() {
        let a = Alphabet::trivial(4);
        let d = DistortionTable::new(DistortionMeasure::Mse, 4);
        let pmf = ready_pmf(&a, &[1.0, 1.0, 1.0, 1.0]);
        let q = design(&pmf, &a, &d, 1, 1.0).unwrap();
        assert_eq!(q.output_alphabet().size(), 1);
        let point = q.apply(0);
        for s in 0..4u8 {
            assert_eq!(q.apply(s), point);
        }
    }

    #[test]
    fn two_states_splits_uniform_four_symbols_in_half() {
        let a = Alphabet::trivial(4);
        let d = DistortionTable::new(DistortionMeasure::Mse, 4);
        let pmf = ready_pmf(&a, &[1.0, 1.0, 1.0, 1.0]);
        let q = design(&pmf, &a, &d, 2, 1.0).unwrap();
        assert!(q.output_alphabet().size() <= 2);
        // Contiguity: 0 and 1 should map together, as should 2 and 3 (or an
        // equally-contiguous split); verify no "0 with 3, 1 with 2" split.
        assert_eq!(q.apply(0), q.apply(1));
        assert_eq!(q.apply(2), q.apply(3));
    }

    #[test]
    fn output_alphabet_never_exceeds_target_states() {
        let a = Alphabet::trivial(8);
        let d = DistortionTable::new(DistortionMeasure::Mse, 8);
        let pmf = ready_pmf(&a, &[5.0, 1.0, 1.0, 3.0, 1.0, 1.0, 1.0, 2.0]);
        for m in 1..=8 {
            let q = design(&pmf, &a, &d, m, 1.0).unwrap();
            assert!(q.output_alphabet().size() <= m);
        }
    }

    /// A single round of nearest-center assignment from an arbitrary (not
    /// necessarily contiguous) set of M centers, used as a k-means baseline
    /// in `designed_quantizer_never_worse_than_a_kmeans_baseline` below.
    /// Because the three supported distortion measures are all convex in
    /// `|i - j|`, the DP in `design` always finds the globally optimal
    /// *contiguous* partition, which is a lower bound on the cost of any
    /// feasible (including non-contiguous) M-center assignment; one round is
    /// enough for the comparison since we only need "at least as good",
    /// never "equal".
    fn kmeans_baseline_distortion(
        pmf: &Pmf,
        alphabet: &Alphabet,
        distortion: &DistortionTable,
        centers: &[u8],
    ) -> f64 {
        let mut assigned_center = vec![0u8; alphabet.size()];
        for (position, symbol) in alphabet.iter().enumerate() {
            let mut best = centers[0];
            let mut best_cost = distortion.get(symbol, best);
            for &c in &centers[1..] {
                let cost = distortion.get(symbol, c);
                if cost < best_cost {
                    best_cost = cost;
                    best = c;
                }
            }
            assigned_center[position] = best;
        }
        alphabet
            .iter()
            .enumerate()
            .map(|(position, symbol)| pmf.probability_at(position) * distortion.get(symbol, assigned_center[position]))
            .sum()
    }

    proptest! {
        /// spec.md §8, "Designer optimality (property-based)": for random
        /// PMFs over A <= 8 and random state counts M, `design`'s expected
        /// distortion never exceeds a k-means baseline's on the same input.
        #[test]
        fn designed_quantizer_never_worse_than_a_kmeans_baseline(
            weights in prop::collection::vec(0u32..6, 8),
            m in 1usize..=8,
            center_seed in prop::collection::vec(0u8..8, 8),
        ) {
            let a = Alphabet::trivial(8);
            let d = DistortionTable::new(DistortionMeasure::Mse, 8);
            // Guarantee at least one nonzero weight so renormalize succeeds.
            let mut weights = weights;
            if weights.iter().all(|&w| w == 0) {
                weights[0] = 1;
            }
            let float_weights: Vec<f64> = weights.iter().map(|&w| w as f64).collect();
            let pmf = ready_pmf(&a, &float_weights);

            let mut centers: Vec<u8> = center_seed.into_iter().take(m).collect();
            centers.sort_unstable();
            centers.dedup();
            if centers.is_empty() {
                centers.push(0);
            }

            let designed = design(&pmf, &a, &d, m, 1.0).unwrap();
            let baseline = kmeans_baseline_distortion(&pmf, &a, &d, &centers);

            prop_assert!(designed.expected_distortion() <= baseline + 1e-9);
        }

        /// spec.md §8, "Entropy monotonicity": raising the target state
        /// count (the knob `comp` ultimately drives via the bit allocator)
        /// never increases a column's expected distortion, for a fixed
        /// source PMF.
        #[test]
        fn raising_target_states_never_increases_expected_distortion(
            weights in prop::collection::vec(0u32..6, 8),
            m_low in 1usize..=7,
            extra in 1usize..=7,
        ) {
            let a = Alphabet::trivial(8);
            let d = DistortionTable::new(DistortionMeasure::Mse, 8);
            let mut weights = weights;
            if weights.iter().all(|&w| w == 0) {
                weights[0] = 1;
            }
            let float_weights: Vec<f64> = weights.iter().map(|&w| w as f64).collect();
            let pmf = ready_pmf(&a, &float_weights);

            let m_high = (m_low + extra).min(8);
            let q_low = design(&pmf, &a, &d, m_low, 1.0).unwrap();
            let q_high = design(&pmf, &a, &d, m_high, 1.0).unwrap();

            prop_assert!(q_high.expected_distortion() <= q_low.expected_distortion() + 1e-9);
        }
    }
}
