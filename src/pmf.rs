use alloc::vec;
use alloc::vec::Vec;
use num_traits::Float;

use crate::alphabet::Alphabet;
use crate::error::{CoreError, Result};

/// A probability mass function over an [`Alphabet`], stored densely by
/// ascending position.
///
/// Carries a `ready` flag so that the same representation serves both as a
/// raw count accumulator (built with [`Pmf::zeros`] and [`Pmf::increment`])
/// and, after [`Pmf::renormalize`], as a normalized distribution. Mixing the
/// two uses up is a logic error the type does not try to prevent at
/// compile time — matching the teacher's own stance in `distributions.rs`,
/// where a `Categorical`'s invariants ("the assertion ensures we're not out
/// of bounds") are likewise documented rather than encoded in the type —
/// but [`Pmf::increment`] does refuse to run once `ready` is set, since that
/// combination can only be a bug.
#[derive(Debug, Clone)]
pub struct Pmf {
    components: Vec<f64>,
    ready: bool,
}

impl Pmf {
    /// A new all-zero count accumulator over `alphabet`.
    pub fn zeros(alphabet: &Alphabet) -> Self {
        Self {
            components: vec![0.0; alphabet.size()],
            ready: false,
        }
    }

    /// Increments the raw count at `symbol`'s position. Requires `self` to
    /// not be normalized yet.
    pub fn increment(&mut self, alphabet: &Alphabet, symbol: u8) -> Result<()> {
        if self.ready {
            return Err(CoreError::InternalInvariantViolated {
                column: usize::max_value(),
                message: alloc::string::String::from(
                    "Pmf::increment called after renormalize",
                ),
            });
        }
        let position = alphabet.index_of(symbol);
        if position == crate::alphabet::NOT_FOUND {
            return Err(CoreError::AlphabetLookupMiss {
                column: usize::max_value(),
                symbol,
            });
        }
        self.components[position] += 1.0;
        Ok(())
    }

    /// Divides every component by the total mass. Fails with
    /// [`CoreError::EmptyDistribution`] if the total mass is zero.
    pub fn renormalize(&mut self) -> Result<()> {
        let total: f64 = self.components.iter().sum();
        if total <= 0.0 {
            return Err(CoreError::EmptyDistribution {
                column: usize::max_value(),
                context: None,
            });
        }
        for c in &mut self.components {
            *c /= total;
        }
        self.ready = true;
        Ok(())
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn components(&self) -> &[f64] {
        &self.components
    }

    pub fn components_mut(&mut self) -> &mut [f64] {
        &mut self.components
    }

    /// Probability assigned to ascending position `position` (not a raw
    /// symbol; callers look the symbol up in the owning alphabet first).
    pub fn probability_at(&self, position: usize) -> f64 {
        self.components[position]
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Shannon entropy in bits, with the convention `0 * log2(0) = 0`.
    pub fn entropy(&self) -> f64 {
        self.components
            .iter()
            .map(|&p| if p > 0.0 { -p * p.log2() } else { 0.0 })
            .sum()
    }

    /// `out[s] = alpha * p[s] + beta * q[s]`, componentwise. `p` and `q` must
    /// have the same length as `out` (the same underlying alphabet).
    /// Aliasing `out` with `p` or `q` is permitted; the caller is
    /// responsible for renormalizing `out` afterwards if the result needs
    /// to be a valid distribution again (this mirrors spec.md §4.2, which
    /// leaves renormalization to the caller).
    pub fn combine(p: &Pmf, q: &Pmf, alpha: f64, beta: f64, out: &mut Pmf) {
        debug_assert_eq!(p.len(), q.len());
        debug_assert_eq!(p.len(), out.len());
        for i in 0..out.components.len() {
            out.components[i] = alpha * p.components[i] + beta * q.components[i];
        }
        out.ready = false;
    }

    /// A zero-length placeholder used where a per-context slot has no
    /// observed mass (an unseen training context). Never marked ready.
    pub fn empty() -> Self {
        Self {
            components: Vec::new(),
            ready: false,
        }
    }
}
