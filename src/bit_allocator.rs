use num_traits::Float;

/// Converts an entropy target into an `(low, high, ratio)` triple: the
/// number of states of the low- and high-rate quantizers to mix, and the
/// probability of picking the low one, such that
/// `ratio * log2(low) + (1 - ratio) * log2(high) = target` (spec.md §4.6).
///
/// `low = floor(2^target)`, `high = ceil(2^target)`. When `target` lands
/// exactly on an integer power of two, `low == high` and only one quantizer
/// is needed, with `ratio = 1.0` by convention so callers can always read
/// `low` as "the quantizer actually used".
///
/// `target == 0.0` is the degenerate single-point case: `low = high = 1`,
/// `ratio = 1.0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Allocation {
    pub low: usize,
    pub high: usize,
    pub ratio: f64,
}

pub fn allocate(target_bits: f64) -> Allocation {
    debug_assert!(target_bits >= 0.0, "entropy target must be non-negative");

    if target_bits <= 0.0 {
        return Allocation {
            low: 1,
            high: 1,
            ratio: 1.0,
        };
    }

    let states = libm::pow(2.0, target_bits);
    let low = states.floor() as usize;
    let low = low.max(1);
    let high = states.ceil() as usize;

    if low == high {
        return Allocation {
            low,
            high,
            ratio: 1.0,
        };
    }

    let log_low = (low as f64).log2();
    let log_high = (high as f64).log2();
    // Solve target = r * log_low + (1 - r) * log_high for r.
    let ratio = (target_bits - log_high) / (log_low - log_high);
    let ratio = ratio.max(0.0).min(1.0);

    Allocation { low, high, ratio }
}
