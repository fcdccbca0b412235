use alloc::vec::Vec;

/// Sentinel returned by [`Alphabet::index_of`] for a symbol that isn't a
/// member.
pub const NOT_FOUND: usize = usize::max_value();

/// An ordered set of distinct symbols drawn from `[0, 64)`, with O(1)
/// membership and index lookup.
///
/// Alphabets are immutable after construction: once built, the only way to
/// get a new one is [`Alphabet::union`], which builds a fresh value rather
/// than mutating either operand. Equality is by symbol-set identity, not by
/// the order in which symbols happen to be stored (construction always
/// yields ascending order, so the two coincide in practice).
///
/// Membership and index lookup are backed by a fixed 64-bit presence mask
/// plus a dense index table, since `A <= 64` in practice (spec.md's ceiling
/// on alphabet size); this avoids a hash map for what is, at these sizes,
/// cheaper as a bitset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alphabet {
    symbols: Vec<u8>,
    /// `index[s] = position of s in `symbols`, or `NOT_FOUND`.
    index: [usize; 64],
}

impl Alphabet {
    fn from_sorted_unique(symbols: Vec<u8>) -> Self {
        let mut index = [NOT_FOUND; 64];
        for (position, &s) in symbols.iter().enumerate() {
            index[s as usize] = position;
        }
        Self { symbols, index }
    }

    /// Builds `{0, 1, ..., n - 1}`.
    pub fn trivial(n: u8) -> Self {
        Self::from_sorted_unique((0..n).collect())
    }

    /// Builds the alphabet containing exactly the given symbols, which must
    /// be pairwise distinct and in `[0, 64)`. Input need not be sorted.
    pub fn duplicate(symbols: &[u8]) -> Self {
        let mut sorted: Vec<u8> = symbols.to_vec();
        sorted.sort_unstable();
        sorted.dedup();
        debug_assert_eq!(sorted.len(), symbols.len(), "duplicate symbols passed to Alphabet::duplicate");
        Self::from_sorted_unique(sorted)
    }

    /// Builds the alphabet from an already-sorted, already-deduplicated
    /// sequence of symbols. Used internally where callers can guarantee the
    /// precondition cheaply (e.g. set unions); exposed because quantizer
    /// designs also produce sorted-unique output alphabets.
    pub fn from_sorted_unique_unchecked(symbols: Vec<u8>) -> Self {
        Self::from_sorted_unique(symbols)
    }

    /// The set union of `self` and `other`, preserving ascending symbol
    /// order.
    pub fn union(&self, other: &Alphabet) -> Alphabet {
        let mut merged = Vec::with_capacity(self.symbols.len() + other.symbols.len());
        let (mut i, mut j) = (0, 0);
        while i < self.symbols.len() && j < other.symbols.len() {
            let (a, b) = (self.symbols[i], other.symbols[j]);
            if a == b {
                merged.push(a);
                i += 1;
                j += 1;
            } else if a < b {
                merged.push(a);
                i += 1;
            } else {
                merged.push(b);
                j += 1;
            }
        }
        merged.extend_from_slice(&self.symbols[i..]);
        merged.extend_from_slice(&other.symbols[j..]);
        Self::from_sorted_unique(merged)
    }

    /// The union of many alphabets, preserving ascending symbol order.
    pub fn union_all<'a>(alphabets: impl IntoIterator<Item = &'a Alphabet>) -> Alphabet {
        alphabets
            .into_iter()
            .fold(None, |acc: Option<Alphabet>, a| match acc {
                Some(acc) => Some(acc.union(a)),
                None => Some(a.clone()),
            })
            .unwrap_or_else(|| Alphabet::from_sorted_unique(Vec::new()))
    }

    pub fn size(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn contains(&self, symbol: u8) -> bool {
        (symbol as usize) < 64 && self.index[symbol as usize] != NOT_FOUND
    }

    /// Position of `symbol` within the ascending symbol order, or
    /// [`NOT_FOUND`] if `symbol` isn't a member.
    pub fn index_of(&self, symbol: u8) -> usize {
        if (symbol as usize) < 64 {
            self.index[symbol as usize]
        } else {
            NOT_FOUND
        }
    }

    /// The symbol at ascending position `position`. Panics if out of range;
    /// all other operations here require presence and fail hard, and this
    /// is the read-side counterpart.
    pub fn symbol_at(&self, position: usize) -> u8 {
        self.symbols[position]
    }

    pub fn symbols(&self) -> &[u8] {
        &self.symbols
    }

    pub fn iter(&self) -> impl Iterator<Item = u8> + '_ {
        self.symbols.iter().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trivial_alphabet() {
        let a = Alphabet::trivial(4);
        assert_eq!(a.size(), 4);
        for s in 0..4u8 {
            assert!(a.contains(s));
            assert_eq!(a.index_of(s), s as usize);
        }
        assert!(!a.contains(4));
        assert_eq!(a.index_of(4), NOT_FOUND);
    }

    #[test]
    fn union_preserves_ascending_order() {
        let a = Alphabet::duplicate(&[0, 2]);
        let b = Alphabet::duplicate(&[0, 1, 3]);
        let u = a.union(&b);
        assert_eq!(u.symbols(), &[0, 1, 2, 3]);
    }

    #[test]
    fn union_with_disjoint_sets() {
        let a = Alphabet::duplicate(&[5, 1]);
        let b = Alphabet::duplicate(&[3, 2]);
        let u = a.union(&b);
        assert_eq!(u.symbols(), &[1, 2, 3, 5]);
    }

    #[test]
    fn union_all_of_empty_iterator_is_empty() {
        let u = Alphabet::union_all(core::iter::empty());
        assert_eq!(u.size(), 0);
    }

    #[test]
    fn duplicate_requires_distinct_symbols() {
        // Exercised via debug_assert in debug builds; release builds silently
        // dedup, which is documented as a precondition violation either way.
        let a = Alphabet::duplicate(&[0, 1, 2]);
        assert_eq!(a.size(), 3);
    }
}
