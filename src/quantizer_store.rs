use alloc::vec::Vec;
use hashbrown::HashMap;

use crate::alphabet::Alphabet;
use crate::error::{CoreError, Result};
use crate::quantizer::Quantizer;
use crate::rng::{next_uniform, Well1024a};

/// The two quantizers and mixing ratio stored at one (column, context)
/// slot (spec.md §3, §4.7).
#[derive(Debug, Clone)]
pub struct QuantizerPair {
    pub lo: Quantizer,
    pub hi: Quantizer,
    pub ratio: f64,
}

#[derive(Debug, Clone)]
struct Column {
    input_alphabet: Alphabet,
    by_context: HashMap<u8, QuantizerPair>,
}

/// For each column, the set of left-context symbols it must answer for and,
/// for each, a `(q_lo, q_hi, ratio)` triple (spec.md §3, §4.7).
///
/// Columns are opened and filled strictly left to right by
/// [`crate::codebook`]'s generator and are read-only once the next column
/// has been opened (spec.md §5: "a column is not read by the generator
/// until the previous column is fully closed"). The PRNG that backs
/// [`ConditionalQuantizerStore::choose`] lives inside the store, not as
/// global state (spec.md §9), so two independently constructed stores
/// never interfere with each other's draws.
#[derive(Debug, Clone)]
pub struct ConditionalQuantizerStore {
    columns: Vec<Column>,
    rng: Well1024a,
}

impl ConditionalQuantizerStore {
    pub fn new(seed: [u8; 128]) -> Self {
        use rand_core::SeedableRng;
        Self {
            columns: Vec::new(),
            rng: Well1024a::from_seed(seed),
        }
    }

    /// Opens column `self.columns.len()` with the given input alphabet.
    /// Columns must be opened in order; there is no random-access "open
    /// column 3 before column 2" path, matching the generator's strictly
    /// sequential column dependency (spec.md §5).
    pub fn open_column(&mut self, input_alphabet: Alphabet) {
        self.columns.push(Column {
            input_alphabet,
            by_context: HashMap::new(),
        });
    }

    /// Stores `(lo, hi, ratio)` at the most recently opened column, under
    /// context symbol `context`. `context` must be a member of that
    /// column's input alphabet.
    pub fn store(&mut self, context: u8, pair: QuantizerPair) -> Result<()> {
        let column_index = self.columns.len().checked_sub(1).ok_or_else(|| {
            CoreError::InternalInvariantViolated {
                column: 0,
                message: alloc::string::String::from("store() called before open_column()"),
            }
        })?;
        let column = &mut self.columns[column_index];
        if !column.input_alphabet.contains(context) {
            return Err(CoreError::AlphabetLookupMiss {
                column: column_index,
                symbol: context,
            });
        }
        column.by_context.insert(context, pair);
        Ok(())
    }

    pub fn columns(&self) -> usize {
        self.columns.len()
    }

    pub fn input_alphabet(&self, column: usize) -> &Alphabet {
        &self.columns[column].input_alphabet
    }

    /// Fetches the stored pair at `column` for context symbol `context`.
    pub fn get(&self, column: usize, context: u8) -> Result<&QuantizerPair> {
        let col = self
            .columns
            .get(column)
            .ok_or(CoreError::AlphabetLookupMiss {
                column,
                symbol: context,
            })?;
        if !col.input_alphabet.contains(context) {
            return Err(CoreError::AlphabetLookupMiss {
                column,
                symbol: context,
            });
        }
        col.by_context
            .get(&context)
            .ok_or(CoreError::AlphabetLookupMiss {
                column,
                symbol: context,
            })
    }

    /// Fetches the pair at `column` by its raw position in ascending
    /// input-alphabet order, used by the generator when iterating a closed
    /// column to derive the next one (spec.md §4.7).
    pub fn get_by_index(&self, column: usize, index: usize) -> Result<&QuantizerPair> {
        let context = self
            .columns
            .get(column)
            .map(|col| col.input_alphabet.symbol_at(index));
        match context {
            Some(context) => self.get(column, context),
            None => Err(CoreError::AlphabetLookupMiss {
                column,
                symbol: index as u8,
            }),
        }
    }

    /// Encoder-side selector: draws a uniform `[0, 1)` from the store's
    /// PRNG and returns the low quantizer's output when the draw is less
    /// than the stored ratio, else the high quantizer's (spec.md §4.7). An
    /// encoder and a decoder that construct identical stores with identical
    /// seeds and step `choose` in the same column order observe identical
    /// selections (spec.md §8, "PRNG determinism").
    pub fn choose(&mut self, column: usize, prev: u8, symbol: u8) -> Result<u8> {
        let pair = {
            // Look up context by value first so the mutable PRNG borrow
            // below doesn't overlap with the immutable alphabet/table
            // borrow from `get`.
            let col = self
                .columns
                .get(column)
                .ok_or(CoreError::AlphabetLookupMiss { column, symbol: prev })?;
            if !col.input_alphabet.contains(prev) {
                return Err(CoreError::AlphabetLookupMiss { column, symbol: prev });
            }
            col.by_context
                .get(&prev)
                .cloned()
                .ok_or(CoreError::AlphabetLookupMiss { column, symbol: prev })?
        };
        let draw = next_uniform(&mut self.rng);
        let quantizer = if draw < pair.ratio { &pair.lo } else { &pair.hi };
        Ok(quantizer.apply(symbol))
    }
}
