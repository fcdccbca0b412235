//! Codebook generation for a lossy per-base sequencing quality-value
//! compressor.
//!
//! Given a training corpus of fixed-width quality lines, this crate builds,
//! for every column, a pair of conditional quantizers (indexed by the
//! previously emitted quantized symbol) plus a mixing ratio, such that the
//! expected per-symbol rate matches a user-supplied entropy budget while
//! minimizing expected distortion under a chosen measure (MSE, Manhattan,
//! or Lorentz). The entry point is [`codebook::CodebookGenerator`]; its
//! output is a [`quantizer_store::ConditionalQuantizerStore`], which an
//! encoder consults column by column via
//! [`quantizer_store::ConditionalQuantizerStore::choose`].
//!
//! Parsing FASTQ-style input into quality lines, the arithmetic/range-coded
//! entropy coder that writes the final bitstream, and the k-means pre-pass
//! that partitions training lines into classes are out of scope here; this
//! crate is the statistical core those three pieces sit around.
//!
//! `no_std + alloc` is enough to run the generator and drive an encoder or
//! decoder. `feature = "std"` (on by default) additionally turns on
//! [`format`], the persisted codebook text format, which needs `Read`/
//! `Write` handles.
#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

pub mod alphabet;
pub mod bit_allocator;
pub mod codebook;
pub mod cond_pmf;
pub mod config;
pub mod distortion;
pub mod error;
#[cfg(feature = "std")]
pub mod format;
pub mod pmf;
pub mod quantizer;
pub mod quantizer_store;
mod rng;
pub mod training;

pub use alphabet::Alphabet;
pub use bit_allocator::{allocate, Allocation};
pub use codebook::CodebookGenerator;
pub use cond_pmf::ConditionalPmfStore;
pub use config::Config;
pub use distortion::{DistortionMeasure, DistortionTable};
pub use error::{CoreError, Result};
pub use pmf::Pmf;
pub use quantizer::Quantizer;
pub use quantizer_store::{ConditionalQuantizerStore, QuantizerPair};
pub use training::{TrainingCorpus, TrainingLines, VecCorpus};

/// A [`ConditionalQuantizerStore`] bundled with the [`Config`] it was
/// generated under, so a caller can persist and reload one self-contained
/// value instead of wiring the pieces by hand (spec.md doesn't name this
/// type; it's pure ergonomics over the store spec.md does name).
#[derive(Debug, Clone)]
pub struct Codebook {
    pub config: Config,
    pub store: ConditionalQuantizerStore,
}

impl Codebook {
    /// Trains a codebook from `corpus` under `config`, seeding the
    /// resulting store's `choose` PRNG with `seed`.
    pub fn generate(
        config: Config,
        corpus: &impl TrainingCorpus,
        seed: [u8; 128],
    ) -> Result<Self> {
        let alphabet = Alphabet::trivial(config.alphabet_size);
        let pmf_store = ConditionalPmfStore::build(corpus, &alphabet)?;
        let generator = CodebookGenerator::new(&config, &pmf_store)?;
        let store = generator.generate(seed)?;
        Ok(Self { config, store })
    }

    #[cfg(feature = "std")]
    pub fn write<W: std::io::Write>(&self, writer: &mut W) -> Result<()> {
        format::write(&self.store, self.config.alphabet_size, writer)
    }

    #[cfg(feature = "std")]
    pub fn read<R: std::io::Read>(reader: &mut R, config: Config, seed: [u8; 128]) -> Result<Self> {
        let store = format::read(reader, config.alphabet_size, seed)?;
        Ok(Self { config, store })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distortion::DistortionMeasure;

    #[test]
    fn codebook_generate_end_to_end_on_the_spec_corpus() {
        let corpus = VecCorpus::new(alloc::vec![
            alloc::vec![0, 0, 0],
            alloc::vec![0, 1, 0],
            alloc::vec![1, 1, 2],
            alloc::vec![3, 2, 1],
        ]);
        let config = Config {
            alphabet_size: 4,
            distortion_measure: DistortionMeasure::Mse,
            comp: 0.5,
            clusters: 1,
        };
        let codebook = Codebook::generate(config, &corpus, [1u8; 128]).unwrap();
        assert_eq!(codebook.store.columns(), 3);
        assert_eq!(codebook.store.input_alphabet(0).symbols(), &[0]);
    }
}
