//! Persisted codebook text format (spec.md §6.4), kept for compatibility
//! with existing decoders. Lives behind `feature = "std"` since it needs
//! `Read`/`Write` handles.

use std::io::{self, Read, Write};

use crate::alphabet::Alphabet;
use crate::error::{CoreError, Result};
use crate::quantizer::Quantizer;
use crate::quantizer_store::{ConditionalQuantizerStore, QuantizerPair};

const BYTE_OFFSET: i32 = 33;
const MISSING: u8 = 0x20;

/// One format quirk worth flagging up front: the in-memory store keeps a
/// ratio per `(column, context)` pair (spec.md §3), but line 3 of this
/// format reserves only one ratio byte per *column*. Writing picks the
/// ratio of the column's lowest-valued context as that column's
/// representative byte; reading reapplies that single ratio to every
/// context's pair reconstructed for the column. Round-tripping a store
/// whose contexts all share one ratio per column is exact; round-tripping
/// one that doesn't loses the per-context ratio spread (see DESIGN.md).
fn ratio_byte(ratio: f64) -> u8 {
    let clamped = ratio.max(0.0).min(1.0);
    (clamped * 100.0).floor() as u8 + BYTE_OFFSET as u8
}

fn ratio_from_byte(byte: u8) -> f64 {
    (byte as i32 - BYTE_OFFSET) as f64 / 100.0
}

fn quantizer_map(quantizer: &Quantizer, alphabet_size: u8) -> Vec<u8> {
    (0..alphabet_size).map(|s| quantizer.apply(s)).collect()
}

fn encode_map(map: &[u8], out: &mut Vec<u8>) -> Result<()> {
    for &symbol in map {
        let byte = symbol as i32 + BYTE_OFFSET;
        if byte > u8::max_value() as i32 {
            return Err(CoreError::ConfigurationInvalid {
                message: String::from("alphabet_size too large for the persisted codebook format"),
            });
        }
        out.push(byte as u8);
    }
    Ok(())
}

fn decode_map(bytes: &[u8], alphabet_size: usize) -> Result<Vec<u8>> {
    bytes
        .iter()
        .map(|&byte| {
            let symbol = byte as i32 - BYTE_OFFSET;
            if symbol < 0 || symbol as usize >= alphabet_size {
                return Err(CoreError::ConfigurationInvalid {
                    message: String::from("codebook byte decodes to a symbol outside the configured alphabet"),
                });
            }
            Ok(symbol as u8)
        })
        .collect()
}

fn io_err(err: io::Error) -> CoreError {
    CoreError::ConfigurationInvalid {
        message: format!("codebook I/O error: {}", err),
    }
}

fn malformed(message: &str) -> CoreError {
    CoreError::ConfigurationInvalid {
        message: String::from(message),
    }
}

/// Writes `store` in the format spec.md §6.4 describes.
///
/// `alphabet_size` must match the `Alphabet` the store's quantizers were
/// designed over; it determines both the placeholder line widths and the
/// per-block width for columns `>= 1`.
pub fn write<W: Write>(store: &ConditionalQuantizerStore, alphabet_size: u8, writer: &mut W) -> Result<()> {
    let a = alphabet_size as usize;
    let columns = store.columns();

    let placeholder = std::vec![BYTE_OFFSET as u8; a];
    writer.write_all(&placeholder).map_err(io_err)?;
    writer.write_all(b"\n").map_err(io_err)?;
    writer.write_all(&placeholder).map_err(io_err)?;
    writer.write_all(b"\n").map_err(io_err)?;

    let mut ratio_line = Vec::with_capacity(columns);
    for c in 0..columns {
        let representative = store.get_by_index(c, 0)?;
        ratio_line.push(ratio_byte(representative.ratio));
    }
    writer.write_all(&ratio_line).map_err(io_err)?;
    writer.write_all(b"\n").map_err(io_err)?;

    // Column 0 always has exactly one context (spec.md §3 invariant), so it
    // is written as plain A-byte lines rather than a block grid.
    let col0 = store.get(0, 0)?;
    let mut low0 = Vec::with_capacity(a);
    encode_map(&quantizer_map(&col0.lo, alphabet_size), &mut low0)?;
    writer.write_all(&low0).map_err(io_err)?;
    writer.write_all(b"\n").map_err(io_err)?;
    let mut high0 = Vec::with_capacity(a);
    encode_map(&quantizer_map(&col0.hi, alphabet_size), &mut high0)?;
    writer.write_all(&high0).map_err(io_err)?;
    writer.write_all(b"\n").map_err(io_err)?;

    for c in 1..columns {
        let mut low_line = Vec::with_capacity(a * a);
        let mut high_line = Vec::with_capacity(a * a);
        for context in 0..alphabet_size {
            match store.get(c, context) {
                Ok(pair) => {
                    encode_map(&quantizer_map(&pair.lo, alphabet_size), &mut low_line)?;
                    encode_map(&quantizer_map(&pair.hi, alphabet_size), &mut high_line)?;
                }
                Err(_) => {
                    low_line.extend(core::iter::repeat(MISSING).take(a));
                    high_line.extend(core::iter::repeat(MISSING).take(a));
                }
            }
        }
        writer.write_all(&low_line).map_err(io_err)?;
        writer.write_all(b"\n").map_err(io_err)?;
        writer.write_all(&high_line).map_err(io_err)?;
        writer.write_all(b"\n").map_err(io_err)?;
    }

    Ok(())
}

/// Reads a store back from the format spec.md §6.4 describes.
///
/// `seed` initializes the returned store's `choose` PRNG (the persisted
/// format carries no PRNG state of its own, matching spec.md §9: "the
/// PRNG's state lives inside the quantizer store... this makes tests
/// reproducible"; a decoder that needs to replay an encoder's draws must be
/// handed the same seed out of band).
pub fn read<R: Read>(reader: &mut R, alphabet_size: u8, seed: [u8; 128]) -> Result<ConditionalQuantizerStore> {
    let mut bytes = Vec::new();
    reader.read_to_end(&mut bytes).map_err(io_err)?;

    let mut lines = bytes.split(|&b| b == b'\n');
    let _placeholder_1 = lines.next().ok_or_else(|| malformed("missing placeholder line 1"))?;
    let _placeholder_2 = lines.next().ok_or_else(|| malformed("missing placeholder line 2"))?;
    let ratio_line = lines.next().ok_or_else(|| malformed("missing ratio line"))?;
    let columns = ratio_line.len();
    if columns == 0 {
        return Err(malformed("ratio line has zero columns"));
    }

    let a = alphabet_size as usize;

    let low0 = lines.next().ok_or_else(|| malformed("missing column 0 low line"))?;
    let high0 = lines.next().ok_or_else(|| malformed("missing column 0 high line"))?;
    if low0.len() != a || high0.len() != a {
        return Err(malformed("column 0 line width does not match alphabet_size"));
    }

    let mut store = ConditionalQuantizerStore::new(seed);
    let ratio0 = ratio_from_byte(ratio_line[0]);
    store.open_column(Alphabet::duplicate(&[0]));
    store.store(
        0,
        QuantizerPair {
            lo: Quantizer::from_raw_map(decode_map(low0, a)?, ratio0),
            hi: Quantizer::from_raw_map(decode_map(high0, a)?, 1.0 - ratio0),
            ratio: ratio0,
        },
    )?;

    for c in 1..columns {
        let low_line = lines.next().ok_or_else(|| malformed("missing low line for a column"))?;
        let high_line = lines.next().ok_or_else(|| malformed("missing high line for a column"))?;
        if low_line.len() != a * a || high_line.len() != a * a {
            return Err(malformed("column block-grid width does not match alphabet_size"));
        }

        let ratio_c = ratio_from_byte(ratio_line[c]);
        let contexts: Vec<u8> = (0..alphabet_size)
            .filter(|&context| {
                let start = context as usize * a;
                low_line[start..start + a].iter().any(|&b| b != MISSING)
            })
            .collect();

        store.open_column(Alphabet::duplicate(&contexts));
        for &context in &contexts {
            let start = context as usize * a;
            let lo_map = decode_map(&low_line[start..start + a], a)?;
            let hi_map = decode_map(&high_line[start..start + a], a)?;
            store.store(
                context,
                QuantizerPair {
                    lo: Quantizer::from_raw_map(lo_map, ratio_c),
                    hi: Quantizer::from_raw_map(hi_map, 1.0 - ratio_c),
                    ratio: ratio_c,
                },
            )?;
        }
    }

    Ok(store)
}
