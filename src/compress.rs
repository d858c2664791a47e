//! The single LZ-family codec used to pack/unpack compressed archive
//! entries. The exact variant used by the original games could not be
//! recovered, so this is an explicit, documented design choice rather than a
//! byte-for-byte port: an LZSS scheme with 8-entry flag groups, a 12-bit
//! back-reference offset and a 4-bit length (biased by 3, so matches run
//! 3..=18). See DESIGN.md for the reasoning.
//!
//! The contract the rest of the crate relies on does not depend on the
//! variant: given a bounded source and an expected decompressed length,
//! `decompress` emits exactly that many bytes or fails; `compress` is its
//! inverse, falling back to "store uncompressed" being the caller's call
//! when the compressed form isn't smaller (see `archive`).

use std::io;

const MIN_MATCH: usize = 3;
const MAX_MATCH: usize = 18;
const MAX_OFFSET: usize = 4096;

#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("decompression produced {actual} bytes, expected exactly {expected}")]
    LengthMismatch { expected: usize, actual: usize },

    #[error("back-reference at output position {position} pointed {offset} bytes further back than the start of the output")]
    InvalidBackReference { position: usize, offset: usize },

    #[error("compressed stream ended before the expected output length was reached")]
    SourceExhausted,

    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type Result<T> = core::result::Result<T, Error>;

/// Decompresses `src` into exactly `expected_len` bytes.
pub(crate) fn decompress(src: &[u8], expected_len: usize) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(expected_len);
    let mut pos = 0usize;

    while out.len() < expected_len {
        let Some(&flags) = src.get(pos) else {
            return Err(Error::SourceExhausted);
        };
        pos += 1;

        for bit in 0..8 {
            if out.len() >= expected_len {
                break;
            }

            if flags & (1 << bit) != 0 {
                let Some(&byte) = src.get(pos) else {
                    return Err(Error::SourceExhausted);
                };
                pos += 1;
                out.push(byte);
            } else {
                let (&lo, &hi) = (
                    src.get(pos).ok_or(Error::SourceExhausted)?,
                    src.get(pos + 1).ok_or(Error::SourceExhausted)?,
                );
                pos += 2;
                let token = u16::from_le_bytes([lo, hi]);
                let offset = usize::from(token & 0x0FFF) + 1;
                let length = usize::from(token >> 12) + MIN_MATCH;

                if offset > out.len() {
                    return Err(Error::InvalidBackReference {
                        position: out.len(),
                        offset,
                    });
                }

                let start = out.len() - offset;
                for i in 0..length {
                    if out.len() >= expected_len {
                        break;
                    }
                    let byte = out[start + i];
                    out.push(byte);
                }
            }
        }
    }

    if out.len() == expected_len {
        Ok(out)
    } else {
        Err(Error::LengthMismatch {
            expected: expected_len,
            actual: out.len(),
        })
    }
}

/// Compresses `src`, greedily picking the longest back-reference within the
/// last [`MAX_OFFSET`] bytes via a simple hash-chain match finder. Returns
/// `None` if the compressed form would not be smaller than `src` (the
/// caller, the archive writer, stores the entry uncompressed in that case).
pub(crate) fn compress(src: &[u8]) -> Option<Vec<u8>> {
    if src.is_empty() {
        return None;
    }

    let mut out = Vec::with_capacity(src.len());
    let mut chains: std::collections::HashMap<[u8; 3], Vec<usize>> =
        std::collections::HashMap::new();

    let mut pos = 0usize;
    while pos < src.len() {
        let flags_idx = out.len();
        out.push(0u8);
        let mut flags = 0u8;

        for bit in 0..8 {
            if pos >= src.len() {
                break;
            }

            let best = find_best_match(src, pos, &chains);
            if let Some((offset, length)) = best {
                flags |= 1 << bit;
                let token = ((length - MIN_MATCH) as u16) << 12 | ((offset - 1) as u16 & 0x0FFF);
                out.extend_from_slice(&token.to_le_bytes());
                record_positions(src, &mut chains, pos, length);
                pos += length;
            } else {
                out.push(src[pos]);
                record_positions(src, &mut chains, pos, 1);
                pos += 1;
            }
        }

        out[flags_idx] = flags;
    }

    (out.len() < src.len()).then_some(out)
}

fn record_positions(
    src: &[u8],
    chains: &mut std::collections::HashMap<[u8; 3], Vec<usize>>,
    start: usize,
    count: usize,
) {
    for i in start..(start + count).min(src.len().saturating_sub(MIN_MATCH - 1)) {
        let key = [src[i], src[i + 1], src[i + 2]];
        chains.entry(key).or_default().push(i);
    }
}

fn find_best_match(
    src: &[u8],
    pos: usize,
    chains: &std::collections::HashMap<[u8; 3], Vec<usize>>,
) -> Option<(usize, usize)> {
    if pos + MIN_MATCH > src.len() {
        return None;
    }

    let key = [src[pos], src[pos + 1], src[pos + 2]];
    let candidates = chains.get(&key)?;

    let mut best: Option<(usize, usize)> = None;
    for &start in candidates.iter().rev() {
        let offset = pos - start;
        if offset == 0 || offset > MAX_OFFSET {
            continue;
        }

        let max_len = MAX_MATCH.min(src.len() - pos);
        let mut length = 0;
        while length < max_len && src[start + length] == src[pos + length] {
            length += 1;
        }

        if length >= MIN_MATCH && best.map_or(true, |(_, best_len)| length > best_len) {
            best = Some((offset, length));
        }
    }

    best
}

#[cfg(test)]
mod tests {
    use super::{compress, decompress};

    #[test]
    fn round_trips_repetitive_data() {
        let original = b"the quick brown fox jumps over the lazy dog the quick brown fox".repeat(4);
        let packed = compress(&original).expect("should compress smaller");
        assert!(packed.len() < original.len());
        let unpacked = decompress(&packed, original.len()).unwrap();
        assert_eq!(unpacked, original);
    }

    #[test]
    fn round_trips_incompressible_data() {
        let original: Vec<u8> = (0..=255u8).collect();
        let unpacked = match compress(&original) {
            Some(packed) => decompress(&packed, original.len()).unwrap(),
            None => original.clone(),
        };
        assert_eq!(unpacked, original);
    }

    #[test]
    fn rejects_short_streams() {
        let err = decompress(&[0x00], 10);
        assert!(matches!(err, Err(super::Error::SourceExhausted)));
    }

    #[test]
    fn rejects_out_of_range_back_reference() {
        // flags byte 0x00 -> first token is a back-reference; offset 5 with
        // nothing decoded yet is out of range.
        let stream = [0x00u8, 0x04, 0x00];
        let err = decompress(&stream, 4);
        assert!(matches!(err, Err(super::Error::InvalidBackReference { .. })));
    }

    #[test]
    fn empty_input_is_never_compressed() {
        assert!(compress(&[]).is_none());
    }
}
