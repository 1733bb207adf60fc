// Copyright (c) 2018 10x Genomics, Inc. All rights reserved.
//! IUPAC nucleotide codes as 4-bit base sets.
//!
//! Each symbol maps to the set of bases it stands for (A=1, C=2, G=4, T=8).
//! Two symbols are compatible if their sets intersect. `X` is the empty set
//! and therefore never matches anything.

/// Characters accepted in an adapter sequence after normalisation.
pub(crate) const ALLOWED_ADAPTER_CHARS: &str = "XACGTURYSWKMBDHVN";

const A: u8 = 1;
const C: u8 = 2;
const G: u8 = 4;
const T: u8 = 8;

/// Base set of an upper-case IUPAC symbol, `None` if the byte is not one.
pub(crate) fn iupac_mask(symbol: u8) -> Option<u8> {
    let mask = match symbol {
        b'A' => A,
        b'C' => C,
        b'G' => G,
        b'T' | b'U' => T,
        b'R' => A | G,
        b'Y' => C | T,
        b'S' => G | C,
        b'W' => A | T,
        b'K' => G | T,
        b'M' => A | C,
        b'B' => C | G | T,
        b'D' => A | G | T,
        b'H' => A | C | T,
        b'V' => A | C | G,
        b'N' => A | C | G | T,
        b'X' => 0,
        _ => return None,
    };
    Some(mask)
}

/// Base set of a read symbol. Ambiguity codes in the read only stand for
/// their bases when `wildcards` is set; otherwise they match nothing.
#[inline]
pub(crate) fn read_mask(symbol: u8, wildcards: bool) -> u8 {
    match symbol {
        b'A' => A,
        b'C' => C,
        b'G' => G,
        b'T' | b'U' => T,
        _ if wildcards => iupac_mask(symbol).unwrap_or(0),
        _ => 0,
    }
}

/// True if `seq` contains any symbol other than A, C, G and T.
pub(crate) fn has_ambiguity(seq: &[u8]) -> bool {
    seq.iter().any(|b| !matches!(b, b'A' | b'C' | b'G' | b'T'))
}

/// Upper-case the sequence and fold `U` into `T`. Returns the first byte
/// that is not a valid adapter symbol as an error.
pub(crate) fn normalize_adapter(seq: &str) -> Result<Vec<u8>, char> {
    seq.chars()
        .map(|c| {
            let upper = c.to_ascii_uppercase();
            match upper {
                'U' => Ok(b'T'),
                _ if upper.is_ascii() && iupac_mask(upper as u8).is_some() => Ok(upper as u8),
                _ => Err(c),
            }
        })
        .collect()
}
