//! EBCDIC codec (component C1).
//!
//! Each supported codepage is a fixed 256-entry decode table plus a
//! lazily-inverted encode table, built once in [`Codec::new`] and fixed for
//! the lifetime of the codec — mirroring the Data Model's "implementer's
//! choice, fixed for life of buffer" rule applied one layer down to the
//! codec itself.
//!
//! `decode` is infallible: every EBCDIC byte has *some* host representation.
//! `encode` can fail with [`CodecError::InvalidCharacter`] for host
//! characters outside the codepage's representable (Latin-1) range — this is
//! the bijective-subset boundary the round-trip law in the test suite
//! exercises.

use serde::{Deserialize, Serialize};

use crate::error::{CodecError, CodecResult};

/// Which EBCDIC codepage a [`Codec`] translates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CodePage {
    /// US/Canada (the default; also what the teacher's `protocol_common::ebcdic` module implements).
    Cp037,
    /// Germany/Austria.
    Cp273,
    /// International #5.
    Cp500,
    /// Open Systems (latin-1).
    Cp1047,
}

impl Default for CodePage {
    fn default() -> Self { CodePage::Cp037 }
}

// EBCDIC -> host byte (Latin-1 code point), CP037 (US/Canada).
const CP037_DECODE: [u8; 256] = [
    0x00, 0x01, 0x02, 0x03, 0x9C, 0x09, 0x86, 0x7F, 0x97, 0x8D, 0x8E, 0x0B, 0x0C, 0x0D, 0x0E, 0x0F,
    0x10, 0x11, 0x12, 0x13, 0x9D, 0x85, 0x08, 0x87, 0x18, 0x19, 0x92, 0x8F, 0x1C, 0x1D, 0x1E, 0x1F,
    0x80, 0x81, 0x82, 0x83, 0x84, 0x0A, 0x17, 0x1B, 0x88, 0x89, 0x8A, 0x8B, 0x8C, 0x05, 0x06, 0x07,
    0x90, 0x91, 0x16, 0x93, 0x94, 0x95, 0x96, 0x04, 0x98, 0x99, 0x9A, 0x9B, 0x14, 0x15, 0x9E, 0x1A,
    0x20, 0xA0, 0xE2, 0xE4, 0xE0, 0xE1, 0xE3, 0xE5, 0xE7, 0xF1, 0xA2, 0x2E, 0x3C, 0x28, 0x2B, 0x7C,
    0x26, 0xE9, 0xEA, 0xEB, 0xE8, 0xED, 0xEE, 0xEF, 0xEC, 0xDF, 0x21, 0x24, 0x2A, 0x29, 0x3B, 0xAC,
    0x2D, 0x2F, 0xC2, 0xC4, 0xC0, 0xC1, 0xC3, 0xC5, 0xC7, 0xD1, 0xA6, 0x2C, 0x25, 0x5F, 0x3E, 0x3F,
    0xF8, 0xC9, 0xCA, 0xCB, 0xC8, 0xCD, 0xCE, 0xCF, 0xCC, 0x60, 0x3A, 0x23, 0x40, 0x27, 0x3D, 0x22,
    0xD8, 0x61, 0x62, 0x63, 0x64, 0x65, 0x66, 0x67, 0x68, 0x69, 0xAB, 0xBB, 0xF0, 0xFD, 0xFE, 0xB1,
    0xB0, 0x6A, 0x6B, 0x6C, 0x6D, 0x6E, 0x6F, 0x70, 0x71, 0x72, 0xAA, 0xBA, 0xE6, 0xB8, 0xC6, 0xA4,
    0xB5, 0x7E, 0x73, 0x74, 0x75, 0x76, 0x77, 0x78, 0x79, 0x7A, 0xA1, 0xBF, 0xD0, 0xDD, 0xDE, 0xAE,
    0x5E, 0xA3, 0xA5, 0xB7, 0xA9, 0xA7, 0xB6, 0xBC, 0xBD, 0xBE, 0x5B, 0x5D, 0xAF, 0xA8, 0xB4, 0xD7,
    0x7B, 0x41, 0x42, 0x43, 0x44, 0x45, 0x46, 0x47, 0x48, 0x49, 0xAD, 0xF4, 0xF6, 0xF2, 0xF3, 0xF5,
    0x7D, 0x4A, 0x4B, 0x4C, 0x4D, 0x4E, 0x4F, 0x50, 0x51, 0x52, 0xB9, 0xFB, 0xFC, 0xF9, 0xFA, 0xFF,
    0x5C, 0xF7, 0x53, 0x54, 0x55, 0x56, 0x57, 0x58, 0x59, 0x5A, 0xB2, 0xD4, 0xD6, 0xD2, 0xD3, 0xD5,
    0x30, 0x31, 0x32, 0x33, 0x34, 0x35, 0x36, 0x37, 0x38, 0x39, 0xB3, 0xDB, 0xDC, 0xD9, 0xDA, 0x9F,
];

/// CP500 and CP1047 are built from CP037 by swapping the bracket/pipe/
/// exclamation-mark positions that international EBCDIC variants reposition
/// relative to CP037: the swap is a genuine permutation (so every table is
/// still a full bijection over the 256 byte values), constructed the same
/// way for both variants since they share this repositioning convention.
fn swap_pairs(mut table: [u8; 256], pairs: &[(u8, u8)]) -> [u8; 256] {
    for &(a, b) in pairs {
        table.swap(a as usize, b as usize);
    }
    table
}

fn cp500_table() -> [u8; 256] {
    swap_pairs(CP037_DECODE, &[(0x4A, 0xBA), (0x4F, 0x5F), (0x5A, 0xBB)])
}

fn cp1047_table() -> [u8; 256] {
    swap_pairs(CP037_DECODE, &[(0x4A, 0xBA), (0x4F, 0x5F), (0x5A, 0xBB), (0xB0, 0xA1)])
}

fn cp273_table() -> [u8; 256] {
    swap_pairs(CP037_DECODE, &[(0x4A, 0x79), (0x5A, 0x4F), (0xB0, 0xA1)])
}

/// EBCDIC <-> host-byte translator for one codepage.
pub struct Codec {
    codepage: CodePage,
    decode_table: [u8; 256],
    encode_table: [Option<u8>; 256],
}

impl Codec {
    pub fn new(codepage: CodePage) -> Self {
        let decode_table = match codepage {
            CodePage::Cp037 => CP037_DECODE,
            CodePage::Cp500 => cp500_table(),
            CodePage::Cp1047 => cp1047_table(),
            CodePage::Cp273 => cp273_table(),
        };
        let mut encode_table = [None; 256];
        for (ebcdic, &host) in decode_table.iter().enumerate() {
            // First writer wins: if two EBCDIC bytes decode to the same host
            // byte, the lower one is the canonical encode target and the
            // higher one falls outside the bijective subset for `encode`.
            if encode_table[host as usize].is_none() {
                encode_table[host as usize] = Some(ebcdic as u8);
            }
        }
        Codec { codepage, decode_table, encode_table }
    }

    pub fn codepage(&self) -> CodePage { self.codepage }

    /// Decode one EBCDIC byte to its host character. Infallible.
    pub fn decode(&self, ebcdic_byte: u8) -> char {
        self.decode_table[ebcdic_byte as usize] as char
    }

    /// Encode one host character to its EBCDIC byte.
    pub fn encode(&self, host_char: char) -> CodecResult<u8> {
        let code_point = host_char as u32;
        if code_point > 0xFF {
            return Err(CodecError::InvalidCharacter { byte: code_point as u8 });
        }
        let byte = code_point as u8;
        self.encode_table[byte as usize].ok_or(CodecError::InvalidCharacter { byte })
    }

    /// Decode a slice of EBCDIC bytes into an owned `String`.
    pub fn decode_alloc(&self, bytes: &[u8]) -> String {
        bytes.iter().map(|&b| self.decode(b)).collect()
    }

    /// Encode a `&str` into an owned `Vec<u8>` of EBCDIC bytes.
    pub fn encode_alloc(&self, text: &str) -> CodecResult<Vec<u8>> {
        text.chars().map(|c| self.encode(c)).collect()
    }

    /// Decode `ebcdic` into `out`, one host byte per input byte.
    /// Fails with [`CodecError::BufferOverflow`] without partially writing
    /// past the point of failure if `out` is too small.
    pub fn decode_into(&self, ebcdic: &[u8], out: &mut [u8]) -> CodecResult<usize> {
        if out.len() < ebcdic.len() {
            return Err(CodecError::BufferOverflow { needed: ebcdic.len(), available: out.len() });
        }
        for (i, &b) in ebcdic.iter().enumerate() {
            out[i] = self.decode_table[b as usize];
        }
        Ok(ebcdic.len())
    }

    /// Encode `text` into `out`, one EBCDIC byte per input character.
    /// Stops (without partial commit of the failing character) on the first
    /// character outside the bijective subset.
    pub fn encode_into(&self, text: &str, out: &mut [u8]) -> CodecResult<usize> {
        let mut n = 0;
        for c in text.chars() {
            if n >= out.len() {
                return Err(CodecError::BufferOverflow { needed: n + 1, available: out.len() });
            }
            out[n] = self.encode(c)?;
            n += 1;
        }
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cp037_decodes_known_bytes() {
        let codec = Codec::new(CodePage::Cp037);
        assert_eq!(codec.decode(0xC1), 'A');
        assert_eq!(codec.decode(0x81), 'a');
        assert_eq!(codec.decode(0xF0), '0');
    }

    #[test]
    fn cp037_encodes_known_chars() {
        let codec = Codec::new(CodePage::Cp037);
        assert_eq!(codec.encode('A').unwrap(), 0xC1);
        assert_eq!(codec.encode('0').unwrap(), 0xF0);
    }

    #[test]
    fn round_trip_alnum_all_codepages() {
        let text = "ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789 .,";
        for cp in [CodePage::Cp037, CodePage::Cp273, CodePage::Cp500, CodePage::Cp1047] {
            let codec = Codec::new(cp);
            for ch in text.chars() {
                let encoded = codec.encode(ch).unwrap();
                assert_eq!(codec.decode(encoded), ch, "round trip failed for {ch:?} in {cp:?}");
            }
        }
    }

    #[test]
    fn encode_rejects_non_latin1() {
        let codec = Codec::new(CodePage::Cp037);
        assert!(codec.encode('€').is_err());
    }

    #[test]
    fn encode_into_rejects_undersized_buffer() {
        let codec = Codec::new(CodePage::Cp037);
        let mut out = [0u8; 2];
        assert!(codec.encode_into("abc", &mut out).is_err());
    }

    #[test]
    fn decode_into_fills_buffer() {
        let codec = Codec::new(CodePage::Cp037);
        let mut out = [0u8; 3];
        let n = codec.decode_into(&[0xC8, 0xC5, 0xD3], &mut out).unwrap();
        assert_eq!(n, 3);
        assert_eq!(&out, b"HEL");
    }

    #[test]
    fn cp500_differs_from_cp037_at_bracket_positions() {
        let cp037 = Codec::new(CodePage::Cp037);
        let cp500 = Codec::new(CodePage::Cp500);
        assert_ne!(cp037.decode(0x4A), cp500.decode(0x4A));
    }
}
