//! Key equivalence strategies: how keys are hashed and compared.
//!
//! The map never hashes or compares keys directly; it goes through a
//! `KeyEquivalence` so the same structure serves both case-insensitive and
//! case-sensitive string keys.

use core::hash::Hasher;

/// Hashing and equality over the raw bytes of a key.
///
/// Implementations must be consistent: `keys_equal(a, b)` implies that
/// `hash_key(a, ..)` and `hash_key(b, ..)` feed identical input to the hasher.
/// Both must be pure functions of the key bytes.
pub trait KeyEquivalence {
    fn hash_key<H: Hasher>(&self, key: &[u8], state: &mut H);
    fn keys_equal(&self, a: &[u8], b: &[u8]) -> bool;
}

/// ASCII case-insensitive keys: `A-Z` fold to `a-z`, every other byte
/// (including non-ASCII) compares as-is.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct AsciiCaseInsensitive;

/// Plain byte-wise keys.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct CaseSensitive;

// Folded bytes are handed to the hasher in fixed-size chunks so equal keys
// always produce the same sequence of `write` calls.
const FOLD_CHUNK: usize = 32;

impl KeyEquivalence for AsciiCaseInsensitive {
    #[inline]
    fn hash_key<H: Hasher>(&self, key: &[u8], state: &mut H) {
        let mut buf = [0u8; FOLD_CHUNK];
        for chunk in key.chunks(FOLD_CHUNK) {
            let out = &mut buf[..chunk.len()];
            out.copy_from_slice(chunk);
            out.make_ascii_lowercase();
            state.write(out);
        }
        // Same terminator `str` uses, so "ab" + "c" and "a" + "bc" differ
        // when keys are hashed as parts of a larger value.
        state.write_u8(0xff);
    }

    #[inline]
    fn keys_equal(&self, a: &[u8], b: &[u8]) -> bool {
        a.eq_ignore_ascii_case(b)
    }
}

impl KeyEquivalence for CaseSensitive {
    #[inline]
    fn hash_key<H: Hasher>(&self, key: &[u8], state: &mut H) {
        state.write(key);
        state.write_u8(0xff);
    }

    #[inline]
    fn keys_equal(&self, a: &[u8], b: &[u8]) -> bool {
        a == b
    }
}
