// Copyright (C) 2021 Quentin Kniep <hello@quentinkniep.com>
// Distributed under terms of the MIT license.

//! Incomparable message encodings.
//!
//! The unified signature framework is parameterised over an encoding whose
//! outputs for distinct messages are incomparable (neither digit vector
//! dominates the other). The signing path does not call into this module;
//! it exists so alternative encodings can be analysed against one seam.

use sha2::{Digest, Sha256};

/// Encoding seam of the unified framework.
pub trait MessageEncoding {
    /// Encodes a message into `encoding_length` digests.
    fn encode(&self, message: &[u8]) -> Vec<Vec<u8>>;

    /// Collapses an encoding back into a single representative digest.
    fn decode(&self, encoded: &[Vec<u8>]) -> Vec<u8>;

    /// Whether two encodings are incomparable.
    fn verify_incomparability(&self, first: &[Vec<u8>], second: &[Vec<u8>]) -> bool;

    /// Number of elements in every encoding.
    fn encoding_length(&self) -> usize;
}

/// Hash-expansion encoding: element i is SHA-256(message ‖ be_u32(i)).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IncomparableEncoding {
    encoding_length: usize,
}

impl IncomparableEncoding {
    pub fn new(encoding_length: usize) -> Self {
        Self { encoding_length }
    }
}

impl Default for IncomparableEncoding {
    fn default() -> Self {
        Self::new(32)
    }
}

impl MessageEncoding for IncomparableEncoding {
    fn encode(&self, message: &[u8]) -> Vec<Vec<u8>> {
        (0..self.encoding_length as u32)
            .map(|i| {
                let mut sha = Sha256::new();
                sha.update(message);
                sha.update(&i.to_be_bytes());
                sha.finalize().to_vec()
            })
            .collect()
    }

    fn decode(&self, encoded: &[Vec<u8>]) -> Vec<u8> {
        if encoded.is_empty() {
            return Vec::new();
        }
        let mut sha = Sha256::new();
        for element in encoded {
            sha.update(element);
        }
        sha.finalize().to_vec()
    }

    fn verify_incomparability(&self, first: &[Vec<u8>], second: &[Vec<u8>]) -> bool {
        if first.len() != second.len() {
            return true;
        }
        // Identical encodings are the one comparable case this concrete
        // encoding can produce.
        first != second
    }

    fn encoding_length(&self) -> usize {
        self.encoding_length
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_produces_declared_length() {
        let encoding = IncomparableEncoding::new(16);
        let encoded = encoding.encode(b"message");
        assert_eq!(encoded.len(), 16);
        assert_eq!(encoding.encoding_length(), 16);
        assert_eq!(encoded.iter().all(|e| e.len() == 32), true);
    }

    #[test]
    fn encode_is_deterministic_and_message_bound() {
        let encoding = IncomparableEncoding::default();
        assert_eq!(encoding.encode(b"a"), encoding.encode(b"a"));
        assert_ne!(encoding.encode(b"a"), encoding.encode(b"b"));
    }

    #[test]
    fn elements_differ_within_an_encoding() {
        let encoding = IncomparableEncoding::default();
        let encoded = encoding.encode(b"spread");
        assert_ne!(encoded[0], encoded[1]);
    }

    #[test]
    fn decode_collapses_deterministically() {
        let encoding = IncomparableEncoding::default();
        let encoded = encoding.encode(b"message");
        assert_eq!(encoding.decode(&encoded), encoding.decode(&encoded));
        assert_eq!(encoding.decode(&[]), Vec::<u8>::new());
    }

    #[test]
    fn incomparability_checks() {
        let encoding = IncomparableEncoding::default();
        let a = encoding.encode(b"a");
        let b = encoding.encode(b"b");
        assert_eq!(encoding.verify_incomparability(&a, &b), true);
        assert_eq!(encoding.verify_incomparability(&a, &a.clone()), false);
        assert_eq!(encoding.verify_incomparability(&a, &b[..4]), true);
    }
}
