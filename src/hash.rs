// Copyright (C) 2021 Quentin Kniep <hello@quentinkniep.com>
// Distributed under terms of the MIT license.

//! Tweakable hash functions.
//!
//! A tweakable hash domain-separates the four hashing roles of the scheme
//! (message, chain, leaf, node) by prepending a role-specific tweak to the
//! data before invoking the underlying primitive.

use sha3::{Sha3_256, Sha3_512, Shake256};

use crate::error::{Result, XmssError};

/// Domain-separated hashing with a common primitive.
///
/// The provided methods fix the tweak layout; implementors only supply the
/// raw `hash` and their output width.
pub trait TweakableHash {
    /// Hashes `data`, with the tweak (if any) prepended.
    fn hash(&self, data: &[u8], tweak: Option<&[u8]>) -> Vec<u8>;

    /// Output width in bytes.
    fn output_length(&self) -> usize;

    /// Hash used to digest messages before encoding.
    fn message_hash(&self, data: &[u8]) -> Vec<u8> {
        self.hash(data, Some(b"MSG"))
    }

    /// Hash used for one step of a Winternitz chain, separated per chain.
    fn chain_hash(&self, data: &[u8], index: u32) -> Vec<u8> {
        let mut tweak = b"CHAIN".to_vec();
        tweak.extend_from_slice(&index.to_be_bytes());
        self.hash(data, Some(&tweak))
    }

    /// Hash used to turn a one-time public key into a Merkle leaf.
    fn leaf_hash(&self, data: &[u8]) -> Vec<u8> {
        self.hash(data, Some(b"LEAF"))
    }

    /// Hash used for inner Merkle nodes, separated by level and position.
    fn node_hash(&self, left: &[u8], right: &[u8], level: u32, index: u32) -> Vec<u8> {
        let mut tweak = b"NODE".to_vec();
        tweak.extend_from_slice(&level.to_be_bytes());
        tweak.extend_from_slice(&index.to_be_bytes());
        let mut data = left.to_vec();
        data.extend_from_slice(right);
        self.hash(&data, Some(&tweak))
    }
}

/// SHA-3 backed tweakable hash (SHA3-256 or SHA3-512).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sha3Hash {
    output_length: usize,
}

impl Sha3Hash {
    /// Creates a SHA-3 instance with the given output width in bytes.
    /// Only 32 (SHA3-256) and 64 (SHA3-512) are supported.
    pub fn new(output_length: usize) -> Result<Self> {
        match output_length {
            32 | 64 => Ok(Self { output_length }),
            other => Err(XmssError::InvalidParameter(format!(
                "unsupported SHA-3 output width: {} bytes",
                other
            ))),
        }
    }
}

impl TweakableHash for Sha3Hash {
    fn hash(&self, data: &[u8], tweak: Option<&[u8]>) -> Vec<u8> {
        use sha3::Digest;

        if self.output_length == 32 {
            let mut hasher = Sha3_256::new();
            if let Some(tweak) = tweak {
                hasher.update(tweak);
            }
            hasher.update(data);
            hasher.finalize().to_vec()
        } else {
            let mut hasher = Sha3_512::new();
            if let Some(tweak) = tweak {
                hasher.update(tweak);
            }
            hasher.update(data);
            hasher.finalize().to_vec()
        }
    }

    fn output_length(&self) -> usize {
        self.output_length
    }
}

/// Poseidon-shaped stand-in.
///
/// Exposes the tweakable-hash contract with the declared output width so an
/// arithmetic-friendly hash can be slotted in later. The permutation here is
/// NOT Poseidon: the output is squeezed from a SHAKE-256 XOF, which honours
/// the width contract but has none of Poseidon's algebraic structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoseidonHash {
    rate: usize,
    capacity: usize,
    full_rounds: usize,
    partial_rounds: usize,
}

impl PoseidonHash {
    /// Creates a stub with the given sponge parameters.
    /// The output width equals `rate` bytes.
    pub fn new(
        rate: usize,
        capacity: usize,
        full_rounds: usize,
        partial_rounds: usize,
    ) -> Result<Self> {
        if rate == 0 {
            return Err(XmssError::InvalidParameter(
                "Poseidon rate must be non-zero".to_string(),
            ));
        }
        Ok(Self {
            rate,
            capacity,
            full_rounds,
            partial_rounds,
        })
    }

    /// Declared (full, partial) round counts.
    pub fn round_counts(&self) -> (usize, usize) {
        (self.full_rounds, self.partial_rounds)
    }

    /// Declared sponge capacity in bytes.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl TweakableHash for PoseidonHash {
    fn hash(&self, data: &[u8], tweak: Option<&[u8]>) -> Vec<u8> {
        use sha3::digest::{ExtendableOutput, Update, XofReader};

        let mut xof = Shake256::default();
        if let Some(tweak) = tweak {
            xof.update(tweak);
        }
        xof.update(data);
        let mut output = vec![0u8; self.rate];
        xof.finalize_xof().read(&mut output);
        return output;
    }

    fn output_length(&self) -> usize {
        self.rate
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha3_contract_widths() {
        for &width in &[32usize, 64] {
            let hash = Sha3Hash::new(width).unwrap();
            let x = b"test data for hashing";
            assert_eq!(hash.message_hash(x).len(), width);
            assert_eq!(hash.chain_hash(x, 10).len(), width);
            assert_eq!(hash.leaf_hash(x).len(), width);
            assert_eq!(hash.node_hash(b"left", b"right", 2, 5).len(), width);
            assert_eq!(hash.output_length(), width);
        }
    }

    #[test]
    fn sha3_rejects_unsupported_width() {
        assert!(Sha3Hash::new(16).is_err());
        assert!(Sha3Hash::new(48).is_err());
        assert!(Sha3Hash::new(0).is_err());
    }

    #[test]
    fn tweaks_separate_roles() {
        let hash = Sha3Hash::new(32).unwrap();
        let x = b"same input";
        let digests = [
            hash.message_hash(x),
            hash.chain_hash(x, 0),
            hash.leaf_hash(x),
            hash.hash(x, None),
        ];
        for i in 0..digests.len() {
            for j in i + 1..digests.len() {
                assert_ne!(digests[i], digests[j]);
            }
        }
    }

    #[test]
    fn chain_hash_separates_indices() {
        let hash = Sha3Hash::new(32).unwrap();
        assert_ne!(hash.chain_hash(b"x", 0), hash.chain_hash(b"x", 1));
    }

    #[test]
    fn node_hash_separates_positions() {
        let hash = Sha3Hash::new(32).unwrap();
        let a = hash.node_hash(b"l", b"r", 1, 0);
        let b = hash.node_hash(b"l", b"r", 1, 1);
        let c = hash.node_hash(b"l", b"r", 2, 0);
        assert_ne!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn sha3_is_deterministic() {
        let hash = Sha3Hash::new(32).unwrap();
        assert_eq!(hash.message_hash(b"abc"), hash.message_hash(b"abc"));
    }

    #[test]
    fn poseidon_stub_honours_declared_width() {
        let poseidon = PoseidonHash::new(32, 8, 8, 57).unwrap();
        let x = b"poseidon input";
        assert_eq!(poseidon.message_hash(x).len(), 32);
        assert_eq!(poseidon.chain_hash(x, 3).len(), 32);
        assert_eq!(poseidon.leaf_hash(x).len(), 32);
        assert_eq!(poseidon.node_hash(b"l", b"r", 0, 0).len(), 32);

        let wide = PoseidonHash::new(48, 16, 8, 57).unwrap();
        assert_eq!(wide.message_hash(x).len(), 48);
        assert_eq!(wide.round_counts(), (8, 57));
        assert_eq!(wide.capacity(), 16);
    }

    #[test]
    fn poseidon_rejects_zero_rate() {
        assert!(PoseidonHash::new(0, 8, 8, 57).is_err());
    }
}
