// Copyright (C) 2021 Quentin Kniep <hello@quentinkniep.com>
// Distributed under terms of the MIT license.

//! Machinery shared by both Winternitz one-time signature variants:
//! the iterated chain hash, message digit extraction, the leaf digest
//! rule, and the closed scheme abstraction.

use std::convert::TryInto;

use rand::RngCore;
use sha2::{Digest as Sha2Digest, Sha256};

use crate::error::{Result, XmssError};
use crate::target_sum::TargetSumWinternitzOts;
use crate::wots::WinternitzOts;

/// Security parameter, chain element size in bytes.
pub const N: usize = 32;

/// Message digest length in bits; every message is padded or truncated to
/// this length before digit extraction.
pub const MSG_BITLEN: usize = 256;

/// A single chain element.
pub type Digest = [u8; N];

/// One random chain start per function chain, in chain order.
pub type OtsPrivateKey = Vec<Digest>;

/// One fully-iterated chain end per function chain, in chain order.
pub type OtsPublicKey = Vec<Digest>;

/// One partially-iterated chain element per function chain, in chain order.
pub type OtsSignature = Vec<Digest>;

/// Winternitz parameters accepted by both variants.
pub const VALID_W: [usize; 5] = [1, 2, 4, 8, 16];

/// Applies `length` iterations of the chain hash to `start`.
///
/// Each step hashes the accumulator followed by the chain index as a single
/// byte. This encoding is load-bearing: signatures are only compatible with
/// verifiers using the identical step function.
pub fn chain(start: &Digest, length: usize, index: usize) -> Digest {
    let mut result = *start;
    for _ in 0..length {
        let mut sha = Sha256::new();
        sha.update(&result);
        sha.update(&[index as u8]);
        result = sha.finalize().as_slice().try_into().unwrap();
    }
    return result;
}

/// Extracts the first `count` w-bit digits of the message, big-endian.
///
/// The message is first padded with zero bits (or truncated) to exactly
/// [`MSG_BITLEN`] bits.
pub fn message_digits(message: &[u8], w: usize, count: usize) -> Vec<u32> {
    let mut padded = [0u8; MSG_BITLEN / 8];
    let take = message.len().min(MSG_BITLEN / 8);
    padded[..take].copy_from_slice(&message[..take]);

    let mut digits = Vec::with_capacity(count);
    for i in 0..count {
        let mut digit = 0u32;
        for b in 0..w {
            let bit_index = i * w + b;
            let bit = (padded[bit_index / 8] >> (7 - (bit_index % 8))) & 1;
            digit = (digit << 1) | u32::from(bit);
        }
        digits.push(digit);
    }
    return digits;
}

/// Digests a one-time public key into the 32-byte Merkle leaf committed to
/// it: SHA-256 over the concatenated chain ends.
pub fn leaf_digest(public_key: &[Digest]) -> Vec<u8> {
    let mut sha = Sha256::new();
    for element in public_key {
        sha.update(element);
    }
    sha.finalize().to_vec()
}

/// The closed capability set of a one-time signature scheme.
///
/// Keygen, sign, verify and public-key recovery; no run-time extension is
/// needed, the two concrete variants below are the whole family.
pub trait Ots {
    /// Draws a fresh keypair from the given randomness source.
    fn generate_keypair(&self, rng: &mut dyn RngCore) -> (OtsPrivateKey, OtsPublicKey);

    /// Signs a message; each chain is advanced by its encoded digit.
    fn sign(&self, message: &[u8], private_key: &[Digest]) -> OtsSignature;

    /// Verifies a signature against a public key. Total: any mismatch or
    /// malformed input yields `false`, never an error.
    fn verify(&self, message: &[u8], signature: &[Digest], public_key: &[Digest]) -> bool;

    /// Recomputes the public key a signature commits to. Used by Merkle
    /// verification to rebuild the leaf without the original key.
    fn public_key_from_signature(&self, message: &[u8], signature: &[Digest]) -> OtsPublicKey;

    /// Number of function chains (and therefore key/signature elements).
    fn num_chains(&self) -> usize;

    /// The Winternitz width this scheme was constructed with.
    fn winternitz_parameter(&self) -> usize;
}

/// Sum type over the two supported one-time signature variants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OtsScheme {
    /// Classical Winternitz with checksum chains.
    Winternitz(WinternitzOts),
    /// Checksum-free variant enforcing a fixed digit sum.
    TargetSum(TargetSumWinternitzOts),
}

impl OtsScheme {
    /// Classical Winternitz with the given width.
    pub fn winternitz(w: usize) -> Result<Self> {
        Ok(OtsScheme::Winternitz(WinternitzOts::new(w)?))
    }

    /// Target-sum Winternitz with the given width.
    pub fn target_sum(w: usize) -> Result<Self> {
        Ok(OtsScheme::TargetSum(TargetSumWinternitzOts::new(w)?))
    }

    /// Stable one-byte scheme tag used by the serialized key layout.
    pub fn tag(&self) -> u8 {
        match self {
            OtsScheme::Winternitz(_) => 1,
            OtsScheme::TargetSum(_) => 2,
        }
    }

    /// Rebuilds a scheme from its serialized tag and width.
    pub fn from_tag(tag: u8, w: usize) -> Result<Self> {
        match tag {
            1 => Self::winternitz(w),
            2 => Self::target_sum(w),
            other => Err(XmssError::MalformedInput(format!(
                "unknown OTS scheme tag: {}",
                other
            ))),
        }
    }
}

impl Ots for OtsScheme {
    fn generate_keypair(&self, rng: &mut dyn RngCore) -> (OtsPrivateKey, OtsPublicKey) {
        match self {
            OtsScheme::Winternitz(ots) => ots.generate_keypair(rng),
            OtsScheme::TargetSum(ots) => ots.generate_keypair(rng),
        }
    }

    fn sign(&self, message: &[u8], private_key: &[Digest]) -> OtsSignature {
        match self {
            OtsScheme::Winternitz(ots) => ots.sign(message, private_key),
            OtsScheme::TargetSum(ots) => ots.sign(message, private_key),
        }
    }

    fn verify(&self, message: &[u8], signature: &[Digest], public_key: &[Digest]) -> bool {
        match self {
            OtsScheme::Winternitz(ots) => ots.verify(message, signature, public_key),
            OtsScheme::TargetSum(ots) => ots.verify(message, signature, public_key),
        }
    }

    fn public_key_from_signature(&self, message: &[u8], signature: &[Digest]) -> OtsPublicKey {
        match self {
            OtsScheme::Winternitz(ots) => ots.public_key_from_signature(message, signature),
            OtsScheme::TargetSum(ots) => ots.public_key_from_signature(message, signature),
        }
    }

    fn num_chains(&self) -> usize {
        match self {
            OtsScheme::Winternitz(ots) => ots.num_chains(),
            OtsScheme::TargetSum(ots) => ots.num_chains(),
        }
    }

    fn winternitz_parameter(&self) -> usize {
        match self {
            OtsScheme::Winternitz(ots) => ots.winternitz_parameter(),
            OtsScheme::TargetSum(ots) => ots.winternitz_parameter(),
        }
    }
}
