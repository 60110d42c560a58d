// Copyright (C) 2021 Quentin Kniep <hello@quentinkniep.com>
// Distributed under terms of the MIT license.

//! Classical Winternitz One-Time Signature scheme.
//!
//! Message digits select positions along hash chains; appended checksum
//! chains stop an attacker from advancing message chains undetected.

use rand::RngCore;
use subtle::{Choice, ConstantTimeEq};

use crate::error::{Result, XmssError};
use crate::ots::{chain, message_digits, Digest, Ots, OtsPrivateKey, OtsPublicKey, OtsSignature};
use crate::ots::{MSG_BITLEN, N, VALID_W};

/// Classical Winternitz OTS with checksum blocks.
///
/// All lengths are fixed by the width `w` at construction: `m = 256/w`
/// message digits, `c = ⌈bits(m·(2^w−1))/w⌉` checksum digits, `L = m + c`
/// chains of maximum length `2^w − 1`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WinternitzOts {
    w: usize,
    num_msg_blocks: usize,
    num_checksum_blocks: usize,
    num_blocks: usize,
    max_chain_len: u32,
}

impl WinternitzOts {
    /// Creates the scheme for a width `w` in {1, 2, 4, 8, 16}.
    pub fn new(w: usize) -> Result<Self> {
        if !VALID_W.contains(&w) {
            return Err(XmssError::InvalidParameter(format!(
                "Winternitz parameter w must be 1, 2, 4, 8 or 16, got {}",
                w
            )));
        }

        let num_msg_blocks = MSG_BITLEN / w;
        let max_chain_len = (1u32 << w) - 1;
        let max_checksum = num_msg_blocks as u64 * u64::from(max_chain_len);
        let checksum_bits = (64 - max_checksum.leading_zeros()) as usize;
        let num_checksum_blocks = (checksum_bits + w - 1) / w;

        return Ok(Self {
            w,
            num_msg_blocks,
            num_checksum_blocks,
            num_blocks: num_msg_blocks + num_checksum_blocks,
            max_chain_len,
        });
    }

    /// Maximum chain length `2^w − 1`.
    pub fn max_chain_length(&self) -> u32 {
        self.max_chain_len
    }

    /// Encodes a message as `L` chain positions: `m` message digits
    /// followed by the checksum `Σ(C − b_i)` in base `2^w`,
    /// most-significant digit first, zero-padded to `L`.
    fn encode(&self, message: &[u8]) -> Vec<u32> {
        let mut digits = message_digits(message, self.w, self.num_msg_blocks);

        let total: u64 = digits
            .iter()
            .map(|&d| u64::from(self.max_chain_len - d))
            .sum();
        let mut checksum = Vec::with_capacity(self.num_checksum_blocks);
        let mut rest = total;
        for _ in 0..self.num_checksum_blocks {
            checksum.push((rest & u64::from(self.max_chain_len)) as u32);
            rest >>= self.w;
        }
        checksum.reverse();
        digits.extend(checksum);

        while digits.len() < self.num_blocks {
            digits.push(0);
        }
        digits.truncate(self.num_blocks);
        return digits;
    }
}

impl Ots for WinternitzOts {
    fn generate_keypair(&self, rng: &mut dyn RngCore) -> (OtsPrivateKey, OtsPublicKey) {
        let mut private_key = Vec::with_capacity(self.num_blocks);
        for _ in 0..self.num_blocks {
            let mut element = [0u8; N];
            rng.fill_bytes(&mut element);
            private_key.push(element);
        }

        let mut public_key = Vec::with_capacity(self.num_blocks);
        for (j, element) in private_key.iter().enumerate() {
            public_key.push(chain(element, self.max_chain_len as usize, j));
        }

        return (private_key, public_key);
    }

    fn sign(&self, message: &[u8], private_key: &[Digest]) -> OtsSignature {
        let encoded = self.encode(message);
        encoded
            .iter()
            .zip(private_key)
            .enumerate()
            .map(|(j, (&digit, element))| chain(element, digit as usize, j))
            .collect()
    }

    fn verify(&self, message: &[u8], signature: &[Digest], public_key: &[Digest]) -> bool {
        if signature.len() != public_key.len() {
            return false;
        }
        let encoded = self.encode(message);
        if signature.len() > encoded.len() {
            return false;
        }

        let mut ok = Choice::from(1u8);
        for (j, (sig_element, pk_element)) in signature.iter().zip(public_key).enumerate() {
            let remaining = (self.max_chain_len - encoded[j]) as usize;
            let reconstructed = chain(sig_element, remaining, j);
            ok &= reconstructed.ct_eq(pk_element);
        }
        ok.unwrap_u8() == 1
    }

    fn public_key_from_signature(&self, message: &[u8], signature: &[Digest]) -> OtsPublicKey {
        let encoded = self.encode(message);
        encoded
            .iter()
            .zip(signature)
            .enumerate()
            .map(|(j, (&digit, element))| chain(element, (self.max_chain_len - digit) as usize, j))
            .collect()
    }

    fn num_chains(&self) -> usize {
        self.num_blocks
    }

    fn winternitz_parameter(&self) -> usize {
        self.w
    }
}

#[cfg(test)]
mod tests {
    use rand::thread_rng;

    use super::*;

    #[test]
    fn rejects_invalid_widths() {
        for &w in &[0usize, 3, 5, 6, 7, 9, 15, 32, 256] {
            assert_eq!(WinternitzOts::new(w).is_err(), true);
        }
        for &w in &VALID_W {
            assert_eq!(WinternitzOts::new(w).is_ok(), true);
        }
    }

    #[test]
    fn chain_counts_per_width() {
        // m = 256/w message chains plus ⌈bits(m·(2^w−1))/w⌉ checksum chains.
        assert_eq!(WinternitzOts::new(1).unwrap().num_chains(), 256 + 9);
        assert_eq!(WinternitzOts::new(2).unwrap().num_chains(), 128 + 5);
        assert_eq!(WinternitzOts::new(4).unwrap().num_chains(), 64 + 3);
        assert_eq!(WinternitzOts::new(8).unwrap().num_chains(), 32 + 2);
        assert_eq!(WinternitzOts::new(16).unwrap().num_chains(), 16 + 2);
    }

    #[test]
    fn keypair_has_one_element_per_chain() {
        let ots = WinternitzOts::new(4).unwrap();
        let (sk, pk) = ots.generate_keypair(&mut thread_rng());
        assert_eq!(sk.len(), ots.num_chains());
        assert_eq!(pk.len(), ots.num_chains());
    }

    #[test]
    fn sign_and_verify() {
        let ots = WinternitzOts::new(4).unwrap();
        let (sk, pk) = ots.generate_keypair(&mut thread_rng());
        let sig = ots.sign(b"hello world", &sk);
        assert_eq!(ots.verify(b"hello world", &sig, &pk), true);
        assert_eq!(ots.verify(b"hello", &sig, &pk), false);
        assert_eq!(ots.verify(b"hello world 123", &sig, &pk), false);
    }

    #[test]
    fn signing_is_deterministic() {
        let ots = WinternitzOts::new(4).unwrap();
        let (sk, _) = ots.generate_keypair(&mut thread_rng());
        assert_eq!(ots.sign(b"msg", &sk), ots.sign(b"msg", &sk));
    }

    #[test]
    fn recovered_public_key_matches() {
        for &w in &[2usize, 4, 8] {
            let ots = WinternitzOts::new(w).unwrap();
            let (sk, pk) = ots.generate_keypair(&mut thread_rng());
            let sig = ots.sign(b"round trip", &sk);
            assert_eq!(ots.public_key_from_signature(b"round trip", &sig), pk);
        }
    }

    #[test]
    fn tampered_signature_fails() {
        let ots = WinternitzOts::new(4).unwrap();
        let (sk, pk) = ots.generate_keypair(&mut thread_rng());
        let mut sig = ots.sign(b"payload", &sk);
        sig[0][0] ^= 1;
        assert_eq!(ots.verify(b"payload", &sig, &pk), false);
    }

    #[test]
    fn truncated_signature_fails() {
        let ots = WinternitzOts::new(4).unwrap();
        let (sk, pk) = ots.generate_keypair(&mut thread_rng());
        let mut sig = ots.sign(b"payload", &sk);
        sig.pop();
        assert_eq!(ots.verify(b"payload", &sig, &pk), false);
    }

    #[test]
    fn encoding_has_full_length_and_bounded_digits() {
        for &w in &VALID_W {
            let ots = WinternitzOts::new(w).unwrap();
            let encoded = ots.encode(b"bounded digits");
            assert_eq!(encoded.len(), ots.num_chains());
            assert_eq!(encoded.iter().all(|&d| d <= ots.max_chain_length()), true);
        }
    }

    #[test]
    fn checksum_is_big_endian_expansion_of_deficit() {
        let ots = WinternitzOts::new(4).unwrap();
        let encoded = ots.encode(b"checksum check");
        let (msg_digits, checksum) = encoded.split_at(ots.num_msg_blocks);

        let total: u64 = msg_digits
            .iter()
            .map(|&d| u64::from(ots.max_chain_length() - d))
            .sum();
        for (k, &digit) in checksum.iter().enumerate() {
            let shift = ots.w * (ots.num_checksum_blocks - 1 - k);
            let expected = (total >> shift) & u64::from(ots.max_chain_length());
            assert_eq!(u64::from(digit), expected);
        }
    }

    #[test]
    fn empty_and_long_messages_encode() {
        let ots = WinternitzOts::new(4).unwrap();
        assert_eq!(ots.encode(b"").len(), ots.num_chains());
        assert_eq!(ots.encode(&[0xFFu8; 100]).len(), ots.num_chains());
    }
}
