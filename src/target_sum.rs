// Copyright (C) 2021 Quentin Kniep <hello@quentinkniep.com>
// Distributed under terms of the MIT license.

//! Target-sum Winternitz One-Time Signature scheme.
//!
//! Drops the checksum chains entirely: every message encodes to digits
//! summing to a fixed target T = ⌈m·(2^w−1)/2⌉, so lowering one digit
//! forces raising another and no separate checksum is needed. Verification
//! walks half as many chain steps on average as the classical variant.

use rand::RngCore;
use subtle::{Choice, ConstantTimeEq};

use crate::error::{Result, XmssError};
use crate::ots::{chain, message_digits, Digest, Ots, OtsPrivateKey, OtsPublicKey, OtsSignature};
use crate::ots::{MSG_BITLEN, N, VALID_W};

/// Checksum-free Winternitz OTS enforcing a fixed digit sum.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetSumWinternitzOts {
    w: usize,
    num_blocks: usize,
    max_chain_len: u32,
    target_sum: u64,
}

impl TargetSumWinternitzOts {
    /// Creates the scheme for a width `w` in {1, 2, 4, 8, 16}.
    pub fn new(w: usize) -> Result<Self> {
        if !VALID_W.contains(&w) {
            return Err(XmssError::InvalidParameter(format!(
                "Winternitz parameter w must be 1, 2, 4, 8 or 16, got {}",
                w
            )));
        }

        let num_blocks = MSG_BITLEN / w;
        let max_chain_len = (1u32 << w) - 1;
        let capacity = num_blocks as u64 * u64::from(max_chain_len);
        let target_sum = (capacity + 1) / 2;

        return Ok(Self {
            w,
            num_blocks,
            max_chain_len,
            target_sum,
        });
    }

    /// Maximum chain length `2^w − 1`.
    pub fn max_chain_length(&self) -> u32 {
        self.max_chain_len
    }

    /// The digit sum every encoding attains.
    pub fn target_sum(&self) -> u64 {
        self.target_sum
    }

    /// Encodes a message as `m` digits whose sum is exactly the target.
    ///
    /// The first `m−1` digits come straight from the message bits; the last
    /// digit is the remainder to the target. When that remainder leaves
    /// [0, C] the earlier digits are rebalanced deterministically: lowered
    /// rightmost-first while the remainder is negative, raised
    /// leftmost-first while it exceeds C. A final pass absorbs anything the
    /// clamp left over. The encoding is a deterministic function of the
    /// message, but not injective: nearby messages can rebalance onto the
    /// same digit vector.
    fn encode(&self, message: &[u8]) -> Vec<u32> {
        let mut digits = message_digits(message, self.w, self.num_blocks - 1);
        let cap = i64::from(self.max_chain_len);
        let target = self.target_sum as i64;

        let mut sum: i64 = digits.iter().map(|&d| i64::from(d)).sum();
        let mut last = target - sum;

        if last < 0 {
            let mut adjustment = -last;
            for digit in digits.iter_mut().rev() {
                let take = adjustment.min(i64::from(*digit));
                *digit -= take as u32;
                sum -= take;
                adjustment -= take;
                if adjustment == 0 {
                    break;
                }
            }
            last = target - sum;
        } else if last > cap {
            let mut adjustment = last - cap;
            for digit in digits.iter_mut() {
                let give = adjustment.min(cap - i64::from(*digit));
                *digit += give as u32;
                sum += give;
                adjustment -= give;
                if adjustment == 0 {
                    break;
                }
            }
            last = target - sum;
        }

        last = last.max(0).min(cap);
        digits.push(last as u32);

        let final_sum: i64 = digits.iter().map(|&d| i64::from(d)).sum();
        if final_sum != target {
            let diff = target - final_sum;
            let len = digits.len();
            let last_digit = i64::from(digits[len - 1]);
            if last_digit + diff >= 0 && last_digit + diff <= cap {
                digits[len - 1] = (last_digit + diff) as u32;
            } else {
                for i in (0..len - 1).rev() {
                    let digit = i64::from(digits[i]);
                    if diff > 0 && digit <= cap - diff {
                        digits[i] = (digit + diff) as u32;
                        break;
                    } else if diff < 0 && digit >= -diff {
                        digits[i] = (digit + diff) as u32;
                        break;
                    }
                }
            }
        }

        return digits;
    }
}

impl Ots for TargetSumWinternitzOts {
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
