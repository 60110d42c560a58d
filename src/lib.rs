// Copyright (C) 2021 Quentin Kniep <hello@quentinkniep.com>
// Distributed under terms of the MIT license.

//! Stateful hash-based signatures in the XMSS family.
//!
//! Security rests solely on the underlying hash function: a keypair
//! commits to 2^h one-time Winternitz keys through a Merkle tree, and each
//! signature spends one of them. Two one-time variants are provided, the
//! classical checksum scheme and a checksum-free target-sum scheme, both
//! driven by the same stateful orchestrator.
//!
//! Reusing a one-time key leaks its private chains, so the signing index
//! must survive crashes; [`state::XmssStateStore`] persists it durably and
//! [`xmss::Xmss::sign_and_persist`] refuses to hand out signatures whose
//! index was not persisted first.

pub mod encoding;
pub mod error;
pub mod hash;
pub mod merkle;
pub mod ots;
pub mod params;
pub mod state;
pub mod target_sum;
pub mod wots;
pub mod xmss;

pub use crate::error::{Result, XmssError};
pub use crate::merkle::{MerklePath, MerkleTree};
pub use crate::ots::{Ots, OtsScheme};
pub use crate::state::XmssStateStore;
pub use crate::target_sum::TargetSumWinternitzOts;
pub use crate::wots::WinternitzOts;
pub use crate::xmss::{Xmss, XmssPublicKey, XmssSignature};
