// Copyright (C) 2021 Quentin Kniep <hello@quentinkniep.com>
// Distributed under terms of the MIT license.

//! Error types shared across the crate.

use thiserror::Error;

/// Convenience alias used by all fallible operations in this crate.
pub type Result<T> = std::result::Result<T, XmssError>;

/// Errors raised by key generation, signing and state handling.
///
/// Verification never surfaces these: the public verify entry points are
/// total and collapse every internal failure into `false`.
#[derive(Debug, Error)]
pub enum XmssError {
    /// Unsupported Winternitz parameter, hash width or parameter-set name.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// Sign was called before any key material was loaded or generated.
    #[error("no key material loaded")]
    NotInitialised,

    /// Every one-time key of this keypair has been consumed.
    #[error("one-time key supply exhausted")]
    Exhausted,

    /// Merkle leaf or path access outside the tree.
    #[error("index {index} out of range for {len} leaves")]
    OutOfRange { index: usize, len: usize },

    /// A serialized key or state file failed to decode.
    #[error("malformed input: {0}")]
    MalformedInput(String),

    /// The state store could not durably record a monotonic advance.
    #[error("state persistence failed: {0}")]
    PersistenceFailure(String),
}
