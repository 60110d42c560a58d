// Copyright (C) 2021 Quentin Kniep <hello@quentinkniep.com>
// Distributed under terms of the MIT license.

//! Stateful XMSS orchestrator.
//!
//! Keygen derives 2^h one-time keypairs, commits to them in a Merkle tree
//! and publishes the root. Signing consumes one-time keys in index order
//! and never hands the same index out twice; the monotonic index is the
//! only mutable state after keygen. A handle must not be shared: it is not
//! `Clone`, and signing takes `&mut self` for the whole operation.

use std::convert::TryInto;
use std::fmt;

use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use rayon::prelude::*;
use sha2::{Digest as Sha2Digest, Sha256};
use tracing::{debug, error, info, warn};
use zeroize::Zeroize;

use crate::error::{Result, XmssError};
use crate::merkle::{MerklePath, MerkleTree};
use crate::ots::{leaf_digest, Ots, OtsPrivateKey, OtsPublicKey, OtsScheme, OtsSignature, N};
use crate::params::{get_parameters_by_name, XmssParameters};
use crate::state::XmssStateStore;

const MAGIC: &[u8; 4] = b"XMSS";
const FORMAT_VERSION: u8 = 1;
const KIND_PRIVATE: u8 = 1;
const KIND_PUBLIC: u8 = 2;

/// Heights at and above this would overflow the eager keypair vector long
/// before they overflow anything else.
const MAX_HEIGHT: u32 = 32;

/// XMSS private key: every one-time keypair in index order, the tree over
/// their leaf digests, and the next unused index.
pub struct XmssPrivateKey {
    ots_keypairs: Vec<(OtsPrivateKey, OtsPublicKey)>,
    merkle_tree: MerkleTree,
    index: u64,
    height: u32,
}

impl XmssPrivateKey {
    /// Next unused one-time key index.
    pub fn index(&self) -> u64 {
        self.index
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Total number of one-time keypairs (2^height).
    pub fn num_keypairs(&self) -> u64 {
        self.ots_keypairs.len() as u64
    }
}

impl fmt::Debug for XmssPrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("XmssPrivateKey")
            .field("index", &self.index)
            .field("height", &self.height)
            .field("ots_keypairs", &"[REDACTED]")
            .finish()
    }
}

impl Drop for XmssPrivateKey {
    fn drop(&mut self) {
        for (private, _) in &mut self.ots_keypairs {
            private.zeroize();
        }
    }
}

/// XMSS public key: the Merkle root and the tree height.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmssPublicKey {
    pub root: Vec<u8>,
    pub height: u32,
}

/// Composite signature: the one-time signature, the one-time public key it
/// verifies under, the authentication path for that key's leaf, and the
/// index the leaf sits at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmssSignature {
    pub ots_signature: OtsSignature,
    pub ots_public_key: OtsPublicKey,
    pub auth_path: MerklePath,
    pub index: u64,
}

/// Stateful XMSS signer/verifier handle.
pub struct Xmss {
    ots: OtsScheme,
    height: u32,
    parameters: Option<&'static XmssParameters>,
    private_key: Option<XmssPrivateKey>,
    public_key: Option<XmssPublicKey>,
    poisoned: bool,
}

impl Xmss {
    /// Creates an unkeyed handle for the given scheme and tree height.
    pub fn new(ots: OtsScheme, height: u32) -> Self {
        Self {
            ots,
            height,
            parameters: None,
            private_key: None,
            public_key: None,
            poisoned: false,
        }
    }

    /// Creates an unkeyed handle from a named parameter set.
    pub fn from_parameter_set(name: &str) -> Result<Self> {
        let parameters = get_parameters_by_name(name)?;
        let ots = OtsScheme::winternitz(parameters.winternitz_w)?;
        let mut xmss = Self::new(ots, parameters.height);
        xmss.parameters = Some(parameters);
        Ok(xmss)
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn scheme(&self) -> &OtsScheme {
        &self.ots
    }

    /// The parameter set this handle was constructed from, if any.
    pub fn parameters(&self) -> Option<&'static XmssParameters> {
        self.parameters
    }

    /// Generates a fresh keypair from operating-system entropy.
    pub fn generate_keypair(&mut self) -> Result<(&XmssPrivateKey, &XmssPublicKey)> {
        let mut master_seed = [0u8; N];
        getrandom::getrandom(&mut master_seed).map_err(|e| {
            XmssError::PersistenceFailure(format!("cannot gather entropy: {}", e))
        })?;
        self.generate_keypair_from_seed(master_seed)
    }

    /// Generates the keypair deterministically from a master seed.
    ///
    /// The i-th one-time keypair is a pure function of (seed, i), so a key
    /// can be rebuilt from the seed alone, e.g. when restoring a signer
    /// from persisted state.
    pub fn generate_keypair_from_seed(
        &mut self,
        master_seed: [u8; N],
    ) -> Result<(&XmssPrivateKey, &XmssPublicKey)> {
        let (private_key, public_key) = generate_xmss_keypair(&self.ots, self.height, master_seed)?;
        self.poisoned = false;
        self.private_key = Some(private_key);
        self.public_key = Some(public_key);
        Ok((
            self.private_key.as_ref().expect("keypair just stored"),
            self.public_key.as_ref().expect("keypair just stored"),
        ))
    }

    /// Signs a message with the next unused one-time key and advances the
    /// index. Fails once all 2^h one-time keys are consumed.
    pub fn sign(&mut self, message: &[u8]) -> Result<XmssSignature> {
        if self.poisoned {
            return Err(XmssError::PersistenceFailure(
                "key handle is poisoned after a failed state persist; restore state first"
                    .to_string(),
            ));
        }

        let private_key = self.private_key.as_mut().ok_or(XmssError::NotInitialised)?;
        if private_key.index >= 1u64 << private_key.height {
            warn!(
                index = private_key.index,
                height = private_key.height,
                "refusing to sign: one-time keys exhausted"
            );
            return Err(XmssError::Exhausted);
        }

        let index = private_key.index;
        let (ots_private, ots_public) = &private_key.ots_keypairs[index as usize];
        let ots_signature = self.ots.sign(message, ots_private);
        let ots_public_key = ots_public.clone();
        let auth_path = private_key.merkle_tree.path(index as usize)?;

        // The state transition; everything above is read-only.
        private_key.index = index + 1;
        debug!(index, "produced signature");

        Ok(XmssSignature {
            ots_signature,
            ots_public_key,
            auth_path,
            index,
        })
    }

    /// Signs and durably persists the advanced index before releasing the
    /// signature.
    ///
    /// If persistence fails the handle is poisoned and refuses further
    /// signing: the already-consumed index would otherwise be reused after
    /// a restart, leaking a one-time key. [`Xmss::update_state`] against
    /// reconciled storage clears the poisoning.
    pub fn sign_and_persist(
        &mut self,
        message: &[u8],
        store: &XmssStateStore,
        identifier: &str,
    ) -> Result<XmssSignature> {
        let signature = self.sign(message)?;
        let index = self.get_state();
        if let Err(e) = store.save(identifier, index, self.height) {
            self.poisoned = true;
            error!(
                identifier,
                index,
                "state persistence failed after signing; poisoning key handle"
            );
            return Err(e);
        }
        Ok(signature)
    }

    /// Verifies a signature against a public key.
    ///
    /// Total: any malformed, tampered or out-of-range input yields `false`.
    pub fn verify(
        &self,
        message: &[u8],
        signature: &XmssSignature,
        public_key: &XmssPublicKey,
    ) -> bool {
        let capacity = match 1u64.checked_shl(public_key.height) {
            Some(capacity) => capacity,
            None => return false,
        };
        if signature.index >= capacity {
            return false;
        }
        if signature.auth_path.len() != public_key.height as usize {
            return false;
        }

        if !self
            .ots
            .verify(message, &signature.ots_signature, &signature.ots_public_key)
        {
            return false;
        }

        let leaf = leaf_digest(&signature.ots_public_key);
        signature
            .auth_path
            .verify(&leaf, &public_key.root, signature.index as usize)
    }

    /// The public key, once a keypair was generated or loaded.
    pub fn get_public_key(&self) -> Option<&XmssPublicKey> {
        self.public_key.as_ref()
    }

    /// Current signing index; 0 when no keypair is loaded.
    pub fn get_state(&self) -> u64 {
        self.private_key.as_ref().map_or(0, |key| key.index)
    }

    /// Forces the signing index.
    ///
    /// For restoring a signer from persisted state only: setting the index
    /// backwards reuses one-time keys and destroys all security. Clears a
    /// poisoned handle, since the caller has reconciled with storage.
    pub fn update_state(&mut self, new_index: u64) {
        if let Some(private_key) = self.private_key.as_mut() {
            private_key.index = new_index;
            self.poisoned = false;
        }
    }

    /// One-time keys left before the handle is exhausted.
    pub fn remaining_signatures(&self) -> u64 {
        self.private_key
            .as_ref()
            .map_or(0, |key| (1u64 << key.height).saturating_sub(key.index))
    }

    /// Serializes the private key: `magic || version || kind || scheme tag
    /// || w || height || index || chains-per-key || keypair count ||
    /// keypairs`. The Merkle tree is not stored; it is rebuilt on load.
    pub fn serialize_private_key(&self) -> Result<Vec<u8>> {
        let private_key = self.private_key.as_ref().ok_or(XmssError::NotInitialised)?;
        let num_chains = self.ots.num_chains();

        let mut out = Vec::with_capacity(
            24 + private_key.ots_keypairs.len() * num_chains * 2 * N,
        );
        out.extend_from_slice(MAGIC);
        out.push(FORMAT_VERSION);
        out.push(KIND_PRIVATE);
        out.push(self.ots.tag());
        out.push(self.ots.winternitz_parameter() as u8);
        out.extend_from_slice(&private_key.height.to_be_bytes());
        out.extend_from_slice(&private_key.index.to_be_bytes());
        out.extend_from_slice(&(num_chains as u32).to_be_bytes());
        out.extend_from_slice(&(private_key.ots_keypairs.len() as u64).to_be_bytes());
        for (private, public) in &private_key.ots_keypairs {
            for element in private {
                out.extend_from_slice(element);
            }
            for element in public {
                out.extend_from_slice(element);
            }
        }
        Ok(out)
    }

    /// Serializes the public key: `magic || version || kind || scheme tag
    /// || w || height || root length || root`.
    pub fn serialize_public_key(&self) -> Result<Vec<u8>> {
        let public_key = self.public_key.as_ref().ok_or(XmssError::NotInitialised)?;

        let mut out = Vec::with_capacity(16 + public_key.root.len());
        out.extend_from_slice(MAGIC);
        out.push(FORMAT_VERSION);
        out.push(KIND_PUBLIC);
        out.push(self.ots.tag());
        out.push(self.ots.winternitz_parameter() as u8);
        out.extend_from_slice(&public_key.height.to_be_bytes());
        out.extend_from_slice(&(public_key.root.len() as u32).to_be_bytes());
        out.extend_from_slice(&public_key.root);
        Ok(out)
    }

    /// Restores a private key from [`Xmss::serialize_private_key`] output.
    /// The blob is authoritative: scheme, height and index all come from
    /// it, and the Merkle tree and public key are rebuilt.
    pub fn load_private_key(&mut self, data: &[u8]) -> Result<()> {
        let mut reader = Reader::new(data);
        let (ots, height) = read_header(&mut reader, KIND_PRIVATE)?;

        let index = reader.read_u64()?;
        let num_chains = reader.read_u32()? as usize;
        if num_chains != ots.num_chains() {
            return Err(XmssError::MalformedInput(format!(
                "chain count {} does not match scheme ({} chains)",
                num_chains,
                ots.num_chains()
            )));
        }
        let num_keypairs = reader.read_u64()?;
        if num_keypairs != 1u64 << height {
            return Err(XmssError::MalformedInput(format!(
                "keypair count {} does not match height {}",
                num_keypairs, height
            )));
        }
        if index > num_keypairs {
            return Err(XmssError::MalformedInput(format!(
                "index {} exceeds keypair count {}",
                index, num_keypairs
            )));
        }

        let mut ots_keypairs = Vec::with_capacity(num_keypairs as usize);
        for _ in 0..num_keypairs {
            let mut private = Vec::with_capacity(num_chains);
            for _ in 0..num_chains {
                private.push(reader.read_digest()?);
            }
            let mut public = Vec::with_capacity(num_chains);
            for _ in 0..num_chains {
                public.push(reader.read_digest()?);
            }
            ots_keypairs.push((private, public));
        }
        reader.finish()?;

        let leaves = ots_keypairs
            .iter()
            .map(|(_, public)| leaf_digest(public))
            .collect();
        let merkle_tree = MerkleTree::new(leaves)?;
        let public_key = XmssPublicKey {
            root: merkle_tree.root().to_vec(),
            height,
        };

        info!(height, index, "restored private key from blob");
        self.ots = ots;
        self.height = height;
        self.poisoned = false;
        self.private_key = Some(XmssPrivateKey {
            ots_keypairs,
            merkle_tree,
            index,
            height,
        });
        self.public_key = Some(public_key);
        Ok(())
    }

    /// Restores a public key from [`Xmss::serialize_public_key`] output.
    /// For verifier-side handles; scheme and height come from the blob.
    pub fn load_public_key(&mut self, data: &[u8]) -> Result<()> {
        let mut reader = Reader::new(data);
        let (ots, height) = read_header(&mut reader, KIND_PUBLIC)?;

        let root_len = reader.read_u32()? as usize;
        let root = reader.take(root_len)?.to_vec();
        reader.finish()?;

        self.ots = ots;
        self.height = height;
        self.public_key = Some(XmssPublicKey { root, height });
        Ok(())
    }
}

/// Derives the seed of the i-th one-time keypair from the master seed.
fn leaf_seed(master_seed: &[u8; N], index: u64) -> [u8; N] {
    let mut sha = Sha256::new();
    sha.update(master_seed);
    sha.update(&index.to_be_bytes());
    sha.finalize().as_slice().try_into().unwrap()
}

/// Builds the full keypair: 2^height one-time keypairs (in parallel, each
/// from its own seeded stream cipher RNG) and the Merkle tree over their
/// leaf digests.
fn generate_xmss_keypair(
    ots: &OtsScheme,
    height: u32,
    master_seed: [u8; N],
) -> Result<(XmssPrivateKey, XmssPublicKey)> {
    if height >= MAX_HEIGHT {
        return Err(XmssError::InvalidParameter(format!(
            "tree height must be below {}, got {}",
            MAX_HEIGHT, height
        )));
    }

    let num_keys = 1u64 << height;
    let ots_keypairs: Vec<(OtsPrivateKey, OtsPublicKey)> = (0..num_keys)
        .into_par_iter()
        .map(|i| {
            let mut rng = ChaCha20Rng::from_seed(leaf_seed(&master_seed, i));
            ots.generate_keypair(&mut rng)
        })
        .collect();

    let leaves = ots_keypairs
        .iter()
        .map(|(_, public)| leaf_digest(public))
        .collect();
    let merkle_tree = MerkleTree::new(leaves)?;
    let public_key = XmssPublicKey {
        root: merkle_tree.root().to_vec(),
        height,
    };
    info!(
        height,
        root = %hex::encode(&public_key.root),
        "generated XMSS keypair"
    );

    let private_key = XmssPrivateKey {
        ots_keypairs,
        merkle_tree,
        index: 0,
        height,
    };
    Ok((private_key, public_key))
}

/// Parses the common blob header and returns the scheme and height.
fn read_header(reader: &mut Reader<'_>, expected_kind: u8) -> Result<(OtsScheme, u32)> {
    if reader.take(4)? != MAGIC {
        return Err(XmssError::MalformedInput("bad magic".to_string()));
    }
    let version = reader.read_u8()?;
    if version != FORMAT_VERSION {
        return Err(XmssError::MalformedInput(format!(
            "unsupported format version: {}",
            version
        )));
    }
    let kind = reader.read_u8()?;
    if kind != expected_kind {
        return Err(XmssError::MalformedInput(format!(
            "wrong blob kind: expected {}, got {}",
            expected_kind, kind
        )));
    }
    let tag = reader.read_u8()?;
    let w = reader.read_u8()? as usize;
    let ots = OtsScheme::from_tag(tag, w)?;
    let height = reader.read_u32()?;
    if height >= MAX_HEIGHT {
        return Err(XmssError::MalformedInput(format!(
            "tree height {} out of range",
            height
        )));
    }
    Ok((ots, height))
}

/// Bounds-checked cursor over a key blob.
struct Reader<'a> {
    data: &'a [u8],
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.data.len() < n {
            return Err(XmssError::MalformedInput("truncated key blob".to_string()));
        }
        let (head, tail) = self.data.split_at(n);
        self.data = tail;
        Ok(head)
    }

    fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn read_u32(&mut self) -> Result<u32> {
        Ok(u32::from_be_bytes(self.take(4)?.try_into().unwrap()))
    }

    fn read_u64(&mut self) -> Result<u64> {
        Ok(u64::from_be_bytes(self.take(8)?.try_into().unwrap()))
    }

    fn read_digest(&mut self) -> Result<[u8; N]> {
        Ok(self.take(N)?.try_into().unwrap())
    }

    fn finish(self) -> Result<()> {
        if !self.data.is_empty() {
            return Err(XmssError::MalformedInput(format!(
                "{} trailing bytes after key blob",
                self.data.len()
            )));
        }
        Ok(())
    }
}
