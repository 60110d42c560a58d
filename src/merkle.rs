// Copyright (C) 2021 Quentin Kniep <hello@quentinkniep.com>
// Distributed under terms of the MIT license.

//! Merkle tree committing to a batch of one-time public keys.
//!
//! The tree stores every level bottom-up; a level with an odd node count
//! duplicates its trailing node when hashing upward. The node hash is an
//! injected [`Digest`] primitive, SHA-256 unless a caller says otherwise.

use std::marker::PhantomData;

use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::error::{Result, XmssError};

/// One sibling on the way from a leaf to the root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MerklePathNode {
    /// Sibling node value at this level.
    pub value: Vec<u8>,
    /// Whether the sibling sits to the left of the walked node.
    pub is_left: bool,
}

/// Authentication path from a leaf to the root, one sibling per level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MerklePath {
    pub nodes: Vec<MerklePathNode>,
}

impl MerklePath {
    /// Number of levels the path crosses.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Verifies the path under the default SHA-256 node hash.
    pub fn verify(&self, leaf: &[u8], root: &[u8], index: usize) -> bool {
        self.verify_with::<Sha256>(leaf, root, index)
    }

    /// Verifies the path under an injected node hash.
    ///
    /// Walks upward combining with the sibling on the side given by the
    /// current index parity, halving the index each level, and compares the
    /// accumulator against the expected root in constant time.
    pub fn verify_with<D: Digest>(&self, leaf: &[u8], root: &[u8], index: usize) -> bool {
        let mut current = leaf.to_vec();
        let mut path_index = index;

        for node in &self.nodes {
            current = if path_index % 2 == 0 {
                hash_pair::<D>(&current, &node.value)
            } else {
                hash_pair::<D>(&node.value, &current)
            };
            path_index /= 2;
        }

        current.ct_eq(root).unwrap_u8() == 1
    }
}

/// Merkle tree over caller-supplied leaves, generic in its node hash.
#[derive(Debug, Clone)]
pub struct MerkleTree<D: Digest = Sha256> {
    levels: Vec<Vec<Vec<u8>>>,
    _hash: PhantomData<D>,
}

impl<D: Digest> MerkleTree<D> {
    /// Builds a tree over the given leaves. At least one leaf is required.
    pub fn new(leaves: Vec<Vec<u8>>) -> Result<Self> {
        if leaves.is_empty() {
            return Err(XmssError::InvalidParameter(
                "Merkle tree requires at least one leaf".to_string(),
            ));
        }

        let mut levels = vec![leaves];
        while levels[levels.len() - 1].len() > 1 {
            let current = &levels[levels.len() - 1];
            let next = current
                .chunks(2)
                .map(|pair| {
                    // Odd trailing node is paired with itself.
                    let right = pair.get(1).unwrap_or(&pair[0]);
                    hash_pair::<D>(&pair[0], right)
                })
                .collect();
            levels.push(next);
        }

        return Ok(Self {
            levels,
            _hash: PhantomData,
        });
    }

    /// Root node; the public commitment to all leaves.
    pub fn root(&self) -> &[u8] {
        &self.levels[self.levels.len() - 1][0]
    }

    /// Number of leaves the tree was built over.
    pub fn num_leaves(&self) -> usize {
        self.levels[0].len()
    }

    /// Leaf value at `index`.
    pub fn leaf(&self, index: usize) -> Result<&[u8]> {
        if index >= self.num_leaves() {
            return Err(XmssError::OutOfRange {
                index,
                len: self.num_leaves(),
            });
        }
        Ok(&self.levels[0][index])
    }

    /// Authentication path for the leaf at `index`, walked leaf to root.
    ///
    /// Where a level has no sibling for the walked node (odd tail), the
    /// node itself is recorded with its own parity.
    pub fn path(&self, index: usize) -> Result<MerklePath> {
        if index >= self.num_leaves() {
            return Err(XmssError::OutOfRange {
                index,
                len: self.num_leaves(),
            });
        }

        let mut nodes = Vec::with_capacity(self.levels.len() - 1);
        let mut path_index = index;

        for level in &self.levels[..self.levels.len() - 1] {
            let sibling_index = path_index ^ 1;
            let node = if sibling_index < level.len() {
                MerklePathNode {
                    value: level[sibling_index].clone(),
                    is_left: sibling_index % 2 == 0,
                }
            } else {
                MerklePathNode {
                    value: level[path_index].clone(),
                    is_left: path_index % 2 == 0,
                }
            };
            nodes.push(node);
            path_index /= 2;
        }

        return Ok(MerklePath { nodes });
    }

    /// Verifies a path against this tree's root.
    pub fn verify_path(&self, leaf: &[u8], path: &MerklePath, index: usize) -> bool {
        path.verify_with::<D>(leaf, self.root(), index)
    }
}

/// Hashes two sibling nodes into their parent.
fn hash_pair<D: Digest>(left: &[u8], right: &[u8]) -> Vec<u8> {
    let mut hasher = D::new();
    hasher.update(left);
    hasher.update(right);
    hasher.finalize().to_vec()
}
