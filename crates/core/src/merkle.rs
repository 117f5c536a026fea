//! Merkle tree over block payload leaves.

use crate::hash::{hash_concat, Hash};

/// Combine one level of the tree into its parent level.
///
/// An odd trailing node is paired with itself.
fn parent_level(level: &[Hash]) -> Vec<Hash> {
    level
        .chunks(2)
        .map(|pair| match pair {
            [left, right] => hash_concat(&[left.as_ref(), right.as_ref()]),
            [single] => hash_concat(&[single.as_ref(), single.as_ref()]),
            _ => unreachable!("chunks(2) yields one or two elements"),
        })
        .collect()
}

/// Compute the merkle root of a list of leaf hashes.
///
/// Returns the zero hash if the list is empty.
pub fn merkle_root(leaves: &[Hash]) -> Hash {
    if leaves.is_empty() {
        return Hash::ZERO;
    }

    let mut current_level = leaves.to_vec();
    while current_level.len() > 1 {
        current_level = parent_level(&current_level);
    }
    current_level[0]
}

/// A merkle tree for inclusion proofs.
#[derive(Debug, Clone)]
pub struct MerkleTree {
    /// All nodes in the tree, level by level (leaves first).
    levels: Vec<Vec<Hash>>,
}

/// A merkle proof for a single leaf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MerkleProof {
    /// The leaf being proven.
    pub leaf: Hash,
    /// Sibling hashes from leaf to root.
    pub siblings: Vec<Hash>,
    /// Direction for each sibling (true = sibling is on the right).
    pub directions: Vec<bool>,
}

impl MerkleTree {
    /// Build a merkle tree from a list of leaf hashes.
    pub fn new(leaves: &[Hash]) -> Self {
        if leaves.is_empty() {
            return Self {
                levels: vec![vec![Hash::ZERO]],
            };
        }

        let mut levels = vec![leaves.to_vec()];
        loop {
            let current = &levels[levels.len() - 1];
            if current.len() <= 1 {
                break;
            }
            let next = parent_level(current);
            levels.push(next);
        }

        Self { levels }
    }

    /// Get the root of the merkle tree.
    pub fn root(&self) -> Hash {
        self.levels
            .last()
            .and_then(|level| level.first())
            .copied()
            .unwrap_or(Hash::ZERO)
    }

    /// Get the number of leaves in the tree.
    pub fn leaf_count(&self) -> usize {
        self.levels.first().map(|l| l.len()).unwrap_or(0)
    }

    /// Generate a proof for the leaf at the given index.
    pub fn proof(&self, index: usize) -> Option<MerkleProof> {
        if index >= self.leaf_count() {
            return None;
        }

        let leaf = self.levels[0][index];
        let mut siblings = Vec::new();
        let mut directions = Vec::new();
        let mut idx = index;

        for level in &self.levels[..self.levels.len() - 1] {
            let is_right = idx % 2 == 0;
            let sibling_idx = if is_right { idx + 1 } else { idx - 1 };

            let sibling = if sibling_idx < level.len() {
                level[sibling_idx]
            } else {
                level[idx]
            };

            siblings.push(sibling);
            directions.push(is_right);
            idx /= 2;
        }

        Some(MerkleProof {
            leaf,
            siblings,
            directions,
        })
    }

    /// Verify a merkle proof against this tree's root.
    pub fn verify_proof(&self, proof: &MerkleProof) -> bool {
        verify_proof(&self.root(), proof)
    }
}

/// Verify a merkle proof against a given root.
pub fn verify_proof(root: &Hash, proof: &MerkleProof) -> bool {
    let mut current = proof.leaf;

    for (sibling, is_right) in proof.siblings.iter().zip(proof.directions.iter()) {
        current = if *is_right {
            hash_concat(&[current.as_ref(), sibling.as_ref()])
        } else {
            hash_concat(&[sibling.as_ref(), current.as_ref()])
        };
    }

    current == *root
}
