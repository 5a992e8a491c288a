//! Merkle tree hashing.
//!
//! Parents are the double-hash of the two children concatenated in
//! internal byte order. A level with an odd number of nodes pairs its last
//! node with itself.

use bitkoin_primitives::chainhash::Hash;
use bitkoin_primitives::hash::sha256d;

/// Compute the Merkle tree parent of two `Hash` values in internal byte
/// order.
pub fn merkle_tree_parent(left: &Hash, right: &Hash) -> Hash {
    let mut concatenated = [0u8; 64];
    concatenated[..32].copy_from_slice(left.as_bytes());
    concatenated[32..].copy_from_slice(right.as_bytes());
    Hash::new(sha256d(&concatenated))
}

/// Compute the Merkle tree parent of two display-order hex hashes.
pub fn merkle_tree_parent_str(left: &str, right: &str) -> Result<String, bitkoin_primitives::PrimitivesError> {
    let left = Hash::from_hex(left)?;
    let right = Hash::from_hex(right)?;
    Ok(merkle_tree_parent(&left, &right).to_string())
}

/// Fold `leaves` into a single root.
///
/// # Returns
/// The root, the only leaf for a single-element list, or `None` for an
/// empty list.
pub fn merkle_root(leaves: &[Hash]) -> Option<Hash> {
    if leaves.is_empty() {
        return None;
    }

    let mut level = leaves.to_vec();
    while level.len() > 1 {
        level = level
            .chunks(2)
            .map(|pair| {
                let left = &pair[0];
                let right = pair.get(1).unwrap_or(left);
                merkle_tree_parent(left, right)
            })
            .collect();
    }
    level.pop()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(byte: u8) -> Hash {
        Hash::new([byte; 32])
    }

    #[test]
    fn test_merkle_tree_parent_str() {
        let left = "d6c79a6ef05572f0cb8e9a450c561fc40b0a8a7d48faad95e20d93ddeb08c231";
        let right = "b1ed931b79056438b990d8981ba46fae97e5574b142445a74a44b978af284f98";
        let expected = "b0d537b3ee52e472507f453df3d69561720346118a5a8c4d85ca0de73bc792be";
        assert_eq!(merkle_tree_parent_str(left, right).unwrap(), expected);
        assert!(merkle_tree_parent_str("zz", right).is_err());
    }

    #[test]
    fn test_merkle_root_small_trees() {
        assert_eq!(merkle_root(&[]), None);
        assert_eq!(merkle_root(&[leaf(1)]), Some(leaf(1)));

        let two = merkle_root(&[leaf(1), leaf(2)]).unwrap();
        assert_eq!(two, merkle_tree_parent(&leaf(1), &leaf(2)));
        assert_ne!(two, merkle_root(&[leaf(2), leaf(1)]).unwrap());
    }

    #[test]
    fn test_odd_levels_duplicate_last_node() {
        let ab = merkle_tree_parent(&leaf(1), &leaf(2));
        let cc = merkle_tree_parent(&leaf(3), &leaf(3));
        let expected = merkle_tree_parent(&ab, &cc);
        assert_eq!(merkle_root(&[leaf(1), leaf(2), leaf(3)]), Some(expected));

        // Five leaves: the third level has one odd node too.
        let leaves: Vec<Hash> = (1..=5).map(leaf).collect();
        let cd = merkle_tree_parent(&leaf(3), &leaf(4));
        let ee = merkle_tree_parent(&leaf(5), &leaf(5));
        let abcd = merkle_tree_parent(&ab, &cd);
        let eeee = merkle_tree_parent(&ee, &ee);
        assert_eq!(merkle_root(&leaves), Some(merkle_tree_parent(&abcd, &eeee)));
    }
}
