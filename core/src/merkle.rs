//! Merkle roots over ordered transaction identifiers.

use crate::hashes::hash_pair;

/// Computes the merkle root of `ids`, given in internal byte order.
///
/// Adjacent ids are paired left to right and each pair is double-hashed; an
/// odd last id is paired with itself. An empty list yields the all-zero id.
pub fn compute_merkle_root(ids: &[[u8; 32]]) -> [u8; 32] {
    if ids.is_empty() {
        return [0u8; 32];
    }

    let mut level = ids.to_vec();
    while level.len() > 1 {
        level = level
            .chunks(2)
            .map(|pair| {
                let left = pair[0];
                let right = pair.get(1).copied().unwrap_or(left);
                hash_pair(left, right)
            })
            .collect();
    }
    level[0]
}
