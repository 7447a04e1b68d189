// Bitcoin hash implementations

use bitcoin::hashes::{hash160, Hash};

use sha2::{Digest, Sha256};

/// The chain's designated double hash: SHA256(SHA256(input)).
pub fn calculate_double_sha256(input: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::default();
    hasher.update(input);
    let result = hasher.finalize_reset();
    hasher.update(result);
    hasher.finalize().into()
}

pub fn calculate_sha256(input: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::default();
    hasher.update(input);
    hasher.finalize().into()
}

/// Double-hashes the concatenation of two 32-byte nodes, as done at every
/// level of the merkle tree and for the witness commitment.
pub fn hash_pair(left: [u8; 32], right: [u8; 32]) -> [u8; 32] {
    let mut hasher = Sha256::default();
    hasher.update(left);
    hasher.update(right);
    let result = hasher.finalize_reset();
    hasher.update(result);
    hasher.finalize().into()
}

/// Hash160 (SHA256 then RIPEMD160)
pub fn calculate_hash160(input: &[u8]) -> [u8; 20] {
    let result = hash160::Hash::hash(input);
    result.to_byte_array()
}
