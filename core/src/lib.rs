//! Consensus-encoding toolkit for assembling test blocks.
//!
//! Builds coinbase transactions that commit to their height, assembles blocks
//! from an optional `getblocktemplate` result, computes merkle roots, embeds
//! BIP-141 witness commitments and counts legacy signature operations.

pub mod assembler;
pub mod block;
pub mod coinbase;
pub mod constants;
pub mod error;
pub mod hashes;
pub mod height;
pub mod merkle;
pub mod params;
pub mod script;
pub mod transaction;
pub mod witness;

pub use assembler::{BlockBuilder, BlockTemplate, TransactionInput};
pub use block::{Block, BlockHeader, BlockProof};
pub use coinbase::{create_coinbase, create_tx_with_script, CoinbaseBuilder};
pub use error::{BlockToolsError, Result};
pub use height::{decode_height, encode_height};
pub use merkle::compute_merkle_root;
pub use params::NetworkParams;
pub use transaction::{OutputValue, Transaction, TxOutput, ValueCommitment};
pub use witness::{
    extract_witness_commitment, finalize_commitment, reserve_commitment_slot,
    witness_commitment, witness_commitment_script, WitnessNonce,
};
