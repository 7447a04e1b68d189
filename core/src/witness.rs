//! Witness commitment construction (BIP-141).
//!
//! The commitment lives in the last coinbase output whose script is
//! `OP_RETURN OP_PUSHBYTES_36 aa21a9ed <commitment>`, where the commitment is
//! `SHA256d(witness_root || nonce)` and the nonce is the single element of
//! the coinbase input's witness.
//!
//! Embedding is a two-phase protocol: [`reserve_commitment_slot`] appends the
//! placeholder output, [`finalize_commitment`] fills it in once the witness
//! root is known. [`Block::add_witness_commitment`] runs both and rehashes.

use std::borrow::Cow;

use bitcoin::{Amount, ScriptBuf, Witness};
use tracing::debug;

use crate::block::Block;
use crate::constants::{
    WITNESS_COMMITMENT_SCRIPT_LEN, WITNESS_COMMITMENT_SCRIPT_PREFIX,
};
use crate::error::{BlockToolsError, Result};
use crate::hashes::hash_pair;
use crate::script::txout::is_witness_commitment;
use crate::transaction::{OutputValue, Transaction, TxOutput};

/// The 32-byte witness reserved value placed in the coinbase witness.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub struct WitnessNonce(pub [u8; 32]);

impl WitnessNonce {
    pub fn to_bytes(self) -> [u8; 32] {
        self.0
    }
}

/// Little-endian, as a 256-bit integer nonce is serialized.
impl From<u64> for WitnessNonce {
    fn from(value: u64) -> Self {
        let mut bytes = [0u8; 32];
        bytes[..8].copy_from_slice(&value.to_le_bytes());
        Self(bytes)
    }
}

pub fn witness_commitment(witness_root: [u8; 32], nonce: WitnessNonce) -> [u8; 32] {
    hash_pair(witness_root, nonce.to_bytes())
}

pub fn witness_commitment_script(witness_root: [u8; 32], nonce: WitnessNonce) -> ScriptBuf {
    let mut script_bytes = Vec::with_capacity(WITNESS_COMMITMENT_SCRIPT_LEN);
    script_bytes.extend_from_slice(&WITNESS_COMMITMENT_SCRIPT_PREFIX);
    script_bytes.extend_from_slice(&witness_commitment(witness_root, nonce));
    ScriptBuf::from_bytes(script_bytes)
}

/// Returns the commitment carried by the highest-index commitment output.
pub fn extract_witness_commitment(coinbase: &Transaction) -> Option<[u8; 32]> {
    coinbase
        .outputs
        .iter()
        .rev()
        .find(|output| is_witness_commitment(&output.script_pubkey))
        .and_then(|output| {
            output.script_pubkey.as_bytes()
                [WITNESS_COMMITMENT_SCRIPT_PREFIX.len()..WITNESS_COMMITMENT_SCRIPT_LEN]
                .try_into()
                .ok()
        })
}

/// Phase one: append an unset-value, empty-script output to the coinbase.
pub fn reserve_commitment_slot(mut coinbase: Transaction) -> Result<Transaction> {
    check_coinbase_shape(&coinbase)?;
    coinbase.outputs.push(TxOutput {
        value: OutputValue::Null,
        script_pubkey: ScriptBuf::new(),
    });
    Ok(coinbase)
}

/// Phase two: put the nonce in the coinbase witness and overwrite the
/// reserved (last) output with the zero-value commitment output.
pub fn finalize_commitment(
    mut coinbase: Transaction,
    witness_root: [u8; 32],
    nonce: WitnessNonce,
) -> Result<Transaction> {
    check_coinbase_shape(&coinbase)?;
    let input = coinbase
        .inputs
        .first_mut()
        .ok_or(BlockToolsError::InvalidBlockState(Cow::Borrowed(
            "coinbase has no inputs",
        )))?;
    input.witness = Witness::from_slice(&[nonce.to_bytes()]);

    let slot = coinbase
        .outputs
        .last_mut()
        .ok_or(BlockToolsError::InvalidBlockState(Cow::Borrowed(
            "no reserved commitment output",
        )))?;
    *slot = TxOutput::new(Amount::ZERO, witness_commitment_script(witness_root, nonce));
    Ok(coinbase)
}

fn check_coinbase_shape(coinbase: &Transaction) -> Result<()> {
    if coinbase.inputs.is_empty() {
        return Err(BlockToolsError::InvalidBlockState(Cow::Borrowed(
            "coinbase has no inputs",
        )));
    }
    if coinbase.outputs.is_empty() {
        return Err(BlockToolsError::InvalidBlockState(Cow::Borrowed(
            "coinbase has no outputs",
        )));
    }
    Ok(())
}

impl Block {
    /// Commits to the witness merkle root in the coinbase, then recomputes
    /// the merkle root. Each call appends one more output to the coinbase.
    pub fn add_witness_commitment(&mut self, nonce: WitnessNonce) -> Result<()> {
        let coinbase = self
            .transactions
            .first()
            .cloned()
            .ok_or(BlockToolsError::InvalidBlockState(Cow::Borrowed(
                "block has no transactions",
            )))?;
        self.transactions[0] = reserve_commitment_slot(coinbase)?;

        let witness_root = self.calculate_witness_merkle_root();
        let reserved = self.transactions[0].clone();
        self.transactions[0] = finalize_commitment(reserved, witness_root, nonce)?;
        self.rehash();

        debug!(
            witness_root = %hex::encode(witness_root),
            block_hash = %self.block_hash(),
            "added witness commitment"
        );
        Ok(())
    }

    /// Whether the coinbase commits to this block's witness root with the
    /// nonce found in its own witness.
    pub fn has_valid_witness_commitment(&self) -> bool {
        let Some(coinbase) = self.coinbase() else {
            return false;
        };
        let Some(commitment) = extract_witness_commitment(coinbase) else {
            return false;
        };
        let Some(input) = coinbase.inputs.first() else {
            return false;
        };
        let nonce = match input.witness.iter().collect::<Vec<_>>().as_slice() {
            [element] => match <[u8; 32]>::try_from(*element) {
                Ok(bytes) => WitnessNonce(bytes),
                Err(_) => return false,
            },
            _ => return false,
        };
        witness_commitment(self.calculate_witness_merkle_root(), nonce) == commitment
    }
}

#[cfg(test)]
mod tests {
    use bitcoin::hashes::Hash;
    use bitcoin::{BlockHash, CompactTarget, OutPoint, Sequence, TxIn, TxMerkleNode};

    use super::*;
    use crate::block::{BlockHeader, BlockProof};
    use crate::hashes::calculate_double_sha256;
    use crate::height::encode_height;

    fn coinbase() -> Transaction {
        Transaction {
            version: 1,
            inputs: vec![TxIn {
                previous_output: OutPoint::null(),
                script_sig: encode_height(1),
                sequence: Sequence::MAX,
                witness: Witness::new(),
            }],
            outputs: vec![TxOutput::new(
                Amount::from_sat(5_000_000_000),
                ScriptBuf::from_bytes(vec![0x51]),
            )],
            lock_time: 0,
        }
    }

    fn block_with(transactions: Vec<Transaction>) -> Block {
        let mut block = Block {
            header: BlockHeader {
                version: 1,
                prev_blockhash: BlockHash::all_zeros(),
                merkle_root: TxMerkleNode::all_zeros(),
                time: 0,
                bits: CompactTarget::from_consensus(0x207fffff),
                proof: BlockProof {
                    challenge: ScriptBuf::from_bytes(vec![0x51]),
                    solution: ScriptBuf::new(),
                },
            },
            transactions,
            height: 1,
        };
        block.rehash();
        block
    }

    #[test]
    fn test_nonce_from_integer_is_little_endian() {
        let nonce = WitnessNonce::from(0x0102u64);
        assert_eq!(nonce.0[0], 0x02);
        assert_eq!(nonce.0[1], 0x01);
        assert!(nonce.0[2..].iter().all(|b| *b == 0));
        assert_eq!(WitnessNonce::from(0u64), WitnessNonce::default());
    }

    #[test]
    fn test_commitment_script_layout() {
        let root = [0x33u8; 32];
        let nonce = WitnessNonce::from(7u64);
        let script = witness_commitment_script(root, nonce);
        let bytes = script.as_bytes();
        assert_eq!(bytes.len(), 38);
        assert_eq!(&bytes[..6], &[0x6a, 0x24, 0xaa, 0x21, 0xa9, 0xed]);

        let mut preimage = root.to_vec();
        preimage.extend_from_slice(&nonce.0);
        assert_eq!(&bytes[6..], &calculate_double_sha256(&preimage));
    }

    #[test]
    fn test_two_phase_protocol() {
        let reserved = reserve_commitment_slot(coinbase()).unwrap();
        assert_eq!(reserved.outputs.len(), 2);
        assert_eq!(reserved.outputs[1].value, OutputValue::Null);
        assert!(reserved.outputs[1].script_pubkey.is_empty());

        let root = [0u8; 32];
        let finalized = finalize_commitment(reserved, root, WitnessNonce::default()).unwrap();
        assert_eq!(finalized.outputs.len(), 2);
        assert_eq!(
            finalized.outputs[1].value,
            OutputValue::Explicit(Amount::ZERO)
        );
        assert_eq!(
            finalized.inputs[0].witness.to_vec(),
            vec![vec![0u8; 32]]
        );
        assert_eq!(
            extract_witness_commitment(&finalized),
            Some(witness_commitment(root, WitnessNonce::default()))
        );
    }

    #[test]
    fn test_reserve_rejects_coinbase_without_outputs() {
        let mut cb = coinbase();
        cb.outputs.clear();
        assert!(matches!(
            reserve_commitment_slot(cb),
            Err(BlockToolsError::InvalidBlockState(_))
        ));
    }

    #[test]
    fn test_add_witness_commitment() {
        let mut block = block_with(vec![coinbase()]);
        let hash_before = block.block_hash();
        block.add_witness_commitment(WitnessNonce::default()).unwrap();

        let cb = &block.transactions[0];
        assert_eq!(cb.outputs.len(), 2);
        // Only the coinbase, whose witness leaf is zero.
        assert_eq!(
            extract_witness_commitment(cb),
            Some(witness_commitment([0u8; 32], WitnessNonce::default()))
        );
        assert_eq!(block.header.merkle_root, block.calculate_merkle_root());
        assert_ne!(block.block_hash(), hash_before);
        assert!(block.has_valid_witness_commitment());
    }

    #[test]
    fn test_commitment_covers_other_witnesses() {
        let mut spend = coinbase();
        spend.inputs[0].previous_output = OutPoint {
            txid: bitcoin::Txid::from_byte_array([9; 32]),
            vout: 0,
        };
        spend.inputs[0].witness = Witness::from_slice(&[vec![0xaa; 71]]);
        let mut block = block_with(vec![coinbase(), spend]);
        block.add_witness_commitment(WitnessNonce::from(1u64)).unwrap();
        assert!(block.has_valid_witness_commitment());

        // Tampering with another transaction's witness breaks the commitment.
        block.transactions[1].inputs[0].witness = Witness::from_slice(&[vec![0xbb; 71]]);
        assert!(!block.has_valid_witness_commitment());
    }

    #[test]
    fn test_different_nonces_same_shape() {
        let base = block_with(vec![coinbase()]);
        let mut first = base.clone();
        let mut second = base.clone();
        first.add_witness_commitment(WitnessNonce::from(0u64)).unwrap();
        second.add_witness_commitment(WitnessNonce::from(1u64)).unwrap();

        assert_eq!(first.transactions.len(), second.transactions.len());
        assert_eq!(
            first.transactions[0].outputs.len(),
            base.transactions[0].outputs.len() + 1
        );
        assert_eq!(
            first.transactions[0].outputs.len(),
            second.transactions[0].outputs.len()
        );
        assert_ne!(
            first.transactions[0].outputs.last(),
            second.transactions[0].outputs.last()
        );

        // A second call on the same copy appends yet another output.
        first.add_witness_commitment(WitnessNonce::from(0u64)).unwrap();
        assert_eq!(
            first.transactions[0].outputs.len(),
            base.transactions[0].outputs.len() + 2
        );
    }

    #[test]
    fn test_add_witness_commitment_on_empty_block() {
        let mut block = block_with(vec![]);
        assert!(matches!(
            block.add_witness_commitment(WitnessNonce::default()),
            Err(BlockToolsError::InvalidBlockState(_))
        ));
    }
}
