use std::borrow::Cow;

use bitcoin::consensus::serialize;
use bitcoin::hashes::Hash;
use bitcoin::{Amount, BlockHash, CompactTarget, ScriptBuf, TxMerkleNode, VarInt};

use crate::constants::WITNESS_SCALE_FACTOR;
use crate::error::{BlockToolsError, Result};
use crate::hashes::calculate_double_sha256;
use crate::height::decode_height;
use crate::merkle::compute_merkle_root;
use crate::transaction::Transaction;

/// Signed-block proof. The challenge is committed to by the block hash; the
/// solution satisfies it and is therefore left out of the hash.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct BlockProof {
    pub challenge: ScriptBuf,
    pub solution: ScriptBuf,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct BlockHeader {
    pub version: i32,
    pub prev_blockhash: BlockHash,
    pub merkle_root: TxMerkleNode,
    pub time: u32,
    pub bits: CompactTarget,
    pub proof: BlockProof,
}

impl BlockHeader {
    /// Bytes committed to by the block hash.
    pub fn hash_preimage(&self) -> Vec<u8> {
        let mut bytes = serialize(&self.version);
        bytes.extend(serialize(&self.prev_blockhash));
        bytes.extend(serialize(&self.merkle_root));
        bytes.extend(serialize(&self.time));
        bytes.extend(serialize(&self.bits));
        bytes.extend(serialize(&self.proof.challenge));
        bytes
    }

    pub fn block_hash(&self) -> BlockHash {
        BlockHash::from_byte_array(calculate_double_sha256(&self.hash_preimage()))
    }

    fn serialize(&self) -> Vec<u8> {
        let mut bytes = self.hash_preimage();
        bytes.extend(serialize(&self.proof.solution));
        bytes
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Block {
    pub header: BlockHeader,
    pub transactions: Vec<Transaction>,
    /// Height read back from the coinbase; informational only.
    pub height: u32,
}

impl Block {
    pub fn coinbase(&self) -> Option<&Transaction> {
        self.transactions.first()
    }

    /// BIP-34 height committed to by the coinbase scriptSig.
    pub fn coinbase_height(&self) -> Result<u32> {
        let coinbase = self.coinbase().ok_or(BlockToolsError::InvalidBlockState(
            Cow::Borrowed("block has no coinbase"),
        ))?;
        let input = coinbase
            .inputs
            .first()
            .ok_or(BlockToolsError::InvalidBlockState(Cow::Borrowed(
                "coinbase has no inputs",
            )))?;
        decode_height(&input.script_sig)
    }

    pub fn txids(&self) -> Vec<[u8; 32]> {
        self.transactions
            .iter()
            .map(|tx| tx.txid().to_byte_array())
            .collect()
    }

    /// Witness tree leaves. The coinbase leaf is all zeros, since the
    /// coinbase carries the commitment to this very tree.
    pub fn wtxids(&self) -> Vec<[u8; 32]> {
        self.transactions
            .iter()
            .enumerate()
            .map(|(i, tx)| {
                if i == 0 {
                    [0u8; 32]
                } else {
                    tx.wtxid().to_byte_array()
                }
            })
            .collect()
    }

    pub fn calculate_merkle_root(&self) -> TxMerkleNode {
        TxMerkleNode::from_byte_array(compute_merkle_root(&self.txids()))
    }

    pub fn calculate_witness_merkle_root(&self) -> [u8; 32] {
        compute_merkle_root(&self.wtxids())
    }

    /// Recomputes the merkle root after the transaction list changed. The
    /// block hash follows from the header, so it is current afterwards.
    pub fn rehash(&mut self) {
        self.header.merkle_root = self.calculate_merkle_root();
    }

    pub fn block_hash(&self) -> BlockHash {
        self.header.block_hash()
    }

    pub fn is_segwit(&self) -> bool {
        self.transactions.iter().any(|tx| tx.is_segwit())
    }

    fn base_size(&self) -> usize {
        let mut size = self.header.serialize().len();
        size += VarInt::from(self.transactions.len()).size();
        size += self
            .transactions
            .iter()
            .map(|tx| tx.base_size())
            .sum::<usize>();
        size
    }

    pub fn total_size(&self) -> usize {
        let mut size = self.header.serialize().len();
        size += VarInt::from(self.transactions.len()).size();
        size += self
            .transactions
            .iter()
            .map(|tx| tx.total_size())
            .sum::<usize>();
        size
    }

    /// BIP-141 weight: base size counted at the full scale factor, witness
    /// bytes once.
    pub fn weight(&self) -> u64 {
        let witness_factor = u64::from(WITNESS_SCALE_FACTOR);
        (self.base_size() as u64) * (witness_factor - 1) + self.total_size() as u64
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut bytes = self.header.serialize();
        bytes.extend(serialize(&VarInt::from(self.transactions.len())));
        for tx in &self.transactions {
            bytes.extend(tx.serialize());
        }
        bytes
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.serialize())
    }

    /// Sum of the coinbase's explicit output values.
    pub fn claimed_block_reward(&self) -> Amount {
        self.coinbase()
            .map(|coinbase| {
                coinbase
                    .outputs
                    .iter()
                    .filter_map(|output| output.value.explicit())
                    .sum()
            })
            .unwrap_or(Amount::ZERO)
    }
}
