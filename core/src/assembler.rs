//! Block assembly from an optional `getblocktemplate` result.
//!
//! Every header field resolves in the same order: the value passed to the
//! [`BlockBuilder`], then the template, then the network default.

use std::borrow::Cow;

use bitcoin::hashes::Hash;
use bitcoin::{BlockHash, CompactTarget, TxMerkleNode};
use serde::Deserialize;
use tracing::debug;

use crate::block::{Block, BlockHeader, BlockProof};
use crate::coinbase::create_coinbase;
use crate::error::{BlockToolsError, Result};
use crate::params::NetworkParams;
use crate::transaction::Transaction;

/// The fields of a `getblocktemplate` response used for assembly.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct BlockTemplate {
    #[serde(rename = "previousblockhash")]
    pub previous_block_hash: BlockHash,
    pub height: u32,
    pub curtime: Option<u32>,
    /// Compact target as big-endian hex, e.g. `"207fffff"`.
    pub bits: Option<String>,
    pub version: Option<i32>,
}

impl BlockTemplate {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| BlockToolsError::InvalidTemplate(Cow::Owned(e.to_string())))
    }

    pub fn compact_bits(&self) -> Result<Option<CompactTarget>> {
        let Some(bits) = &self.bits else {
            return Ok(None);
        };
        if bits.len() != 8 {
            return Err(BlockToolsError::InvalidTemplate(Cow::Owned(format!(
                "bits {bits:?} is not 4 bytes of hex"
            ))));
        }
        u32::from_str_radix(bits, 16)
            .map(|bits| Some(CompactTarget::from_consensus(bits)))
            .map_err(|e| BlockToolsError::InvalidTemplate(Cow::Owned(format!("bits {bits:?}: {e}"))))
    }
}

/// A transaction to include, either already parsed or as raw hex.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransactionInput {
    Parsed(Transaction),
    Raw(String),
}

impl TransactionInput {
    pub fn into_transaction(self) -> Result<Transaction> {
        match self {
            TransactionInput::Parsed(tx) => Ok(tx),
            TransactionInput::Raw(tx_hex) => Transaction::from_hex(&tx_hex),
        }
    }
}

impl From<Transaction> for TransactionInput {
    fn from(tx: Transaction) -> Self {
        TransactionInput::Parsed(tx)
    }
}

impl From<String> for TransactionInput {
    fn from(tx_hex: String) -> Self {
        TransactionInput::Raw(tx_hex)
    }
}

impl From<&str> for TransactionInput {
    fn from(tx_hex: &str) -> Self {
        TransactionInput::Raw(tx_hex.to_owned())
    }
}

/// Assembles a block whose merkle root and hash are current.
///
/// ```
/// use bitcoin::hashes::Hash;
/// use bitcoin::BlockHash;
/// use blocktools_core::{create_coinbase, BlockBuilder, NetworkParams};
///
/// let params = NetworkParams::regtest();
/// let block = BlockBuilder::new(&params)
///     .previous_block_hash(BlockHash::all_zeros())
///     .coinbase(create_coinbase(1, &params).unwrap())
///     .time(1_296_688_602)
///     .build()
///     .unwrap();
/// assert_eq!(block.height, 1);
/// ```
#[derive(Clone, Debug)]
pub struct BlockBuilder<'a> {
    params: &'a NetworkParams,
    previous_block_hash: Option<BlockHash>,
    coinbase: Option<Transaction>,
    time: Option<u32>,
    version: Option<i32>,
    template: Option<BlockTemplate>,
    transactions: Vec<TransactionInput>,
}

impl<'a> BlockBuilder<'a> {
    pub fn new(params: &'a NetworkParams) -> Self {
        Self {
            params,
            previous_block_hash: None,
            coinbase: None,
            time: None,
            version: None,
            template: None,
            transactions: Vec::new(),
        }
    }

    pub fn previous_block_hash(mut self, hash: BlockHash) -> Self {
        self.previous_block_hash = Some(hash);
        self
    }

    pub fn coinbase(mut self, coinbase: Transaction) -> Self {
        self.coinbase = Some(coinbase);
        self
    }

    pub fn time(mut self, time: u32) -> Self {
        self.time = Some(time);
        self
    }

    pub fn version(mut self, version: i32) -> Self {
        self.version = Some(version);
        self
    }

    pub fn template(mut self, template: BlockTemplate) -> Self {
        self.template = Some(template);
        self
    }

    pub fn transaction(mut self, tx: impl Into<TransactionInput>) -> Self {
        self.transactions.push(tx.into());
        self
    }

    pub fn transactions<I, T>(mut self, txs: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<TransactionInput>,
    {
        self.transactions.extend(txs.into_iter().map(Into::into));
        self
    }

    pub fn build(self) -> Result<Block> {
        let template = self.template.as_ref();

        let version = self
            .version
            .or_else(|| template.and_then(|t| t.version))
            .unwrap_or(self.params.default_block_version);
        let time = match self.time.or_else(|| template.and_then(|t| t.curtime)) {
            Some(time) => time,
            None => default_time(self.params.block_time_offset)?,
        };
        let prev_blockhash = self
            .previous_block_hash
            .or_else(|| template.map(|t| t.previous_block_hash))
            .ok_or(BlockToolsError::InvalidTemplate(Cow::Borrowed(
                "no previous block hash and no template",
            )))?;
        let bits = match template {
            Some(t) => t.compact_bits()?,
            None => None,
        }
        .unwrap_or(self.params.max_bits);

        let coinbase = match (self.coinbase, template) {
            (Some(coinbase), _) => coinbase,
            (None, Some(t)) => create_coinbase(t.height, self.params)?,
            (None, None) => {
                return Err(BlockToolsError::InvalidTemplate(Cow::Borrowed(
                    "no coinbase and no template height",
                )))
            }
        };

        let mut transactions = vec![coinbase];
        for tx in self.transactions {
            transactions.push(tx.into_transaction()?);
        }

        let mut block = Block {
            header: BlockHeader {
                version,
                prev_blockhash,
                merkle_root: TxMerkleNode::all_zeros(),
                time,
                bits,
                proof: BlockProof {
                    challenge: self.params.signblock_challenge.clone(),
                    solution: Default::default(),
                },
            },
            transactions,
            height: 0,
        };
        block.height = block.coinbase_height()?;
        block.rehash();

        debug!(
            height = block.height,
            txs = block.transactions.len(),
            merkle_root = %block.header.merkle_root,
            block_hash = %block.block_hash(),
            "assembled block"
        );
        Ok(block)
    }
}

fn default_time(offset: u32) -> Result<u32> {
    let time = chrono::Utc::now().timestamp() + i64::from(offset);
    u32::try_from(time).map_err(|_| {
        BlockToolsError::InvalidTemplate(Cow::Owned(format!(
            "current time {time} does not fit a block timestamp"
        )))
    })
}

#[cfg(test)]
mod tests {
    use bitcoin::ScriptBuf;

    use super::*;
    use crate::coinbase::CoinbaseBuilder;

    fn template_json() -> String {
        serde_json::json!({
            "height": 1,
            "previousblockhash": "00".repeat(32),
            "bits": "207fffff",
        })
        .to_string()
    }

    #[test]
    fn test_template_parses_optional_fields() {
        let template = BlockTemplate::from_json(&template_json()).unwrap();
        assert_eq!(template.height, 1);
        assert_eq!(template.previous_block_hash, BlockHash::all_zeros());
        assert_eq!(template.curtime, None);
        assert_eq!(template.version, None);
        assert_eq!(
            template.compact_bits().unwrap(),
            Some(CompactTarget::from_consensus(0x207fffff))
        );
    }

    #[test]
    fn test_template_rejects_bad_json_and_bits() {
        assert!(matches!(
            BlockTemplate::from_json("{\"height\": 1}"),
            Err(BlockToolsError::InvalidTemplate(_))
        ));
        let mut template = BlockTemplate::from_json(&template_json()).unwrap();
        template.bits = Some("7fff".to_owned());
        assert!(template.compact_bits().is_err());
        template.bits = Some("zzzzzzzz".to_owned());
        assert!(template.compact_bits().is_err());
    }

    #[test]
    fn test_build_from_template_only() {
        let params = NetworkParams::regtest();
        let template = BlockTemplate::from_json(&template_json()).unwrap();
        let before = chrono::Utc::now().timestamp();
        let block = BlockBuilder::new(&params).template(template).build().unwrap();

        assert_eq!(block.transactions.len(), 1);
        assert_eq!(block.height, 1);
        assert_eq!(block.header.version, 1);
        assert_eq!(block.header.bits.to_consensus(), 0x207fffff);
        assert_eq!(block.header.prev_blockhash, BlockHash::all_zeros());
        assert_eq!(block.header.merkle_root, block.calculate_merkle_root());
        assert_eq!(block.header.proof.challenge.as_bytes(), &[0x51]);
        assert!(block.header.proof.solution.is_empty());
        // Defaults to ten minutes ahead of now.
        let time = i64::from(block.header.time);
        assert!(time >= before + 600 && time <= chrono::Utc::now().timestamp() + 600);
    }

    #[test]
    fn test_explicit_arguments_win_over_template() {
        let params = NetworkParams::regtest();
        let mut template = BlockTemplate::from_json(&template_json()).unwrap();
        template.curtime = Some(1_000);
        template.version = Some(0x2000_0000);

        let prev = BlockHash::from_byte_array([3; 32]);
        let block = BlockBuilder::new(&params)
            .template(template.clone())
            .previous_block_hash(prev)
            .time(2_000)
            .version(4)
            .coinbase(create_coinbase(7, &params).unwrap())
            .build()
            .unwrap();
        assert_eq!(block.header.prev_blockhash, prev);
        assert_eq!(block.header.time, 2_000);
        assert_eq!(block.header.version, 4);
        assert_eq!(block.height, 7);

        let block = BlockBuilder::new(&params).template(template).build().unwrap();
        assert_eq!(block.header.time, 1_000);
        assert_eq!(block.header.version, 0x2000_0000);
    }

    #[test]
    fn test_without_template_uses_network_bits() {
        let params = NetworkParams::signet();
        let block = BlockBuilder::new(&params)
            .previous_block_hash(BlockHash::all_zeros())
            .coinbase(create_coinbase(300, &params).unwrap())
            .time(1)
            .build()
            .unwrap();
        assert_eq!(block.header.bits.to_consensus(), 0x1e0377ae);
        assert_eq!(block.height, 300);
    }

    #[test]
    fn test_missing_inputs_are_template_errors() {
        let params = NetworkParams::regtest();
        assert!(matches!(
            BlockBuilder::new(&params)
                .coinbase(create_coinbase(1, &params).unwrap())
                .build(),
            Err(BlockToolsError::InvalidTemplate(_))
        ));
        assert!(matches!(
            BlockBuilder::new(&params)
                .previous_block_hash(BlockHash::all_zeros())
                .build(),
            Err(BlockToolsError::InvalidTemplate(_))
        ));
    }

    #[test]
    fn test_raw_and_parsed_transactions_are_appended_in_order() {
        let params = NetworkParams::regtest();
        let first = CoinbaseBuilder::new(2)
            .extra_output_script(ScriptBuf::from_bytes(vec![0xac]))
            .build(&params)
            .unwrap();
        let second = create_coinbase(3, &params).unwrap();
        let block = BlockBuilder::new(&params)
            .template(BlockTemplate::from_json(&template_json()).unwrap())
            .transaction(first.clone())
            .transaction(second.to_hex())
            .build()
            .unwrap();
        assert_eq!(block.transactions.len(), 3);
        assert_eq!(block.transactions[1], first);
        assert_eq!(block.transactions[2], second);
    }

    #[test]
    fn test_bad_raw_transaction() {
        let params = NetworkParams::regtest();
        let result = BlockBuilder::new(&params)
            .template(BlockTemplate::from_json(&template_json()).unwrap())
            .transactions(["deadbeef"])
            .build();
        assert!(matches!(result, Err(BlockToolsError::MalformedTransaction(_))));
    }

    #[test]
    fn test_coinbase_without_height_is_rejected() {
        let params = NetworkParams::regtest();
        let mut coinbase = create_coinbase(1, &params).unwrap();
        coinbase.inputs[0].script_sig = ScriptBuf::new();
        let result = BlockBuilder::new(&params)
            .previous_block_hash(BlockHash::all_zeros())
            .coinbase(coinbase)
            .build();
        assert!(matches!(result, Err(BlockToolsError::MalformedHeightEncoding(_))));
    }
}
