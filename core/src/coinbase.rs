//! Coinbase and test-spend transaction construction.

use std::borrow::Cow;

use bitcoin::{Amount, OutPoint, PublicKey, ScriptBuf, Sequence, TxIn, Witness};
use tracing::debug;

use crate::error::{BlockToolsError, Result};
use crate::height::encode_height;
use crate::params::NetworkParams;
use crate::script::templates::{anyone_can_spend, pay_to_pubkey};
use crate::transaction::{Transaction, TxOutput};

/// Builds the coinbase transaction of a block at a given height.
///
/// ```
/// use blocktools_core::{CoinbaseBuilder, NetworkParams};
///
/// let coinbase = CoinbaseBuilder::new(20)
///     .build(&NetworkParams::regtest())
///     .unwrap();
/// assert!(coinbase.is_coinbase());
/// ```
#[derive(Clone, Debug)]
pub struct CoinbaseBuilder {
    height: u32,
    pubkey: Option<PublicKey>,
    extra_output_script: Option<ScriptBuf>,
    fees: Amount,
    reward: Option<Amount>,
}

impl CoinbaseBuilder {
    pub fn new(height: u32) -> Self {
        Self {
            height,
            pubkey: None,
            extra_output_script: None,
            fees: Amount::ZERO,
            reward: None,
        }
    }

    /// Pays the reward to this key (P2PK) instead of `OP_TRUE`.
    pub fn pubkey(mut self, pubkey: PublicKey) -> Self {
        self.pubkey = Some(pubkey);
        self
    }

    /// Adds a zero-value output with this script, e.g. to pad weight or sigops.
    pub fn extra_output_script(mut self, script: ScriptBuf) -> Self {
        self.extra_output_script = Some(script);
        self
    }

    pub fn fees(mut self, fees: Amount) -> Self {
        self.fees = fees;
        self
    }

    /// Overrides the reward. Anything other than the network's base subsidy
    /// is paid verbatim, without halving or fees.
    pub fn reward(mut self, reward: Amount) -> Self {
        self.reward = Some(reward);
        self
    }

    pub fn build(self, params: &NetworkParams) -> Result<Transaction> {
        let reward = self.reward.unwrap_or(params.base_subsidy);
        let value = if reward == params.base_subsidy {
            let subsidy = params.subsidy_at(self.height);
            subsidy.checked_add(self.fees).ok_or_else(|| {
                BlockToolsError::ValueOverflow(Cow::Owned(format!(
                    "subsidy {subsidy} plus fees {}",
                    self.fees
                )))
            })?
        } else {
            reward
        };

        let script_pubkey = match &self.pubkey {
            Some(pubkey) => pay_to_pubkey(pubkey),
            None => anyone_can_spend(),
        };

        let mut outputs = vec![TxOutput::new(value, script_pubkey)];
        if let Some(script) = self.extra_output_script {
            outputs.push(TxOutput::new(Amount::ZERO, script));
        }

        debug!(height = self.height, %value, "built coinbase");
        Ok(Transaction {
            version: 1,
            inputs: vec![TxIn {
                previous_output: OutPoint::null(),
                script_sig: encode_height(self.height),
                sequence: Sequence::MAX,
                witness: Witness::new(),
            }],
            outputs,
            lock_time: 0,
        })
    }
}

/// Coinbase paying the full subsidy at `height` to `OP_TRUE`.
pub fn create_coinbase(height: u32, params: &NetworkParams) -> Result<Transaction> {
    CoinbaseBuilder::new(height).build(params)
}

/// One-input transaction spending output `n` of `prev_tx` to `script_pubkey`.
/// A non-zero `fee` becomes a second output with an empty script.
pub fn create_tx_with_script(
    prev_tx: &Transaction,
    n: u32,
    script_sig: ScriptBuf,
    amount: Amount,
    fee: Amount,
    script_pubkey: ScriptBuf,
) -> Result<Transaction> {
    let outputs = prev_tx.outputs.len();
    if n as usize >= outputs {
        return Err(BlockToolsError::IndexOutOfRange {
            index: n as usize,
            outputs,
        });
    }

    let mut tx_outputs = vec![TxOutput::new(amount, script_pubkey)];
    if fee > Amount::ZERO {
        tx_outputs.push(TxOutput::new(fee, ScriptBuf::new()));
    }

    Ok(Transaction {
        version: 1,
        inputs: vec![TxIn {
            previous_output: OutPoint {
                txid: prev_tx.txid(),
                vout: n,
            },
            script_sig,
            sequence: Sequence::MAX,
            witness: Witness::new(),
        }],
        outputs: tx_outputs,
        lock_time: 0,
    })
}
