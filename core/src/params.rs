// Network Parameters
// ==================
//
// Parameters that change how blocks are assembled on each network. They are
// passed explicitly to the assembler instead of being selected at build time.

use std::borrow::Cow;

use bitcoin::opcodes::OP_TRUE;
use bitcoin::script::Builder;
use bitcoin::{Amount, CompactTarget, ScriptBuf};

use crate::constants::COIN;
use crate::error::{BlockToolsError, Result};

/// Stores the parameters for a specific network
///
/// The assembler resolves every field it is not given explicitly (block
/// version, timestamp, target bits, block reward) from this value. The
/// regtest parameters are the default, since assembled blocks are meant to be
/// accepted by a low-difficulty test chain.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NetworkParams {
    /// Network name, as accepted by [`NetworkParams::for_network`].
    pub name: &'static str,

    /// Maximum difficulty bits value
    ///
    /// Encoded form of the highest target (lowest difficulty) allowed for a
    /// block. Used as the block's `bits` when the template has none.
    pub max_bits: CompactTarget,

    /// The number of blocks between block reward halvings
    pub subsidy_halving_interval: u32,

    /// Reward of a block before any halving, excluding fees.
    pub base_subsidy: Amount,

    /// Header version used when neither the caller nor the template sets one.
    pub default_block_version: i32,

    /// Seconds added to the current time when neither the caller nor the
    /// template provides a block time.
    pub block_time_offset: u32,

    /// Challenge script of the signed-block proof. `OP_TRUE` lets any
    /// (empty) solution satisfy it.
    pub signblock_challenge: ScriptBuf,
}

impl NetworkParams {
    pub fn regtest() -> Self {
        Self {
            name: "regtest",
            max_bits: CompactTarget::from_consensus(0x207F_FFFF),
            subsidy_halving_interval: 150,
            base_subsidy: Amount::from_sat(50 * COIN),
            default_block_version: 1,
            block_time_offset: 600,
            signblock_challenge: Builder::new().push_opcode(OP_TRUE).into_script(),
        }
    }

    pub fn mainnet() -> Self {
        Self {
            name: "mainnet",
            // Max target of Bitcoin's genesis block
            max_bits: CompactTarget::from_consensus(0x1D00_FFFF),
            // Block reward halving occurs every 210,000 blocks (about 4 years)
            subsidy_halving_interval: 210_000,
            ..Self::regtest()
        }
    }

    pub fn testnet4() -> Self {
        Self {
            name: "testnet4",
            ..Self::mainnet()
        }
    }

    pub fn signet() -> Self {
        Self {
            name: "signet",
            max_bits: CompactTarget::from_consensus(0x1E03_77AE),
            ..Self::mainnet()
        }
    }

    /// Selects parameters by network name ("mainnet", "testnet4", "signet",
    /// "regtest").
    pub fn for_network(name: &str) -> Result<Self> {
        match name {
            "mainnet" => Ok(Self::mainnet()),
            "testnet4" => Ok(Self::testnet4()),
            "signet" => Ok(Self::signet()),
            "regtest" => Ok(Self::regtest()),
            other => Err(BlockToolsError::InvalidTemplate(Cow::Owned(format!(
                "unknown network {other}"
            )))),
        }
    }

    /// Block reward at `height` before fees: the base subsidy right-shifted
    /// once per completed halving interval.
    pub fn subsidy_at(&self, height: u32) -> Amount {
        let halvings = height / self.subsidy_halving_interval;
        Amount::from_sat(self.base_subsidy.to_sat().checked_shr(halvings).unwrap_or(0))
    }
}

impl Default for NetworkParams {
    fn default() -> Self {
        Self::regtest()
    }
}
