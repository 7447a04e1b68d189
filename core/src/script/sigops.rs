//! Legacy signature operation counting.
//!
//! Matches the node's `GetSigOpCount(fAccurate)`: `OP_CHECKSIG` and
//! `OP_CHECKSIGVERIFY` cost one sigop, `OP_CHECKMULTISIG` and
//! `OP_CHECKMULTISIGVERIFY` cost the key count when it can be read from an
//! immediately preceding `OP_1`..`OP_16` in accurate mode, and
//! [`MAX_PUBKEYS_PER_MULTISIG`] otherwise.

use std::borrow::Cow;

use bitcoin::opcodes::all::{
    OP_CHECKMULTISIG, OP_CHECKMULTISIGVERIFY, OP_CHECKSIG, OP_CHECKSIGVERIFY, OP_PUSHNUM_1,
    OP_PUSHNUM_16,
};
use bitcoin::opcodes::Opcode;
use bitcoin::script::{self, Instruction};
use bitcoin::Script;
use tracing::warn;

use crate::block::Block;
use crate::constants::MAX_PUBKEYS_PER_MULTISIG;
use crate::error::{BlockToolsError, Result};
use crate::transaction::Transaction;

/// Counts sigops, failing with [`BlockToolsError::UnsupportedScriptForm`] when
/// the script stops decoding part way through. The error carries the count
/// accumulated before that point.
pub fn try_count_script_sigops(script: &Script, accurate: bool) -> Result<u32> {
    match count_decodable_prefix(script, accurate) {
        (count, None) => Ok(count),
        (counted, Some(e)) => Err(BlockToolsError::UnsupportedScriptForm {
            counted,
            reason: Cow::Owned(e.to_string()),
        }),
    }
}

/// Counts sigops in a script. An undecodable tail is not counted, the same
/// way the node stops at the first opcode it cannot read.
pub fn count_script_sigops(script: &Script, accurate: bool) -> u32 {
    let (count, error) = count_decodable_prefix(script, accurate);
    if let Some(e) = error {
        warn!(counted = count, reason = %e, "sigop count stopped at undecodable opcode");
    }
    count
}

/// Sigops up to the first undecodable instruction, and the decode error that
/// ended the walk early, if any.
fn count_decodable_prefix(script: &Script, accurate: bool) -> (u32, Option<script::Error>) {
    let mut count = 0u32;
    let mut last_opcode: Option<Opcode> = None;

    for instruction in script.instructions() {
        let opcode = match instruction {
            Ok(Instruction::PushBytes(_)) => {
                last_opcode = None;
                continue;
            }
            Ok(Instruction::Op(opcode)) => opcode,
            Err(e) => return (count, Some(e)),
        };

        if opcode == OP_CHECKSIG || opcode == OP_CHECKSIGVERIFY {
            count = count.saturating_add(1);
        } else if opcode == OP_CHECKMULTISIG || opcode == OP_CHECKMULTISIGVERIFY {
            let keys = match last_opcode {
                Some(prev) if accurate => pushnum_value(prev).unwrap_or(MAX_PUBKEYS_PER_MULTISIG),
                _ => MAX_PUBKEYS_PER_MULTISIG,
            };
            count = count.saturating_add(keys);
        }
        last_opcode = Some(opcode);
    }

    (count, None)
}

/// Sum over every output's locking script and every input's unlocking script.
pub fn count_transaction_sigops(tx: &Transaction, accurate: bool) -> u32 {
    let outputs = tx
        .outputs
        .iter()
        .map(|output| count_script_sigops(&output.script_pubkey, accurate));
    let inputs = tx
        .inputs
        .iter()
        .map(|input| count_script_sigops(&input.script_sig, accurate));
    outputs.chain(inputs).fold(0u32, u32::saturating_add)
}

pub fn count_block_sigops(block: &Block, accurate: bool) -> u32 {
    block
        .transactions
        .iter()
        .map(|tx| count_transaction_sigops(tx, accurate))
        .fold(0u32, u32::saturating_add)
}

fn pushnum_value(opcode: Opcode) -> Option<u32> {
    let byte = opcode.to_u8();
    (OP_PUSHNUM_1.to_u8()..=OP_PUSHNUM_16.to_u8())
        .contains(&byte)
        .then(|| u32::from(byte - OP_PUSHNUM_1.to_u8() + 1))
}
