//! Standard output script templates.
//!
//! Hash-committing templates are assembled byte by byte: opcode, push length,
//! digest. Wrapped forms always hash the inner script first and embed that
//! digest in the outer one.

use bitcoin::opcodes::all::{
    OP_CHECKMULTISIG, OP_CHECKSIG, OP_EQUAL, OP_HASH160, OP_PUSHBYTES_0, OP_PUSHBYTES_20,
    OP_PUSHBYTES_32, OP_PUSHNUM_1,
};
use bitcoin::opcodes::OP_TRUE;
use bitcoin::script::Builder;
use bitcoin::{PublicKey, Script, ScriptBuf};

use crate::error::{BlockToolsError, Result};
use crate::hashes::{calculate_hash160, calculate_sha256};

/// Witness output flavours used when paying to a key.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WitnessOutputKind {
    /// Pay-to-witness-pubkey-hash of the key.
    P2wpkh,
    /// Pay-to-witness-script-hash of a 1-of-1 multisig over the key.
    P2wsh,
}

/// `<pubkey> OP_CHECKSIG`
pub fn pay_to_pubkey(pubkey: &PublicKey) -> ScriptBuf {
    Builder::new()
        .push_key(pubkey)
        .push_opcode(OP_CHECKSIG)
        .into_script()
}

/// `OP_0 <hash160(pubkey)>`. Witness programs only commit to compressed keys.
pub fn pay_to_witness_pubkey_hash(pubkey: &PublicKey) -> Result<ScriptBuf> {
    if !pubkey.compressed {
        return Err(BlockToolsError::UncompressedWitnessKey);
    }
    let key_hash = calculate_hash160(&pubkey.to_bytes());
    let mut bytes = vec![OP_PUSHBYTES_0.to_u8(), OP_PUSHBYTES_20.to_u8()];
    bytes.extend_from_slice(&key_hash);
    Ok(ScriptBuf::from_bytes(bytes))
}

/// `OP_0 <sha256(witness_script)>`
pub fn pay_to_witness_script_hash(witness_script: &Script) -> ScriptBuf {
    let script_hash = calculate_sha256(witness_script.as_bytes());
    let mut bytes = vec![OP_PUSHBYTES_0.to_u8(), OP_PUSHBYTES_32.to_u8()];
    bytes.extend_from_slice(&script_hash);
    ScriptBuf::from_bytes(bytes)
}

/// `OP_HASH160 <hash160(redeem_script)> OP_EQUAL`
pub fn pay_to_script_hash(redeem_script: &Script) -> ScriptBuf {
    let script_hash = calculate_hash160(redeem_script.as_bytes());
    let mut bytes = vec![OP_HASH160.to_u8(), OP_PUSHBYTES_20.to_u8()];
    bytes.extend_from_slice(&script_hash);
    bytes.push(OP_EQUAL.to_u8());
    ScriptBuf::from_bytes(bytes)
}

/// `OP_1 <pubkey> OP_1 OP_CHECKMULTISIG`
pub fn one_of_one_multisig_witness_script(pubkey: &PublicKey) -> ScriptBuf {
    Builder::new()
        .push_opcode(OP_PUSHNUM_1)
        .push_key(pubkey)
        .push_opcode(OP_PUSHNUM_1)
        .push_opcode(OP_CHECKMULTISIG)
        .into_script()
}

/// `OP_TRUE`
pub fn anyone_can_spend() -> ScriptBuf {
    Builder::new().push_opcode(OP_TRUE).into_script()
}

/// Locking script for sending to `pubkey` through a witness program,
/// optionally nested inside P2SH.
pub fn witness_output_script(
    kind: WitnessOutputKind,
    pubkey: &PublicKey,
    wrap_p2sh: bool,
) -> Result<ScriptBuf> {
    let program = match kind {
        WitnessOutputKind::P2wpkh => pay_to_witness_pubkey_hash(pubkey)?,
        WitnessOutputKind::P2wsh => {
            pay_to_witness_script_hash(&one_of_one_multisig_witness_script(pubkey))
        }
    };
    if wrap_p2sh {
        Ok(pay_to_script_hash(&program))
    } else {
        Ok(program)
    }
}
