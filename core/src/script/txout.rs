use bitcoin::Script;
use serde::Serialize;

use crate::constants::{WITNESS_COMMITMENT_SCRIPT_LEN, WITNESS_COMMITMENT_SCRIPT_PREFIX};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum TxoutType {
    NonStandard,
    P2A,               // Pay-to-Anchor
    P2PK,              // Pay-to-Pubkey
    P2PKH,             // Pay-to-PubkeyHash
    P2SH,              // Pay-to-ScriptHash
    MultiSig,          // Bare MultiSig
    WitnessCommitment, // OP_RETURN carrying the block's witness commitment
    NullData,          // Unspendable OP_RETURN script that carries data
    P2WSH,             // Pay-to-Witness-ScriptHash
    P2WPKH,            // Pay-to-Witness-PubkeyHash
    P2TR,              // Pay-to-Taproot
    WitnessUnknown,    // Only for Witness versions not already defined above
    AnyoneCanSpend,    // Bare OP_TRUE
}

pub fn classify_output(script_pubkey: &Script) -> TxoutType {
    if script_pubkey.is_p2pk() {
        return TxoutType::P2PK;
    }

    if script_pubkey.is_p2pkh() {
        return TxoutType::P2PKH;
    }

    if script_pubkey.is_p2sh() {
        return TxoutType::P2SH;
    }

    if script_pubkey.is_multisig() {
        return TxoutType::MultiSig;
    }

    if is_witness_commitment(script_pubkey) {
        return TxoutType::WitnessCommitment;
    }

    if script_pubkey.is_op_return() {
        return TxoutType::NullData;
    }

    if script_pubkey.is_p2wsh() {
        return TxoutType::P2WSH;
    }

    if script_pubkey.is_p2wpkh() {
        return TxoutType::P2WPKH;
    }

    if script_pubkey.is_p2tr() {
        return TxoutType::P2TR;
    }

    if is_p2a(script_pubkey) {
        return TxoutType::P2A;
    }

    if script_pubkey.is_witness_program() {
        return TxoutType::WitnessUnknown;
    }

    if script_pubkey.as_bytes() == [0x51] {
        return TxoutType::AnyoneCanSpend;
    }

    TxoutType::NonStandard
}

/// `OP_RETURN OP_PUSHBYTES_36 aa21a9ed <32 bytes> ...`
pub fn is_witness_commitment(script_pubkey: &Script) -> bool {
    let script_bytes = script_pubkey.as_bytes();
    script_bytes.len() >= WITNESS_COMMITMENT_SCRIPT_LEN
        && script_bytes[..WITNESS_COMMITMENT_SCRIPT_PREFIX.len()] == WITNESS_COMMITMENT_SCRIPT_PREFIX
}

fn is_p2a(script_pubkey: &Script) -> bool {
    script_pubkey.as_bytes() == [0x51, 0x02, 0x4e, 0x73]
}
