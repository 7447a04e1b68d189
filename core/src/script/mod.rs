//! Script construction, classification and sigop counting.
//!
//! Scripts are plain [`bitcoin::ScriptBuf`] values; the templates here are
//! convenience constructors over that single representation.

pub mod sigops;
pub mod templates;
pub mod txout;

pub use sigops::{
    count_block_sigops, count_script_sigops, count_transaction_sigops, try_count_script_sigops,
};
pub use templates::{
    anyone_can_spend, one_of_one_multisig_witness_script, pay_to_pubkey, pay_to_script_hash,
    pay_to_witness_pubkey_hash, pay_to_witness_script_hash, witness_output_script,
    WitnessOutputKind,
};
pub use txout::{classify_output, TxoutType};
