//! Error types for block and transaction construction

use std::borrow::Cow;
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq, Clone)]
pub enum BlockToolsError {
    #[error("Malformed coinbase height encoding: {0}")]
    MalformedHeightEncoding(Cow<'static, str>),

    #[error("Invalid block state: {0}")]
    InvalidBlockState(Cow<'static, str>),

    #[error("Output index {index} out of range, transaction has {outputs} outputs")]
    IndexOutOfRange { index: usize, outputs: usize },

    /// The sigop counter could not decode the script past this point.
    /// `counted` holds the sigops accumulated before the undecodable opcode.
    #[error("Unsupported script form after {counted} sigops: {reason}")]
    UnsupportedScriptForm {
        counted: u32,
        reason: Cow<'static, str>,
    },

    #[error("Malformed transaction: {0}")]
    MalformedTransaction(Cow<'static, str>),

    #[error("Invalid block template: {0}")]
    InvalidTemplate(Cow<'static, str>),

    #[error("Output value overflow: {0}")]
    ValueOverflow(Cow<'static, str>),

    #[error("Uncompressed public key cannot be committed to by a witness program")]
    UncompressedWitnessKey,
}

pub type Result<T> = std::result::Result<T, BlockToolsError>;
