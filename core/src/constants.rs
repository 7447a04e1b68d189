// Chain Constants
// ===============
//
// Wire-format and consensus constants used when assembling blocks for a
// low-difficulty test chain.

/// Marker byte used in segregated witness (segwit) transactions
///
/// In a serialized segwit transaction, this byte (0x00) appears where the transaction
/// input count would normally be, signaling that the transaction uses the segwit format.
/// It is followed by the segwit flag.
pub const SEGWIT_MARKER: u8 = 0x00;

/// Flag byte used in segregated witness (segwit) transactions
///
/// This byte (0x01) follows the segwit marker in a serialized segwit transaction,
/// indicating that the transaction contains witness data. After this byte, the actual
/// input count follows.
pub const SEGWIT_FLAG: u8 = 0x01;

/// Header of the witness commitment payload (BIP-141).
///
/// The commitment output's script is `OP_RETURN` followed by a 36-byte push
/// of these four bytes and the 32-byte commitment hash.
pub const WITNESS_COMMITMENT_HEADER: [u8; 4] = [0xaa, 0x21, 0xa9, 0xed];

/// Full byte prefix of a witness commitment script:
/// `OP_RETURN OP_PUSHBYTES_36 aa21a9ed`.
pub const WITNESS_COMMITMENT_SCRIPT_PREFIX: [u8; 6] = [0x6a, 0x24, 0xaa, 0x21, 0xa9, 0xed];

/// Length of a witness commitment script (prefix plus the 32-byte hash).
pub const WITNESS_COMMITMENT_SCRIPT_LEN: usize = 38;

/// The scale factor used to calculate weight for witness data
///
/// Witness data is counted at 1/4 the weight of non-witness data. This constant
/// defines that relationship: non-witness (base) data is multiplied by 4 when
/// calculating block weight, while witness data is counted directly.
pub const WITNESS_SCALE_FACTOR: u32 = 4;

/// Maximum number of legacy signature operations in a block.
pub const MAX_BLOCK_SIGOPS: u32 = 20_000;

/// Maximum allowed signature operation cost per block
///
/// Legacy sigops are charged at [`WITNESS_SCALE_FACTOR`] times their count, so
/// the weight budget is `MAX_BLOCK_SIGOPS * WITNESS_SCALE_FACTOR`.
pub const MAX_BLOCK_SIGOPS_WEIGHT: u32 = MAX_BLOCK_SIGOPS * WITNESS_SCALE_FACTOR;

/// Maximum allowed weight of a block
///
/// Introduced in BIP-141 (Segregated Witness), block weight is a measure that
/// replaces the previous concept of block size. A block's weight is calculated
/// as (base size * 3) + total size, where base size is the size of the block
/// with witness data removed, and total size includes witness data.
pub const MAX_BLOCK_WEIGHT: u32 = 4_000_000;

/// Sigops charged for a multisig opcode whose key count cannot be read off
/// the preceding opcode.
pub const MAX_PUBKEYS_PER_MULTISIG: u32 = 20;

/// Heights up to this value are encoded in the coinbase as a small-integer
/// opcode instead of a data push.
pub const SMALL_INT_HEIGHT_LIMIT: u32 = 16;

/// Longest data push a coinbase height can need: four value bytes plus a
/// sign-padding byte for heights above `i32::MAX`.
pub const MAX_HEIGHT_PUSH_LEN: usize = 5;

/// Coinbase transaction outputs can only be spent after this number of new blocks.
pub const COINBASE_MATURITY: u32 = 100;

/// Genesis block time on regtest.
pub const TIME_GENESIS_BLOCK: u32 = 1_296_688_602;

/// Soft-fork activation heights on regtest.
pub const CLTV_HEIGHT: u32 = 1351;
pub const CSV_ACTIVATION_HEIGHT: u32 = 432;

/// Satoshis per coin.
pub const COIN: u64 = 100_000_000;
