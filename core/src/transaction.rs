use std::borrow::Cow;

use bitcoin::consensus::{deserialize_partial, serialize, Decodable};
use bitcoin::hashes::Hash;
use bitcoin::{Amount, ScriptBuf, TxIn, Txid, VarInt, Witness, Wtxid};

use crate::constants::{SEGWIT_FLAG, SEGWIT_MARKER};
use crate::error::{BlockToolsError, Result};
use crate::hashes::calculate_double_sha256;

/// Prefix of an explicit output value, followed by the amount as a
/// big-endian `u64`.
const EXPLICIT_VALUE_PREFIX: u8 = 0x01;
/// Prefix of an output whose value was never set.
const NULL_VALUE_PREFIX: u8 = 0x00;
/// Prefixes of a confidential value commitment (parity of the point).
const COMMITMENT_PREFIXES: [u8; 2] = [0x08, 0x09];

/// A 33-byte Pedersen commitment hiding an output amount.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ValueCommitment(pub [u8; 33]);

/// Value of an output. `Null` is the "not yet set" state and is kept
/// distinct from an explicit zero.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum OutputValue {
    #[default]
    Null,
    Explicit(Amount),
    Confidential(ValueCommitment),
}

impl OutputValue {
    pub fn explicit(&self) -> Option<Amount> {
        match self {
            OutputValue::Explicit(amount) => Some(*amount),
            _ => None,
        }
    }

    fn encode_into(&self, out: &mut Vec<u8>) {
        match self {
            OutputValue::Null => out.push(NULL_VALUE_PREFIX),
            OutputValue::Explicit(amount) => {
                out.push(EXPLICIT_VALUE_PREFIX);
                out.extend_from_slice(&amount.to_sat().to_be_bytes());
            }
            OutputValue::Confidential(commitment) => out.extend_from_slice(&commitment.0),
        }
    }

    fn decode_from(reader: &mut Reader<'_>) -> Result<Self> {
        let prefix = reader.peek_byte()?;
        match prefix {
            NULL_VALUE_PREFIX => {
                reader.take(1)?;
                Ok(OutputValue::Null)
            }
            EXPLICIT_VALUE_PREFIX => {
                reader.take(1)?;
                let bytes: [u8; 8] = reader
                    .take(8)?
                    .try_into()
                    .map_err(|_| malformed("explicit value is not 8 bytes"))?;
                Ok(OutputValue::Explicit(Amount::from_sat(u64::from_be_bytes(
                    bytes,
                ))))
            }
            p if COMMITMENT_PREFIXES.contains(&p) => {
                let bytes: [u8; 33] = reader
                    .take(33)?
                    .try_into()
                    .map_err(|_| malformed("value commitment is not 33 bytes"))?;
                Ok(OutputValue::Confidential(ValueCommitment(bytes)))
            }
            other => Err(BlockToolsError::MalformedTransaction(Cow::Owned(format!(
                "unknown output value prefix {other:#04x}"
            )))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Default)]
pub struct TxOutput {
    pub value: OutputValue,
    pub script_pubkey: ScriptBuf,
}

impl TxOutput {
    pub fn new(value: Amount, script_pubkey: ScriptBuf) -> Self {
        Self {
            value: OutputValue::Explicit(value),
            script_pubkey,
        }
    }
}

/// A transaction as assembled into blocks. Inputs carry their own witness
/// stacks; outputs carry explicit or confidential values.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Default)]
pub struct Transaction {
    pub version: i32,
    pub inputs: Vec<TxIn>,
    pub outputs: Vec<TxOutput>,
    pub lock_time: u32,
}

impl Transaction {
    /// Returns the transaction id, in internal byte order. Displayed ids are
    /// the reverse of this.
    pub fn txid(&self) -> Txid {
        Txid::from_byte_array(calculate_double_sha256(&self.base_bytes()))
    }

    /// Returns the witness-transaction id. Equal to the txid (as bytes) when
    /// no input carries witness data.
    pub fn wtxid(&self) -> Wtxid {
        Wtxid::from_byte_array(calculate_double_sha256(&self.serialize()))
    }

    pub fn is_coinbase(&self) -> bool {
        self.inputs.len() == 1 && self.inputs[0].previous_output.is_null()
    }

    pub fn is_segwit(&self) -> bool {
        self.inputs.iter().any(|input| !input.witness.is_empty())
    }

    /// Serialization without marker, flag or witnesses; the txid preimage.
    pub fn base_bytes(&self) -> Vec<u8> {
        let mut tx_bytes_vec = serialize(&self.version);
        tx_bytes_vec.extend(serialize(&self.inputs));
        self.encode_outputs(&mut tx_bytes_vec);
        tx_bytes_vec.extend(serialize(&self.lock_time));
        tx_bytes_vec
    }

    /// Full wire serialization, including witnesses when any are present.
    pub fn serialize(&self) -> Vec<u8> {
        if !self.is_segwit() {
            return self.base_bytes();
        }
        let mut tx_bytes_vec = serialize(&self.version);
        tx_bytes_vec.push(SEGWIT_MARKER);
        tx_bytes_vec.push(SEGWIT_FLAG);
        tx_bytes_vec.extend(serialize(&self.inputs));
        self.encode_outputs(&mut tx_bytes_vec);
        for input in &self.inputs {
            tx_bytes_vec.extend(serialize(&input.witness));
        }
        tx_bytes_vec.extend(serialize(&self.lock_time));
        tx_bytes_vec
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.serialize())
    }

    pub fn base_size(&self) -> usize {
        self.base_bytes().len()
    }

    pub fn total_size(&self) -> usize {
        self.serialize().len()
    }

    /// Parses a transaction from its full wire encoding. Trailing bytes are
    /// rejected.
    pub fn deserialize(bytes: &[u8]) -> Result<Self> {
        let mut reader = Reader::new(bytes);
        let version: i32 = reader.read()?;

        let segwit = reader.remaining().starts_with(&[SEGWIT_MARKER, SEGWIT_FLAG]);
        if segwit {
            reader.take(2)?;
        }

        let mut inputs: Vec<TxIn> = reader.read()?;

        let output_count: VarInt = reader.read()?;
        let mut outputs = Vec::new();
        for _ in 0..output_count.0 {
            let value = OutputValue::decode_from(&mut reader)?;
            let script_pubkey: ScriptBuf = reader.read()?;
            outputs.push(TxOutput {
                value,
                script_pubkey,
            });
        }

        if segwit {
            for input in inputs.iter_mut() {
                input.witness = reader.read::<Witness>()?;
            }
            // Re-encoding would drop the marker and change the bytes.
            if inputs.iter().all(|input| input.witness.is_empty()) {
                return Err(malformed("segwit marker with no witness data"));
            }
        }

        let lock_time: u32 = reader.read()?;
        if !reader.remaining().is_empty() {
            return Err(BlockToolsError::MalformedTransaction(Cow::Owned(format!(
                "{} trailing bytes",
                reader.remaining().len()
            ))));
        }

        Ok(Self {
            version,
            inputs,
            outputs,
            lock_time,
        })
    }

    pub fn from_hex(tx_hex: &str) -> Result<Self> {
        let bytes = hex::decode(tx_hex.trim())
            .map_err(|e| BlockToolsError::MalformedTransaction(Cow::Owned(e.to_string())))?;
        Self::deserialize(&bytes)
    }

    fn encode_outputs(&self, out: &mut Vec<u8>) {
        out.extend(serialize(&VarInt::from(self.outputs.len())));
        for output in &self.outputs {
            output.value.encode_into(out);
            out.extend(serialize(&output.script_pubkey));
        }
    }
}

/// Sequential consensus decoder over a byte slice.
struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn remaining(&self) -> &'a [u8] {
        &self.data[self.pos..]
    }

    fn read<T: Decodable>(&mut self) -> Result<T> {
        let (value, consumed) = deserialize_partial::<T>(self.remaining())
            .map_err(|e| BlockToolsError::MalformedTransaction(Cow::Owned(e.to_string())))?;
        self.pos += consumed;
        Ok(value)
    }

    fn peek_byte(&self) -> Result<u8> {
        self.remaining()
            .first()
            .copied()
            .ok_or_else(|| malformed("unexpected end of data"))
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        let remaining = self.remaining();
        if remaining.len() < len {
            return Err(malformed("unexpected end of data"));
        }
        self.pos += len;
        Ok(&remaining[..len])
    }
}

fn malformed(reason: &'static str) -> BlockToolsError {
    BlockToolsError::MalformedTransaction(Cow::Borrowed(reason))
}
