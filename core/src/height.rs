//! BIP-34 block height encoding for the coinbase unlocking script.
//!
//! Heights up to 16 use the small-integer opcodes. A lone small-integer
//! opcode would leave the coinbase scriptSig one byte long, below the
//! two-byte consensus minimum, so a dummy `OP_1` follows it. Larger heights
//! are a single push of the minimally encoded script number.

use std::borrow::Cow;

use bitcoin::opcodes::all::{OP_PUSHNUM_1, OP_PUSHNUM_16};
use bitcoin::script::{Builder, Instruction};
use bitcoin::{Script, ScriptBuf};

use crate::constants::{MAX_HEIGHT_PUSH_LEN, SMALL_INT_HEIGHT_LIMIT};
use crate::error::{BlockToolsError, Result};

pub fn encode_height(height: u32) -> ScriptBuf {
    let builder = Builder::new().push_int(i64::from(height));
    if height <= SMALL_INT_HEIGHT_LIMIT {
        builder.push_opcode(OP_PUSHNUM_1).into_script()
    } else {
        builder.into_script()
    }
}

/// Reads the height back from the first element of a coinbase scriptSig.
pub fn decode_height(script_sig: &Script) -> Result<u32> {
    let first = script_sig
        .instructions()
        .next()
        .ok_or(BlockToolsError::MalformedHeightEncoding(Cow::Borrowed(
            "empty coinbase script",
        )))?
        .map_err(|e| BlockToolsError::MalformedHeightEncoding(Cow::Owned(e.to_string())))?;

    match first {
        Instruction::Op(op) => {
            let byte = op.to_u8();
            if (OP_PUSHNUM_1.to_u8()..=OP_PUSHNUM_16.to_u8()).contains(&byte) {
                Ok(u32::from(byte - OP_PUSHNUM_1.to_u8() + 1))
            } else {
                Err(BlockToolsError::MalformedHeightEncoding(Cow::Owned(format!(
                    "first element is {op}, not a height push"
                ))))
            }
        }
        // OP_0 decodes as an empty push, which reads back as zero.
        Instruction::PushBytes(bytes) => read_height_push(bytes.as_bytes()),
    }
}

/// Minimal, non-negative script number of up to five bytes. Heights above
/// `i32::MAX` need the fifth byte, which the interpreter's four-byte integer
/// reader refuses.
fn read_height_push(bytes: &[u8]) -> Result<u32> {
    let Some((&last, rest)) = bytes.split_last() else {
        return Ok(0);
    };
    if bytes.len() > MAX_HEIGHT_PUSH_LEN {
        return Err(BlockToolsError::MalformedHeightEncoding(Cow::Owned(format!(
            "{}-byte height push",
            bytes.len()
        ))));
    }
    if last & 0x80 != 0 {
        return Err(BlockToolsError::MalformedHeightEncoding(Cow::Borrowed(
            "negative height",
        )));
    }
    // A zero top byte is only allowed to keep the previous byte's high bit
    // from reading as a sign.
    if last == 0 && rest.last().map_or(true, |prev| prev & 0x80 == 0) {
        return Err(BlockToolsError::MalformedHeightEncoding(Cow::Borrowed(
            "non-minimal height encoding",
        )));
    }

    let value = bytes
        .iter()
        .rev()
        .fold(0u64, |acc, byte| (acc << 8) | u64::from(*byte));
    u32::try_from(value).map_err(|_| {
        BlockToolsError::MalformedHeightEncoding(Cow::Owned(format!(
            "height {value} out of range"
        )))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn element_count(script: &Script) -> usize {
        script.instructions().count()
    }

    #[test]
    fn test_small_heights_use_opcode_and_dummy() {
        assert_eq!(encode_height(0).as_bytes(), &[0x00, 0x51]);
        assert_eq!(encode_height(1).as_bytes(), &[0x51, 0x51]);
        assert_eq!(encode_height(16).as_bytes(), &[0x60, 0x51]);
        for h in 0..=16 {
            assert_eq!(element_count(&encode_height(h)), 2, "height {h}");
        }
    }

    #[test]
    fn test_large_heights_are_minimal_pushes() {
        assert_eq!(encode_height(17).as_bytes(), &[0x01, 0x11]);
        assert_eq!(encode_height(20).as_bytes(), &[0x01, 0x14]);
        // 0x80 needs a padding byte to stay positive.
        assert_eq!(encode_height(128).as_bytes(), &[0x02, 0x80, 0x00]);
        assert_eq!(encode_height(256).as_bytes(), &[0x02, 0x00, 0x01]);
        assert_eq!(
            encode_height(10_000_000).as_bytes(),
            &[0x04, 0x80, 0x96, 0x98, 0x00]
        );
        for h in [17, 255, 65_536, 10_000_000] {
            assert_eq!(element_count(&encode_height(h)), 1, "height {h}");
        }
    }

    #[test]
    fn test_decode_rejects_non_height_scripts() {
        let cases: [&[u8]; 4] = [
            &[],
            // OP_CHECKSIG
            &[0xac],
            // non-minimal encoding of 20
            &[0x02, 0x14, 0x00],
            // -1
            &[0x01, 0x81],
        ];
        for bytes in cases {
            let err = decode_height(Script::from_bytes(bytes)).unwrap_err();
            assert!(
                matches!(err, BlockToolsError::MalformedHeightEncoding(_)),
                "{bytes:?} gave {err:?}"
            );
        }
    }

    #[test]
    fn test_heights_past_four_byte_numbers() {
        let boundary = i32::MAX as u32 + 1;
        assert_eq!(
            encode_height(boundary).as_bytes(),
            &[0x05, 0x00, 0x00, 0x00, 0x80, 0x00]
        );
        for h in [i32::MAX as u32, boundary, u32::MAX] {
            assert_eq!(decode_height(&encode_height(h)).unwrap(), h, "height {h}");
        }

        // Five bytes that do not fit a u32, and six-byte pushes.
        for bytes in [
            &[0x05, 0x00, 0x00, 0x00, 0x00, 0x01][..],
            &[0x06, 0x01, 0x00, 0x00, 0x00, 0x80, 0x00][..],
        ] {
            assert!(matches!(
                decode_height(Script::from_bytes(bytes)),
                Err(BlockToolsError::MalformedHeightEncoding(_))
            ));
        }
    }

    #[test]
    fn test_decode_ignores_trailing_elements() {
        // Height push followed by extranonce data.
        let script = ScriptBuf::from_bytes(vec![0x02, 0x2c, 0x01, 0x04, 0xde, 0xad, 0xbe, 0xef]);
        assert_eq!(decode_height(&script).unwrap(), 300);
    }

    proptest! {
        #[test]
        fn prop_height_round_trip(h in 0u32..=10_000_000) {
            prop_assert_eq!(decode_height(&encode_height(h)).unwrap(), h);
        }

        #[test]
        fn prop_height_round_trip_full_range(h in any::<u32>()) {
            prop_assert_eq!(decode_height(&encode_height(h)).unwrap(), h);
        }

        #[test]
        fn prop_element_count(h in 0u32..=10_000_000) {
            let expected = if h <= SMALL_INT_HEIGHT_LIMIT { 2 } else { 1 };
            prop_assert_eq!(element_count(&encode_height(h)), expected);
        }
    }
}
