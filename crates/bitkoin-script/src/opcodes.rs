//! Opcode constants used by the standard templates.

/// Push an empty byte vector.
pub const OP_0: u8 = 0x00;
/// Alias of `OP_0`.
pub const OP_FALSE: u8 = 0x00;
/// Smallest direct push (one byte follows).
pub const OP_DATA_1: u8 = 0x01;
/// Direct push of 20 bytes (a hash160).
pub const OP_DATA_20: u8 = 0x14;
/// Direct push of 32 bytes (a sha256).
pub const OP_DATA_32: u8 = 0x20;
/// Direct push of 33 bytes (a compressed public key).
pub const OP_DATA_33: u8 = 0x21;
/// Direct push of 65 bytes (an uncompressed public key).
pub const OP_DATA_65: u8 = 0x41;
/// Largest direct push.
pub const OP_DATA_75: u8 = 0x4b;
/// Push with a one-byte length prefix.
pub const OP_PUSHDATA1: u8 = 0x4c;
/// Push with a two-byte little-endian length prefix.
pub const OP_PUSHDATA2: u8 = 0x4d;
/// Push with a four-byte little-endian length prefix.
pub const OP_PUSHDATA4: u8 = 0x4e;
/// Push the number -1.
pub const OP_1NEGATE: u8 = 0x4f;
/// Push the number 1.
pub const OP_1: u8 = 0x51;
/// Alias of `OP_1`.
pub const OP_TRUE: u8 = 0x51;
/// Push the number 16.
pub const OP_16: u8 = 0x60;

pub const OP_RETURN: u8 = 0x6a;
pub const OP_DUP: u8 = 0x76;
pub const OP_EQUAL: u8 = 0x87;
pub const OP_EQUALVERIFY: u8 = 0x88;
pub const OP_HASH160: u8 = 0xa9;
/// Marks the start of the script code covered by signatures.
pub const OP_CODESEPARATOR: u8 = 0xab;
pub const OP_CHECKSIG: u8 = 0xac;
pub const OP_CHECKMULTISIG: u8 = 0xae;

/// Whether `op` is one of `OP_1` through `OP_16`.
pub fn is_small_int_op(op: u8) -> bool {
    (OP_1..=OP_16).contains(&op)
}

/// The number pushed by a small-integer opcode, or `None` for any other
/// opcode. `OP_0` maps to zero.
pub fn small_int_value(op: u8) -> Option<usize> {
    match op {
        OP_0 => Some(0),
        OP_1..=OP_16 => Some((op - OP_1 + 1) as usize),
        _ => None,
    }
}

/// The opcode pushing the small integer `n`, for `n` in `0..=16`.
pub fn small_int_op(n: usize) -> Option<u8> {
    match n {
        0 => Some(OP_0),
        1..=16 => Some(OP_1 + (n as u8) - 1),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_small_ints() {
        assert_eq!(small_int_value(OP_0), Some(0));
        assert_eq!(small_int_value(OP_1), Some(1));
        assert_eq!(small_int_value(OP_16), Some(16));
        assert_eq!(small_int_value(OP_1NEGATE), None);
        assert_eq!(small_int_value(OP_DUP), None);

        for n in 0..=16 {
            assert_eq!(small_int_value(small_int_op(n).unwrap()), Some(n));
        }
        assert_eq!(small_int_op(17), None);
        assert!(!is_small_int_op(OP_0));
        assert!(is_small_int_op(0x52));
    }
}
