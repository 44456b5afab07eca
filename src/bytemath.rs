use crate::error::{Error, Result};

/// True iff `value` fits in a machine byte.
///
/// Machine state is all `u8`, so range checks only matter where wider
/// integers cross into it: assembler literals and the public setters on
/// [`Machine`](crate::machine::Machine).
pub fn is_byte_value(value: i64) -> bool {
    (0..=255).contains(&value)
}

/// Narrow `value` to a byte, or fail with [`Error::OutOfRange`].
pub fn require_byte_value(value: i64) -> Result<u8> {
    if is_byte_value(value) {
        Ok(value as u8)
    } else {
        Err(Error::OutOfRange(value))
    }
}

/// Magnitude reading of a byte: values below 128 are returned as-is, values
/// from 128 up map to `256 - value`.
///
/// This yields the absolute value of the two's-complement number for every
/// byte, so it is never negative. Sign tests belong to [`is_negative`].
pub fn to_signed(value: u8) -> i16 {
    if value < 128 {
        value as i16
    } else {
        256 - value as i16
    }
}

/// Bit 7 set, i.e. negative under two's complement.
pub fn is_negative(value: u8) -> bool {
    (value as i8) < 0
}

pub fn shift_left(value: u8) -> u8 {
    value << 1
}

pub fn shift_right(value: u8) -> u8 {
    value >> 1
}

/// Circular left rotation within the 8-bit word. Carry is not involved.
pub fn rotate_left(value: u8) -> u8 {
    (value << 1) | (value >> 7)
}

/// Circular right rotation within the 8-bit word. Carry is not involved.
pub fn rotate_right(value: u8) -> u8 {
    (value >> 1) | (value << 7)
}
