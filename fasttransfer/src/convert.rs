//! Big-endian byte/integer conversion
//!
//! Indices travel as unsigned 16-bit values and data as signed 16-bit
//! values, both most significant byte first.

/// Most significant byte of a signed value
pub const fn most_significant_byte(value: i16) -> u8 {
    value.to_be_bytes()[0]
}

/// Least significant byte of a signed value
pub const fn least_significant_byte(value: i16) -> u8 {
    value.to_be_bytes()[1]
}

/// Most significant byte of an unsigned value
pub const fn most_significant_byte_unsigned(value: u16) -> u8 {
    value.to_be_bytes()[0]
}

/// Least significant byte of an unsigned value
pub const fn least_significant_byte_unsigned(value: u16) -> u8 {
    value.to_be_bytes()[1]
}

/// Combine two bytes into a signed value
pub const fn to_signed(msb: u8, lsb: u8) -> i16 {
    i16::from_be_bytes([msb, lsb])
}

/// Combine two bytes into an unsigned value
pub const fn to_unsigned(msb: u8, lsb: u8) -> u16 {
    u16::from_be_bytes([msb, lsb])
}
