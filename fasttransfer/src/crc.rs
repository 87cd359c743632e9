//! CRC-8 over a packet's data segment
//!
//! Bitwise, LSB first, polynomial 0x8C (the reflected form of 0x31), initial
//! value 0. The same function checks inbound packets and stamps outbound
//! ones.

/// Reflected generator polynomial
pub const POLYNOMIAL: u8 = 0x8C;

/// Compute the CRC of `data`
pub fn crc8(data: &[u8]) -> u8 {
    let mut crc = 0u8;
    for &byte in data {
        crc = update(crc, byte);
    }
    crc
}

/// Fold one byte into a running CRC
pub const fn update(mut crc: u8, mut data: u8) -> u8 {
    let mut bit = 0;
    while bit < 8 {
        let sum = (crc ^ data) & 0x01;
        crc >>= 1;
        if sum != 0 {
            crc ^= POLYNOMIAL;
        }
        data >>= 1;
        bit += 1;
    }
    crc
}
