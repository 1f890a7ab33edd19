//! Dallas/Maxim checksums as described in Maxim Application Note 27.

use byteorder::{ByteOrder, LittleEndian};

const CRC8_POLY: u8 = 0x8C;
const CRC16_POLY: u16 = 0xC001;

/// Odd parity of every nibble value.
const ODD_PARITY: [u8; 16] = [0, 1, 1, 0, 1, 0, 0, 1, 1, 0, 0, 1, 0, 1, 1, 0];

/// Lookup table for the 1-Wire CRC-8, `CRC8_TABLE[i]` is the CRC of the single byte `i`.
pub const CRC8_TABLE: [u8; 256] = build_crc8_table();

const fn build_crc8_table() -> [u8; 256] {
    let mut table = [0_u8; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = i as u8;
        let mut bit = 0;
        while bit < 8 {
            crc = if crc & 0x01 != 0x00 {
                (crc >> 1) ^ CRC8_POLY
            } else {
                crc >> 1
            };
            bit += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
}

/// Continues a CRC-8 computation over `data`, shifting bit by bit.
pub fn crc8_bitwise(crc: u8, data: &[u8]) -> u8 {
    let mut crc = crc;
    for byte in data.iter() {
        let mut byte = *byte;
        for _ in 0..8 {
            let mix = (crc ^ byte) & 0x01;
            crc >>= 1;
            if mix != 0x00 {
                crc ^= CRC8_POLY;
            }
            byte >>= 1;
        }
    }
    crc
}

/// Continues a CRC-8 computation over `data` using [`CRC8_TABLE`].
pub fn crc8_lookup(crc: u8, data: &[u8]) -> u8 {
    data.iter()
        .fold(crc, |crc, byte| CRC8_TABLE[(crc ^ *byte) as usize])
}

/// Continues a CRC-8 computation over `data`.
///
/// Uses the lookup table with the `crc-table` feature, the bit loop otherwise.
/// Both give the same result.
pub fn compute_partial_crc8(crc: u8, data: &[u8]) -> u8 {
    if cfg!(feature = "crc-table") {
        crc8_lookup(crc, data)
    } else {
        crc8_bitwise(crc, data)
    }
}

/// Computes the 1-Wire CRC-8 of `data`, as found in ROM addresses and scratchpads.
pub fn crc8(data: &[u8]) -> u8 {
    compute_partial_crc8(0, data)
}

/// Computes the Dallas/Maxim CRC-16 of `data`, starting from `seed`.
///
/// Devices transmit this value bitwise inverted and least significant byte
/// first, use [`check_crc16`] to compare against received bytes.
pub fn crc16(data: &[u8], seed: u16) -> u16 {
    let mut crc = seed;
    for byte in data {
        let mut cdata = (u16::from(*byte) ^ crc) & 0xFF;
        crc >>= 8;

        if ODD_PARITY[(cdata & 0x0F) as usize] ^ ODD_PARITY[(cdata >> 4) as usize] != 0 {
            crc ^= CRC16_POLY;
        }

        cdata <<= 6;
        crc ^= cdata;
        cdata <<= 1;
        crc ^= cdata;
    }
    crc
}

/// Checks `data` against the two CRC-16 bytes as they were received from the wire.
///
/// `inverted_crc` must be the raw bytes in bus order, not a pre-assembled integer.
pub fn check_crc16(data: &[u8], seed: u16, inverted_crc: &[u8; 2]) -> bool {
    !crc16(data, seed) == LittleEndian::read_u16(inverted_crc)
}
