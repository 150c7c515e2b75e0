//! SPI SRAM command framing.
//!
//! Every transaction starts with a one-byte opcode followed by a 24-bit
//! big-endian byte address. In 16-bit mode the same four bytes travel as two
//! words: `[opcode << 8 | addr[23:16], addr[15:0]]`.
//!
//! Samples are stored MSB first, which is what a 16-bit SPI frame puts on the
//! wire, so data written in word mode reads back unchanged in byte mode.

use crate::constants::COMMAND_HEADER_BYTES;

/// Write the mode register.
pub const WRITE_MODE_REGISTER: u8 = 0x01;
/// Sequential write starting at the given address.
pub const WRITE: u8 = 0x02;
/// Sequential read starting at the given address.
pub const READ: u8 = 0x03;

/// Highest byte address reachable with a 24-bit address.
pub const MAX_ADDRESS: u32 = 0x00FF_FFFF;

const ADDR_2_MASK: u32 = 0xFF_0000;
const ADDR_2_SHIFT: u32 = 16;
const ADDR_1_MASK: u32 = 0x00_FF00;
const ADDR_1_SHIFT: u32 = 8;
const ADDR_0_MASK: u32 = 0x00_00FF;

/// Opcode followed by the three address bytes.
#[inline]
pub fn command_header(opcode: u8, address: u32) -> [u8; COMMAND_HEADER_BYTES] {
    [
        opcode,
        ((address & ADDR_2_MASK) >> ADDR_2_SHIFT) as u8,
        ((address & ADDR_1_MASK) >> ADDR_1_SHIFT) as u8,
        (address & ADDR_0_MASK) as u8,
    ]
}

/// The same header packed into two 16-bit transfer units.
#[inline]
pub fn command_header16(opcode: u8, address: u32) -> [u16; 2] {
    [
        ((opcode as u16) << 8) | ((address & ADDR_2_MASK) >> ADDR_2_SHIFT) as u16,
        (address & 0xFFFF) as u16,
    ]
}

/// Encode samples into `dst` as big-endian byte pairs.
///
/// `dst` must hold at least `2 * src.len()` bytes.
pub fn encode_samples(src: &[u16], dst: &mut [u8]) {
    for (pair, &word) in dst.chunks_exact_mut(2).zip(src.iter()) {
        pair.copy_from_slice(&word.to_be_bytes());
    }
}

/// Decode big-endian byte pairs from `src` into `dst`.
pub fn decode_samples(src: &[u8], dst: &mut [u16]) {
    for (word, pair) in dst.iter_mut().zip(src.chunks_exact(2)) {
        *word = u16::from_be_bytes([pair[0], pair[1]]);
    }
}
