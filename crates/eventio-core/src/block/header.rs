// crates/eventio-core/src/block/header.rs

use crate::codec::{read_fixed, write_fixed, ByteOrder};
use crate::error::{EventIoError, Result};

/// Precedes every top-level block. Its byte pattern on disk tells the
/// reader which byte order the block was written in.
pub const SYNC_MARKER: u32 = 0xD41F_8A37;

/// Largest payload length that fits the 30-bit length field.
pub const MAX_SHORT_LENGTH: usize = (1 << 30) - 1;
/// Largest payload length with the 12-bit extension word.
pub const MAX_EXTENDED_LENGTH: usize = (1 << 42) - 1;
pub const MAX_VERSION: u16 = 0x0FFF;
pub const MAX_TYPE: u32 = 0xFFFF;

const USER_FLAG_BIT: u32 = 1 << 16;
pub(crate) const EXTENSION_BIT: u32 = 1 << 17;
const RESERVED_TYPE_BITS: u32 = 0b11 << 18;
const ONLY_SUB_BLOCKS_BIT: u32 = 1 << 30;
const RESERVED_LENGTH_BIT: u32 = 1 << 31;

/// Header size without the extension word.
pub const HEADER_LEN: usize = 12;

/// Decoded block header.
///
/// Wire layout (32-bit words, block byte order):
///   type word:   bits 0..16 type, bit 16 user flag, bit 17 extension present,
///                bits 20..32 version
///   ident word:  signed identifier (run, event or telescope number)
///   length word: bits 0..30 payload length, bit 30 only sub-blocks
///   [extension]: bits 0..12 are length bits 30..42
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockHeader {
    pub type_code: u32,
    pub version: u16,
    pub ident: i64,
    pub user_flag: bool,
    pub extended: bool,
    pub only_sub_blocks: bool,
    pub length: usize,
    pub byte_order: ByteOrder,
    /// 0 for top-level blocks.
    pub depth: usize,
    /// Offset of the payload inside the top-level payload (0 for top-level blocks).
    pub payload_offset: usize,
}

impl BlockHeader {
    pub fn header_len(&self) -> usize {
        if self.extended {
            HEADER_LEN + 4
        } else {
            HEADER_LEN
        }
    }

    /// End of the payload inside the top-level payload.
    pub fn payload_end(&self) -> usize {
        self.payload_offset + self.length
    }
}

pub(crate) fn check_fields(type_code: u32, version: u16, ident: i64) -> Result<()> {
    if type_code > MAX_TYPE {
        return Err(EventIoError::Format(format!(
            "block type {} does not fit 16 bits",
            type_code
        )));
    }
    if version > MAX_VERSION {
        return Err(EventIoError::Format(format!(
            "block version {} for type {} does not fit 12 bits",
            version, type_code
        )));
    }
    if i32::try_from(ident).is_err() {
        return Err(EventIoError::Format(format!(
            "identifier {} for type {} does not fit 32 bits",
            ident, type_code
        )));
    }
    Ok(())
}

pub(crate) fn type_word(type_code: u32, version: u16, user_flag: bool, extended: bool) -> u32 {
    let mut w = (type_code & MAX_TYPE) | ((version as u32 & 0x0FFF) << 20);
    if user_flag {
        w |= USER_FLAG_BIT;
    }
    if extended {
        w |= EXTENSION_BIT;
    }
    w
}

pub(crate) fn length_word(length: usize, only_sub_blocks: bool) -> u32 {
    let mut w = (length & MAX_SHORT_LENGTH) as u32;
    if only_sub_blocks {
        w |= ONLY_SUB_BLOCKS_BIT;
    }
    w
}

pub(crate) fn extension_word(length: usize) -> u32 {
    ((length >> 30) & 0x0FFF) as u32
}

/// Append the header words (no sync marker) for `h` in `h.byte_order`.
/// `h.extended` is recomputed from `h.length`.
pub(crate) fn encode_header(h: &BlockHeader, out: &mut Vec<u8>) -> Result<()> {
    check_fields(h.type_code, h.version, h.ident)?;
    if h.length > MAX_EXTENDED_LENGTH {
        return Err(EventIoError::Resource(format!(
            "payload of {} bytes exceeds the largest representable block",
            h.length
        )));
    }
    let extended = h.length > MAX_SHORT_LENGTH;
    let order = h.byte_order;
    write_fixed(out, type_word(h.type_code, h.version, h.user_flag, extended), order);
    write_fixed(out, h.ident as i32, order);
    write_fixed(out, length_word(h.length, h.only_sub_blocks), order);
    if extended {
        write_fixed(out, extension_word(h.length), order);
    }
    Ok(())
}

/// Parse the header at `*i`. On success `*i` points at the payload.
pub(crate) fn decode_header(
    bytes: &[u8],
    i: &mut usize,
    order: ByteOrder,
    depth: usize,
    base_offset: usize,
) -> Result<BlockHeader> {
    let at = *i;
    let tw: u32 = read_fixed(bytes, i, order)?;
    let ident: i32 = read_fixed(bytes, i, order)?;
    let lw: u32 = read_fixed(bytes, i, order)?;

    if tw & RESERVED_TYPE_BITS != 0 {
        return Err(EventIoError::Format(format!(
            "reserved bits set in type word 0x{:08x} at offset {}",
            tw, at
        )));
    }
    if lw & RESERVED_LENGTH_BIT != 0 {
        return Err(EventIoError::Format(format!(
            "reserved bit set in length word 0x{:08x} at offset {}",
            lw, at
        )));
    }

    let extended = tw & EXTENSION_BIT != 0;
    let mut length = (lw as usize) & MAX_SHORT_LENGTH;
    if extended {
        let ext: u32 = read_fixed(bytes, i, order)?;
        length |= ((ext & 0x0FFF) as usize) << 30;
    }

    Ok(BlockHeader {
        type_code: tw & MAX_TYPE,
        version: ((tw >> 20) & 0x0FFF) as u16,
        ident: ident as i64,
        user_flag: tw & USER_FLAG_BIT != 0,
        extended,
        only_sub_blocks: lw & ONLY_SUB_BLOCKS_BIT != 0,
        length,
        byte_order: order,
        depth,
        payload_offset: base_offset + *i,
    })
}

/// Byte order announced by a sync marker candidate, if it is one.
pub fn sync_order(word: [u8; 4]) -> Option<ByteOrder> {
    if u32::from_le_bytes(word) == SYNC_MARKER {
        Some(ByteOrder::Little)
    } else if u32::from_be_bytes(word) == SYNC_MARKER {
        Some(ByteOrder::Big)
    } else {
        None
    }
}
