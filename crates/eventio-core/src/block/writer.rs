// crates/eventio-core/src/block/writer.rs

use std::io::Write;

use tracing::trace;

use crate::block::header::{
    check_fields, encode_header, extension_word, length_word, type_word, BlockHeader,
    MAX_EXTENDED_LENGTH, MAX_SHORT_LENGTH, SYNC_MARKER,
};
use crate::block::{Block, IoLimits};
use crate::codec::{write_count, write_fixed, write_scount, write_sfloat, write_string, ByteOrder, Fixed};
use crate::error::{EventIoError, Result};

/// Proof that a block was opened. Must be handed back to `end_block`
/// in strict reverse order of opening.
#[derive(Debug)]
#[must_use = "an open block must be closed with end_block"]
pub struct ItemHandle {
    depth: usize,
    type_code: u32,
    header_at: usize,
}

impl ItemHandle {
    pub fn type_code(&self) -> u32 {
        self.type_code
    }
}

#[derive(Debug)]
struct OpenItem {
    type_code: u32,
    version: u16,
    user_flag: bool,
    only_sub_blocks: bool,
    header_at: usize,
    payload_at: usize,
}

/// Builds blocks in memory and hands each finished top-level block to the
/// sink. Length words are backpatched when a block is closed.
pub struct BlockWriter<W: Write> {
    sink: W,
    order: ByteOrder,
    limits: IoLimits,
    buf: Vec<u8>,
    stack: Vec<OpenItem>,
    blocks_written: u64,
}

impl<W: Write> BlockWriter<W> {
    pub fn new(sink: W) -> Self {
        Self::with_limits(sink, IoLimits::writer())
    }

    pub fn with_limits(sink: W, limits: IoLimits) -> Self {
        Self {
            sink,
            order: ByteOrder::native(),
            limits,
            buf: Vec::with_capacity(limits.initial_capacity),
            stack: Vec::new(),
            blocks_written: 0,
        }
    }

    /// Byte order used for blocks built by this writer.
    pub fn with_byte_order(mut self, order: ByteOrder) -> Self {
        self.order = order;
        self
    }

    /// Switch the byte order for blocks begun from now on. Only allowed
    /// between top-level blocks.
    pub fn set_byte_order(&mut self, order: ByteOrder) -> Result<()> {
        if let Some(top) = self.stack.last() {
            return Err(EventIoError::Format(format!(
                "cannot change byte order while block type {} is open",
                top.type_code
            )));
        }
        self.order = order;
        Ok(())
    }

    pub fn byte_order(&self) -> ByteOrder {
        self.order
    }

    pub fn blocks_written(&self) -> u64 {
        self.blocks_written
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    pub fn begin_block(&mut self, type_code: u32, version: u16, ident: i64) -> Result<ItemHandle> {
        self.open(type_code, version, ident, false, false)
    }

    /// Block whose payload consists of sub-blocks only.
    pub fn begin_container(&mut self, type_code: u32, version: u16, ident: i64) -> Result<ItemHandle> {
        self.open(type_code, version, ident, false, true)
    }

    pub fn begin_flagged(
        &mut self,
        type_code: u32,
        version: u16,
        ident: i64,
        user_flag: bool,
    ) -> Result<ItemHandle> {
        self.open(type_code, version, ident, user_flag, false)
    }

    fn open(
        &mut self,
        type_code: u32,
        version: u16,
        ident: i64,
        user_flag: bool,
        only_sub_blocks: bool,
    ) -> Result<ItemHandle> {
        check_fields(type_code, version, ident)?;
        if self.stack.is_empty() {
            self.buf.clear();
            write_fixed(&mut self.buf, SYNC_MARKER, self.order);
        }
        let header_at = self.buf.len();
        write_fixed(&mut self.buf, type_word(type_code, version, user_flag, false), self.order);
        write_fixed(&mut self.buf, ident as i32, self.order);
        write_fixed(&mut self.buf, 0u32, self.order);
        let payload_at = self.buf.len();
        let depth = self.stack.len();
        self.stack.push(OpenItem {
            type_code,
            version,
            user_flag,
            only_sub_blocks,
            header_at,
            payload_at,
        });
        Ok(ItemHandle {
            depth,
            type_code,
            header_at,
        })
    }

    /// Close the innermost open block. Writes the block out once the
    /// outermost block is closed.
    pub fn end_block(&mut self, handle: ItemHandle) -> Result<()> {
        let top = match self.stack.last() {
            Some(top) => top,
            None => {
                return Err(EventIoError::Format(format!(
                    "end_block for type {} but no block is open",
                    handle.type_code
                )))
            }
        };
        if handle.depth + 1 != self.stack.len() || handle.header_at != top.header_at {
            return Err(EventIoError::Format(format!(
                "end_block for type {} at depth {} out of order: innermost open block is type {} at depth {}",
                handle.type_code,
                handle.depth,
                top.type_code,
                self.stack.len() - 1
            )));
        }
        let item = match self.stack.pop() {
            Some(item) => item,
            None => return Err(EventIoError::Internal("writer stack underflow".into())),
        };

        let mut length = self.buf.len() - item.payload_at;
        if length > MAX_EXTENDED_LENGTH {
            return Err(EventIoError::Resource(format!(
                "block type {} has {} payload bytes, more than any header can describe",
                item.type_code, length
            )));
        }
        let extended = length > MAX_SHORT_LENGTH;
        if extended {
            let mut ext = Vec::with_capacity(4);
            write_fixed(&mut ext, extension_word(length), self.order);
            self.buf.splice(item.payload_at..item.payload_at, ext);
            length = self.buf.len() - item.payload_at - 4;
        }
        let tw = type_word(item.type_code, item.version, item.user_flag, extended);
        let lw = length_word(length, item.only_sub_blocks);
        self.patch_u32(item.header_at, tw);
        self.patch_u32(item.header_at + 8, lw);
        trace!(
            type_code = item.type_code,
            length,
            depth = self.stack.len(),
            "closed block"
        );

        if self.stack.is_empty() {
            self.sink.write_all(&self.buf)?;
            self.buf.clear();
            self.blocks_written += 1;
        }
        Ok(())
    }

    fn patch_u32(&mut self, at: usize, v: u32) {
        let bytes = match self.order {
            ByteOrder::Little => v.to_le_bytes(),
            ByteOrder::Big => v.to_be_bytes(),
        };
        self.buf[at..at + 4].copy_from_slice(&bytes);
    }

    fn require_open(&self, what: &str) -> Result<()> {
        if self.stack.is_empty() {
            return Err(EventIoError::Format(format!("{} outside of any open block", what)));
        }
        Ok(())
    }

    fn check_room(&self, extra: usize) -> Result<()> {
        let used = self.buf.len().saturating_sub(4 + super::HEADER_LEN);
        if used + extra > self.limits.max_block_length {
            return Err(EventIoError::Resource(format!(
                "output block would grow to {} bytes, limit is {}",
                used + extra,
                self.limits.max_block_length
            )));
        }
        Ok(())
    }

    pub fn put<T: Fixed>(&mut self, v: T) -> Result<()> {
        self.require_open("fixed-width value")?;
        self.check_room(T::WIDTH)?;
        write_fixed(&mut self.buf, v, self.order);
        Ok(())
    }

    pub fn put_slice<T: Fixed>(&mut self, vs: &[T]) -> Result<()> {
        self.require_open("fixed-width array")?;
        self.check_room(T::WIDTH * vs.len())?;
        for &v in vs {
            write_fixed(&mut self.buf, v, self.order);
        }
        Ok(())
    }

    pub fn put_count(&mut self, v: u64) -> Result<()> {
        self.require_open("count")?;
        self.check_room(9)?;
        write_count(&mut self.buf, v);
        Ok(())
    }

    pub fn put_scount(&mut self, v: i64) -> Result<()> {
        self.require_open("signed count")?;
        self.check_room(9)?;
        write_scount(&mut self.buf, v);
        Ok(())
    }

    pub fn put_sfloat(&mut self, v: f32) -> Result<()> {
        self.require_open("short float")?;
        self.check_room(2)?;
        write_sfloat(&mut self.buf, v, self.order);
        Ok(())
    }

    pub fn put_string(&mut self, s: &str) -> Result<()> {
        self.require_open("string")?;
        self.check_room(9 + s.len())?;
        write_string(&mut self.buf, s);
        Ok(())
    }

    pub fn put_bytes(&mut self, raw: &[u8]) -> Result<()> {
        self.require_open("raw bytes")?;
        self.check_room(raw.len())?;
        self.buf.extend_from_slice(raw);
        Ok(())
    }

    /// Embed an already framed block as a sub-block of the open block.
    /// The raw payload is copied, so its byte order must match ours.
    pub fn put_sub_block(&mut self, header: &BlockHeader, payload: &[u8]) -> Result<()> {
        self.require_open("embedded sub-block")?;
        if header.byte_order != self.order {
            return Err(EventIoError::Format(format!(
                "cannot embed {:?} sub-block type {} in a {:?} block",
                header.byte_order, header.type_code, self.order
            )));
        }
        self.check_room(16 + payload.len())?;
        let mut h = header.clone();
        h.length = payload.len();
        encode_header(&h, &mut self.buf)?;
        self.buf.extend_from_slice(payload);
        Ok(())
    }

    /// Write a complete top-level block as-is, in its own byte order.
    pub fn write_block(&mut self, block: &Block) -> Result<()> {
        if !self.stack.is_empty() {
            return Err(EventIoError::Format(format!(
                "cannot pass through block type {} while {} block(s) are open",
                block.type_code(),
                self.stack.len()
            )));
        }
        if block.payload().len() > self.limits.max_block_length {
            return Err(EventIoError::Resource(format!(
                "block type {} has {} payload bytes, limit is {}",
                block.type_code(),
                block.payload().len(),
                self.limits.max_block_length
            )));
        }
        let mut head = Vec::with_capacity(20);
        write_fixed(&mut head, SYNC_MARKER, block.byte_order());
        let mut h = block.header.clone();
        h.length = block.payload().len();
        encode_header(&h, &mut head)?;
        self.sink.write_all(&head)?;
        self.sink.write_all(block.payload())?;
        self.blocks_written += 1;
        trace!(type_code = block.type_code(), ident = block.ident(), "passed block through");
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.sink.flush()?;
        Ok(())
    }

    /// Fails if a block is still open.
    pub fn into_inner(mut self) -> Result<W> {
        if let Some(top) = self.stack.last() {
            return Err(EventIoError::Format(format!(
                "writer closed with block type {} still open",
                top.type_code
            )));
        }
        self.sink.flush()?;
        Ok(self.sink)
    }
}
