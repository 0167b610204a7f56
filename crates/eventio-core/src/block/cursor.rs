// crates/eventio-core/src/block/cursor.rs

use crate::block::header::{decode_header, BlockHeader, HEADER_LEN};
use crate::codec::{
    read_count, read_count16, read_count32, read_fixed, read_scount, read_scount32, read_sfloat,
    read_string, take, ByteOrder, Fixed,
};
use crate::error::{EventIoError, Result};

#[derive(Clone, Debug)]
struct Frame {
    header: BlockHeader,
    start: usize,
    end: usize,
}

/// Read position inside one top-level payload plus the stack of
/// sub-blocks currently opened. Reads never cross the end of the
/// innermost open block.
pub struct ItemCursor<'a> {
    data: &'a [u8],
    order: ByteOrder,
    pos: usize,
    frames: Vec<Frame>,
}

impl<'a> ItemCursor<'a> {
    pub(crate) fn new(top: &BlockHeader, data: &'a [u8]) -> Self {
        let mut header = top.clone();
        header.payload_offset = 0;
        header.length = data.len();
        Self {
            data,
            order: top.byte_order,
            pos: 0,
            frames: vec![Frame {
                header,
                start: 0,
                end: data.len(),
            }],
        }
    }

    fn end(&self) -> usize {
        self.frames.last().map(|f| f.end).unwrap_or(0)
    }

    fn window(&self) -> &'a [u8] {
        let data: &'a [u8] = self.data;
        &data[..self.end()]
    }

    /// Header of the innermost open block.
    pub fn header(&self) -> Option<&BlockHeader> {
        self.frames.last().map(|f| &f.header)
    }

    pub fn byte_order(&self) -> ByteOrder {
        self.order
    }

    /// Offset inside the top-level payload.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Unread bytes in the innermost open block.
    pub fn remaining(&self) -> usize {
        self.end().saturating_sub(self.pos)
    }

    /// Number of sub-blocks currently open.
    pub fn depth(&self) -> usize {
        self.frames.len() - 1
    }

    pub fn get<T: Fixed>(&mut self) -> Result<T> {
        let w = self.window();
        read_fixed(w, &mut self.pos, self.order)
    }

    pub fn get_vec<T: Fixed>(&mut self, n: usize) -> Result<Vec<T>> {
        if n.saturating_mul(T::WIDTH) > self.remaining() {
            return Err(EventIoError::Format(format!(
                "array of {} x {} bytes exceeds the {} bytes left in block type {}",
                n,
                T::WIDTH,
                self.remaining(),
                self.header().map(|h| h.type_code).unwrap_or(0)
            )));
        }
        (0..n).map(|_| self.get::<T>()).collect()
    }

    pub fn get_count(&mut self) -> Result<u64> {
        let w = self.window();
        read_count(w, &mut self.pos)
    }

    pub fn get_count32(&mut self) -> Result<u32> {
        let w = self.window();
        read_count32(w, &mut self.pos)
    }

    pub fn get_count16(&mut self) -> Result<u16> {
        let w = self.window();
        read_count16(w, &mut self.pos)
    }

    pub fn get_scount(&mut self) -> Result<i64> {
        let w = self.window();
        read_scount(w, &mut self.pos)
    }

    pub fn get_scount32(&mut self) -> Result<i32> {
        let w = self.window();
        read_scount32(w, &mut self.pos)
    }

    pub fn get_sfloat(&mut self) -> Result<f32> {
        let w = self.window();
        read_sfloat(w, &mut self.pos, self.order)
    }

    pub fn get_string(&mut self) -> Result<String> {
        let w = self.window();
        read_string(w, &mut self.pos)
    }

    pub fn get_bytes(&mut self, n: usize) -> Result<&'a [u8]> {
        let w = self.window();
        take(w, &mut self.pos, n)
    }

    /// Payload bytes of a sub-block previously returned by this cursor.
    pub fn payload_of(&self, h: &BlockHeader) -> Result<&'a [u8]> {
        let data: &'a [u8] = self.data;
        data.get(h.payload_offset..h.payload_end()).ok_or_else(|| {
            EventIoError::Format(format!(
                "sub-block type {} lies outside the enclosing payload",
                h.type_code
            ))
        })
    }

    fn header_at(&self, at: usize, end: usize, depth: usize) -> Result<Option<BlockHeader>> {
        let left = end.saturating_sub(at);
        if left == 0 {
            return Ok(None);
        }
        if left < HEADER_LEN {
            return Err(EventIoError::Format(format!(
                "{} trailing bytes at offset {} are too short for a sub-block header",
                left, at
            )));
        }
        let mut i = at;
        let h = decode_header(&self.data[..end], &mut i, self.order, depth, 0)?;
        if h.payload_end() > end {
            return Err(EventIoError::Format(format!(
                "sub-block type {} (id {}) at offset {} claims {} bytes, beyond its parent ending at {}",
                h.type_code, h.ident, at, h.length, end
            )));
        }
        Ok(Some(h))
    }

    /// Header of the next sub-block without consuming it.
    pub fn peek_header(&self) -> Result<Option<BlockHeader>> {
        self.header_at(self.pos, self.end(), self.frames.len())
    }

    pub fn next_sub_type(&self) -> Result<Option<u32>> {
        Ok(self.peek_header()?.map(|h| h.type_code))
    }

    /// Descend into the next sub-block, which must be of `expected` type.
    pub fn open_sub_block(&mut self, expected: u32) -> Result<BlockHeader> {
        let parent = self.header().map(|h| h.type_code).unwrap_or(0);
        match self.peek_header()? {
            Some(h) if h.type_code == expected => {
                self.push(h.clone());
                Ok(h)
            }
            Some(h) => Err(EventIoError::Format(format!(
                "expected sub-block type {} in block type {} but found type {} (id {})",
                expected, parent, h.type_code, h.ident
            ))),
            None => Err(EventIoError::Format(format!(
                "expected sub-block type {} but block type {} has no more sub-blocks",
                expected, parent
            ))),
        }
    }

    /// Descend into whatever sub-block comes next.
    pub fn open_next(&mut self) -> Result<Option<BlockHeader>> {
        let h = self.peek_header()?;
        if let Some(h) = &h {
            self.push(h.clone());
        }
        Ok(h)
    }

    fn push(&mut self, h: BlockHeader) {
        self.pos = h.payload_offset;
        let (start, end) = (h.payload_offset, h.payload_end());
        self.frames.push(Frame { header: h, start, end });
    }

    /// Leave the innermost sub-block; the cursor lands right after it
    /// no matter how much of it was read.
    pub fn close_sub_block(&mut self, header: &BlockHeader) -> Result<()> {
        if self.frames.len() < 2 {
            return Err(EventIoError::Format(format!(
                "close_sub_block for type {} with no sub-block open",
                header.type_code
            )));
        }
        let top = &self.frames[self.frames.len() - 1];
        if top.header != *header {
            return Err(EventIoError::Format(format!(
                "close_sub_block for type {} but the innermost open sub-block is type {}",
                header.type_code, top.header.type_code
            )));
        }
        self.pos = top.end;
        self.frames.pop();
        Ok(())
    }

    fn frame_index(&self, header: &BlockHeader) -> Result<usize> {
        self.frames
            .iter()
            .rposition(|f| f.header == *header)
            .ok_or_else(|| {
                EventIoError::Format(format!(
                    "block type {} (id {}) is not open in this cursor",
                    header.type_code, header.ident
                ))
            })
    }

    /// Back to the first payload byte of `header`, closing anything
    /// opened inside it.
    pub fn rewind_to_block_start(&mut self, header: &BlockHeader) -> Result<()> {
        let idx = self.frame_index(header)?;
        self.frames.truncate(idx + 1);
        self.pos = self.frames[idx].start;
        Ok(())
    }

    /// Look through the whole payload of `parent` for a direct child of
    /// type `type_code`, independent of what was read before. On a hit the
    /// cursor sits on the child header, ready for `open_sub_block`. On a
    /// miss it sits at the start of `parent`'s payload.
    pub fn find_sub_block_by_type(
        &mut self,
        parent: &BlockHeader,
        type_code: u32,
    ) -> Result<Option<BlockHeader>> {
        self.rewind_to_block_start(parent)?;
        let (start, end, depth) = {
            let f = &self.frames[self.frames.len() - 1];
            (f.start, f.end, self.frames.len())
        };
        let mut at = start;
        while let Some(h) = self.header_at(at, end, depth)? {
            if h.type_code == type_code {
                self.pos = at;
                return Ok(Some(h));
            }
            at = h.payload_end();
        }
        Ok(None)
    }

    /// Step over the next sub-block without opening it.
    pub fn skip_sub_block(&mut self) -> Result<Option<BlockHeader>> {
        let h = self.peek_header()?;
        if let Some(h) = &h {
            self.pos = h.payload_end();
        }
        Ok(h)
    }
}
