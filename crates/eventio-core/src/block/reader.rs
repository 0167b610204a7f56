// crates/eventio-core/src/block/reader.rs

use std::io::{self, Read};

use tracing::{trace, warn};

use crate::block::header::{decode_header, sync_order, BlockHeader, EXTENSION_BIT, HEADER_LEN};
use crate::block::{Block, BlockSource, IoLimits};
use crate::codec::read_fixed;
use crate::error::{EventIoError, Result};

/// Pulls top-level blocks from a byte stream.
pub struct BlockReader<R: Read> {
    src: R,
    limits: IoLimits,
    /// Stream offset of the next unread byte.
    offset: u64,
    skipped_bytes: u64,
    blocks_read: u64,
}

impl<R: Read> BlockReader<R> {
    pub fn new(src: R) -> Self {
        Self::with_limits(src, IoLimits::reader())
    }

    pub fn with_limits(src: R, limits: IoLimits) -> Self {
        Self {
            src,
            limits,
            offset: 0,
            skipped_bytes: 0,
            blocks_read: 0,
        }
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Garbage bytes skipped while looking for sync markers.
    pub fn skipped_bytes(&self) -> u64 {
        self.skipped_bytes
    }

    pub fn blocks_read(&self) -> u64 {
        self.blocks_read
    }

    /// Fill `buf` completely. `Ok(false)` on a clean end of stream before
    /// the first byte.
    fn fill(&mut self, buf: &mut [u8]) -> Result<bool> {
        let mut got = 0;
        while got < buf.len() {
            match self.src.read(&mut buf[got..]) {
                Ok(0) => break,
                Ok(n) => got += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        self.offset += got as u64;
        if got == 0 {
            return Ok(false);
        }
        if got < buf.len() {
            return Err(EventIoError::Format(format!(
                "truncated input: needed {} bytes at offset {}, got {}",
                buf.len(),
                self.offset - got as u64,
                got
            )));
        }
        Ok(true)
    }

    /// Advance to the next sync marker and decode the header behind it,
    /// leaving the stream at the payload. `Ok(None)` at end of stream.
    pub fn find_next_block(&mut self) -> Result<Option<BlockHeader>> {
        let mut window = [0u8; 4];
        if !self.fill(&mut window)? {
            return Ok(None);
        }
        let mut skipped = 0u64;
        let order = loop {
            if let Some(order) = sync_order(window) {
                break order;
            }
            let mut next = [0u8; 1];
            if !self.fill(&mut next)? {
                warn!(skipped = skipped + 4, "end of stream while looking for a sync marker");
                self.skipped_bytes += skipped + 4;
                return Ok(None);
            }
            window.copy_within(1.., 0);
            window[3] = next[0];
            skipped += 1;
        };
        if skipped > 0 {
            warn!(
                skipped,
                offset = self.offset - 4,
                "skipped bytes before sync marker"
            );
            self.skipped_bytes += skipped;
        }

        let mut raw = [0u8; HEADER_LEN + 4];
        if !self.fill(&mut raw[..HEADER_LEN])? {
            return Err(EventIoError::Format(format!(
                "stream ends after sync marker at offset {}",
                self.offset - 4
            )));
        }
        let mut at = 0;
        let tw: u32 = read_fixed(&raw, &mut at, order)?;
        let header_len = if tw & EXTENSION_BIT != 0 {
            if !self.fill(&mut raw[HEADER_LEN..])? {
                return Err(EventIoError::Format("stream ends inside block header".into()));
            }
            HEADER_LEN + 4
        } else {
            HEADER_LEN
        };

        let mut i = 0;
        let header = decode_header(&raw[..header_len], &mut i, order, 0, 0)?;
        let header = BlockHeader {
            payload_offset: 0,
            ..header
        };
        if header.length > self.limits.max_block_length {
            return Err(EventIoError::Resource(format!(
                "block type {} (id {}) declares {} payload bytes, limit is {}",
                header.type_code, header.ident, header.length, self.limits.max_block_length
            )));
        }
        trace!(
            type_code = header.type_code,
            ident = header.ident,
            length = header.length,
            "found block"
        );
        Ok(Some(header))
    }

    /// Read the payload announced by `header`.
    pub fn read_block(&mut self, header: BlockHeader) -> Result<Block> {
        let mut payload = Vec::new();
        payload.try_reserve_exact(header.length).map_err(|e| {
            EventIoError::Resource(format!(
                "cannot allocate {} bytes for block type {}: {}",
                header.length, header.type_code, e
            ))
        })?;
        payload.resize(header.length, 0);
        if header.length > 0 && !self.fill(&mut payload)? {
            return Err(EventIoError::Format(format!(
                "stream ends before payload of block type {} (id {})",
                header.type_code, header.ident
            )));
        }
        self.blocks_read += 1;
        Ok(Block::new(header, payload))
    }

    /// Discard the payload announced by `header`.
    pub fn skip_block(&mut self, header: &BlockHeader) -> Result<()> {
        let want = header.length as u64;
        let got = io::copy(&mut (&mut self.src).take(want), &mut io::sink())?;
        self.offset += got;
        if got < want {
            return Err(EventIoError::Format(format!(
                "stream ends inside skipped block type {} (id {})",
                header.type_code, header.ident
            )));
        }
        Ok(())
    }

    pub fn next_block(&mut self) -> Result<Option<Block>> {
        match self.find_next_block()? {
            Some(h) => self.read_block(h).map(Some),
            None => Ok(None),
        }
    }

    pub fn into_inner(self) -> R {
        self.src
    }
}

impl<R: Read> BlockSource for BlockReader<R> {
    fn next_block(&mut self) -> Result<Option<Block>> {
        BlockReader::next_block(self)
    }
}
