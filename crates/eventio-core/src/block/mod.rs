// crates/eventio-core/src/block/mod.rs
//
// Nested block container: a top-level block is a sync marker followed by a
// header and a payload. A payload may itself be a sequence of sub-blocks,
// which carry a header but no sync marker.

pub mod cursor;
pub mod header;
pub mod reader;
pub mod writer;

pub use cursor::ItemCursor;
pub use header::{BlockHeader, HEADER_LEN, MAX_SHORT_LENGTH, SYNC_MARKER};
pub use reader::BlockReader;
pub use writer::{BlockWriter, ItemHandle};

use crate::codec::ByteOrder;
use crate::error::Result;

/// Buffer policy for one reader or writer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IoLimits {
    pub initial_capacity: usize,
    /// Largest payload accepted (reader) or produced (writer).
    pub max_block_length: usize,
}

impl IoLimits {
    pub const fn reader() -> Self {
        Self {
            initial_capacity: 1 << 16,
            max_block_length: 400_000_000,
        }
    }

    pub const fn writer() -> Self {
        Self {
            initial_capacity: 1 << 16,
            max_block_length: 800_000_000,
        }
    }
}

impl Default for IoLimits {
    fn default() -> Self {
        Self::reader()
    }
}

/// One decoded top-level block: its header and the raw payload bytes.
#[derive(Clone, Debug, PartialEq)]
pub struct Block {
    pub header: BlockHeader,
    payload: Vec<u8>,
}

impl Block {
    pub fn new(header: BlockHeader, payload: Vec<u8>) -> Self {
        let mut header = header;
        header.length = payload.len();
        header.depth = 0;
        header.payload_offset = 0;
        Self { header, payload }
    }

    pub fn type_code(&self) -> u32 {
        self.header.type_code
    }

    pub fn ident(&self) -> i64 {
        self.header.ident
    }

    pub fn version(&self) -> u16 {
        self.header.version
    }

    pub fn byte_order(&self) -> ByteOrder {
        self.header.byte_order
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Same block, different identifier. Everything else is copied verbatim.
    pub fn with_ident(&self, ident: i64) -> Block {
        let mut b = self.clone();
        b.header.ident = ident;
        b
    }

    /// Read cursor over the payload, positioned at its start.
    pub fn cursor(&self) -> ItemCursor<'_> {
        ItemCursor::new(&self.header, &self.payload)
    }
}

/// Anything that yields top-level blocks in stream order.
pub trait BlockSource {
    /// `Ok(None)` at end of stream.
    fn next_block(&mut self) -> Result<Option<Block>>;
}

impl<S: BlockSource + ?Sized> BlockSource for Box<S> {
    fn next_block(&mut self) -> Result<Option<Block>> {
        (**self).next_block()
    }
}

/// In-memory source, mostly for tests and replay.
impl BlockSource for std::vec::IntoIter<Block> {
    fn next_block(&mut self) -> Result<Option<Block>> {
        Ok(self.next())
    }
}
