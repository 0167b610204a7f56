pub mod error;

pub mod codec;
pub mod block;
pub mod records;
pub mod trgmask;
pub mod remap;
pub mod merge;

pub use crate::error::{EventIoError, Result};
pub use crate::block::{Block, BlockHeader, BlockReader, BlockSource, BlockWriter, IoLimits};
pub use crate::codec::ByteOrder;
pub use crate::merge::{LostRecord, MergeOptions, MergeSummary, StreamMerger};
pub use crate::records::History;
pub use crate::remap::{Source, TelescopeMap};
pub use crate::trgmask::{TriggerMaskIndex, TriggerMaskSet};
