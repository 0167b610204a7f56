// crates/eventio-core/src/records/mod.rs
//
// The subset of record layouts the merge needs to look into or rewrite.
// Everything else travels as opaque blocks.

pub mod event;
pub mod history;
pub mod mc;
pub mod run_header;
pub mod telescope;
pub mod types;

pub use event::{
    AdcData, CentralEvent, ComponentKind, FullEvent, TelEvent, TelTrigger, TrackEvent,
    TIME_NOT_MEASURED,
};
pub use history::{History, HistoryLine};
pub use mc::{McEvent, McPeSum, McShower, TelPeSum};
pub use run_header::RunHeader;
pub use telescope::TelescopeBlock;

use std::io::Write;

use crate::block::{Block, BlockHeader, BlockWriter, ItemCursor};
use crate::error::{EventIoError, Result};

/// Seconds and nanoseconds.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct HTime {
    pub seconds: i64,
    pub nanoseconds: i64,
}

impl HTime {
    pub(crate) fn read(c: &mut ItemCursor<'_>) -> Result<Self> {
        Ok(Self {
            seconds: c.get::<i32>()? as i64,
            nanoseconds: c.get::<i32>()? as i64,
        })
    }

    pub(crate) fn write<W: Write>(&self, w: &mut BlockWriter<W>) -> Result<()> {
        w.put(self.seconds as i32)?;
        w.put(self.nanoseconds as i32)
    }
}

/// Explicit copy contract for records that move between telescope slots:
/// every field is carried over, only the telescope identity changes.
pub trait WithTelescopeId: Sized {
    fn telescope_id(&self) -> i32;

    fn with_telescope_id(&self, tel_id: i32) -> Self;
}

pub(crate) fn check_block(block: &Block, type_code: u32, max_version: u16) -> Result<()> {
    check_header(&block.header, type_code, max_version)
}

pub(crate) fn check_header(h: &BlockHeader, type_code: u32, max_version: u16) -> Result<()> {
    if h.type_code != type_code {
        return Err(EventIoError::Format(format!(
            "expected block type {} but got type {} (id {})",
            type_code, h.type_code, h.ident
        )));
    }
    if h.version > max_version {
        return Err(EventIoError::Format(format!(
            "unsupported version {} of block type {} (id {}), at most {} understood",
            h.version, type_code, h.ident, max_version
        )));
    }
    Ok(())
}
