// crates/eventio-core/src/records/telescope.rs

use crate::block::Block;
use crate::error::{EventIoError, Result};
use crate::records::types::{
    has_packed_tel_ident, repack_tel_ident, unpack_tel_ident, CAMERA_ORGANISATION,
    CAMERA_SETTINGS, CAMERA_SOFTWARE_SETTINGS, LASER_CALIBRATION, PIXEL_DISABLED, PIXEL_SETTINGS,
    POINTING_CORRECTION, TEL_MONITORING, TRACKING_SETTINGS,
};
use crate::records::WithTelescopeId;

/// Settings, monitoring or calibration block of a single telescope.
/// The payload is never decoded; the telescope id lives in the header.
#[derive(Clone, Debug, PartialEq)]
pub struct TelescopeBlock {
    block: Block,
}

impl TelescopeBlock {
    pub fn is_per_telescope(type_code: u32) -> bool {
        matches!(
            type_code,
            CAMERA_SETTINGS
                | CAMERA_ORGANISATION
                | PIXEL_SETTINGS
                | PIXEL_DISABLED
                | CAMERA_SOFTWARE_SETTINGS
                | POINTING_CORRECTION
                | TRACKING_SETTINGS
                | TEL_MONITORING
                | LASER_CALIBRATION
        )
    }

    pub fn from_block(block: Block) -> Result<Self> {
        if !Self::is_per_telescope(block.type_code()) {
            return Err(EventIoError::Format(format!(
                "block type {} (id {}) is not a per-telescope block",
                block.type_code(),
                block.ident()
            )));
        }
        Ok(Self { block })
    }

    pub fn type_code(&self) -> u32 {
        self.block.type_code()
    }

    pub fn block(&self) -> &Block {
        &self.block
    }

    pub fn into_block(self) -> Block {
        self.block
    }
}

impl WithTelescopeId for TelescopeBlock {
    fn telescope_id(&self) -> i32 {
        if has_packed_tel_ident(self.type_code()) {
            unpack_tel_ident(self.block.ident())
        } else {
            self.block.ident() as i32
        }
    }

    fn with_telescope_id(&self, tel_id: i32) -> Self {
        let ident = if has_packed_tel_ident(self.type_code()) {
            repack_tel_ident(self.block.ident(), tel_id)
        } else {
            tel_id as i64
        };
        Self {
            block: self.block.with_ident(ident),
        }
    }
}
