// crates/eventio-core/src/records/types.rs
//
// Block type numbers the merge branches on.

pub const HISTORY: u32 = 70;
pub const HISTORY_COMMAND_LINE: u32 = 71;
pub const HISTORY_CONFIG: u32 = 72;
pub const HISTOGRAMS: u32 = 100;

pub const MC_PHOTONS: u32 = 1204;
pub const MC_INPUT_CONFIG: u32 = 1212;

pub const RUN_HEADER: u32 = 2000;
pub const MC_RUN_HEADER: u32 = 2001;
pub const CAMERA_SETTINGS: u32 = 2002;
pub const CAMERA_ORGANISATION: u32 = 2003;
pub const PIXEL_SETTINGS: u32 = 2004;
pub const PIXEL_DISABLED: u32 = 2005;
pub const CAMERA_SOFTWARE_SETTINGS: u32 = 2006;
pub const POINTING_CORRECTION: u32 = 2007;
pub const TRACKING_SETTINGS: u32 = 2008;
pub const CENTRAL_EVENT: u32 = 2009;
pub const EVENT: u32 = 2010;
pub const TEL_EVENT_HEADER: u32 = 2011;
pub const ADC_SUMS: u32 = 2012;
pub const ADC_SAMPLES: u32 = 2013;
pub const PIXEL_TIMING: u32 = 2016;
pub const MC_SHOWER: u32 = 2020;
pub const MC_EVENT: u32 = 2021;
pub const TEL_MONITORING: u32 = 2022;
pub const LASER_CALIBRATION: u32 = 2023;
pub const RUN_STATISTICS: u32 = 2024;
pub const MC_RUN_STATISTICS: u32 = 2025;
pub const MC_PE_SUM: u32 = 2026;
pub const PIXEL_LIST: u32 = 2027;
pub const CALIBRATION_EVENT: u32 = 2028;
pub const TRIGGER_MASKS: u32 = 2090;

pub const TRACK_EVENT_BASE: u32 = 2100;
pub const TEL_EVENT_BASE: u32 = 2200;

/// Highest telescope id that can be folded into a block type.
pub const MAX_TELESCOPE_ID: i32 = 31_999;

/// Fold a telescope id into the offset added to a per-telescope type base:
/// ids below 100 map to themselves, higher hundreds go to thousands.
pub fn tel_type_offset(tel_id: i32) -> u32 {
    let id = tel_id.max(0) as u32;
    id % 100 + 1000 * (id / 100)
}

/// Inverse of [`tel_type_offset`] for a type built on `base`.
pub fn tel_id_from_type(type_code: u32, base: u32) -> Option<i32> {
    let off = type_code.checked_sub(base)?;
    if off % 1000 >= 100 || off == 0 {
        return None;
    }
    Some((off % 1000 + 100 * (off / 1000)) as i32)
}

pub fn track_event_type(tel_id: i32) -> u32 {
    TRACK_EVENT_BASE + tel_type_offset(tel_id)
}

pub fn tel_event_type(tel_id: i32) -> u32 {
    TEL_EVENT_BASE + tel_type_offset(tel_id)
}

/// Telescope id hidden in a track event type (2100 + k), if it is one.
pub fn track_event_tel_id(type_code: u32) -> Option<i32> {
    if !(TRACK_EVENT_BASE..TRACK_EVENT_BASE + 32_000).contains(&type_code) {
        return None;
    }
    tel_id_from_type(type_code, TRACK_EVENT_BASE)
}

/// Telescope id hidden in a telescope event type (2200 + k), if it is one.
pub fn tel_event_tel_id(type_code: u32) -> Option<i32> {
    if !(TEL_EVENT_BASE..TEL_EVENT_BASE + 32_000).contains(&type_code) {
        return None;
    }
    tel_id_from_type(type_code, TEL_EVENT_BASE)
}

const PACKED_LOW: i64 = 0xff;
const PACKED_HIGH: i64 = 0x3f00_0000;

/// Telescope id of blocks whose ident packs it into bits 0..8 and 24..30,
/// leaving bits 8..24 for flags.
pub fn unpack_tel_ident(ident: i64) -> i32 {
    ((ident & PACKED_LOW) | ((ident & PACKED_HIGH) >> 16)) as i32
}

/// Replace the telescope id in a packed ident, keeping the flag bits.
pub fn repack_tel_ident(ident: i64, tel_id: i32) -> i64 {
    let id = tel_id as i64;
    (ident & !(PACKED_LOW | PACKED_HIGH)) | (id & PACKED_LOW) | ((id << 16) & PACKED_HIGH)
}

/// Whether the block type keeps its telescope id in a packed ident.
pub fn has_packed_tel_ident(type_code: u32) -> bool {
    matches!(type_code, TEL_MONITORING | ADC_SUMS | ADC_SAMPLES | PIXEL_TIMING)
}
