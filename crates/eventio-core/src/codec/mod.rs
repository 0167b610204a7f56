// crates/eventio-core/src/codec/mod.rs
//
// Primitive encodings shared by the block writer and the payload cursor.

pub mod count;
pub mod fixed;
pub mod sfloat;

pub use count::{
    count_width, read_count, read_count16, read_count32, read_scount, read_scount32,
    write_count, write_scount,
};
pub use fixed::{read_fixed, write_fixed, ByteOrder, Fixed};
pub use sfloat::{read_sfloat, write_sfloat};

use crate::error::{EventIoError, Result};

/// Strings are a count length followed by the raw bytes.
pub fn write_string(out: &mut Vec<u8>, s: &str) {
    write_count(out, s.len() as u64);
    out.extend_from_slice(s.as_bytes());
}

pub fn read_string(bytes: &[u8], i: &mut usize) -> Result<String> {
    let n = read_count(bytes, i)? as usize;
    let raw = take(bytes, i, n)?;
    Ok(String::from_utf8_lossy(raw).into_owned())
}

pub(crate) fn take<'a>(bytes: &'a [u8], i: &mut usize, n: usize) -> Result<&'a [u8]> {
    let end = i
        .checked_add(n)
        .ok_or_else(|| EventIoError::Format("length overflow".into()))?;
    if end > bytes.len() {
        return Err(EventIoError::Format(format!(
            "unexpected end of data: need {} bytes at offset {}, have {}",
            n,
            *i,
            bytes.len().saturating_sub(*i)
        )));
    }
    let s = &bytes[*i..end];
    *i = end;
    Ok(s)
}
