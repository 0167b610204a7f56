// crates/eventio-core/src/codec/count.rs
//
// Self-delimiting unsigned "counts" and their signed variant.
//
// The number of leading one-bits in the first byte tells how many more bytes
// follow; the remaining bits of the first byte are the most significant part
// of the value. Bytes are always most significant first, so counts do not
// depend on the byte order of the enclosing block.
//
//   value < 2^7   0xxxxxxx
//   value < 2^14  10xxxxxx xxxxxxxx
//   value < 2^21  110xxxxx + 2 bytes
//   ...
//   value < 2^56  11111110 + 7 bytes
//   otherwise     11111111 + 8 bytes

use crate::codec::take;
use crate::error::{EventIoError, Result};

/// Encoded width in bytes of `v` (1..=9).
pub fn count_width(v: u64) -> usize {
    let mut n = 1usize;
    while n < 9 && v >= 1u64 << (7 * n) {
        n += 1;
    }
    n
}

pub fn write_count(out: &mut Vec<u8>, v: u64) {
    let n = count_width(v);
    if n == 9 {
        out.push(0xFF);
        out.extend_from_slice(&v.to_be_bytes());
        return;
    }
    let prefix: u8 = !(0xFFu8 >> (n - 1));
    out.push(prefix | (v >> (8 * (n - 1))) as u8);
    for k in (0..n - 1).rev() {
        out.push((v >> (8 * k)) as u8);
    }
}

pub fn read_count(bytes: &[u8], i: &mut usize) -> Result<u64> {
    let b0 = take(bytes, i, 1)?[0];
    let n = b0.leading_ones() as usize + 1;
    if n == 9 {
        let s = take(bytes, i, 8)?;
        let mut a = [0u8; 8];
        a.copy_from_slice(s);
        return Ok(u64::from_be_bytes(a));
    }
    let mut v = (b0 as u64) & (0xFFu64 >> n);
    for &b in take(bytes, i, n - 1)? {
        v = (v << 8) | b as u64;
    }
    Ok(v)
}

/// Count restricted to 32 bits (at most 5 bytes on the wire).
pub fn read_count32(bytes: &[u8], i: &mut usize) -> Result<u32> {
    read_bounded(bytes, i, 5, u32::MAX as u64).map(|v| v as u32)
}

/// Count restricted to 16 bits (at most 3 bytes on the wire).
pub fn read_count16(bytes: &[u8], i: &mut usize) -> Result<u16> {
    read_bounded(bytes, i, 3, u16::MAX as u64).map(|v| v as u16)
}

fn read_bounded(bytes: &[u8], i: &mut usize, max_width: usize, max_value: u64) -> Result<u64> {
    let at = *i;
    let b0 = *bytes
        .get(at)
        .ok_or_else(|| EventIoError::Format("count: unexpected end of data".into()))?;
    let n = b0.leading_ones() as usize + 1;
    if n > max_width {
        return Err(EventIoError::Format(format!(
            "count at offset {} needs {} bytes, at most {} supported",
            at, n, max_width
        )));
    }
    let v = read_count(bytes, i)?;
    if v > max_value {
        return Err(EventIoError::Format(format!(
            "count {} at offset {} exceeds {}",
            v, at, max_value
        )));
    }
    Ok(v)
}

/// Sign goes to bit 0, magnitude is doubled: 0, -1, 1, -2, ... -> 0, 1, 2, 3, ...
fn fold_sign(v: i64) -> u64 {
    if v < 0 {
        (((-(v + 1)) as u64) << 1) | 1
    } else {
        (v as u64) << 1
    }
}

fn unfold_sign(u: u64) -> i64 {
    if u & 1 != 0 {
        -((u >> 1) as i64) - 1
    } else {
        (u >> 1) as i64
    }
}

pub fn write_scount(out: &mut Vec<u8>, v: i64) {
    write_count(out, fold_sign(v));
}

pub fn read_scount(bytes: &[u8], i: &mut usize) -> Result<i64> {
    read_count(bytes, i).map(unfold_sign)
}

pub fn read_scount32(bytes: &[u8], i: &mut usize) -> Result<i32> {
    let at = *i;
    let v = unfold_sign(read_bounded(bytes, i, 5, u32::MAX as u64)?);
    i32::try_from(v).map_err(|_| {
        EventIoError::Format(format!("signed count {} at offset {} exceeds 32 bits", v, at))
    })
}
