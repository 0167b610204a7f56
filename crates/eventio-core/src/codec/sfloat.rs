// crates/eventio-core/src/codec/sfloat.rs

use half::f16;

use crate::codec::fixed::{read_fixed, write_fixed, ByteOrder};
use crate::error::Result;

/// Store `v` as an IEEE binary16 "short float" (2 bytes, block byte order).
///
/// This is lossy on purpose: it is meant for calibration-style values of
/// low dynamic range. Normal numbers come back within ~0.2% relative error
/// (the half mantissa has 11 bits, so the actual bound is 2^-11); small
/// integers up to 2048 are exact. Magnitudes above 65504 become infinite.
pub fn write_sfloat(out: &mut Vec<u8>, v: f32, order: ByteOrder) {
    write_fixed(out, f16::from_f32(v).to_bits(), order);
}

pub fn read_sfloat(bytes: &[u8], i: &mut usize, order: ByteOrder) -> Result<f32> {
    let bits: u16 = read_fixed(bytes, i, order)?;
    Ok(f16::from_bits(bits).to_f32())
}
