// crates/eventio-core/src/codec/fixed.rs

use crate::codec::take;
use crate::error::Result;

/// Byte order of one block. Nested blocks inherit the order of their
/// top-level block; there is no process-wide setting.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ByteOrder {
    #[default]
    Little,
    Big,
}

impl ByteOrder {
    pub const fn native() -> Self {
        if cfg!(target_endian = "big") {
            ByteOrder::Big
        } else {
            ByteOrder::Little
        }
    }
}

/// Fixed-width value with an explicit byte order on the wire.
pub trait Fixed: Copy {
    const WIDTH: usize;

    fn put(self, order: ByteOrder, out: &mut Vec<u8>);

    /// `bytes` must hold at least `WIDTH` bytes.
    fn get(bytes: &[u8], order: ByteOrder) -> Self;
}

macro_rules! impl_fixed {
    ($($t:ty),*) => {
        $(
            impl Fixed for $t {
                const WIDTH: usize = std::mem::size_of::<$t>();

                fn put(self, order: ByteOrder, out: &mut Vec<u8>) {
                    match order {
                        ByteOrder::Little => out.extend_from_slice(&self.to_le_bytes()),
                        ByteOrder::Big => out.extend_from_slice(&self.to_be_bytes()),
                    }
                }

                fn get(bytes: &[u8], order: ByteOrder) -> Self {
                    let mut a = [0u8; std::mem::size_of::<$t>()];
                    a.copy_from_slice(&bytes[..Self::WIDTH]);
                    match order {
                        ByteOrder::Little => <$t>::from_le_bytes(a),
                        ByteOrder::Big => <$t>::from_be_bytes(a),
                    }
                }
            }
        )*
    };
}

impl_fixed!(u8, i8, u16, i16, u32, i32, u64, i64, f32, f64);

pub fn write_fixed<T: Fixed>(out: &mut Vec<u8>, v: T, order: ByteOrder) {
    v.put(order, out);
}

pub fn read_fixed<T: Fixed>(bytes: &[u8], i: &mut usize, order: ByteOrder) -> Result<T> {
    let s = take(bytes, i, T::WIDTH)?;
    Ok(T::get(s, order))
}
