//! Big-endian integer packing for the container framing.
//!
//! Every length, CRC and IHDR dimension goes through here; nothing else in the
//! crate touches byte order.

use byteorder::{BigEndian, ByteOrder};

/// Read a big-endian u32 at `offset`, or None if fewer than 4 bytes remain.
pub fn read_u32(buf: &[u8], offset: usize) -> Option<u32> {
    let end = offset.checked_add(4)?;
    buf.get(offset..end).map(BigEndian::read_u32)
}

/// Append `v` as 4 big-endian bytes.
pub fn push_u32(out: &mut Vec<u8>, v: u32) {
    out.extend_from_slice(&u32_bytes(v));
}

/// `v` as 4 big-endian bytes.
pub fn u32_bytes(v: u32) -> [u8; 4] {
    let mut b = [0u8; 4];
    BigEndian::write_u32(&mut b, v);
    b
}
