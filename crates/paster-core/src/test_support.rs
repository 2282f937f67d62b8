//! Fixture fragments for unit tests.

use flate2::write::ZlibEncoder;
use flate2::Compression;
use std::io::Write;

use crate::codec::{encode, ImageHeader};

/// Filtered scanlines for a `width` x `height` band: filter byte 0, then
/// pixel bytes derived from `seed` so different bands are distinguishable.
pub(crate) fn band_rows(width: u32, height: u32, seed: u8) -> Vec<u8> {
    let row_len = 1 + width as usize * 4;
    let mut out = Vec::with_capacity(row_len * height as usize);
    for y in 0..height as usize {
        out.push(0);
        for x in 0..width as usize * 4 {
            out.push(seed.wrapping_mul(31).wrapping_add((y * 7 + x) as u8));
        }
    }
    out
}

pub(crate) fn zlib(data: &[u8]) -> Vec<u8> {
    let mut enc = ZlibEncoder::new(Vec::new(), Compression::default());
    enc.write_all(data).unwrap();
    enc.finish().unwrap()
}

/// A complete fragment container holding `band_rows(width, height, seed)`.
pub(crate) fn fragment_png(width: u32, height: u32, seed: u8) -> Vec<u8> {
    let header = ImageHeader::rgba8(width, height);
    encode(&header, &zlib(&band_rows(width, height, seed))).unwrap()
}
