//! IHDR payload: the fixed 13-byte image header.

use super::be;
use super::error::CodecError;

/// Color type 6: truecolor with alpha.
pub const COLOR_TYPE_RGBA: u8 = 6;
/// Bytes per RGBA8 pixel.
pub const BYTES_PER_PIXEL: usize = 4;
pub const HEADER_LEN: usize = 13;

/// Decoded IHDR fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageHeader {
    pub width: u32,
    pub height: u32,
    pub bit_depth: u8,
    pub color_type: u8,
    pub compression: u8,
    pub filter: u8,
    pub interlace: u8,
}

impl ImageHeader {
    /// Header for an 8-bit RGBA, non-interlaced image.
    pub fn rgba8(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            bit_depth: 8,
            color_type: COLOR_TYPE_RGBA,
            compression: 0,
            filter: 0,
            interlace: 0,
        }
    }

    /// True for the only layout this crate reassembles.
    pub fn is_rgba8(&self) -> bool {
        self.bit_depth == 8
            && self.color_type == COLOR_TYPE_RGBA
            && self.compression == 0
            && self.filter == 0
            && self.interlace == 0
    }

    /// Bytes of one filtered scanline: the filter byte plus the pixels.
    pub fn row_len(&self) -> usize {
        1 + self.width as usize * BYTES_PER_PIXEL
    }

    /// Inflated size of the data stream for this header.
    pub fn raw_len(&self) -> Option<usize> {
        (self.width as usize)
            .checked_mul(BYTES_PER_PIXEL)?
            .checked_add(1)?
            .checked_mul(self.height as usize)
    }

    pub fn parse(data: &[u8]) -> Result<Self, CodecError> {
        if data.len() != HEADER_LEN {
            return Err(CodecError::BadHeader(format!(
                "IHDR is {} bytes, expected {}",
                data.len(),
                HEADER_LEN
            )));
        }
        let width = be::read_u32(data, 0).ok_or(CodecError::Truncated {
            offset: 0,
            needed: 4,
        })?;
        let height = be::read_u32(data, 4).ok_or(CodecError::Truncated {
            offset: 4,
            needed: 4,
        })?;
        if width == 0 || height == 0 {
            return Err(CodecError::BadHeader(format!(
                "zero dimension {}x{}",
                width, height
            )));
        }
        Ok(Self {
            width,
            height,
            bit_depth: data[8],
            color_type: data[9],
            compression: data[10],
            filter: data[11],
            interlace: data[12],
        })
    }

    pub fn to_bytes(&self) -> [u8; HEADER_LEN] {
        let mut out = [0u8; HEADER_LEN];
        out[0..4].copy_from_slice(&be::u32_bytes(self.width));
        out[4..8].copy_from_slice(&be::u32_bytes(self.height));
        out[8] = self.bit_depth;
        out[9] = self.color_type;
        out[10] = self.compression;
        out[11] = self.filter;
        out[12] = self.interlace;
        out
    }
}
