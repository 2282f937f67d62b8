//! Band extraction: one fragment container to its inflated scanlines.

use flate2::read::ZlibDecoder;
use std::io::Read;
use thiserror::Error;

use crate::codec::{CodecError, ImageHeader, ImageParts};
use crate::config::IntegrityPolicy;

/// Upper bound on the up-front buffer reservation; larger bands grow as they inflate.
const MAX_PREALLOC: usize = 64 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum BandError {
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error(
        "unsupported layout: bit depth {}, color type {}, interlace {} (need 8-bit RGBA, non-interlaced)",
        .0.bit_depth, .0.color_type, .0.interlace
    )]
    Unsupported(ImageHeader),
    #[error("decompress failed: {0}")]
    Decompress(String),
}

/// Raw scanlines of one fragment: `height` rows of one filter byte plus `width` RGBA pixels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Band {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
    /// Accepted with CRC mismatches under the warn policy.
    pub flagged: bool,
}

/// Validate a fragment container and inflate its data stream.
///
/// The inflated size must be exactly `height * (width * 4 + 1)`; a longer
/// stream is cut off at the bound and reported, never buffered in full.
pub fn extract(bytes: &[u8], policy: IntegrityPolicy) -> Result<Band, BandError> {
    let parts = ImageParts::parse(bytes)?;
    let flagged = parts.verify(policy)?;
    let header = parts.header;
    if !header.is_rgba8() {
        return Err(BandError::Unsupported(header));
    }
    let bound = header.raw_len().ok_or_else(|| {
        BandError::Decompress(format!(
            "{}x{} band overflows addressable memory",
            header.width, header.height
        ))
    })?;

    let mut data = Vec::with_capacity(bound.min(MAX_PREALLOC));
    ZlibDecoder::new(parts.data.as_slice())
        .take((bound as u64).saturating_add(1))
        .read_to_end(&mut data)
        .map_err(|e| BandError::Decompress(e.to_string()))?;

    if data.len() > bound {
        return Err(BandError::Decompress(format!(
            "data stream inflates past {} bytes",
            bound
        )));
    }
    if data.len() < bound {
        return Err(BandError::Decompress(format!(
            "data stream ended at {} of {} bytes",
            data.len(),
            bound
        )));
    }

    Ok(Band {
        width: header.width,
        height: header.height,
        data,
        flagged,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::encode;
    use crate::test_support::{band_rows, fragment_png, zlib};

    #[test]
    fn extract_returns_rows_and_size() {
        let bytes = fragment_png(5, 3, 7);
        let band = extract(&bytes, IntegrityPolicy::Reject).unwrap();
        assert_eq!(band.width, 5);
        assert_eq!(band.height, 3);
        assert_eq!(band.data.len(), 3 * (5 * 4 + 1));
        assert_eq!(band.data, band_rows(5, 3, 7));
        assert!(!band.flagged);
    }

    #[test]
    fn corrupted_signature_is_a_signature_error() {
        let mut bytes = fragment_png(4, 2, 1);
        bytes[0] = 0;
        assert!(matches!(
            extract(&bytes, IntegrityPolicy::Warn),
            Err(BandError::Codec(CodecError::Signature))
        ));
    }

    #[test]
    fn stream_longer_than_header_is_rejected() {
        let header = ImageHeader::rgba8(4, 2);
        let bytes = encode(&header, &zlib(&band_rows(4, 3, 0))).unwrap();
        match extract(&bytes, IntegrityPolicy::Reject) {
            Err(BandError::Decompress(msg)) => assert!(msg.contains("past")),
            other => panic!("expected Decompress, got {:?}", other),
        }
    }

    #[test]
    fn stream_shorter_than_header_is_rejected() {
        let header = ImageHeader::rgba8(4, 3);
        let bytes = encode(&header, &zlib(&band_rows(4, 2, 0))).unwrap();
        assert!(matches!(
            extract(&bytes, IntegrityPolicy::Reject),
            Err(BandError::Decompress(_))
        ));
    }

    #[test]
    fn garbage_stream_is_a_decompress_error() {
        let header = ImageHeader::rgba8(4, 2);
        let bytes = encode(&header, b"definitely not zlib").unwrap();
        assert!(matches!(
            extract(&bytes, IntegrityPolicy::Reject),
            Err(BandError::Decompress(_))
        ));
    }

    #[test]
    fn huge_declared_size_does_not_overflow_the_bound() {
        // (2^32 + 1) * (2^32 - 1) bytes: the bound is u64::MAX on 64-bit targets.
        let header = ImageHeader::rgba8(1 << 30, u32::MAX);
        let bytes = encode(&header, &zlib(&band_rows(1, 1, 0))).unwrap();
        assert!(matches!(
            extract(&bytes, IntegrityPolicy::Reject),
            Err(BandError::Decompress(_))
        ));
    }

    #[test]
    fn non_rgba_layout_is_unsupported() {
        let mut header = ImageHeader::rgba8(4, 2);
        header.color_type = 2;
        let bytes = encode(&header, &zlib(&band_rows(4, 2, 0))).unwrap();
        assert!(matches!(
            extract(&bytes, IntegrityPolicy::Reject),
            Err(BandError::Unsupported(h)) if h.color_type == 2
        ));
    }

    #[test]
    fn crc_mismatch_follows_policy() {
        let mut bytes = fragment_png(3, 2, 9);
        // Flip a bit in the stored IEND CRC.
        let last = bytes.len() - 1;
        bytes[last] ^= 1;
        assert!(matches!(
            extract(&bytes, IntegrityPolicy::Reject),
            Err(BandError::Codec(CodecError::ChecksumMismatch { .. }))
        ));
        let band = extract(&bytes, IntegrityPolicy::Warn).unwrap();
        assert!(band.flagged);
        assert_eq!(band.data, band_rows(3, 2, 9));
    }
}
