//! Reassembly: ordered fragments to one RGBA8 container.
//!
//! Bands are stacked top to bottom in ascending fragment index. The stacked
//! scanlines keep their per-row filter bytes, so the result is recompressed as
//! one zlib stream and wrapped in a fresh IHDR / IDAT / IEND.

use flate2::write::ZlibEncoder;
use flate2::Compression;
use std::io::Write;
use thiserror::Error;

use crate::band::{extract, BandError};
use crate::codec::{encode, CodecError, ImageHeader};
use crate::config::IntegrityPolicy;
use crate::store::Fragment;

#[derive(Debug, Error)]
pub enum ReassembleError {
    #[error("{} fragment(s) missing, first {:?}", missing.len(), missing.first())]
    Incomplete { missing: Vec<u32> },
    #[error("fragment {index} is {found} pixels wide, expected {expected}")]
    WidthMismatch { index: u32, expected: u32, found: u32 },
    #[error("fragment {index}: {source}")]
    Band {
        index: u32,
        #[source]
        source: BandError,
    },
    #[error("compress failed: {0}")]
    Compress(String),
    #[error("image too large: {0}")]
    TooLarge(String),
}

/// Stacked scanlines of every band, filter bytes included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RasterBuffer {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

/// The serialized result plus what went into it.
#[derive(Debug, Clone)]
pub struct FinalImage {
    pub header: ImageHeader,
    pub raster: RasterBuffer,
    /// The complete container: signature, IHDR, one IDAT, IEND.
    pub bytes: Vec<u8>,
    /// Fragment indices that were accepted despite CRC mismatches.
    pub flagged: Vec<u32>,
}

/// Check that `fragments` covers `[0, target)` exactly, and return them in index order.
fn ordered(fragments: &[Fragment], target: usize) -> Result<Vec<&Fragment>, ReassembleError> {
    let mut slots: Vec<Option<&Fragment>> = vec![None; target];
    for f in fragments {
        if let Some(slot) = slots.get_mut(f.index as usize) {
            if slot.is_none() {
                *slot = Some(f);
            }
        }
    }
    let missing: Vec<u32> = slots
        .iter()
        .enumerate()
        .filter(|(_, s)| s.is_none())
        .map(|(i, _)| i as u32)
        .collect();
    if !missing.is_empty() {
        return Err(ReassembleError::Incomplete { missing });
    }
    Ok(slots.into_iter().flatten().collect())
}

/// Extract and stack every band. Returns the raster and the flagged indices.
pub fn stack_bands(
    fragments: &[Fragment],
    target: usize,
    policy: IntegrityPolicy,
) -> Result<(RasterBuffer, Vec<u32>), ReassembleError> {
    let ordered = ordered(fragments, target)?;
    let mut width: Option<u32> = None;
    let mut height: u32 = 0;
    let mut data = Vec::new();
    let mut flagged = Vec::new();

    for fragment in ordered {
        let index = fragment.index;
        let band = extract(&fragment.bytes, policy)
            .map_err(|source| ReassembleError::Band { index, source })?;
        let expected = *width.get_or_insert(band.width);
        if band.width != expected {
            return Err(ReassembleError::WidthMismatch {
                index,
                expected,
                found: band.width,
            });
        }
        height = height.checked_add(band.height).ok_or_else(|| {
            ReassembleError::TooLarge(format!("total height overflows at fragment {}", index))
        })?;
        if band.flagged || fragment.flagged {
            flagged.push(index);
        }
        data.extend_from_slice(&band.data);
        tracing::debug!(index, width = band.width, height = band.height, "stacked band");
    }

    Ok((
        RasterBuffer {
            width: width.unwrap_or(0),
            height,
            data,
        },
        flagged,
    ))
}

/// zlib-compress a raster at `level` (0-9) and serialize the container.
pub fn encode_raster(raster: &RasterBuffer, level: u32) -> Result<(ImageHeader, Vec<u8>), ReassembleError> {
    let header = ImageHeader::rgba8(raster.width, raster.height);
    let mut enc = ZlibEncoder::new(
        Vec::with_capacity(raster.data.len() / 2),
        Compression::new(level.min(9)),
    );
    enc.write_all(&raster.data)
        .map_err(|e| ReassembleError::Compress(e.to_string()))?;
    let compressed = enc
        .finish()
        .map_err(|e| ReassembleError::Compress(e.to_string()))?;
    let bytes = encode(&header, &compressed).map_err(|e| match e {
        CodecError::ChunkTooLarge { .. } => ReassembleError::TooLarge(e.to_string()),
        other => ReassembleError::Compress(other.to_string()),
    })?;
    Ok((header, bytes))
}

/// Rebuild the full image from every fragment in `[0, target)`.
pub fn reassemble(
    fragments: &[Fragment],
    target: usize,
    policy: IntegrityPolicy,
    level: u32,
) -> Result<FinalImage, ReassembleError> {
    let (raster, flagged) = stack_bands(fragments, target, policy)?;
    let (header, bytes) = encode_raster(&raster, level)?;
    tracing::info!(
        width = header.width,
        height = header.height,
        raw = raster.data.len(),
        encoded = bytes.len(),
        "image reassembled"
    );
    Ok(FinalImage {
        header,
        raster,
        bytes,
        flagged,
    })
}
