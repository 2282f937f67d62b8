//! Structural view of a decoded container: header, joined data stream, damage report.

use super::error::CodecError;
use super::header::ImageHeader;
use super::{decode, Chunk, ChunkType};
use crate::config::IntegrityPolicy;

/// A chunk whose stored CRC didn't match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrcMismatch {
    pub kind: ChunkType,
    pub stored: u32,
    pub computed: u32,
}

impl From<CrcMismatch> for CodecError {
    fn from(m: CrcMismatch) -> Self {
        CodecError::ChecksumMismatch {
            kind: m.kind,
            stored: m.stored,
            computed: m.computed,
        }
    }
}

/// Header and compressed data stream of one container.
#[derive(Debug, Clone)]
pub struct ImageParts {
    pub header: ImageHeader,
    /// All IDAT payloads joined in stream order.
    pub data: Vec<u8>,
    /// Chunks whose CRC didn't verify, in stream order.
    pub mismatches: Vec<CrcMismatch>,
}

impl ImageParts {
    /// Decode `bytes` and collect its parts.
    pub fn parse(bytes: &[u8]) -> Result<Self, CodecError> {
        Self::from_chunks(decode(bytes)?)
    }

    /// IHDR must come first and IEND last; at least one IDAT is required.
    /// Ancillary chunks are skipped.
    pub fn from_chunks(chunks: Vec<Chunk>) -> Result<Self, CodecError> {
        let first = chunks
            .first()
            .filter(|c| c.kind == ChunkType::IHDR)
            .ok_or(CodecError::MissingChunk(ChunkType::IHDR))?;
        let header = ImageHeader::parse(&first.data)?;
        if chunks.last().map(|c| c.kind) != Some(ChunkType::IEND) {
            return Err(CodecError::MissingChunk(ChunkType::IEND));
        }

        let mut data = Vec::new();
        let mut seen_idat = false;
        let mut mismatches = Vec::new();
        for chunk in chunks {
            let computed = chunk.computed_crc();
            if computed != chunk.crc {
                mismatches.push(CrcMismatch {
                    kind: chunk.kind,
                    stored: chunk.crc,
                    computed,
                });
            }
            if chunk.kind == ChunkType::IDAT {
                seen_idat = true;
                data.extend_from_slice(&chunk.data);
            }
        }
        if !seen_idat {
            return Err(CodecError::MissingChunk(ChunkType::IDAT));
        }

        Ok(Self {
            header,
            data,
            mismatches,
        })
    }

    /// Apply the integrity policy. Returns true when the container was accepted
    /// despite CRC mismatches (warn policy), so callers can flag it.
    pub fn verify(&self, policy: IntegrityPolicy) -> Result<bool, CodecError> {
        let Some(first) = self.mismatches.first() else {
            return Ok(false);
        };
        match policy {
            IntegrityPolicy::Reject => Err((*first).into()),
            IntegrityPolicy::Warn => {
                for m in &self.mismatches {
                    tracing::warn!(
                        chunk = %m.kind,
                        stored = m.stored,
                        computed = m.computed,
                        "accepting chunk with CRC mismatch"
                    );
                }
                Ok(true)
            }
        }
    }
}
