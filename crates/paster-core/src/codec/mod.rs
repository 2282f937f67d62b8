//! PNG container codec.
//!
//! A container is the 8-byte signature followed by chunks framed as
//! `length (u32 BE) | type (4 bytes) | payload | CRC-32 (u32 BE)`, where the
//! CRC covers type and payload. Decoding never fails on a CRC mismatch: each
//! chunk reports whether it is intact and callers apply their own policy.

pub mod be;
mod error;
mod header;
mod parts;

pub use error::CodecError;
pub use header::{ImageHeader, BYTES_PER_PIXEL, COLOR_TYPE_RGBA, HEADER_LEN};
pub use parts::{CrcMismatch, ImageParts};

use std::fmt;

/// The fixed 8-byte PNG signature.
pub const SIGNATURE: [u8; 8] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];

/// Largest payload a chunk length field may declare.
pub const MAX_CHUNK_LEN: usize = 0x7FFF_FFFF;

/// 4-byte chunk type tag.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChunkType(pub [u8; 4]);

impl ChunkType {
    pub const IHDR: ChunkType = ChunkType(*b"IHDR");
    pub const IDAT: ChunkType = ChunkType(*b"IDAT");
    pub const IEND: ChunkType = ChunkType(*b"IEND");
}

impl fmt::Display for ChunkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for &b in &self.0 {
            if b.is_ascii_graphic() {
                write!(f, "{}", b as char)?;
            } else {
                write!(f, "\\x{:02x}", b)?;
            }
        }
        Ok(())
    }
}

impl fmt::Debug for ChunkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ChunkType({})", self)
    }
}

/// One decoded chunk with the CRC as stored in the stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub kind: ChunkType,
    pub data: Vec<u8>,
    pub crc: u32,
}

impl Chunk {
    /// Build a chunk with a freshly computed CRC.
    pub fn new(kind: ChunkType, data: Vec<u8>) -> Self {
        let crc = chunk_crc(kind, &data);
        Self { kind, data, crc }
    }

    pub fn computed_crc(&self) -> u32 {
        chunk_crc(self.kind, &self.data)
    }

    /// True when the stored CRC matches the type and payload.
    pub fn is_intact(&self) -> bool {
        self.crc == self.computed_crc()
    }
}

/// CRC-32 over `type || payload`.
pub fn chunk_crc(kind: ChunkType, data: &[u8]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(&kind.0);
    hasher.update(data);
    hasher.finalize()
}

/// Split a container into its chunks. Stops after `IEND`; trailing bytes are ignored.
pub fn decode(bytes: &[u8]) -> Result<Vec<Chunk>, CodecError> {
    if bytes.len() < SIGNATURE.len() || bytes[..SIGNATURE.len()] != SIGNATURE {
        return Err(CodecError::Signature);
    }

    let mut chunks = Vec::new();
    let mut offset = SIGNATURE.len();
    while offset < bytes.len() {
        let len = be::read_u32(bytes, offset)
            .ok_or(CodecError::Truncated { offset, needed: 4 })? as usize;
        let kind_start = offset + 4;
        let data_start = kind_start + 4;
        let kind = bytes
            .get(kind_start..data_start)
            .and_then(|s| <[u8; 4]>::try_from(s).ok())
            .map(ChunkType)
            .ok_or(CodecError::Truncated { offset, needed: 8 })?;
        if len > MAX_CHUNK_LEN {
            return Err(CodecError::ChunkTooLarge { kind, len });
        }
        let data_end = data_start + len;
        let crc = be::read_u32(bytes, data_end).ok_or(CodecError::Truncated {
            offset,
            needed: 12 + len,
        })?;

        chunks.push(Chunk {
            kind,
            data: bytes[data_start..data_end].to_vec(),
            crc,
        });
        offset = data_end + 4;

        if kind == ChunkType::IEND {
            break;
        }
    }
    Ok(chunks)
}

/// Append one framed chunk (length, type, payload, fresh CRC) to `out`.
pub fn encode_chunk(out: &mut Vec<u8>, kind: ChunkType, data: &[u8]) -> Result<(), CodecError> {
    if data.len() > MAX_CHUNK_LEN {
        return Err(CodecError::ChunkTooLarge {
            kind,
            len: data.len(),
        });
    }
    be::push_u32(out, data.len() as u32);
    out.extend_from_slice(&kind.0);
    out.extend_from_slice(data);
    be::push_u32(out, chunk_crc(kind, data));
    Ok(())
}

/// Serialize `signature | IHDR | IDAT | IEND` for a header and an already-compressed data stream.
pub fn encode(header: &ImageHeader, compressed: &[u8]) -> Result<Vec<u8>, CodecError> {
    let mut out = Vec::with_capacity(SIGNATURE.len() + 3 * 12 + HEADER_LEN + compressed.len());
    out.extend_from_slice(&SIGNATURE);
    encode_chunk(&mut out, ChunkType::IHDR, &header.to_bytes())?;
    encode_chunk(&mut out, ChunkType::IDAT, compressed)?;
    encode_chunk(&mut out, ChunkType::IEND, &[])?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> (ImageHeader, Vec<u8>) {
        let header = ImageHeader::rgba8(7, 3);
        let payload: Vec<u8> = (0u8..=40).collect();
        (header, payload)
    }

    #[test]
    fn decode_encode_roundtrip() {
        let (header, payload) = sample();
        let bytes = encode(&header, &payload).unwrap();
        let parts = ImageParts::parse(&bytes).unwrap();
        assert_eq!(parts.header, header);
        assert_eq!(parts.data, payload);
        assert!(parts.mismatches.is_empty());
    }

    #[test]
    fn encode_emits_three_intact_chunks() {
        let (header, payload) = sample();
        let chunks = decode(&encode(&header, &payload).unwrap()).unwrap();
        let kinds: Vec<ChunkType> = chunks.iter().map(|c| c.kind).collect();
        assert_eq!(kinds, vec![ChunkType::IHDR, ChunkType::IDAT, ChunkType::IEND]);
        assert!(chunks.iter().all(Chunk::is_intact));
        assert!(chunks[2].data.is_empty());
        // CRC of an empty IEND is a well-known constant.
        assert_eq!(chunks[2].crc, 0xAE42_6082);
    }

    #[test]
    fn every_payload_bit_flip_is_detected() {
        let (header, payload) = sample();
        let bytes = encode(&header, &payload).unwrap();
        // IDAT payload starts after signature, IHDR chunk (12 + 13) and IDAT length + type.
        let idat_data = SIGNATURE.len() + 12 + HEADER_LEN + 8;
        for byte in 0..payload.len() {
            for bit in 0..8 {
                let mut corrupt = bytes.clone();
                corrupt[idat_data + byte] ^= 1 << bit;
                let chunks = decode(&corrupt).unwrap();
                assert!(chunks[0].is_intact());
                assert!(!chunks[1].is_intact(), "byte {} bit {}", byte, bit);
                assert!(chunks[2].is_intact());
            }
        }
    }

    #[test]
    fn bad_signature_is_rejected() {
        let (header, payload) = sample();
        let mut bytes = encode(&header, &payload).unwrap();
        bytes[1] = b'Q';
        assert!(matches!(decode(&bytes), Err(CodecError::Signature)));
        assert!(matches!(decode(&bytes[..4]), Err(CodecError::Signature)));
    }

    #[test]
    fn truncated_chunk_is_an_error() {
        let (header, payload) = sample();
        let bytes = encode(&header, &payload).unwrap();
        let cut = &bytes[..bytes.len() - 20];
        assert!(matches!(decode(cut), Err(CodecError::Truncated { .. })));
    }

    #[test]
    fn trailing_bytes_after_iend_are_ignored() {
        let (header, payload) = sample();
        let mut bytes = encode(&header, &payload).unwrap();
        bytes.extend_from_slice(b"garbage");
        assert_eq!(decode(&bytes).unwrap().len(), 3);
    }

    #[test]
    fn chunk_type_display() {
        assert_eq!(ChunkType::IDAT.to_string(), "IDAT");
        assert_eq!(ChunkType([b'a', 0, b'b', b'c']).to_string(), "a\\x00bc");
    }
}
