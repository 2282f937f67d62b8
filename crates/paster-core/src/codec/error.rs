use thiserror::Error;

use super::ChunkType;

/// Errors raised while parsing or building a container.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("signature mismatch: not a PNG container")]
    Signature,
    #[error("truncated container: needed {needed} bytes at offset {offset}")]
    Truncated { offset: usize, needed: usize },
    #[error("chunk {kind} too large: {len} bytes")]
    ChunkTooLarge { kind: ChunkType, len: usize },
    #[error("missing {0} chunk")]
    MissingChunk(ChunkType),
    #[error("bad header: {0}")]
    BadHeader(String),
    #[error("CRC mismatch in {kind} chunk: stored {stored:08x}, computed {computed:08x}")]
    ChecksumMismatch {
        kind: ChunkType,
        stored: u32,
        computed: u32,
    },
}
