//! `paster inspect`: list a PNG's chunks, their CRC status and the header fields.

use anyhow::{Context, Result};
use paster_core::codec::{self, ChunkType, ImageHeader};
use std::path::Path;

pub async fn run_inspect(path: &Path) -> Result<()> {
    let bytes = std::fs::read(path).with_context(|| format!("read {}", path.display()))?;
    let chunks = codec::decode(&bytes).with_context(|| format!("decode {}", path.display()))?;

    println!("{}: {} bytes, {} chunk(s)", path.display(), bytes.len(), chunks.len());
    let mut damaged = 0usize;
    for chunk in &chunks {
        let intact = chunk.is_intact();
        if !intact {
            damaged += 1;
        }
        println!(
            "  {}  {:>10} bytes  crc {:08x}  {}",
            chunk.kind,
            chunk.data.len(),
            chunk.crc,
            if intact { "ok" } else { "MISMATCH" }
        );
    }

    if let Some(ihdr) = chunks.iter().find(|c| c.kind == ChunkType::IHDR) {
        match ImageHeader::parse(&ihdr.data) {
            Ok(h) => println!(
                "  {}x{}  bit depth {}  color type {}  compression {}  filter {}  interlace {}",
                h.width, h.height, h.bit_depth, h.color_type, h.compression, h.filter, h.interlace
            ),
            Err(e) => println!("  IHDR unreadable: {}", e),
        }
    }
    if damaged > 0 {
        anyhow::bail!("{} chunk(s) failed CRC verification", damaged);
    }
    Ok(())
}
