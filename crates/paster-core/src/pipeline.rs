//! One complete run: fetch every fragment, reassemble, write the output file.

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;

use crate::config::PasterConfig;
use crate::digest;
use crate::fetch::{self, FetchPlan, FetchProgress, FetchSummary};
use crate::reassemble::reassemble;
use crate::storage;
use crate::store::FragmentStore;
use crate::transport::CurlTransport;

/// What a successful run produced.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub summary: FetchSummary,
    pub width: u32,
    pub height: u32,
    pub output: PathBuf,
    /// Size of the written file in bytes.
    pub bytes: usize,
    pub sha256: String,
    /// Fragments accepted despite CRC mismatches.
    pub flagged: Vec<u32>,
}

/// Run the pipeline with the libcurl transport. Blocks until done.
pub fn run(
    cfg: &PasterConfig,
    progress_tx: Option<&tokio::sync::mpsc::Sender<FetchProgress>>,
) -> Result<RunReport> {
    let plan = FetchPlan::from_config(cfg)?;
    let http = cfg.http();
    let store = Arc::new(FragmentStore::new(plan.fragment_count));

    let summary = fetch::fetch(&plan, &store, |_| CurlTransport::new(&http), progress_tx)
        .context("fetching fragments")?;

    let fragments = store.take_ordered();
    let image = reassemble(
        &fragments,
        plan.fragment_count,
        cfg.integrity,
        cfg.compression_level,
    )
    .context("reassembling image")?;

    storage::write_atomic(&cfg.output, &image.bytes)
        .with_context(|| format!("writing {}", cfg.output.display()))?;
    let sha256 = digest::sha256_bytes(&image.bytes);

    if !image.flagged.is_empty() {
        tracing::warn!(
            count = image.flagged.len(),
            "output contains fragments accepted with CRC mismatches: {:?}",
            image.flagged
        );
    }
    tracing::info!(
        output = %cfg.output.display(),
        width = image.header.width,
        height = image.header.height,
        bytes = image.bytes.len(),
        requests = summary.requests,
        duplicates = summary.duplicates,
        sha256 = %sha256,
        "run finished"
    );

    Ok(RunReport {
        summary,
        width: image.header.width,
        height: image.header.height,
        output: cfg.output.clone(),
        bytes: image.bytes.len(),
        sha256,
        flagged: image.flagged,
    })
}
