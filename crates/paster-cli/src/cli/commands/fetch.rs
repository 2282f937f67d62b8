//! `paster fetch`: collect every fragment and write the reassembled image.

use anyhow::{Context, Result};
use paster_core::config::{self, IntegrityPolicy, PasterConfig};
use paster_core::fetch::FetchProgress;
use paster_core::pipeline;
use std::io::Write;
use std::path::PathBuf;
use std::time::Instant;

/// Command-line values that take precedence over config.toml.
#[derive(Debug, Clone, Default)]
pub struct FetchOverrides {
    pub workers: Option<usize>,
    pub image: Option<u32>,
    pub output: Option<PathBuf>,
    pub fragment_count: Option<usize>,
    /// Replaces the configured server list when non-empty.
    pub servers: Vec<String>,
    pub accept_corrupt: bool,
}

impl FetchOverrides {
    pub fn apply(&self, cfg: &mut PasterConfig) {
        if let Some(n) = self.workers {
            cfg.workers = n;
        }
        if let Some(img) = self.image {
            cfg.image = img;
        }
        if let Some(path) = &self.output {
            cfg.output = path.clone();
        }
        if let Some(n) = self.fragment_count {
            cfg.fragment_count = n;
        }
        if !self.servers.is_empty() {
            cfg.servers = self.servers.clone();
        }
        if self.accept_corrupt {
            cfg.integrity = IntegrityPolicy::Warn;
        }
    }
}

/// One in-place progress line: carriage return first, no newline.
fn progress_line(p: &FetchProgress) -> String {
    format!(
        "\r  {} / {} fragments ({:.0}%)  {:.1}s  ",
        p.completed,
        p.target,
        p.fraction() * 100.0,
        p.elapsed_secs
    )
}

pub async fn run_fetch(overrides: FetchOverrides) -> Result<()> {
    let mut cfg = config::load_or_init()?;
    overrides.apply(&mut cfg);
    cfg.validate()?;
    tracing::debug!("effective config: {:?}", cfg);
    let servers = cfg.servers.clone();

    let (progress_tx, mut progress_rx) = tokio::sync::mpsc::channel::<FetchProgress>(16);
    const PROGRESS_INTERVAL_MS: u64 = 250;
    let progress_handle = tokio::spawn(async move {
        let mut last_print: Option<Instant> = None;
        while let Some(p) = progress_rx.recv().await {
            let now = Instant::now();
            let due = last_print
                .map(|t| now.duration_since(t).as_millis() as u64 >= PROGRESS_INTERVAL_MS)
                .unwrap_or(true);
            if due || p.completed >= p.target {
                print!("{}", progress_line(&p));
                let _ = std::io::stdout().flush();
                last_print = Some(now);
            }
        }
        if last_print.is_some() {
            println!();
        }
    });

    let report = tokio::task::spawn_blocking(move || pipeline::run(&cfg, Some(&progress_tx)))
        .await
        .context("fetch task failed")??;
    let _ = progress_handle.await;

    let s = &report.summary;
    println!(
        "Wrote {} ({}x{}, {} bytes) in {:.2}s",
        report.output.display(),
        report.width,
        report.height,
        report.bytes,
        s.elapsed.as_secs_f64()
    );
    println!(
        "  requests {}  accepted {}  duplicates {}  discarded {}  rejected {}  errors {}  throttled {}",
        s.requests,
        s.accepted,
        s.duplicates,
        s.discarded,
        s.rejected,
        s.transport_errors,
        s.throttle_events
    );
    for (server, n) in servers.iter().zip(&s.per_server) {
        println!("  {:>4}  {}", n, server);
    }
    if !report.flagged.is_empty() {
        println!("  accepted with CRC mismatches: {:?}", report.flagged);
    }
    println!("sha256 {}", report.sha256);
    Ok(())
}
