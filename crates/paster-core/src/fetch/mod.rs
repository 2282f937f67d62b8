//! Fetch coordinator.
//!
//! Runs a fixed pool of OS-thread workers against a set of redundant origin
//! servers. Each server returns a fragment of its own choosing, tagged with a
//! sequence header; workers keep asking until the shared `FragmentStore`
//! holds every index. Duplicates and late arrivals are dropped by the store.
//! The coordinator joins every worker before returning, so callers never see
//! fetching and reassembly overlap.

mod sequence;
mod url;
mod worker;


pub use self::url::fragment_url;
pub use sequence::parse_sequence;

use ::url::Url;
use anyhow::Result;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;

use crate::config::{IntegrityPolicy, PasterConfig};
use crate::retry::{classify, ErrorKind, FetchError, RetryPolicy};
use crate::store::FragmentStore;
use crate::transport::Transport;

use worker::{Worker, WorkerReport};

/// Everything the coordinator needs for one run.
#[derive(Debug, Clone)]
pub struct FetchPlan {
    /// One fragment URL per origin server.
    pub servers: Vec<Url>,
    pub workers: usize,
    pub fragment_count: usize,
    pub sequence_header: String,
    pub integrity: IntegrityPolicy,
    pub retry: RetryPolicy,
}

impl FetchPlan {
    pub fn from_config(cfg: &PasterConfig) -> Result<Self> {
        cfg.validate()?;
        let servers = cfg
            .servers
            .iter()
            .map(|s| fragment_url(s, &cfg.image_path, cfg.image))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            servers,
            workers: cfg.workers,
            fragment_count: cfg.fragment_count,
            sequence_header: cfg.sequence_header.clone(),
            integrity: cfg.integrity,
            retry: cfg.retry_policy(),
        })
    }
}

/// Progress snapshot sent after each accepted fragment.
#[derive(Debug, Clone, Copy)]
pub struct FetchProgress {
    pub completed: usize,
    pub target: usize,
    pub elapsed_secs: f64,
}

impl FetchProgress {
    /// Fraction complete in [0.0, 1.0].
    pub fn fraction(&self) -> f64 {
        if self.target == 0 {
            return 1.0;
        }
        (self.completed as f64 / self.target as f64).min(1.0)
    }
}

/// Counters for one fetch run (summed over workers).
#[derive(Debug, Clone, Default)]
pub struct FetchSummary {
    pub requests: u64,
    /// Fragments inserted into the store (first copies).
    pub accepted: u64,
    /// Valid responses for an index already held.
    pub duplicates: u64,
    /// Responses without a usable sequence index, or with one outside the image.
    pub discarded: u64,
    /// Fragments refused by container validation.
    pub rejected: u64,
    pub transport_errors: u64,
    pub throttle_events: u64,
    /// Accepted fragments per server, in plan order.
    pub per_server: Vec<u64>,
    /// Workers that gave up before the store was complete.
    pub failed_workers: usize,
    pub elapsed: Duration,
}

impl FetchSummary {
    fn new(servers: usize) -> Self {
        Self {
            per_server: vec![0; servers],
            ..Self::default()
        }
    }

    /// Count a failed attempt by kind.
    fn record_error(&mut self, e: &FetchError) {
        match e {
            FetchError::MissingSequence => self.discarded += 1,
            FetchError::Malformed { .. } => self.rejected += 1,
            _ if classify(e) == ErrorKind::Throttled => self.throttle_events += 1,
            _ => self.transport_errors += 1,
        }
    }

    fn merge(&mut self, other: &FetchSummary) {
        self.requests += other.requests;
        self.accepted += other.accepted;
        self.duplicates += other.duplicates;
        self.discarded += other.discarded;
        self.rejected += other.rejected;
        self.transport_errors += other.transport_errors;
        self.throttle_events += other.throttle_events;
        if self.per_server.len() < other.per_server.len() {
            self.per_server.resize(other.per_server.len(), 0);
        }
        for (acc, n) in self.per_server.iter_mut().zip(&other.per_server) {
            *acc += n;
        }
    }
}

/// Terminal outcome of a fetch that could not collect every fragment.
#[derive(Debug, Error)]
pub enum FetchFailed {
    #[error("no servers or workers configured")]
    EmptyPlan,
    #[error("could not set up transport for worker {worker}")]
    Setup {
        worker: usize,
        #[source]
        source: FetchError,
    },
    #[error(
        "fetch gave up with {completed} of {target} fragments ({} missing)",
        missing.len()
    )]
    Exhausted {
        completed: usize,
        target: usize,
        missing: Vec<u32>,
        summary: FetchSummary,
        #[source]
        last: Option<FetchError>,
    },
}

/// Fetch every fragment into `store`.
///
/// `make_transport` is called once per worker, in the calling thread, before any
/// worker starts. Worker `w` begins on `plan.servers[w % M]`. Returns once every
/// worker has been joined: `Ok` when the store is complete, `Exhausted` when all
/// workers ran out of retry budget first.
pub fn fetch<T, F>(
    plan: &FetchPlan,
    store: &Arc<FragmentStore>,
    mut make_transport: F,
    progress_tx: Option<&tokio::sync::mpsc::Sender<FetchProgress>>,
) -> Result<FetchSummary, FetchFailed>
where
    T: Transport + Send + 'static,
    F: FnMut(usize) -> Result<T, FetchError>,
{
    if plan.servers.is_empty() || plan.workers == 0 {
        return Err(FetchFailed::EmptyPlan);
    }

    let mut transports = Vec::with_capacity(plan.workers);
    for id in 0..plan.workers {
        let t = make_transport(id).map_err(|source| FetchFailed::Setup { worker: id, source })?;
        transports.push(t);
    }

    let servers: Arc<[Url]> = plan.servers.clone().into();
    let sequence_header: Arc<str> = Arc::from(plan.sequence_header.as_str());
    let started = Instant::now();
    tracing::info!(
        workers = plan.workers,
        servers = servers.len(),
        target = store.target(),
        "starting fragment fetch"
    );

    let handles: Vec<_> = transports
        .into_iter()
        .enumerate()
        .map(|(id, transport)| {
            let worker = Worker {
                id,
                transport,
                servers: Arc::clone(&servers),
                cursor: id % servers.len(),
                store: Arc::clone(store),
                sequence_header: Arc::clone(&sequence_header),
                integrity: plan.integrity,
                retry: plan.retry,
                progress_tx: progress_tx.cloned(),
                started,
                stats: FetchSummary::new(servers.len()),
            };
            std::thread::spawn(move || worker.run())
        })
        .collect();

    let mut summary = FetchSummary::new(servers.len());
    let mut last_error: Option<FetchError> = None;
    for (id, handle) in handles.into_iter().enumerate() {
        match handle.join() {
            Ok(WorkerReport { stats, error }) => {
                summary.merge(&stats);
                if let Some(e) = error {
                    summary.failed_workers += 1;
                    last_error = Some(e);
                }
            }
            Err(e) => {
                tracing::error!(worker = id, "fetch worker panicked: {:?}", e);
                summary.failed_workers += 1;
            }
        }
    }
    summary.elapsed = started.elapsed();

    if store.is_complete() {
        if summary.failed_workers > 0 {
            tracing::warn!(
                failed = summary.failed_workers,
                "some workers gave up, but every fragment arrived"
            );
        }
        tracing::info!(
            requests = summary.requests,
            accepted = summary.accepted,
            duplicates = summary.duplicates,
            elapsed_ms = summary.elapsed.as_millis() as u64,
            "fetch complete"
        );
        return Ok(summary);
    }

    Err(FetchFailed::Exhausted {
        completed: store.completed(),
        target: store.target(),
        missing: store.missing(),
        summary,
        last: last_error,
    })
}
