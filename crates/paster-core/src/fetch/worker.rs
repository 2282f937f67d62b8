//! One fetch worker: request, classify, validate, insert, repeat.

use ::url::Url;
use std::sync::Arc;
use std::time::Instant;

use crate::band::{self, BandError};
use crate::config::IntegrityPolicy;
use crate::retry::{classify, run_with_retry, ErrorKind, FetchError, RetryPolicy};
use crate::store::{Fragment, FragmentStore, InsertOutcome};
use crate::transport::Transport;

use super::sequence::parse_sequence;
use super::{FetchProgress, FetchSummary};

/// What a successful request turned into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Accepted,
    Duplicate,
    Discarded,
    /// The store was already complete; nothing was requested.
    Done,
}

pub(super) struct WorkerReport {
    pub(super) stats: FetchSummary,
    /// Set when the worker gave up on its retry budget.
    pub(super) error: Option<FetchError>,
}

/// Per-worker state. The transport and counters are owned here and never shared.
pub(super) struct Worker<T> {
    pub(super) id: usize,
    pub(super) transport: T,
    pub(super) servers: Arc<[Url]>,
    /// Index into `servers` for the next request; advances on failure.
    pub(super) cursor: usize,
    pub(super) store: Arc<FragmentStore>,
    pub(super) sequence_header: Arc<str>,
    pub(super) integrity: IntegrityPolicy,
    pub(super) retry: RetryPolicy,
    pub(super) progress_tx: Option<tokio::sync::mpsc::Sender<FetchProgress>>,
    pub(super) started: Instant,
    pub(super) stats: FetchSummary,
}

/// Full check run on arrival, outside the store lock: container, CRCs under
/// `policy`, layout, and an inflate of the data stream to its exact size.
/// Returns whether the fragment must be flagged (accepted under the warn policy).
fn validate_fragment(body: &[u8], policy: IntegrityPolicy) -> Result<bool, BandError> {
    band::extract(body, policy).map(|b| b.flagged)
}

impl<T: Transport> Worker<T> {
    pub(super) fn run(mut self) -> WorkerReport {
        let id = self.id;
        tracing::debug!(worker = id, server = %self.servers[self.cursor], "worker started");
        let retry = self.retry;
        loop {
            let res = run_with_retry(
                &retry,
                || self.attempt(),
                |e, attempt, delay| {
                    if classify(e) == ErrorKind::Malformed {
                        tracing::debug!(worker = id, attempt, "discarded response: {}", e);
                    } else {
                        tracing::warn!(
                            worker = id,
                            attempt,
                            backoff_ms = delay.as_millis() as u64,
                            "request failed: {}",
                            e
                        );
                    }
                },
            );
            match res {
                Ok(Outcome::Done) => break,
                Ok(_) => continue,
                Err(e) => {
                    tracing::error!(worker = id, "giving up: {}", e);
                    return WorkerReport {
                        stats: self.stats,
                        error: Some(e),
                    };
                }
            }
        }
        tracing::debug!(worker = id, requests = self.stats.requests, "worker finished");
        WorkerReport {
            stats: self.stats,
            error: None,
        }
    }

    /// One loop iteration. On failure the worker fails over to the next server.
    fn attempt(&mut self) -> Result<Outcome, FetchError> {
        if self.store.is_complete() {
            return Ok(Outcome::Done);
        }
        let server = self.cursor % self.servers.len();
        match self.request(server) {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                self.stats.record_error(&e);
                self.cursor = (server + 1) % self.servers.len();
                Err(e)
            }
        }
    }

    fn request(&mut self, server: usize) -> Result<Outcome, FetchError> {
        self.stats.requests += 1;
        let response = self.transport.get(&self.servers[server])?;
        if !(200..300).contains(&response.status) {
            return Err(FetchError::Http(response.status));
        }

        let index = parse_sequence(response.header(&self.sequence_header))
            .ok_or(FetchError::MissingSequence)?;
        if index as usize >= self.store.target() {
            tracing::debug!(worker = self.id, index, "sequence index outside image, discarding");
            self.stats.discarded += 1;
            return Ok(Outcome::Discarded);
        }
        if self.store.contains(index) {
            self.stats.duplicates += 1;
            return Ok(Outcome::Duplicate);
        }

        let flagged = validate_fragment(&response.body, self.integrity)
            .map_err(|source| FetchError::Malformed { index, source })?;
        let size = response.body.len();
        let fragment = Fragment {
            index,
            bytes: response.body,
            flagged,
        };

        match self.store.insert(fragment) {
            InsertOutcome::Inserted { completed } => {
                self.stats.accepted += 1;
                self.stats.per_server[server] += 1;
                tracing::info!(
                    worker = self.id,
                    index,
                    size,
                    server = %self.servers[server],
                    completed,
                    target = self.store.target(),
                    "received fragment"
                );
                if let Some(tx) = &self.progress_tx {
                    let _ = tx.try_send(FetchProgress {
                        completed,
                        target: self.store.target(),
                        elapsed_secs: self.started.elapsed().as_secs_f64(),
                    });
                }
                Ok(Outcome::Accepted)
            }
            // Another worker won the race between `contains` and `insert`.
            InsertOutcome::Duplicate => {
                self.stats.duplicates += 1;
                Ok(Outcome::Duplicate)
            }
            InsertOutcome::OutOfRange => {
                self.stats.discarded += 1;
                Ok(Outcome::Discarded)
            }
        }
    }
}
