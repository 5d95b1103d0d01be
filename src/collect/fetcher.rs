// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::bundle::{FetchFailure, FetchOutcome};
use crate::kubernetes::{ClusterApi, ExecSinks, PodRef};

/// Reads one file from one pod with `cat`
#[derive(Clone)]
pub struct Fetcher {
    cluster: Arc<dyn ClusterApi>,
    /// Per-pod limit; None waits as long as the run allows
    timeout: Option<Duration>,
}

impl Fetcher {
    pub fn new(cluster: Arc<dyn ClusterApi>, timeout: Option<Duration>) -> Self {
        Self { cluster, timeout }
    }

    /// Fetch `path` from `pod`. Never fails as a call: every problem, including
    /// timeout and cancellation, comes back as [`FetchOutcome::Failure`].
    ///
    /// Dropping the in-flight exec on timeout or cancellation closes its
    /// channel. Output captured up to that point is kept in the failure.
    pub async fn fetch(
        &self,
        pod: &PodRef,
        container_override: Option<&str>,
        path: &str,
        run_deadline: Option<Instant>,
        cancel: &CancellationToken,
    ) -> FetchOutcome {
        let Some(container) = effective_container(pod, container_override) else {
            return FetchOutcome::Failure(FetchFailure::connection(format!(
                "pod {}/{} has no containers",
                pod.namespace, pod.name
            )));
        };

        let command = read_command(path);
        let deadline = self.deadline(run_deadline);

        debug!(
            namespace = %pod.namespace,
            pod = %pod.name,
            container = %container,
            path = %path,
            "Fetching file"
        );

        let sinks = ExecSinks::new();
        let exec = self.cluster.exec(pod, container, &command, &sinks);
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                warn!(pod = %pod.name, "Fetch cancelled");
                return FetchOutcome::Failure(FetchFailure::captured(&sinks, "collection cancelled"));
            }
            result = async move {
                match deadline {
                    Some(at) => tokio::time::timeout_at(at, exec).await.ok(),
                    None => Some(exec.await),
                }
            } => result,
        };

        match result {
            Some(Ok(())) => {
                let stderr = sinks.stderr.snapshot();
                if !stderr.is_empty() {
                    debug!(
                        pod = %pod.name,
                        stderr = %String::from_utf8_lossy(&stderr),
                        "Command succeeded with stderr output"
                    );
                }
                FetchOutcome::Success {
                    bytes: sinks.stdout.snapshot(),
                }
            }
            Some(Err(e)) => {
                warn!(
                    namespace = %pod.namespace,
                    pod = %pod.name,
                    container = %container,
                    error = %e,
                    "Fetch failed"
                );
                FetchOutcome::Failure(FetchFailure::from_exec(e, &sinks))
            }
            None => {
                warn!(
                    namespace = %pod.namespace,
                    pod = %pod.name,
                    "Fetch timed out"
                );
                FetchOutcome::Failure(FetchFailure::captured(
                    &sinks,
                    format!("timed out reading {} from container {}", path, container),
                ))
            }
        }
    }

    /// The earlier of the per-pod timeout and the run deadline
    fn deadline(&self, run_deadline: Option<Instant>) -> Option<Instant> {
        let own = self.timeout.map(|t| Instant::now() + t);
        match (own, run_deadline) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }
}

/// The requested container, or the pod's first one when none is requested
fn effective_container<'a>(pod: &'a PodRef, container_override: Option<&'a str>) -> Option<&'a str> {
    match container_override {
        Some(c) if !c.is_empty() => Some(c),
        _ => pod.default_container(),
    }
}

fn read_command(path: &str) -> Vec<String> {
    vec!["cat".to_string(), path.to_string()]
}
