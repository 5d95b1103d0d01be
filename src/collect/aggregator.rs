// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

use futures::{StreamExt, stream};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant as StdInstant};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::bundle::{FetchOutcome, ResultBundle};
use super::{CollectionRequest, Fetcher, Resolver};
use crate::error::CollectResult;
use crate::kubernetes::{ClusterApi, PodRef};
use crate::progress::ProgressHandle;

/// Limits applied to one collection run
#[derive(Debug, Clone, Copy)]
pub struct RunLimits {
    /// Per-pod fetch timeout
    pub fetch_timeout: Option<Duration>,
    /// Deadline for the whole run, shared by every pod
    pub run_timeout: Option<Duration>,
    /// Pods fetched at the same time; 1 fetches sequentially
    pub max_concurrent_fetches: usize,
}

impl Default for RunLimits {
    fn default() -> Self {
        Self {
            fetch_timeout: Some(Duration::from_secs(60)),
            run_timeout: Some(Duration::from_secs(600)),
            max_concurrent_fetches: 1,
        }
    }
}

/// Drives resolution and fetching and merges everything into one bundle
pub struct Aggregator {
    resolver: Resolver,
    fetcher: Fetcher,
    limits: RunLimits,
    progress: ProgressHandle,
}

impl Aggregator {
    pub fn new(cluster: Arc<dyn ClusterApi>, limits: RunLimits, progress: ProgressHandle) -> Self {
        Self {
            resolver: Resolver::new(Arc::clone(&cluster)),
            fetcher: Fetcher::new(cluster, limits.fetch_timeout),
            limits,
            progress,
        }
    }

    /// Run one collection.
    ///
    /// Errors only on an invalid request or when an error payload cannot be
    /// encoded. Selector and pod failures are recorded in the bundle.
    pub async fn collect(
        &self,
        request: &CollectionRequest,
        cancel: &CancellationToken,
    ) -> CollectResult<ResultBundle> {
        request.validate()?;

        let started = StdInstant::now();
        let deadline = self.limits.run_timeout.map(|t| Instant::now() + t);
        let mut bundle = ResultBundle::new();

        self.progress.resolving(&request.namespace);
        let resolution = self
            .resolver
            .resolve(&request.namespace, &request.selectors, deadline, cancel)
            .await;

        bundle.record_selector_errors(request.selector_errors_key(), &resolution.selector_errors)?;

        let pods = unique_pods(resolution.pods);
        self.progress.resolved(pods.len());

        info!(
            namespace = %request.namespace,
            selectors = request.selectors.len(),
            selector_errors = resolution.selector_errors.len(),
            pods = pods.len(),
            path = %request.container_path,
            "Collecting file from pods"
        );

        let container = request.container_name.as_deref();
        let path = request.container_path.as_str();

        let mut outcomes = stream::iter(pods)
            .map(|pod| async move {
                self.progress.fetching(&pod.name);
                let start = StdInstant::now();
                let outcome = self
                    .fetcher
                    .fetch(&pod, container, path, deadline, cancel)
                    .await;
                let ok = matches!(outcome, FetchOutcome::Success { .. });
                self.progress
                    .fetched(&pod.name, ok, start.elapsed().as_millis() as u64);
                (pod, outcome)
            })
            .buffer_unordered(self.limits.max_concurrent_fetches.max(1));

        // Single merge point: only this loop touches the bundle
        let mut failed = 0usize;
        while let Some((pod, outcome)) = outcomes.next().await {
            if matches!(outcome, FetchOutcome::Failure(_)) {
                failed += 1;
            }
            debug!(namespace = %pod.namespace, pod = %pod.name, "Merging outcome");
            bundle.record(&pod, path, outcome)?;
        }

        info!(
            files = bundle.files.len(),
            failed_pods = failed,
            errors = bundle.errors.len(),
            elapsed_ms = started.elapsed().as_millis(),
            "Collection complete"
        );

        Ok(bundle)
    }
}

/// Drop repeated pods (same namespace and name), keeping first-seen order
fn unique_pods(pods: Vec<PodRef>) -> Vec<PodRef> {
    let mut seen = HashSet::new();
    pods.into_iter()
        .filter(|p| seen.insert((p.namespace.clone(), p.name.clone())))
        .collect()
}
