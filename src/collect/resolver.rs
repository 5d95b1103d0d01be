// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::kubernetes::{ClusterApi, PodRef};

/// Pods found for a list of selectors, plus the selectors that failed
#[derive(Debug, Default)]
pub struct Resolution {
    /// Union of all selector results, duplicates included
    pub pods: Vec<PodRef>,
    /// Selector text -> error message
    pub selector_errors: BTreeMap<String, String>,
}

/// Turns label selectors into pods
#[derive(Clone)]
pub struct Resolver {
    cluster: Arc<dyn ClusterApi>,
}

impl Resolver {
    pub fn new(cluster: Arc<dyn ClusterApi>) -> Self {
        Self { cluster }
    }

    /// List pods for each selector independently. A failing selector is
    /// recorded and does not stop the others. Once `cancel` fires, the listing
    /// in flight and every remaining selector are recorded as cancelled.
    pub async fn resolve(
        &self,
        namespace: &str,
        selectors: &[String],
        deadline: Option<Instant>,
        cancel: &CancellationToken,
    ) -> Resolution {
        let mut resolution = Resolution::default();

        for selector in selectors {
            let listing = self.cluster.list_pods(namespace, selector);
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(anyhow::anyhow!("collection cancelled")),
                result = async move {
                    match deadline {
                        Some(at) => match tokio::time::timeout_at(at, listing).await {
                            Ok(r) => r,
                            Err(_) => Err(anyhow::anyhow!("run deadline exceeded while listing pods")),
                        },
                        None => listing.await,
                    }
                } => result,
            };

            match result {
                Ok(pods) => {
                    debug!(
                        namespace = %namespace,
                        selector = %selector,
                        pods = pods.len(),
                        "Selector resolved"
                    );
                    resolution.pods.extend(pods);
                }
                Err(e) => {
                    warn!(
                        namespace = %namespace,
                        selector = %selector,
                        error = %e,
                        "Selector failed"
                    );
                    resolution
                        .selector_errors
                        .insert(selector.clone(), e.to_string());
                }
            }
        }

        resolution
    }
}
