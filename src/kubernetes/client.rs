// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Pod;
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Api, Client, Config, api::ListParams};
use std::time::Duration;
use tracing::{debug, info};

use super::{ClusterApi, ExecError, ExecSinks, PodRef};

/// Timeout for connecting to K8s API
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Timeout for reading K8s API responses
const READ_TIMEOUT: Duration = Duration::from_secs(30);

/// Page size for paginated list requests
const PAGE_SIZE: u32 = 500;

/// Single client handle to one cluster
///
/// Built once per run and shared by the resolver and the fetcher, so the
/// kubeconfig is parsed exactly once.
#[derive(Clone)]
pub struct KubeCluster {
    client: Client,
    context: String,
}

impl KubeCluster {
    /// Connect using the named kubeconfig context, or infer the config
    /// (current kubeconfig context, then in-cluster service account) when
    /// `context` is None
    pub async fn connect(context: Option<&str>) -> Result<Self> {
        let (mut config, context_name) = match context {
            Some(ctx) => {
                let kubeconfig = Kubeconfig::read().context("Failed to read kubeconfig")?;
                if !kubeconfig.contexts.iter().any(|c| c.name == ctx) {
                    return Err(anyhow!("Context '{}' not found in kubeconfig", ctx));
                }
                let config = Config::from_custom_kubeconfig(
                    kubeconfig,
                    &KubeConfigOptions {
                        context: Some(ctx.to_string()),
                        ..Default::default()
                    },
                )
                .await
                .with_context(|| format!("Failed to load kubeconfig for context '{}'", ctx))?;
                (config, ctx.to_string())
            }
            None => {
                let config = Config::infer()
                    .await
                    .context("Failed to infer Kubernetes config")?;
                (config, "inferred".to_string())
            }
        };

        config.connect_timeout = Some(CONNECT_TIMEOUT);
        config.read_timeout = Some(READ_TIMEOUT);

        let client = Client::try_from(config)
            .with_context(|| format!("Failed to create client for context '{}'", context_name))?;

        info!(context = %context_name, "Kubernetes client ready");

        Ok(Self {
            client,
            context: context_name,
        })
    }

    pub fn context(&self) -> &str {
        &self.context
    }

    /// List all pages of pods matching `selector`, following continue tokens
    async fn list_all_pages(&self, namespace: &str, selector: &str) -> Result<Vec<Pod>> {
        let api: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        let base_params = ListParams::default().labels(selector);

        let mut all_items: Vec<Pod> = Vec::new();
        let mut continue_token: Option<String> = None;
        let mut page_count = 0u32;

        loop {
            let mut params = base_params.clone().limit(PAGE_SIZE);
            if let Some(ref token) = continue_token {
                params = params.continue_token(token);
            }

            let list = api
                .list(&params)
                .await
                .map_err(|e| anyhow!("K8s API error: {}", e))?;

            all_items.extend(list.items);
            page_count += 1;

            match list.metadata.continue_ {
                Some(token) if !token.is_empty() => {
                    debug!(
                        namespace = %namespace,
                        selector = %selector,
                        page = page_count,
                        total_so_far = all_items.len(),
                        "Fetched page, continuing"
                    );
                    continue_token = Some(token);
                }
                _ => break,
            }
        }

        Ok(all_items)
    }
}

#[async_trait]
impl ClusterApi for KubeCluster {
    async fn list_pods(&self, namespace: &str, selector: &str) -> Result<Vec<PodRef>> {
        let pods = self.list_all_pages(namespace, selector).await?;

        debug!(
            context = %self.context,
            namespace = %namespace,
            selector = %selector,
            pods = pods.len(),
            "Listed pods"
        );

        Ok(pods
            .iter()
            .filter_map(|pod| PodRef::from_pod(pod, namespace))
            .collect())
    }

    async fn exec(
        &self,
        pod: &PodRef,
        container: &str,
        command: &[String],
        sinks: &ExecSinks,
    ) -> Result<(), ExecError> {
        super::exec::run(self.client.clone(), pod, container, command, sinks).await
    }
}
