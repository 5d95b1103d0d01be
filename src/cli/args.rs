// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

use anyhow::{Result, anyhow};
use clap::Parser;
use std::path::PathBuf;

use crate::collect::CollectionRequest;
use crate::config::{self, Config};

#[derive(Parser, Debug)]
#[command(name = "podcopy")]
#[command(
    author,
    version,
    about = "Copy a file out of every pod matching a label selector"
)]
pub struct Args {
    /// Collector spec file (YAML or JSON) describing what to copy
    #[arg(short, long, value_name = "FILE")]
    pub spec: Option<PathBuf>,

    /// Namespace to look for pods in
    #[arg(short, long)]
    pub namespace: Option<String>,

    /// Label selector; may be given more than once
    #[arg(short = 'l', long = "selector", value_name = "SELECTOR")]
    pub selectors: Vec<String>,

    /// Container to read from (default: first container of each pod)
    #[arg(short, long)]
    pub container: Option<String>,

    /// Path of the file inside the container
    #[arg(short, long, value_name = "PATH")]
    pub path: Option<String>,

    /// Collector name, used to name the selector error file
    #[arg(long)]
    pub name: Option<String>,

    /// Kubernetes context to use
    #[arg(long, value_name = "CONTEXT")]
    pub context: Option<String>,

    /// Per-pod timeout in seconds (0 disables)
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Timeout for the whole run in seconds (0 disables)
    #[arg(long, value_name = "SECS")]
    pub run_timeout: Option<u64>,

    /// Number of pods to read from at the same time
    #[arg(long, value_name = "N")]
    pub concurrency: Option<usize>,

    /// Hide matches of the configured redaction patterns in copied files
    #[arg(long)]
    pub redact: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

/// Default namespace when neither the spec file nor the flags name one
const DEFAULT_NAMESPACE: &str = "default";

impl Args {
    /// Build the request: spec file first, flags on top
    pub fn request(&self) -> Result<CollectionRequest> {
        let mut request = match &self.spec {
            Some(path) => config::load_request(path)?,
            None => CollectionRequest::new(DEFAULT_NAMESPACE, String::new()),
        };

        if let Some(ns) = &self.namespace {
            request.namespace = ns.clone();
        }
        if request.namespace.is_empty() {
            request.namespace = DEFAULT_NAMESPACE.to_string();
        }
        if !self.selectors.is_empty() {
            request.selectors.clear();
            for selector in &self.selectors {
                request = request.with_selector(selector.as_str());
            }
        }
        if let Some(container) = &self.container {
            request = request.with_container(container.as_str());
        }
        if let Some(path) = &self.path {
            request.container_path = path.clone();
        }
        if let Some(name) = &self.name {
            request = request.with_collector_name(name.as_str());
        }

        if request.container_path.is_empty() {
            return Err(anyhow!(
                "No file to copy: pass --path or set containerPath in the spec file"
            ));
        }

        Ok(request)
    }

    /// Apply flag overrides to the loaded config
    pub fn apply_to(&self, config: &mut Config) {
        if let Some(ctx) = &self.context {
            config.context = Some(ctx.clone());
        }
        if let Some(t) = self.timeout {
            config.fetch_timeout_secs = t;
        }
        if let Some(t) = self.run_timeout {
            config.run_timeout_secs = t;
        }
        if let Some(n) = self.concurrency {
            config.max_concurrent_fetches = n;
        }
    }
}
