// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Configuration for podcopy
//!
//! All podcopy data is stored under ~/.podcopy/:
//! - ~/.podcopy/config.json - defaults for timeouts, concurrency and redaction
//! - ~/.podcopy/log/ - log files
//!
//! Command line flags override anything read from here.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::collect::{CollectionRequest, RunLimits};

/// Get the base podcopy directory (~/.podcopy/)
pub fn base_dir() -> Result<PathBuf> {
    dirs::home_dir()
        .map(|p| p.join(".podcopy"))
        .context("Could not determine home directory")
}

/// podcopy configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    /// Kubeconfig context; None infers from the environment
    pub context: Option<String>,
    /// Per-pod fetch timeout in seconds, 0 disables
    pub fetch_timeout_secs: u64,
    /// Whole-run timeout in seconds, 0 disables
    pub run_timeout_secs: u64,
    /// Pods fetched at the same time
    pub max_concurrent_fetches: usize,
    /// Regular expressions whose matches are hidden when redaction is on
    pub redact_patterns: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            context: None,
            fetch_timeout_secs: 60,
            run_timeout_secs: 600,
            max_concurrent_fetches: 1,
            redact_patterns: Vec::new(),
        }
    }
}

impl Config {
    /// Load config from disk, or return default if not found
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            let config: Config = serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
            Ok(config)
        } else {
            Ok(Config::default())
        }
    }

    /// Get the config file path (~/.podcopy/config.json)
    pub fn config_path() -> Result<PathBuf> {
        Ok(base_dir()?.join("config.json"))
    }

    pub fn run_limits(&self) -> RunLimits {
        RunLimits {
            fetch_timeout: secs(self.fetch_timeout_secs),
            run_timeout: secs(self.run_timeout_secs),
            max_concurrent_fetches: self.max_concurrent_fetches.max(1),
        }
    }
}

fn secs(value: u64) -> Option<Duration> {
    (value > 0).then(|| Duration::from_secs(value))
}

/// Read a collector spec file. YAML is tried for anything that is not
/// `.json`; YAML also accepts JSON input.
pub fn load_request(path: &Path) -> Result<CollectionRequest> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read collector spec: {}", path.display()))?;
    let is_json = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    let request = if is_json {
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse collector spec: {}", path.display()))?
    } else {
        serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse collector spec: {}", path.display()))?
    };
    Ok(request)
}
