// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Progress reporting for a collection run
//!
//! The aggregator reports what it is doing through a broadcast channel; the
//! CLI turns those updates into a spinner on stderr.

use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::broadcast;

/// Create a spinner with consistent styling
pub fn create_spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
            .template("{spinner:.cyan} {msg} {elapsed:.dim}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(80));
    pb
}

/// Progress update message
#[derive(Clone, Debug)]
pub enum ProgressUpdate {
    /// Listing pods for the request's selectors
    Resolving { namespace: String },
    /// Selectors resolved to this many distinct pods
    Resolved { pods: usize },
    /// Starting to read the file from a pod
    Fetching { pod: String },
    /// Finished with a pod
    Fetched {
        pod: String,
        ok: bool,
        elapsed_ms: u64,
    },
}

/// Progress reporter shared by the aggregator and the CLI
pub struct ProgressReporter {
    sender: broadcast::Sender<ProgressUpdate>,
    pods_done: AtomicUsize,
    pods_total: AtomicUsize,
}

impl ProgressReporter {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(100);
        Self {
            sender,
            pods_done: AtomicUsize::new(0),
            pods_total: AtomicUsize::new(0),
        }
    }

    /// Subscribe to progress updates
    pub fn subscribe(&self) -> broadcast::Receiver<ProgressUpdate> {
        self.sender.subscribe()
    }

    pub fn resolving(&self, namespace: &str) {
        let _ = self.sender.send(ProgressUpdate::Resolving {
            namespace: namespace.to_string(),
        });
    }

    /// Report resolution done; resets the counters for the fetch phase
    pub fn resolved(&self, pods: usize) {
        self.pods_done.store(0, Ordering::SeqCst);
        self.pods_total.store(pods, Ordering::SeqCst);
        let _ = self.sender.send(ProgressUpdate::Resolved { pods });
    }

    pub fn fetching(&self, pod: &str) {
        let _ = self.sender.send(ProgressUpdate::Fetching {
            pod: pod.to_string(),
        });
    }

    pub fn fetched(&self, pod: &str, ok: bool, elapsed_ms: u64) {
        self.pods_done.fetch_add(1, Ordering::SeqCst);
        let _ = self.sender.send(ProgressUpdate::Fetched {
            pod: pod.to_string(),
            ok,
            elapsed_ms,
        });
    }

    /// Get current progress (done/total)
    pub fn progress(&self) -> (usize, usize) {
        (
            self.pods_done.load(Ordering::SeqCst),
            self.pods_total.load(Ordering::SeqCst),
        )
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

/// Thread-safe handle to progress reporter
pub type ProgressHandle = Arc<ProgressReporter>;

/// Create a new progress reporter handle
pub fn create_progress_handle() -> ProgressHandle {
    Arc::new(ProgressReporter::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_reporter_new() {
        let reporter = ProgressReporter::new();
        assert_eq!(reporter.progress(), (0, 0));
    }

    #[test]
    fn test_fetched_increments() {
        let reporter = ProgressReporter::new();
        reporter.resolved(3);
        assert_eq!(reporter.progress(), (0, 3));

        reporter.fetched("web-0", true, 10);
        assert_eq!(reporter.progress(), (1, 3));

        reporter.fetched("web-1", false, 20);
        assert_eq!(reporter.progress(), (2, 3));
    }

    #[test]
    fn test_resolved_resets_counters() {
        let reporter = ProgressReporter::new();
        reporter.resolved(2);
        reporter.fetched("a", true, 1);
        reporter.fetched("b", true, 1);
        assert_eq!(reporter.progress(), (2, 2));

        reporter.resolved(4);
        assert_eq!(reporter.progress(), (0, 4));
    }

    #[test]
    fn test_subscribe_receives_updates_in_order() {
        let reporter = ProgressReporter::new();
        let mut receiver = reporter.subscribe();

        reporter.resolving("prod");
        reporter.resolved(1);
        reporter.fetching("web-0");
        reporter.fetched("web-0", true, 5);

        let updates: Vec<_> = std::iter::from_fn(|| receiver.try_recv().ok()).collect();
        assert_eq!(updates.len(), 4);
        assert!(matches!(&updates[0], ProgressUpdate::Resolving { namespace } if namespace == "prod"));
        assert!(matches!(updates[1], ProgressUpdate::Resolved { pods: 1 }));
        assert!(matches!(&updates[2], ProgressUpdate::Fetching { pod } if pod == "web-0"));
        assert!(matches!(updates[3], ProgressUpdate::Fetched { ok: true, .. }));
    }

    #[test]
    fn test_send_without_subscribers_is_harmless() {
        let reporter = create_progress_handle();
        reporter.resolving("prod");
        reporter.fetched("web-0", false, 0);
        assert_eq!(reporter.progress(), (1, 0));
    }
}
