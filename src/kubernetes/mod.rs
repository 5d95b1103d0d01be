// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Kubernetes access for podcopy
//!
//! Everything the collector needs from the cluster goes through the
//! [`ClusterApi`] trait: listing pods by label selector and running a
//! command inside one container. [`KubeCluster`] is the real implementation;
//! tests use the in-memory fake.

mod client;
mod exec;
#[cfg(test)]
pub mod fake;

pub use client::KubeCluster;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Pod;
use std::sync::{Arc, Mutex, PoisonError};

/// A pod discovered by label selector
///
/// Only the identity and the declared container names are kept; the rest of
/// the pod object is dropped right after listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PodRef {
    pub namespace: String,
    pub name: String,
    /// Container names in declaration order
    pub containers: Vec<String>,
}

impl PodRef {
    pub fn new(
        namespace: impl Into<String>,
        name: impl Into<String>,
        containers: Vec<String>,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            containers,
        }
    }

    /// Build from a listed pod, falling back to the list namespace when the
    /// object carries none
    pub fn from_pod(pod: &Pod, list_namespace: &str) -> Option<Self> {
        let name = pod.metadata.name.clone()?;
        let namespace = pod
            .metadata
            .namespace
            .clone()
            .unwrap_or_else(|| list_namespace.to_string());
        let containers = pod
            .spec
            .as_ref()
            .map(|spec| spec.containers.iter().map(|c| c.name.clone()).collect())
            .unwrap_or_default();
        Some(Self::new(namespace, name, containers))
    }

    /// First declared container, used when no container is requested
    pub fn default_container(&self) -> Option<&str> {
        self.containers.first().map(String::as_str)
    }
}

/// Append-only byte buffer shared between the exec task and its caller
#[derive(Debug, Clone, Default)]
pub struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    pub fn append(&self, bytes: &[u8]) {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend_from_slice(bytes);
    }

    /// Copy of everything appended so far
    pub fn snapshot(&self) -> Vec<u8> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

/// Caller-owned destinations for a command's stdout and stderr.
///
/// Bytes are appended as they arrive, so they are still readable after the
/// exec future is dropped on timeout or cancellation.
#[derive(Debug, Clone, Default)]
pub struct ExecSinks {
    pub stdout: SharedBuffer,
    pub stderr: SharedBuffer,
}

impl ExecSinks {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Why a remote command did not produce a result
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExecError {
    /// The exec channel could not be opened (transport, auth, bad URL).
    /// Nothing was captured.
    #[error("{0}")]
    Connection(String),

    /// The channel was opened but the command failed or the stream broke.
    /// Whatever arrived before the failure is in the sinks.
    #[error("{0}")]
    Stream(String),
}

/// Read-only view of the cluster used by the collector
#[async_trait]
pub trait ClusterApi: Send + Sync {
    /// List pods in `namespace` matching the label `selector`
    async fn list_pods(&self, namespace: &str, selector: &str) -> anyhow::Result<Vec<PodRef>>;

    /// Run `command` in `container` of `pod`, appending stdout and stderr to
    /// `sinks` as they arrive. No stdin is attached and no TTY is allocated.
    async fn exec(
        &self,
        pod: &PodRef,
        container: &str,
        command: &[String],
        sinks: &ExecSinks,
    ) -> Result<(), ExecError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::{Container, PodSpec};
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

    fn pod(name: Option<&str>, namespace: Option<&str>, containers: &[&str]) -> Pod {
        Pod {
            metadata: ObjectMeta {
                name: name.map(String::from),
                namespace: namespace.map(String::from),
                ..Default::default()
            },
            spec: Some(PodSpec {
                containers: containers
                    .iter()
                    .map(|c| Container {
                        name: c.to_string(),
                        ..Default::default()
                    })
                    .collect(),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn test_from_pod_keeps_container_order() {
        let p = pod(Some("web-0"), Some("prod"), &["app", "sidecar"]);
        let r = PodRef::from_pod(&p, "ignored").unwrap();
        assert_eq!(r.namespace, "prod");
        assert_eq!(r.name, "web-0");
        assert_eq!(r.containers, vec!["app", "sidecar"]);
        assert_eq!(r.default_container(), Some("app"));
    }

    #[test]
    fn test_from_pod_falls_back_to_list_namespace() {
        let p = pod(Some("web-0"), None, &["app"]);
        let r = PodRef::from_pod(&p, "default").unwrap();
        assert_eq!(r.namespace, "default");
    }

    #[test]
    fn test_from_pod_without_name_is_skipped() {
        let p = pod(None, Some("prod"), &["app"]);
        assert!(PodRef::from_pod(&p, "prod").is_none());
    }

    #[test]
    fn test_default_container_empty() {
        let r = PodRef::new("ns", "p", vec![]);
        assert_eq!(r.default_container(), None);
    }

    #[test]
    fn test_exec_error_display() {
        let e = ExecError::Connection("connection refused".into());
        assert_eq!(e.to_string(), "connection refused");
        let e = ExecError::Stream("command terminated with non-zero exit code".into());
        assert_eq!(e.to_string(), "command terminated with non-zero exit code");
    }

    #[test]
    fn test_sinks_shared_between_clones() {
        let sinks = ExecSinks::new();
        let writer = sinks.clone();
        writer.stdout.append(b"127.0.0.1 ");
        writer.stdout.append(b"localhost\n");
        writer.stderr.append(b"warn");
        drop(writer);

        assert_eq!(sinks.stdout.snapshot(), b"127.0.0.1 localhost\n");
        assert_eq!(sinks.stderr.snapshot(), b"warn");
    }
}
