//! In-memory [`ClusterApi`] for tests

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use super::{ClusterApi, ExecError, ExecSinks, PodRef};

#[derive(Clone)]
enum Listing {
    Pods(Vec<PodRef>),
    Error(String),
}

/// Bytes are written to the sinks first, then the delay (if any) runs, then
/// the result is returned. A hanging response never returns.
#[derive(Clone, Default)]
struct Response {
    stdout: Vec<u8>,
    stderr: Vec<u8>,
    result: Option<Result<(), ExecError>>,
    delay: Option<Duration>,
}

/// Serves canned pod lists per selector and canned exec results per pod name.
/// Records every exec call as `(pod, container, command)`.
#[derive(Default)]
pub struct FakeCluster {
    listings: HashMap<String, Listing>,
    list_delays: HashMap<String, Duration>,
    responses: HashMap<String, Response>,
    calls: Mutex<Vec<(String, String, Vec<String>)>>,
}

impl FakeCluster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pods(mut self, selector: &str, pods: Vec<PodRef>) -> Self {
        self.listings
            .insert(selector.to_string(), Listing::Pods(pods));
        self
    }

    pub fn with_selector_error(mut self, selector: &str, message: &str) -> Self {
        self.listings
            .insert(selector.to_string(), Listing::Error(message.to_string()));
        self
    }

    /// Make listing `selector` take `delay` before answering
    pub fn with_list_delay(mut self, selector: &str, delay: Duration) -> Self {
        self.list_delays.insert(selector.to_string(), delay);
        self
    }

    pub fn with_output(mut self, pod: &str, stdout: &[u8]) -> Self {
        self.responses.insert(
            pod.to_string(),
            Response {
                stdout: stdout.to_vec(),
                result: Some(Ok(())),
                ..Default::default()
            },
        );
        self
    }

    pub fn with_exec_error(mut self, pod: &str, error: ExecError) -> Self {
        self.responses.insert(
            pod.to_string(),
            Response {
                result: Some(Err(error)),
                ..Default::default()
            },
        );
        self
    }

    /// Command writes some output, then fails with `message`
    pub fn with_stream_error(mut self, pod: &str, stdout: &[u8], stderr: &[u8], message: &str) -> Self {
        self.responses.insert(
            pod.to_string(),
            Response {
                stdout: stdout.to_vec(),
                stderr: stderr.to_vec(),
                result: Some(Err(ExecError::Stream(message.to_string()))),
                delay: None,
            },
        );
        self
    }

    /// Command writes some output and then never finishes
    pub fn with_hang(mut self, pod: &str, stdout: &[u8], stderr: &[u8]) -> Self {
        self.responses.insert(
            pod.to_string(),
            Response {
                stdout: stdout.to_vec(),
                stderr: stderr.to_vec(),
                result: None,
                delay: None,
            },
        );
        self
    }

    /// Make exec against `pod` take `delay` before answering
    pub fn with_delay(mut self, pod: &str, delay: Duration) -> Self {
        if let Some(r) = self.responses.get_mut(pod) {
            r.delay = Some(delay);
        }
        self
    }

    pub fn calls(&self) -> Vec<(String, String, Vec<String>)> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

pub fn pod(namespace: &str, name: &str, containers: &[&str]) -> PodRef {
    PodRef::new(
        namespace,
        name,
        containers.iter().map(|c| c.to_string()).collect(),
    )
}

#[async_trait]
impl ClusterApi for FakeCluster {
    async fn list_pods(&self, _namespace: &str, selector: &str) -> Result<Vec<PodRef>> {
        if let Some(delay) = self.list_delays.get(selector) {
            tokio::time::sleep(*delay).await;
        }
        match self.listings.get(selector) {
            Some(Listing::Pods(pods)) => Ok(pods.clone()),
            Some(Listing::Error(msg)) => Err(anyhow!("{}", msg)),
            None => Ok(Vec::new()),
        }
    }

    async fn exec(
        &self,
        pod: &PodRef,
        container: &str,
        command: &[String],
        sinks: &ExecSinks,
    ) -> Result<(), ExecError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push((pod.name.clone(), container.to_string(), command.to_vec()));
        }
        let Some(response) = self.responses.get(&pod.name).cloned() else {
            return Err(ExecError::Connection(format!(
                "pods \"{}\" not found",
                pod.name
            )));
        };
        sinks.stdout.append(&response.stdout);
        sinks.stderr.append(&response.stderr);
        if let Some(delay) = response.delay {
            tokio::time::sleep(delay).await;
        }
        match response.result {
            Some(result) => result,
            None => std::future::pending().await,
        }
    }
}
