// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Remote command execution over the pod `exec` subresource
//!
//! Opens a websocket exec channel with stdout and stderr attached (no stdin,
//! no TTY), drains both streams concurrently and interprets the final status
//! message sent by the API server.

use k8s_openapi::api::core::v1::Pod;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Status;
use kube::api::AttachParams;
use kube::{Api, Client};
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{debug, trace};

use super::{ExecError, ExecSinks, PodRef, SharedBuffer};

/// Status value the API server reports for a command that exited 0
const STATUS_SUCCESS: &str = "Success";

/// Cause reason carrying the exit code of a failed command
const CAUSE_EXIT_CODE: &str = "ExitCode";

/// The server always ends a v4 exec session with a status frame; its absence
/// means the channel broke and the output may be cut short
const NO_STATUS: &str = "exec channel closed without status";

const READ_CHUNK: usize = 8 * 1024;

pub(super) async fn run(
    client: Client,
    pod: &PodRef,
    container: &str,
    command: &[String],
    sinks: &ExecSinks,
) -> Result<(), ExecError> {
    let api: Api<Pod> = Api::namespaced(client, &pod.namespace);
    let params = AttachParams::default()
        .container(container)
        .stdin(false)
        .stdout(true)
        .stderr(true);

    debug!(
        namespace = %pod.namespace,
        pod = %pod.name,
        container = %container,
        command = ?command,
        "Opening exec channel"
    );

    let mut attached = api
        .exec(&pod.name, command.to_vec(), &params)
        .await
        .map_err(|e| ExecError::Connection(e.to_string()))?;

    let stdout = attached.stdout();
    let stderr = attached.stderr();
    let status = attached.take_status();

    let (stdout_err, stderr_err, status) = tokio::join!(
        drain(stdout, &sinks.stdout),
        drain(stderr, &sinks.stderr),
        async move {
            match status {
                Some(fut) => fut.await,
                None => None,
            }
        }
    );

    trace!(pod = %pod.name, "Exec streams drained");

    let join_result = attached.join().await;

    if let Some(e) = stdout_err.or(stderr_err) {
        return Err(ExecError::Stream(format!("error reading exec stream: {}", e)));
    }

    if let Err(e) = join_result {
        return Err(ExecError::Stream(e.to_string()));
    }

    match failure_message(status.as_ref()) {
        Some(message) => Err(ExecError::Stream(message)),
        None => Ok(()),
    }
}

/// Copy a stream into `sink` chunk by chunk until EOF or the first error
async fn drain<R: AsyncRead + Unpin>(
    reader: Option<R>,
    sink: &SharedBuffer,
) -> Option<std::io::Error> {
    let mut reader = reader?;
    let mut chunk = vec![0u8; READ_CHUNK];
    loop {
        match reader.read(&mut chunk).await {
            Ok(0) => return None,
            Ok(n) => sink.append(&chunk[..n]),
            Err(e) => return Some(e),
        }
    }
}

/// Describe a non-success exec status, or None if the command succeeded
fn failure_message(status: Option<&Status>) -> Option<String> {
    let Some(status) = status else {
        return Some(NO_STATUS.to_string());
    };
    if status.status.as_deref() == Some(STATUS_SUCCESS) {
        return None;
    }

    let exit_code = status
        .details
        .as_ref()
        .and_then(|d| d.causes.as_ref())
        .and_then(|causes| {
            causes
                .iter()
                .find(|c| c.reason.as_deref() == Some(CAUSE_EXIT_CODE))
        })
        .and_then(|c| c.message.clone());

    Some(match (exit_code, &status.message) {
        (Some(code), _) => format!("command terminated with exit code {}", code),
        (None, Some(msg)) if !msg.is_empty() => msg.clone(),
        _ => format!(
            "command failed: {}",
            status.reason.as_deref().unwrap_or("unknown reason")
        ),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::{StatusCause, StatusDetails};
    use std::pin::Pin;
    use std::task::{Context, Poll};
    use tokio::io::ReadBuf;

    fn status(value: &str, message: Option<&str>, exit_code: Option<&str>) -> Status {
        Status {
            status: Some(value.to_string()),
            message: message.map(String::from),
            reason: Some("NonZeroExitCode".to_string()),
            details: exit_code.map(|code| StatusDetails {
                causes: Some(vec![StatusCause {
                    reason: Some(CAUSE_EXIT_CODE.to_string()),
                    message: Some(code.to_string()),
                    ..Default::default()
                }]),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn test_success_status_has_no_failure() {
        assert_eq!(failure_message(Some(&status("Success", None, None))), None);
    }

    #[test]
    fn test_exit_code_is_reported() {
        let s = status("Failure", Some("error executing command"), Some("1"));
        assert_eq!(
            failure_message(Some(&s)).as_deref(),
            Some("command terminated with exit code 1")
        );
    }

    #[test]
    fn test_message_used_without_exit_code() {
        let s = status("Failure", Some("container not found (\"db\")"), None);
        assert_eq!(
            failure_message(Some(&s)).as_deref(),
            Some("container not found (\"db\")")
        );
    }

    #[test]
    fn test_reason_used_as_last_resort() {
        let s = status("Failure", None, None);
        assert_eq!(
            failure_message(Some(&s)).as_deref(),
            Some("command failed: NonZeroExitCode")
        );
    }

    #[test]
    fn test_missing_status_is_failure() {
        assert_eq!(
            failure_message(None).as_deref(),
            Some("exec channel closed without status")
        );
    }

    #[tokio::test]
    async fn test_drain_missing_stream() {
        let sink = SharedBuffer::default();
        let err = drain::<&[u8]>(None, &sink).await;
        assert!(sink.snapshot().is_empty());
        assert!(err.is_none());
    }

    #[tokio::test]
    async fn test_drain_reads_everything() {
        let data: &[u8] = b"127.0.0.1 localhost\n";
        let sink = SharedBuffer::default();
        let err = drain(Some(data), &sink).await;
        assert_eq!(sink.snapshot(), data);
        assert!(err.is_none());
    }

    /// Yields one chunk, then fails like a dropped websocket
    struct Broken(Option<&'static [u8]>);

    impl AsyncRead for Broken {
        fn poll_read(
            mut self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &mut ReadBuf<'_>,
        ) -> Poll<std::io::Result<()>> {
            match self.0.take() {
                Some(data) => {
                    buf.put_slice(data);
                    Poll::Ready(Ok(()))
                }
                None => Poll::Ready(Err(std::io::Error::new(
                    std::io::ErrorKind::BrokenPipe,
                    "broken pipe",
                ))),
            }
        }
    }

    #[tokio::test]
    async fn test_drain_keeps_bytes_before_error() {
        let sink = SharedBuffer::default();
        let err = drain(Some(Broken(Some(b"partial "))), &sink).await;
        assert_eq!(sink.snapshot(), b"partial ");
        assert_eq!(err.map(|e| e.kind()), Some(std::io::ErrorKind::BrokenPipe));
    }
}
