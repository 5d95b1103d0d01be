// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Per-pod outcomes and the bundle they are merged into

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{error_key, file_key};
use crate::error::{CollectError, CollectResult};
use crate::kubernetes::{ExecError, ExecSinks, PodRef};

/// Result of reading the file from one pod
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Success { bytes: Vec<u8> },
    Failure(FetchFailure),
}

/// A failed fetch, with any output captured before the failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchFailure {
    pub stdout: Option<Vec<u8>>,
    pub stderr: Option<Vec<u8>>,
    pub message: String,
}

impl FetchFailure {
    /// Failure before any data could be captured
    pub fn connection(message: impl Into<String>) -> Self {
        Self {
            stdout: None,
            stderr: None,
            message: message.into(),
        }
    }

    /// Failure after the channel was open; keeps partial output
    pub fn stream(stdout: Vec<u8>, stderr: Vec<u8>, message: impl Into<String>) -> Self {
        Self {
            stdout: Some(stdout),
            stderr: Some(stderr),
            message: message.into(),
        }
    }

    pub fn payload(&self) -> ErrorPayload {
        ErrorPayload {
            error: self.message.clone(),
            stderr: self
                .stderr
                .as_ref()
                .map(|b| String::from_utf8_lossy(b).into_owned()),
            stdout: self
                .stdout
                .as_ref()
                .map(|b| String::from_utf8_lossy(b).into_owned()),
        }
    }

    /// Failure after the channel was open, with whatever the sinks captured
    pub fn captured(sinks: &ExecSinks, message: impl Into<String>) -> Self {
        Self::stream(sinks.stdout.snapshot(), sinks.stderr.snapshot(), message)
    }

    pub fn from_exec(err: ExecError, sinks: &ExecSinks) -> Self {
        match err {
            ExecError::Connection(message) => Self::connection(message),
            ExecError::Stream(message) => Self::captured(sinks, message),
        }
    }
}

/// JSON body stored under a pod's `-errors.json` key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stderr: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stdout: Option<String>,
}

/// Everything one collection run produced
///
/// Keys are slash separated logical paths. A pod/path pair lands in exactly
/// one of the two maps.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultBundle {
    #[serde(
        rename = "copy/",
        default,
        skip_serializing_if = "BTreeMap::is_empty",
        with = "base64_map"
    )]
    pub files: BTreeMap<String, Vec<u8>>,

    #[serde(
        rename = "copy-errors/",
        default,
        skip_serializing_if = "BTreeMap::is_empty",
        with = "base64_map"
    )]
    pub errors: BTreeMap<String, Vec<u8>>,
}

impl ResultBundle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty() && self.errors.is_empty()
    }

    /// Fold one pod's outcome into the bundle
    pub fn record(
        &mut self,
        pod: &PodRef,
        container_path: &str,
        outcome: FetchOutcome,
    ) -> CollectResult<()> {
        match outcome {
            FetchOutcome::Success { bytes } => {
                self.errors.remove(&error_key(pod, container_path));
                self.files.insert(file_key(pod, container_path), bytes);
            }
            FetchOutcome::Failure(failure) => {
                let key = error_key(pod, container_path);
                let body = serde_json::to_vec(&failure.payload())
                    .map_err(|e| CollectError::serialization(key.clone(), e))?;
                self.files.remove(&file_key(pod, container_path));
                self.errors.insert(key, body);
            }
        }
        Ok(())
    }

    /// Store selector-level errors as one JSON object under `key`
    pub fn record_selector_errors(
        &mut self,
        key: String,
        errors: &BTreeMap<String, String>,
    ) -> CollectResult<()> {
        if errors.is_empty() {
            return Ok(());
        }
        let body = serde_json::to_vec(errors)
            .map_err(|e| CollectError::serialization(key.clone(), e))?;
        self.errors.insert(key, body);
        Ok(())
    }
}

/// Byte values encoded as standard base64 strings
mod base64_map {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};
    use std::collections::BTreeMap;

    pub fn serialize<S>(map: &BTreeMap<String, Vec<u8>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_map(map.iter().map(|(k, v)| (k, STANDARD.encode(v))))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<BTreeMap<String, Vec<u8>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let encoded = BTreeMap::<String, String>::deserialize(deserializer)?;
        encoded
            .into_iter()
            .map(|(k, v)| {
                STANDARD
                    .decode(v.as_bytes())
                    .map(|bytes| (k, bytes))
                    .map_err(D::Error::custom)
            })
            .collect()
    }
}
