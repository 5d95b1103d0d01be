// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Errors that abort a whole collection run
//!
//! Selector, connection and stream failures are not here: they are recorded
//! as data in the result bundle and never stop the run.

/// A fatal collection error. No output is produced when one is returned.
#[derive(Debug, thiserror::Error)]
pub enum CollectError {
    /// No usable cluster client could be built
    #[error("cluster configuration error: {0:#}")]
    Config(#[source] anyhow::Error),

    /// The request cannot be executed as given
    #[error("invalid collection request: {0}")]
    InvalidRequest(String),

    /// An error payload or the final document could not be encoded
    #[error("failed to serialize {what}: {source}")]
    Serialization {
        what: String,
        #[source]
        source: serde_json::Error,
    },
}

impl CollectError {
    pub fn serialization(what: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Serialization {
            what: what.into(),
            source,
        }
    }
}

pub type CollectResult<T> = std::result::Result<T, CollectError>;
