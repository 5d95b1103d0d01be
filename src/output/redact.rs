// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Redaction of collected file content before it is written out

use regex::bytes::Regex;
use std::collections::BTreeMap;
use tracing::debug;

/// Replacement for every redacted match
pub const REDACTED: &[u8] = b"***HIDDEN***";

/// A transform over collected files, applied to the whole payload of each
/// file before serialization
pub trait Redactor: Send + Sync {
    fn redact(&self, files: BTreeMap<String, Vec<u8>>) -> BTreeMap<String, Vec<u8>>;
}

/// Leaves files untouched
pub struct Identity;

impl Redactor for Identity {
    fn redact(&self, files: BTreeMap<String, Vec<u8>>) -> BTreeMap<String, Vec<u8>> {
        files
    }
}

/// Replaces every match of any configured pattern with [`REDACTED`]
pub struct RegexRedactor {
    patterns: Vec<Regex>,
}

impl RegexRedactor {
    pub fn new(patterns: &[String]) -> Result<Self, regex::Error> {
        let patterns = patterns
            .iter()
            .map(|p| Regex::new(p))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }

    fn redact_bytes(&self, content: Vec<u8>) -> Vec<u8> {
        self.patterns.iter().fold(content, |acc, re| {
            if re.is_match(&acc) {
                re.replace_all(&acc, REDACTED).into_owned()
            } else {
                acc
            }
        })
    }
}

impl Redactor for RegexRedactor {
    fn redact(&self, files: BTreeMap<String, Vec<u8>>) -> BTreeMap<String, Vec<u8>> {
        files
            .into_iter()
            .map(|(key, content)| {
                let redacted = self.redact_bytes(content);
                debug!(file = %key, bytes = redacted.len(), "Redacted file");
                (key, redacted)
            })
            .collect()
    }
}

/// Pick the redactor for a run: regex redaction when enabled and patterns
/// exist, otherwise the identity
pub fn build(enabled: bool, patterns: &[String]) -> Result<Box<dyn Redactor>, regex::Error> {
    if enabled && !patterns.is_empty() {
        Ok(Box::new(RegexRedactor::new(patterns)?))
    } else {
        Ok(Box::new(Identity))
    }
}
