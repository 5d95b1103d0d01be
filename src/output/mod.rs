// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Turning a finished bundle into the output document
//!
//! ```text
//! {
//!   "copy/":        { "<ns>/<pod>/<path>": "<base64 file content>" },
//!   "copy-errors/": { "<ns>/<pod>/<path>-errors.json": "<base64 JSON>" }
//! }
//! ```
//!
//! Empty sections are left out. Redaction runs on the files right before
//! serialization.

mod json;
pub mod redact;

use std::io::Write;

use crate::collect::ResultBundle;
use crate::error::CollectResult;
use redact::{Identity, Redactor};

pub struct Reporter {
    redactor: Box<dyn Redactor>,
}

impl Reporter {
    pub fn new(redactor: Box<dyn Redactor>) -> Self {
        Self { redactor }
    }

    /// Redact and serialize the bundle
    pub fn report(&self, mut bundle: ResultBundle) -> CollectResult<Vec<u8>> {
        let files = std::mem::take(&mut bundle.files);
        bundle.files = self.redactor.redact(files);
        json::to_document(&bundle)
    }

    /// Write the document once to `out`
    pub fn write_to<W: Write>(&self, bundle: ResultBundle, out: &mut W) -> anyhow::Result<()> {
        let document = self.report(bundle)?;
        out.write_all(&document)?;
        out.flush()?;
        Ok(())
    }
}

impl Default for Reporter {
    fn default() -> Self {
        Self::new(Box::new(Identity))
    }
}
