// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Load, inspect, edit and re-save existing EFT files.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use openeft_ansi::{
    Decoder, DisplayKey, Encoder, FieldTag, Schema, Transaction, extract_images, hash_bytes,
};
use openeft_core::error::{EftError, Result};
use tracing::{info, instrument};

/// File-level operations on decoded transactions.
#[derive(Debug, Clone, Copy)]
pub struct EditorService {
    schema: &'static Schema,
}

impl Default for EditorService {
    fn default() -> Self {
        Self::new()
    }
}

impl EditorService {
    pub fn new() -> Self {
        Self {
            schema: Schema::standard(),
        }
    }

    pub fn load(&self, bytes: &[u8]) -> Result<Transaction> {
        Decoder::new(self.schema).decode(bytes)
    }

    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<Transaction> {
        let bytes = std::fs::read(path.as_ref())?;
        let transaction = self.load(&bytes)?;
        info!(records = transaction.records().len() + 1, "transaction loaded");
        Ok(transaction)
    }

    pub fn render_for_display(&self, transaction: &Transaction) -> BTreeMap<DisplayKey, String> {
        openeft_ansi::render_for_display(transaction)
    }

    /// Display map keyed by its rendered key, ready for JSON output.
    pub fn display_json(&self, transaction: &Transaction) -> Result<String> {
        let rendered: BTreeMap<String, String> = self
            .render_for_display(transaction)
            .into_iter()
            .map(|(key, value)| (key.to_string(), value))
            .collect();
        Ok(serde_json::to_string_pretty(&rendered)?)
    }

    pub fn text_dump(&self, transaction: &Transaction) -> String {
        openeft_ansi::text_dump(self.schema, transaction)
    }

    pub fn update_fields(
        &self,
        transaction: Transaction,
        edits: &BTreeMap<FieldTag, String>,
    ) -> Result<Transaction> {
        openeft_ansi::update_fields(self.schema, transaction, edits)
    }

    /// Edits keyed as [`render_for_display`](Self::render_for_display) keys
    /// its output, reaching any one of several repeated records.
    pub fn update_display_fields(
        &self,
        transaction: Transaction,
        edits: &BTreeMap<DisplayKey, String>,
    ) -> Result<Transaction> {
        openeft_ansi::update_display_fields(self.schema, transaction, edits)
    }

    pub fn encode(&self, transaction: &Transaction) -> Result<Vec<u8>> {
        Encoder::new(self.schema).encode(transaction)
    }

    /// Encode and write to `path`. Returns the SHA-256 of the written bytes.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn save(&self, transaction: &Transaction, path: impl AsRef<Path>) -> Result<String> {
        let bytes = self.encode(transaction)?;
        std::fs::write(path.as_ref(), &bytes)?;
        let sha256 = hash_bytes(&bytes);
        info!(size = bytes.len(), %sha256, "transaction saved");
        Ok(sha256)
    }

    /// Write every embedded image into `dir` as `fld_<n>_999.<ext>`.
    #[instrument(skip_all, fields(dir = %dir.as_ref().display()))]
    pub fn extract_to(&self, transaction: &Transaction, dir: impl AsRef<Path>) -> Result<Vec<PathBuf>> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;
        let mut written = Vec::new();
        for image in extract_images(self.schema, transaction) {
            let path = dir.join(image.file_name());
            std::fs::write(&path, &image.bytes)?;
            info!(
                path = %path.display(),
                position = image.position,
                format = ?image.format,
                "image extracted"
            );
            written.push(path);
        }
        Ok(written)
    }
}

/// Split `TAG=VALUE` as typed on the command line. The value is kept
/// verbatim, including an empty one.
pub fn parse_assignment(text: &str) -> Result<(FieldTag, String)> {
    let (tag, value) = text.split_once('=').ok_or_else(|| {
        EftError::SchemaViolation(format!("'{text}' is not of the form TAG=VALUE"))
    })?;
    Ok((tag.parse()?, value.to_string()))
}

/// Parse a list of `TAG=VALUE` assignments. Later duplicates win.
pub fn parse_assignments<S: AsRef<str>>(items: &[S]) -> Result<BTreeMap<FieldTag, String>> {
    items
        .iter()
        .map(|item| parse_assignment(item.as_ref()))
        .collect()
}

/// Split `[INDEX] TAG=VALUE`, the key form `inspect --json` prints.
pub fn parse_display_assignment(text: &str) -> Result<(DisplayKey, String)> {
    let invalid = || {
        EftError::SchemaViolation(format!("'{text}' is not of the form [INDEX] TAG=VALUE"))
    };
    let (index, rest) = text
        .trim_start()
        .strip_prefix('[')
        .and_then(|rest| rest.split_once(']'))
        .ok_or_else(invalid)?;
    let record_index = index.trim().parse().map_err(|_| invalid())?;
    let (tag, value) = parse_assignment(rest.trim_start())?;
    Ok((DisplayKey { record_index, tag }, value))
}

/// Parse a list of `[INDEX] TAG=VALUE` assignments. Later duplicates win.
pub fn parse_display_assignments<S: AsRef<str>>(
    items: &[S],
) -> Result<BTreeMap<DisplayKey, String>> {
    items
        .iter()
        .map(|item| parse_display_assignment(item.as_ref()))
        .collect()
}
