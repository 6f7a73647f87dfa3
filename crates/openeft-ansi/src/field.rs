// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Field model: one tagged value inside a record.

use std::borrow::Cow;
use std::str::FromStr;

use openeft_core::error::{EftError, Result};

use crate::schema::Schema;
use crate::separators::{self, FS, GS, RS, US};

/// `record_type.field_number`, rendered as `2.018`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FieldTag {
    pub record_type: u8,
    pub field_number: u16,
}

impl FieldTag {
    pub const fn new(record_type: u8, field_number: u16) -> Self {
        Self {
            record_type,
            field_number,
        }
    }
}

impl std::fmt::Display for FieldTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{:03}", self.record_type, self.field_number)
    }
}

impl FromStr for FieldTag {
    type Err = EftError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || EftError::SchemaViolation(format!("'{s}' is not a field tag"));
        let (record, field) = s.trim().split_once('.').ok_or_else(invalid)?;
        let all_digits = |part: &str| !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit());
        if !all_digits(record) || !all_digits(field) {
            return Err(invalid());
        }
        Ok(Self {
            record_type: record.parse().map_err(|_| invalid())?,
            field_number: field.parse().map_err(|_| invalid())?,
        })
    }
}

/// One item: the smallest delimited unit of a field.
pub type Item = Vec<u8>;
/// Items joined by US.
pub type Subfield = Vec<Item>;

/// The content of a field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    /// Subfields joined by RS, each made of items joined by US.
    Structured(Vec<Subfield>),
    /// Bytes written verbatim. Used for fields the schema does not describe.
    Opaque(Vec<u8>),
}

/// A single tagged value. The tag cannot change after construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    tag: FieldTag,
    value: FieldValue,
}

impl Field {
    /// Build a structured field, rejecting tags the schema does not allow and
    /// items that contain a separator byte.
    pub fn new(schema: &Schema, tag: FieldTag, subfields: Vec<Subfield>) -> Result<Self> {
        schema.check_field(tag)?;
        for (index, item) in subfields.iter().flatten().enumerate() {
            if let Some(&byte) = item.iter().find(|b| separators::is_separator(**b)) {
                return Err(EftError::SchemaViolation(format!(
                    "field {tag} item {index} contains reserved separator byte 0x{byte:02X}"
                )));
            }
        }
        Ok(Self {
            tag,
            value: FieldValue::Structured(normalise(subfields)),
        })
    }

    /// Single-item text field.
    pub fn text(schema: &Schema, tag: FieldTag, value: impl AsRef<str>) -> Result<Self> {
        Self::new(schema, tag, vec![vec![value.as_ref().as_bytes().to_vec()]])
    }

    /// One subfield holding several items.
    pub fn items<S: AsRef<str>>(schema: &Schema, tag: FieldTag, items: &[S]) -> Result<Self> {
        let subfield = items
            .iter()
            .map(|item| item.as_ref().as_bytes().to_vec())
            .collect();
        Self::new(schema, tag, vec![subfield])
    }

    /// Opaque bytes. Subfield and item separators pass through untouched; the
    /// field and record separators are rejected.
    pub fn opaque(schema: &Schema, tag: FieldTag, bytes: Vec<u8>) -> Result<Self> {
        schema.check_field(tag)?;
        if let Some(&byte) = bytes.iter().find(|b| **b == GS || **b == FS) {
            return Err(EftError::SchemaViolation(format!(
                "field {tag} contains reserved separator byte 0x{byte:02X}"
            )));
        }
        Ok(Self {
            tag,
            value: FieldValue::Opaque(bytes),
        })
    }

    /// Field whose tag and content were already checked by the caller.
    pub(crate) fn from_parts(tag: FieldTag, value: FieldValue) -> Self {
        Self { tag, value }
    }

    /// Split raw wire bytes into subfields and items without any checks.
    pub(crate) fn from_raw(tag: FieldTag, raw: &[u8]) -> Self {
        Self {
            tag,
            value: FieldValue::Structured(split_value(raw)),
        }
    }

    pub fn tag(&self) -> FieldTag {
        self.tag
    }

    pub fn record_type(&self) -> u8 {
        self.tag.record_type
    }

    pub fn field_number(&self) -> u16 {
        self.tag.field_number
    }

    pub fn value(&self) -> &FieldValue {
        &self.value
    }

    pub fn subfields(&self) -> Option<&[Subfield]> {
        match &self.value {
            FieldValue::Structured(subfields) => Some(subfields),
            FieldValue::Opaque(_) => None,
        }
    }

    /// First item of the first subfield.
    pub fn first_item(&self) -> Option<&[u8]> {
        match &self.value {
            FieldValue::Structured(subfields) => {
                subfields.first().and_then(|s| s.first()).map(Vec::as_slice)
            }
            FieldValue::Opaque(bytes) => Some(bytes),
        }
    }

    /// Text of a single-valued field.
    pub fn as_text(&self) -> Option<String> {
        self.first_item()
            .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
    }

    /// Bytes written between `T.NNN:` and the next separator.
    pub fn encoded_value(&self) -> Cow<'_, [u8]> {
        match &self.value {
            FieldValue::Opaque(bytes) => Cow::Borrowed(bytes),
            FieldValue::Structured(subfields) => {
                let mut out = Vec::new();
                for (s, subfield) in subfields.iter().enumerate() {
                    if s > 0 {
                        out.push(RS);
                    }
                    for (i, item) in subfield.iter().enumerate() {
                        if i > 0 {
                            out.push(US);
                        }
                        out.extend_from_slice(item);
                    }
                }
                Cow::Owned(out)
            }
        }
    }

    /// Human-readable rendering: subfields separated by `; `, items by `, `.
    /// Opaque content is shown as raw text.
    pub fn display_value(&self) -> String {
        match &self.value {
            FieldValue::Opaque(bytes) => String::from_utf8_lossy(bytes).into_owned(),
            FieldValue::Structured(subfields) => subfields
                .iter()
                .map(|subfield| {
                    subfield
                        .iter()
                        .map(|item| String::from_utf8_lossy(item))
                        .collect::<Vec<_>>()
                        .join(", ")
                })
                .collect::<Vec<_>>()
                .join("; "),
        }
    }
}

/// Empty subfield lists and empty subfields encode as an empty value, which
/// decodes as one empty item.
fn normalise(mut subfields: Vec<Subfield>) -> Vec<Subfield> {
    if subfields.is_empty() {
        subfields.push(Vec::new());
    }
    for subfield in &mut subfields {
        if subfield.is_empty() {
            subfield.push(Vec::new());
        }
    }
    subfields
}

pub(crate) fn split_value(raw: &[u8]) -> Vec<Subfield> {
    raw.split(|b| *b == RS)
        .map(|subfield| subfield.split(|b| *b == US).map(<[u8]>::to_vec).collect())
        .collect()
}
