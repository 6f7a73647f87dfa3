// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Record model: one logical record of a transaction.

use std::collections::BTreeMap;

use openeft_core::error::{EftError, Result};
use openeft_core::types::RawImage;

use crate::field::{Field, FieldTag};
use crate::schema::Schema;

/// Image data attached to an image record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImagePayload {
    /// Uncompressed capture; the encoder compresses it with the codec it is
    /// given and stamps the record's compression field.
    Pending(RawImage),
    /// Bytes written verbatim, as read from a file or pre-compressed.
    Encoded(Vec<u8>),
}

impl ImagePayload {
    /// Encoded bytes, if the payload is already in wire form.
    pub fn encoded(&self) -> Option<&[u8]> {
        match self {
            Self::Encoded(bytes) => Some(bytes),
            Self::Pending(_) => None,
        }
    }
}

/// Fields keyed by field number, serialized in ascending order. The length
/// field is never stored; the encoder computes it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    record_type: u8,
    fields: BTreeMap<u16, Field>,
    image: Option<ImagePayload>,
}

impl Record {
    pub fn new(schema: &Schema, record_type: u8) -> Result<Self> {
        schema.require(record_type)?;
        Ok(Self {
            record_type,
            fields: BTreeMap::new(),
            image: None,
        })
    }

    pub(crate) fn from_parts(
        record_type: u8,
        fields: BTreeMap<u16, Field>,
        image: Option<ImagePayload>,
    ) -> Self {
        Self {
            record_type,
            fields,
            image,
        }
    }

    pub fn record_type(&self) -> u8 {
        self.record_type
    }

    /// Store `field`, returning whatever it replaced.
    pub fn set_field(&mut self, field: Field) -> Result<Option<Field>> {
        if field.record_type() != self.record_type {
            return Err(EftError::SchemaViolation(format!(
                "field {} cannot be stored in a type-{} record",
                field.tag(),
                self.record_type
            )));
        }
        Ok(self.fields.insert(field.field_number(), field))
    }

    /// Builder form of [`Record::set_field`].
    pub fn with_field(mut self, field: Field) -> Result<Self> {
        self.set_field(field)?;
        Ok(self)
    }

    /// Store a single-item text value under `field_number`.
    pub fn set_text(
        &mut self,
        schema: &Schema,
        field_number: u16,
        value: impl AsRef<str>,
    ) -> Result<()> {
        let field = Field::text(schema, FieldTag::new(self.record_type, field_number), value)?;
        self.set_field(field).map(|_| ())
    }

    pub fn remove(&mut self, field_number: u16) -> Option<Field> {
        self.fields.remove(&field_number)
    }

    pub fn field(&self, field_number: u16) -> Option<&Field> {
        self.fields.get(&field_number)
    }

    pub fn fields(&self) -> impl Iterator<Item = &Field> {
        self.fields.values()
    }

    pub fn text(&self, field_number: u16) -> Option<String> {
        self.field(field_number).and_then(Field::as_text)
    }

    /// Attach image data. Only record types with an image field accept one.
    pub fn set_image(&mut self, schema: &Schema, payload: ImagePayload) -> Result<()> {
        let descriptor = schema.require(self.record_type)?;
        if descriptor.image_field().is_none() {
            return Err(EftError::SchemaViolation(format!(
                "{} does not carry image data",
                descriptor.name
            )));
        }
        self.image = Some(payload);
        Ok(())
    }

    pub fn image(&self) -> Option<&ImagePayload> {
        self.image.as_ref()
    }

    /// Information designation character (field 2).
    pub fn idc(&self) -> Option<u8> {
        self.text(2).and_then(|idc| idc.trim().parse().ok())
    }

    /// Finger position of an image record (4.004 or 14.013).
    pub fn position(&self) -> Option<u8> {
        let number = match self.record_type {
            4 => 4,
            14 => 13,
            _ => return None,
        };
        self.text(number).and_then(|fgp| fgp.trim().parse().ok())
    }
}
