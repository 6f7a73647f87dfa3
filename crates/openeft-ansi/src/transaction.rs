// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Transaction model: a header record followed by the logical records it
// lists.

use openeft_core::error::{EftError, Result};

use crate::record::Record;
use crate::schema::{HEADER_RECORD_TYPE, Schema};

/// An ordered set of records. The header is always present and always first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    header: Record,
    records: Vec<Record>,
}

impl Transaction {
    pub fn new(header: Record) -> Result<Self> {
        if header.record_type() != HEADER_RECORD_TYPE {
            return Err(EftError::SchemaViolation(format!(
                "a transaction must start with a type-1 record, not type {}",
                header.record_type()
            )));
        }
        Ok(Self {
            header,
            records: Vec::new(),
        })
    }

    /// Append a record after the header, enforcing per-type uniqueness.
    pub fn push(&mut self, schema: &Schema, record: Record) -> Result<()> {
        let descriptor = schema.require(record.record_type())?;
        if record.record_type() == HEADER_RECORD_TYPE {
            return Err(EftError::SchemaViolation(
                "a transaction has exactly one type-1 record".into(),
            ));
        }
        if descriptor.unique && self.record_of_type(record.record_type()).is_some() {
            return Err(EftError::SchemaViolation(format!(
                "only one {} is allowed per transaction",
                descriptor.name
            )));
        }
        self.records.push(record);
        Ok(())
    }

    pub fn header(&self) -> &Record {
        &self.header
    }

    pub fn header_mut(&mut self) -> &mut Record {
        &mut self.header
    }

    /// Records after the header, in file order.
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// Header first, then the remaining records.
    pub fn all_records(&self) -> impl Iterator<Item = &Record> {
        std::iter::once(&self.header).chain(self.records.iter())
    }

    pub fn record_of_type(&self, record_type: u8) -> Option<&Record> {
        self.all_records()
            .find(|record| record.record_type() == record_type)
    }

    pub fn record_of_type_mut(&mut self, record_type: u8) -> Option<&mut Record> {
        if record_type == HEADER_RECORD_TYPE {
            return Some(&mut self.header);
        }
        self.records
            .iter_mut()
            .find(|record| record.record_type() == record_type)
    }

    /// Record by its position in [`all_records`](Self::all_records); 0 is the
    /// header.
    pub fn record_at_mut(&mut self, index: usize) -> Option<&mut Record> {
        match index {
            0 => Some(&mut self.header),
            n => self.records.get_mut(n - 1),
        }
    }

    /// Records carrying image data.
    pub fn image_records(&self) -> impl Iterator<Item = &Record> {
        self.records.iter().filter(|record| record.image().is_some())
    }
}
