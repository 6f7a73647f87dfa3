// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Image extraction from loaded transactions.

use openeft_core::types::CompressionAlgorithm;

use crate::record::{ImagePayload, Record};
use crate::schema::{IMAGE_FIELD, Schema};
use crate::transaction::Transaction;

const WSQ_SOI: [u8; 2] = [0xFF, 0xA0];
const JPEG_SOI: [u8; 2] = [0xFF, 0xD8];
const JP2_SIGNATURE: [u8; 12] = [
    0x00, 0x00, 0x00, 0x0C, 0x6A, 0x50, 0x20, 0x20, 0x0D, 0x0A, 0x87, 0x0A,
];
const J2K_SOC: [u8; 4] = [0xFF, 0x4F, 0xFF, 0x51];
const PNG_SIGNATURE: [u8; 8] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];

/// An embedded image in wire form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedImage {
    /// 0 for the header, then file order.
    pub record_index: usize,
    pub record_type: u8,
    pub position: Option<u8>,
    /// Horizontal and vertical line lengths, when recorded.
    pub width: Option<u32>,
    pub height: Option<u32>,
    /// Compression the record claims.
    pub declared: Option<CompressionAlgorithm>,
    /// Format recognised from the data itself. Takes precedence over
    /// `declared` when naming the output.
    pub format: CompressionAlgorithm,
    pub bytes: Vec<u8>,
}

impl ExtractedImage {
    /// `fld_<record>_<field>.<ext>`, numbered from 1 like the record listing.
    pub fn file_name(&self) -> String {
        format!(
            "fld_{}_{}.{}",
            self.record_index + 1,
            IMAGE_FIELD,
            self.format.extension()
        )
    }
}

/// Identify image data by its leading signature. Unrecognised data is
/// reported as uncompressed.
pub fn sniff_format(bytes: &[u8]) -> CompressionAlgorithm {
    if bytes.starts_with(&WSQ_SOI) {
        CompressionAlgorithm::Wsq20
    } else if bytes.starts_with(&JPEG_SOI) {
        CompressionAlgorithm::Jpeg
    } else if bytes.starts_with(&JP2_SIGNATURE) || bytes.starts_with(&J2K_SOC) {
        CompressionAlgorithm::Jpeg2000
    } else if bytes.starts_with(&PNG_SIGNATURE) {
        CompressionAlgorithm::Png
    } else {
        CompressionAlgorithm::None
    }
}

/// Every encoded image in the transaction, in file order. Captures that have
/// not been compressed yet are skipped.
pub fn extract_images(schema: &Schema, transaction: &Transaction) -> Vec<ExtractedImage> {
    transaction
        .all_records()
        .enumerate()
        .filter_map(|(record_index, record)| match record.image() {
            Some(ImagePayload::Encoded(bytes)) => Some(ExtractedImage {
                record_index,
                record_type: record.record_type(),
                position: record.position(),
                width: numeric(record, 6),
                height: numeric(record, 7),
                declared: declared_compression(schema, record),
                format: sniff_format(bytes),
                bytes: bytes.clone(),
            }),
            _ => None,
        })
        .collect()
}

fn numeric(record: &Record, field_number: u16) -> Option<u32> {
    record.text(field_number)?.trim().parse().ok()
}

/// Tagged records carry a label, binary records a numeric code.
fn declared_compression(schema: &Schema, record: &Record) -> Option<CompressionAlgorithm> {
    let descriptor = schema.descriptor(record.record_type())?;
    let value = record.text(descriptor.compression_field()?)?;
    if descriptor.is_binary() {
        CompressionAlgorithm::from_code(value.trim().parse().ok()?)
    } else {
        CompressionAlgorithm::from_label(&value)
    }
}
