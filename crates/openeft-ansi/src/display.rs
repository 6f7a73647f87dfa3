// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Projection of a transaction into display strings.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use crate::field::FieldTag;
use crate::record::ImagePayload;
use crate::schema::{IMAGE_FIELD, Schema};
use crate::transaction::Transaction;

/// Position of a value in the display projection. Image records repeat, so
/// the tag alone is not unique.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DisplayKey {
    /// 0 for the header, then file order.
    pub record_index: usize,
    pub tag: FieldTag,
}

impl std::fmt::Display for DisplayKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.record_index, self.tag)
    }
}

/// Every stored field as text. Subfields are joined by `; ` and items by
/// `, `; fields the schema does not describe are shown as their raw bytes,
/// and image data as a byte count.
pub fn render_for_display(transaction: &Transaction) -> BTreeMap<DisplayKey, String> {
    let mut out = BTreeMap::new();
    for (record_index, record) in transaction.all_records().enumerate() {
        for field in record.fields() {
            out.insert(
                DisplayKey {
                    record_index,
                    tag: field.tag(),
                },
                field.display_value(),
            );
        }
        if let Some(image) = record.image() {
            out.insert(
                DisplayKey {
                    record_index,
                    tag: FieldTag::new(record.record_type(), IMAGE_FIELD),
                },
                binary_placeholder(image_len(image)),
            );
        }
    }
    out
}

/// Plain-text listing, one field per line, grouped by record.
pub fn text_dump(schema: &Schema, transaction: &Transaction) -> String {
    let mut out = String::new();
    let mut current = None;
    for (key, value) in render_for_display(transaction) {
        if current != Some(key.record_index) {
            current = Some(key.record_index);
            let name = schema
                .descriptor(key.tag.record_type)
                .map_or("unknown record", |d| d.name);
            if key.record_index > 0 {
                out.push('\n');
            }
            let _ = writeln!(out, "Record {} - {name}", key.record_index + 1);
        }
        let mnemonic = schema
            .descriptor(key.tag.record_type)
            .and_then(|d| d.mnemonic(key.tag.field_number))
            .unwrap_or("???");
        let value = if value.chars().any(|c| c.is_control()) {
            binary_placeholder(value.len())
        } else {
            value
        };
        let _ = writeln!(out, "{} {mnemonic}: {value}", key.tag);
    }
    out
}

fn image_len(image: &ImagePayload) -> usize {
    match image {
        ImagePayload::Encoded(bytes) => bytes.len(),
        ImagePayload::Pending(raw) => raw.pixels().len(),
    }
}

fn binary_placeholder(len: usize) -> String {
    format!("<binary data: {len} bytes>")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::Field;
    use crate::testing::sample_transaction;

    #[test]
    fn fields_keyed_by_record_and_tag() {
        let schema = Schema::standard();
        let view = render_for_display(&sample_transaction(schema, 2));
        let name = DisplayKey {
            record_index: 1,
            tag: FieldTag::new(2, 18),
        };
        assert_eq!(view[&name], "DOE, JOHN Q");
        let second_slap = DisplayKey {
            record_index: 3,
            tag: FieldTag::new(14, 2),
        };
        assert_eq!(view[&second_slap], "02");
        let image = DisplayKey {
            record_index: 2,
            tag: FieldTag::new(14, 999),
        };
        assert_eq!(view[&image], "<binary data: 128 bytes>");
    }

    #[test]
    fn computed_fields_are_not_shown() {
        let schema = Schema::standard();
        let view = render_for_display(&sample_transaction(schema, 0));
        assert!(view.keys().all(|k| k.tag.field_number != 1));
        assert!(!view.keys().any(|k| k.tag == FieldTag::new(1, 3)));
    }

    #[test]
    fn unknown_fields_shown_raw() {
        let schema = Schema::standard();
        let mut transaction = sample_transaction(schema, 0);
        transaction
            .record_of_type_mut(2)
            .unwrap()
            .set_field(Field::opaque(schema, FieldTag::new(2, 950), b"A\x1fB".to_vec()).unwrap())
            .unwrap();
        let view = render_for_display(&transaction);
        let key = DisplayKey {
            record_index: 1,
            tag: FieldTag::new(2, 950),
        };
        assert_eq!(view[&key], "A\u{1f}B");
        let dump = text_dump(schema, &transaction);
        assert!(dump.contains("2.950 ???: <binary data: 3 bytes>"));
    }

    #[test]
    fn dump_lists_mnemonics() {
        let schema = Schema::standard();
        let dump = text_dump(schema, &sample_transaction(schema, 1));
        assert!(dump.starts_with("Record 1 - Type-1 transaction information record\n"));
        assert!(dump.contains("1.009 TCN: 260104-JQD-07"));
        assert!(dump.contains("14.999 DATA: <binary data: 128 bytes>"));
    }
}
