// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Raw field edits on a loaded transaction.
//
// Values are substituted as typed, subfield and item separators included.
// Nothing is checked beyond what keeps the file structurally encodable.

use std::collections::BTreeMap;

use openeft_core::error::{EftError, Result};
use tracing::{debug, instrument};

use crate::display::DisplayKey;
use crate::field::{Field, FieldTag, FieldValue};
use crate::record::Record;
use crate::schema::Schema;
use crate::separators::{FS, GS};
use crate::transaction::Transaction;

/// Apply `edits` to the first record of each tag's record type. An empty
/// value removes the field.
#[instrument(skip_all, fields(edits = edits.len()))]
pub fn update_fields(
    schema: &Schema,
    mut transaction: Transaction,
    edits: &BTreeMap<FieldTag, String>,
) -> Result<Transaction> {
    for (tag, value) in edits {
        schema.check_field(*tag)?;
        let record = transaction
            .record_of_type_mut(tag.record_type)
            .ok_or_else(|| {
                EftError::SchemaViolation(format!(
                    "transaction has no type-{} record for field {tag}",
                    tag.record_type
                ))
            })?;
        apply_edit(schema, record, *tag, value)?;
    }
    Ok(transaction)
}

/// Apply `edits` keyed the way [`render_for_display`](crate::render_for_display)
/// keys its output, so any one of several repeated records can be reached.
#[instrument(skip_all, fields(edits = edits.len()))]
pub fn update_display_fields(
    schema: &Schema,
    mut transaction: Transaction,
    edits: &BTreeMap<DisplayKey, String>,
) -> Result<Transaction> {
    for (key, value) in edits {
        schema.check_field(key.tag)?;
        let record = transaction.record_at_mut(key.record_index).ok_or_else(|| {
            EftError::SchemaViolation(format!("transaction has no record {}", key.record_index))
        })?;
        if record.record_type() != key.tag.record_type {
            return Err(EftError::SchemaViolation(format!(
                "record {} is type {}, not type {} as {key} expects",
                key.record_index,
                record.record_type(),
                key.tag.record_type
            )));
        }
        apply_edit(schema, record, key.tag, value)?;
    }
    Ok(transaction)
}

fn apply_edit(schema: &Schema, record: &mut Record, tag: FieldTag, value: &str) -> Result<()> {
    if value.is_empty() {
        record.remove(tag.field_number);
        debug!(%tag, "field removed");
        return Ok(());
    }
    let raw = value.as_bytes();
    if raw.iter().any(|b| *b == GS || *b == FS) {
        return Err(EftError::SchemaViolation(format!(
            "field {tag} value contains a field or record separator"
        )));
    }
    let field = if schema.check_field(tag)?.knows(tag.field_number) {
        Field::from_raw(tag, raw)
    } else {
        Field::from_parts(tag, FieldValue::Opaque(raw.to_vec()))
    };
    record.set_field(field)?;
    debug!(%tag, "field updated");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::Decoder;
    use crate::encoder::Encoder;
    use crate::testing::sample_transaction;

    fn edits(pairs: &[(&str, &str)]) -> BTreeMap<FieldTag, String> {
        pairs
            .iter()
            .map(|(tag, value)| (tag.parse().unwrap(), value.to_string()))
            .collect()
    }

    #[test]
    fn empty_edit_is_byte_identical() {
        let schema = Schema::standard();
        let encoder = Encoder::new(schema);
        let bytes = encoder.encode(&sample_transaction(schema, 2)).unwrap();
        let loaded = Decoder::new(schema).decode(&bytes).unwrap();
        let edited = update_fields(schema, loaded, &BTreeMap::new()).unwrap();
        assert_eq!(encoder.encode(&edited).unwrap(), bytes);
    }

    #[test]
    fn values_substituted_without_checks() {
        let schema = Schema::standard();
        let edited = update_fields(
            schema,
            sample_transaction(schema, 1),
            &edits(&[("2.018", "SMITH, JANE"), ("2.024", "banana"), ("14.013", "13\u{1f}14")]),
        )
        .unwrap();
        let demographics = edited.record_of_type(2).unwrap();
        assert_eq!(demographics.text(18).as_deref(), Some("SMITH, JANE"));
        assert_eq!(demographics.text(24).as_deref(), Some("banana"));
        let slap = edited.record_of_type(14).unwrap();
        assert_eq!(slap.field(13).unwrap().display_value(), "13, 14");
    }

    #[test]
    fn empty_value_removes_field() {
        let schema = Schema::standard();
        let edited = update_fields(schema, sample_transaction(schema, 0), &edits(&[("2.022", "")]))
            .unwrap();
        assert!(edited.record_of_type(2).unwrap().field(22).is_none());
    }

    #[test]
    fn unknown_field_added_to_permissive_record() {
        let schema = Schema::standard();
        let edited = update_fields(schema, sample_transaction(schema, 0), &edits(&[("2.901", "X")]))
            .unwrap();
        let field = edited.record_of_type(2).unwrap().field(901).unwrap();
        assert_eq!(field.value(), &FieldValue::Opaque(b"X".to_vec()));
    }

    #[test]
    fn structural_fields_rejected() {
        let schema = Schema::standard();
        for tag in ["1.001", "1.003", "14.999", "14.500", "4.002", "2.000", "2.001"] {
            let result = update_fields(schema, sample_transaction(schema, 1), &edits(&[(tag, "1")]));
            assert!(
                matches!(result, Err(EftError::SchemaViolation(_))),
                "{tag} should be rejected"
            );
        }
    }

    #[test]
    fn display_key_reaches_repeated_records() {
        let schema = Schema::standard();
        let transaction = sample_transaction(schema, 2);
        let second_slap = DisplayKey {
            record_index: 3,
            tag: FieldTag::new(14, 13),
        };
        let edited = update_display_fields(
            schema,
            transaction.clone(),
            &BTreeMap::from([(second_slap, "15".to_string())]),
        )
        .unwrap();

        let slaps: Vec<_> = edited.records().iter().filter(|r| r.record_type() == 14).collect();
        let before: Vec<_> = transaction.records().iter().filter(|r| r.record_type() == 14).collect();
        assert_eq!(slaps[0], before[0]);
        assert_eq!(before[1].text(13).as_deref(), Some("14"));
        assert_eq!(slaps[1].text(13).as_deref(), Some("15"));

        let rendered = crate::render_for_display(&edited);
        assert_eq!(rendered[&second_slap], "15");
    }

    #[test]
    fn display_key_must_match_record_type() {
        let schema = Schema::standard();
        let wrong_type = DisplayKey {
            record_index: 1,
            tag: FieldTag::new(14, 13),
        };
        let past_end = DisplayKey {
            record_index: 9,
            tag: FieldTag::new(14, 13),
        };
        for key in [wrong_type, past_end] {
            let result = update_display_fields(
                schema,
                sample_transaction(schema, 2),
                &BTreeMap::from([(key, "14".to_string())]),
            );
            assert!(matches!(result, Err(EftError::SchemaViolation(_))), "{key}");
        }
    }
}
