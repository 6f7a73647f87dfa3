// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Transaction decoder.
//
// The header is read up to its record separator; its content field then
// drives a linear walk over the remaining records, each consumed exactly as
// far as its own declared length. Any disagreement between declared lengths,
// separators and the content list fails the whole decode.

use std::collections::BTreeMap;

use openeft_core::error::{EftError, Result};
use tracing::{debug, instrument};

use crate::encoder::{BINARY_HEADER_LEN, UNUSED_FGP};
use crate::field::{self, Field, FieldTag, FieldValue};
use crate::record::{ImagePayload, Record};
use crate::schema::{CONTENT_FIELD, HEADER_RECORD_TYPE, LENGTH_FIELD, RecordDescriptor, Schema};
use crate::separators::{FS, GS, TAG_DELIMITER};
use crate::transaction::Transaction;

/// Parses transactions against an injected schema.
#[derive(Debug, Clone, Copy)]
pub struct Decoder<'s> {
    schema: &'s Schema,
}

/// Fields of one tagged record, with the computed ones split out.
struct TaggedBody {
    length: usize,
    fields: BTreeMap<u16, Field>,
    image: Option<Vec<u8>>,
    content: Option<Vec<u8>>,
}

/// One `(record type, IDC)` entry of the header's content field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ContentEntry {
    record_type: u8,
    idc: u8,
}

impl<'s> Decoder<'s> {
    pub fn new(schema: &'s Schema) -> Self {
        Self { schema }
    }

    #[instrument(skip_all, fields(len = bytes.len()))]
    pub fn decode(&self, bytes: &[u8]) -> Result<Transaction> {
        let header_end = bytes
            .iter()
            .position(|b| *b == FS)
            .ok_or_else(|| EftError::malformed(0, "header record is not terminated"))?;
        let header_descriptor = self.schema.require(HEADER_RECORD_TYPE)?;
        let header = self.parse_tagged(header_descriptor, &bytes[..header_end], 0)?;
        if header.length != bytes.len() {
            return Err(EftError::malformed(
                0,
                format!(
                    "header declares {} bytes but the transaction is {} bytes",
                    header.length,
                    bytes.len()
                ),
            ));
        }
        let content = header
            .content
            .as_deref()
            .ok_or_else(|| EftError::malformed(0, "header has no content field (1.003)"))?;
        let entries = parse_content(content)?;

        let mut transaction =
            Transaction::new(Record::from_parts(HEADER_RECORD_TYPE, header.fields, None))?;
        let mut offset = header_end + 1;
        for entry in entries {
            let (record, length) = self.read_record(bytes, offset, entry.record_type)?;
            if record.idc() != Some(entry.idc) {
                return Err(EftError::malformed(
                    offset,
                    format!(
                        "type-{} record IDC {:?} does not match header entry {:02}",
                        entry.record_type,
                        record.idc(),
                        entry.idc
                    ),
                ));
            }
            transaction
                .push(self.schema, record)
                .map_err(|err| EftError::malformed(offset, err.to_string()))?;
            debug!(record_type = entry.record_type, offset, length, "decoded record");
            offset += length;
        }
        if offset != bytes.len() {
            return Err(EftError::malformed(
                offset,
                format!("{} bytes follow the last listed record", bytes.len() - offset),
            ));
        }
        Ok(transaction)
    }

    /// Read the record of `record_type` starting at `offset`, returning it and
    /// the number of bytes it spans.
    fn read_record(&self, bytes: &[u8], offset: usize, record_type: u8) -> Result<(Record, usize)> {
        let descriptor = self
            .schema
            .descriptor(record_type)
            .filter(|d| d.record_type != HEADER_RECORD_TYPE)
            .ok_or_else(|| {
                EftError::malformed(offset, format!("record type {record_type} is not supported"))
            })?;
        let remaining = &bytes[offset.min(bytes.len())..];
        if remaining.is_empty() {
            return Err(EftError::malformed(
                offset,
                format!("transaction ends before the type-{record_type} record"),
            ));
        }
        if descriptor.is_binary() {
            return read_binary(descriptor, remaining, offset);
        }

        let length = declared_length(remaining, record_type, offset)?;
        if length == 0 || length > remaining.len() {
            return Err(EftError::malformed(
                offset,
                format!(
                    "record declares {length} bytes but {} remain",
                    remaining.len()
                ),
            ));
        }
        if remaining[length - 1] != FS {
            return Err(EftError::malformed(
                offset + length - 1,
                "record does not end with a record separator at its declared length",
            ));
        }
        let body = self.parse_tagged(descriptor, &remaining[..length - 1], offset)?;
        if body.length != length {
            return Err(EftError::malformed(
                offset,
                format!("record length field {} disagrees with span {length}", body.length),
            ));
        }
        let record = Record::from_parts(
            record_type,
            body.fields,
            body.image.map(ImagePayload::Encoded),
        );
        Ok((record, length))
    }

    /// Split a tagged record (without its terminating FS) into fields.
    fn parse_tagged(
        &self,
        descriptor: &RecordDescriptor,
        body: &[u8],
        base: usize,
    ) -> Result<TaggedBody> {
        let mut parsed = TaggedBody {
            length: 0,
            fields: BTreeMap::new(),
            image: None,
            content: None,
        };
        let mut length = None;
        let mut previous: Option<u16> = None;
        let mut pos = 0;

        while pos < body.len() {
            let colon = body[pos..]
                .iter()
                .position(|b| *b == TAG_DELIMITER)
                .map(|i| pos + i)
                .ok_or_else(|| EftError::malformed(base + pos, "field has no tag delimiter"))?;
            let tag = parse_wire_tag(&body[pos..colon]).ok_or_else(|| {
                EftError::malformed(
                    base + pos,
                    format!(
                        "'{}' is not a field tag",
                        String::from_utf8_lossy(&body[pos..colon])
                    ),
                )
            })?;
            if tag.record_type != descriptor.record_type {
                return Err(EftError::malformed(
                    base + pos,
                    format!("field {tag} inside a type-{} record", descriptor.record_type),
                ));
            }
            match previous {
                None if tag.field_number != LENGTH_FIELD => {
                    return Err(EftError::malformed(
                        base + pos,
                        "record does not begin with its length field",
                    ));
                }
                Some(prev) if prev >= tag.field_number => {
                    return Err(EftError::malformed(
                        base + pos,
                        format!("field {tag} is repeated or out of order"),
                    ));
                }
                _ => {}
            }
            previous = Some(tag.field_number);

            let value_start = colon + 1;
            if Some(tag.field_number) == descriptor.image_field() {
                parsed.image = Some(body[value_start..].to_vec());
                break;
            }
            let value_end = body[value_start..]
                .iter()
                .position(|b| *b == GS)
                .map_or(body.len(), |i| value_start + i);
            let value = &body[value_start..value_end];
            if let Some(i) = value.iter().position(|b| *b == FS) {
                return Err(EftError::malformed(
                    base + value_start + i,
                    format!("record separator inside field {tag}"),
                ));
            }

            match tag.field_number {
                LENGTH_FIELD => length = Some(parse_length(value, base + value_start)?),
                CONTENT_FIELD if descriptor.is_computed(CONTENT_FIELD) => {
                    parsed.content = Some(value.to_vec());
                }
                number if descriptor.knows(number) => {
                    parsed.fields.insert(number, Field::from_raw(tag, value));
                }
                number if descriptor.permits_unknown() => {
                    parsed.fields.insert(
                        number,
                        Field::from_parts(tag, FieldValue::Opaque(value.to_vec())),
                    );
                }
                _ => {
                    return Err(EftError::malformed(
                        base + pos,
                        format!("field {tag} is not defined for {}", descriptor.name),
                    ));
                }
            }

            pos = value_end + 1;
            if pos == body.len() {
                return Err(EftError::malformed(
                    base + value_end,
                    "field separator with no field after it",
                ));
            }
        }

        parsed.length =
            length.ok_or_else(|| EftError::malformed(base, "record has no length field"))?;
        Ok(parsed)
    }
}

/// Read the `T.001:` prefix of a tagged record.
fn declared_length(remaining: &[u8], record_type: u8, offset: usize) -> Result<usize> {
    let prefix = format!("{record_type}.{LENGTH_FIELD:03}:");
    if !remaining.starts_with(prefix.as_bytes()) {
        return Err(EftError::malformed(
            offset,
            format!("type-{record_type} record does not start with {prefix}"),
        ));
    }
    let digits = &remaining[prefix.len()..];
    let end = digits
        .iter()
        .position(|b| *b == GS || *b == FS)
        .ok_or_else(|| EftError::malformed(offset, "length field is not terminated"))?;
    parse_length(&digits[..end], offset + prefix.len())
}

fn parse_length(value: &[u8], offset: usize) -> Result<usize> {
    if value.is_empty() || !value.iter().all(u8::is_ascii_digit) {
        return Err(EftError::malformed(
            offset,
            format!("length '{}' is not a number", String::from_utf8_lossy(value)),
        ));
    }
    if value.len() > 1 && value[0] == b'0' {
        return Err(EftError::malformed(
            offset,
            format!("length '{}' has leading zeros", String::from_utf8_lossy(value)),
        ));
    }
    std::str::from_utf8(value)
        .ok()
        .and_then(|text| text.parse().ok())
        .ok_or_else(|| EftError::malformed(offset, "length is out of range"))
}

/// Strict `T.NNN` parse: the tag must be written exactly as the encoder
/// writes it, so `2.18`, `02.018` and `2.0018` are all refused.
fn parse_wire_tag(raw: &[u8]) -> Option<FieldTag> {
    let dot = raw.iter().position(|b| *b == b'.')?;
    let (record, field) = (&raw[..dot], &raw[dot + 1..]);
    let digits = |part: &[u8]| !part.is_empty() && part.iter().all(u8::is_ascii_digit);
    if !digits(record) || !digits(field) {
        return None;
    }
    let record_type = std::str::from_utf8(record).ok()?.parse().ok()?;
    let field_number = std::str::from_utf8(field).ok()?.parse().ok()?;
    let tag = FieldTag::new(record_type, field_number);
    (tag.to_string().as_bytes() == raw).then_some(tag)
}

/// Parse the header content field: `1␟N` followed by N `type␟IDC` subfields.
fn parse_content(raw: &[u8]) -> Result<Vec<ContentEntry>> {
    let invalid = |reason: String| EftError::malformed(0, format!("content field 1.003: {reason}"));
    let number = |item: &[u8]| -> Option<usize> {
        std::str::from_utf8(item).ok()?.trim().parse().ok()
    };

    let subfields = field::split_value(raw);
    let (first, rest) = subfields
        .split_first()
        .ok_or_else(|| invalid("empty".into()))?;
    let count = match first.as_slice() {
        [one, count] if number(one) == Some(1) => number(count),
        _ => None,
    }
    .ok_or_else(|| invalid("first subfield must be 1 and a record count".into()))?;
    if count != rest.len() {
        return Err(invalid(format!(
            "declares {count} records but lists {}",
            rest.len()
        )));
    }

    rest.iter()
        .map(|subfield| match subfield.as_slice() {
            [record_type, idc] => {
                let record_type = number(record_type).and_then(|n| u8::try_from(n).ok());
                let idc = number(idc).and_then(|n| u8::try_from(n).ok());
                match (record_type, idc) {
                    (Some(record_type), Some(idc)) => Ok(ContentEntry { record_type, idc }),
                    _ => Err(invalid("entry is not numeric".into())),
                }
            }
            _ => Err(invalid("entry must hold a record type and an IDC".into())),
        })
        .collect()
}

/// Read a binary image record. The span comes from its 4-byte length.
fn read_binary(
    descriptor: &RecordDescriptor,
    remaining: &[u8],
    offset: usize,
) -> Result<(Record, usize)> {
    if remaining.len() < BINARY_HEADER_LEN {
        return Err(EftError::malformed(offset, "binary record header is truncated"));
    }
    let length = u32::from_be_bytes([remaining[0], remaining[1], remaining[2], remaining[3]]) as usize;
    if length < BINARY_HEADER_LEN || length > remaining.len() {
        return Err(EftError::malformed(
            offset,
            format!(
                "binary record declares {length} bytes but {} remain",
                remaining.len()
            ),
        ));
    }

    let record_type = descriptor.record_type;
    let text = |number: u16, value: String| {
        Field::from_raw(FieldTag::new(record_type, number), value.as_bytes())
    };
    let fgp = &remaining[6..12];
    let used = fgp
        .iter()
        .rposition(|b| *b != UNUSED_FGP)
        .map_or(1, |last| last + 1);
    let positions = fgp[..used]
        .iter()
        .map(|code| code.to_string().into_bytes())
        .collect();

    let fields = BTreeMap::from([
        (2, text(2, remaining[4].to_string())),
        (3, text(3, remaining[5].to_string())),
        (
            4,
            Field::from_parts(
                FieldTag::new(record_type, 4),
                FieldValue::Structured(vec![positions]),
            ),
        ),
        (5, text(5, remaining[12].to_string())),
        (6, text(6, u16::from_be_bytes([remaining[13], remaining[14]]).to_string())),
        (7, text(7, u16::from_be_bytes([remaining[15], remaining[16]]).to_string())),
        (8, text(8, remaining[17].to_string())),
    ]);
    let image = remaining[BINARY_HEADER_LEN..length].to_vec();
    Ok((
        Record::from_parts(record_type, fields, Some(ImagePayload::Encoded(image))),
        length,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::{EncodeSettings, Encoder};
    use crate::testing::{StubCodec, sample_transaction};
    use openeft_core::types::{QualityLevel, RawImage};

    fn encode(transaction: &Transaction) -> Vec<u8> {
        Encoder::new(Schema::standard()).encode(transaction).unwrap()
    }

    fn decode(bytes: &[u8]) -> Result<Transaction> {
        Decoder::new(Schema::standard()).decode(bytes)
    }

    fn assert_malformed(result: Result<Transaction>) {
        match result {
            Err(EftError::MalformedTransaction { .. }) => {}
            Err(other) => panic!("expected malformed transaction, got {other}"),
            Ok(_) => panic!("expected malformed transaction, got a transaction"),
        }
    }

    #[test]
    fn round_trip_preserves_fields() {
        let schema = Schema::standard();
        let original = sample_transaction(schema, 3);
        let decoded = decode(&encode(&original)).unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn round_trip_of_pending_images_yields_encoded_payloads() {
        let schema = Schema::standard();
        let mut original = sample_transaction(schema, 1);
        let raw = RawImage::new(vec![9u8; 20], 5, 4).unwrap();
        let slap = original.record_of_type_mut(14).unwrap();
        slap.set_image(schema, ImagePayload::Pending(raw)).unwrap();
        let codec = StubCodec::with_sizes(&[(90, 64)]);
        let bytes = Encoder::new(schema)
            .encode_with(
                &original,
                &EncodeSettings {
                    codec: &codec,
                    quality: QualityLevel(90),
                },
            )
            .unwrap();

        let decoded = decode(&bytes).unwrap();
        let slap = decoded.record_of_type(14).unwrap();
        assert_eq!(slap.image().and_then(ImagePayload::encoded).map(<[u8]>::len), Some(64));
        assert_eq!(slap.text(11).as_deref(), Some("WSQ20"));
        assert_eq!(encode(&decoded), bytes);
    }

    #[test]
    fn unknown_fields_survive_byte_for_byte() {
        let schema = Schema::standard();
        let mut original = sample_transaction(schema, 0);
        let demographics = original.record_of_type_mut(2).unwrap();
        let raw = b"odd\x1fvalue\x1e\x7f\x01".to_vec();
        demographics
            .set_field(Field::opaque(schema, FieldTag::new(2, 950), raw.clone()).unwrap())
            .unwrap();
        let bytes = encode(&original);

        let decoded = decode(&bytes).unwrap();
        let field = decoded.record_of_type(2).unwrap().field(950).unwrap();
        assert_eq!(field.value(), &FieldValue::Opaque(raw));
        assert_eq!(encode(&decoded), bytes);
    }

    #[test]
    fn off_by_one_header_length_rejected() {
        let schema = Schema::standard();
        let bytes = encode(&sample_transaction(schema, 1));
        let text = String::from_utf8_lossy(&bytes).into_owned();
        let declared = bytes.len().to_string();
        for wrong in [bytes.len() - 1, bytes.len() + 1] {
            let replaced = text.replacen(
                &format!("1.001:{declared}"),
                &format!("1.001:{wrong}"),
                1,
            );
            assert_malformed(decode(replaced.as_bytes()));
        }
    }

    #[test]
    fn truncated_stream_rejected() {
        let schema = Schema::standard();
        let bytes = encode(&sample_transaction(schema, 2));
        assert_malformed(decode(&bytes[..bytes.len() - 1]));
        assert_malformed(decode(&bytes[..10]));
        assert_malformed(decode(b""));
    }

    #[test]
    fn trailing_bytes_rejected() {
        let schema = Schema::standard();
        let mut bytes = encode(&sample_transaction(schema, 0));
        bytes.push(b'x');
        assert_malformed(decode(&bytes));
    }

    #[test]
    fn record_length_mismatch_rejected() {
        let schema = Schema::standard();
        let bytes = encode(&sample_transaction(schema, 0));
        let header_end = bytes.iter().position(|b| *b == FS).unwrap() + 1;
        let mut corrupt = bytes.clone();
        // "2.001:NN" -> bump the last length digit.
        let digit = header_end + 7;
        corrupt[digit] = if corrupt[digit] == b'9' { b'0' } else { corrupt[digit] + 1 };
        assert_malformed(decode(&corrupt));
    }

    #[test]
    fn strict_record_rejects_unknown_field() {
        let schema = Schema::standard();
        let bytes = encode(&sample_transaction(schema, 1));
        let text = String::from_utf8_lossy(&bytes).into_owned();
        // Same width, so every declared length still holds.
        let tampered = text.replacen("14.012:", "14.019:", 1);
        assert_malformed(decode(tampered.as_bytes()));
    }

    #[test]
    fn content_mismatch_rejected() {
        let schema = Schema::standard();
        let bytes = encode(&sample_transaction(schema, 2));
        let text = String::from_utf8_lossy(&bytes).into_owned();
        let tampered = text.replacen("\u{1e}14\u{1f}02", "\u{1e}14\u{1f}07", 1);
        assert_malformed(decode(tampered.as_bytes()));
    }

    #[test]
    fn out_of_order_fields_rejected() {
        let schema = Schema::standard();
        let bytes = encode(&sample_transaction(schema, 0));
        let text = String::from_utf8_lossy(&bytes).into_owned();
        let tampered = text.replacen("1.004:", "1.002:", 1);
        assert_malformed(decode(tampered.as_bytes()));
    }

    #[test]
    fn binary_record_round_trip() {
        let schema = Schema::standard();
        let mut original = sample_transaction(schema, 0);
        let mut rolled = Record::new(schema, 4).unwrap();
        for (number, value) in [(2, "1"), (3, "1"), (5, "0"), (6, "812"), (7, "750"), (8, "1")] {
            rolled.set_text(schema, number, value).unwrap();
        }
        rolled
            .set_field(Field::items(schema, FieldTag::new(4, 4), &["1", "6"]).unwrap())
            .unwrap();
        rolled
            .set_image(schema, ImagePayload::Encoded(vec![0xFF, 0xA0, 0x1C, 0x1D, 0xFF, 0xA1]))
            .unwrap();
        original.push(schema, rolled).unwrap();

        let bytes = encode(&original);
        let decoded = decode(&bytes).unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn image_data_may_contain_separators() {
        let schema = Schema::standard();
        let mut original = sample_transaction(schema, 1);
        let slap = original.record_of_type_mut(14).unwrap();
        slap.set_image(schema, ImagePayload::Encoded(vec![FS, GS, 0x1E, 0x1F, FS]))
            .unwrap();
        let decoded = decode(&encode(&original)).unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn wire_tags_are_strict() {
        assert_eq!(parse_wire_tag(b"2.018"), Some(FieldTag::new(2, 18)));
        assert_eq!(parse_wire_tag(b"14.999"), Some(FieldTag::new(14, 999)));
        assert_eq!(parse_wire_tag(b" 2.018"), None);
        assert_eq!(parse_wire_tag(b"2018"), None);
        assert_eq!(parse_wire_tag(b"2."), None);
        assert_eq!(parse_wire_tag(b"2.18"), None);
        assert_eq!(parse_wire_tag(b"02.018"), None);
        assert_eq!(parse_wire_tag(b"2.0018"), None);
        assert_eq!(parse_wire_tag(b"14.1000"), Some(FieldTag::new(14, 1000)));
    }

    #[test]
    fn non_canonical_tags_rejected_not_repaired() {
        let schema = Schema::standard();
        let bytes = encode(&sample_transaction(schema, 1));
        let text = String::from_utf8_lossy(&bytes).into_owned();
        // Each rewrite keeps every declared length intact.
        for rewritten in [
            "2.18:DOE, JOHN QQ",
            "02.018:DOE, JOHN ",
            "2.0018:DOE, JOHN ",
        ] {
            let tampered = text.replacen("2.018:DOE, JOHN Q", rewritten, 1);
            assert_eq!(tampered.len(), bytes.len());
            assert_malformed(decode(tampered.as_bytes()));
        }
    }

    #[test]
    fn zero_padded_length_rejected() {
        let schema = Schema::standard();
        let bytes = encode(&sample_transaction(schema, 0));
        let text = String::from_utf8_lossy(&bytes).into_owned();
        let header_end = bytes.iter().position(|b| *b == FS).unwrap() + 1;
        let record_length = text[header_end..]
            .strip_prefix("2.001:")
            .and_then(|rest| rest.split('\u{1d}').next())
            .unwrap()
            .to_string();
        let tampered = text.replacen(
            &format!("2.001:{record_length}\u{1d}2.002:00"),
            &format!("2.001:0{record_length}\u{1d}2.002:0"),
            1,
        );
        assert_eq!(tampered.len(), bytes.len());
        assert_malformed(decode(tampered.as_bytes()));
    }
}
