// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Transaction encoder.
//
// Records are serialized in order, each prefixed by its own length; the
// header is written last (and placed first) because its length field covers
// the whole transaction and its content field lists every other record.

use std::borrow::Cow;
use std::collections::BTreeMap;

use openeft_core::codec::ImageCodec;
use openeft_core::error::{EftError, Result};
use openeft_core::types::{CompressionAlgorithm, QualityLevel};
use tracing::{debug, instrument};

use crate::field::{Field, FieldTag, FieldValue};
use crate::record::{ImagePayload, Record};
use crate::schema::{CONTENT_FIELD, HEADER_RECORD_TYPE, LENGTH_FIELD, RecordDescriptor, Schema};
use crate::separators::{FS, GS};
use crate::transaction::Transaction;

/// Upper bound on length re-estimation passes. A fixed point is normally
/// reached in two or three.
const MAX_LENGTH_PASSES: usize = 8;

/// Fixed header of a binary image record.
pub(crate) const BINARY_HEADER_LEN: usize = 18;
/// Finger position slots in a binary image record header.
pub(crate) const FGP_SLOTS: usize = 6;
/// Filler for unused finger position slots.
pub(crate) const UNUSED_FGP: u8 = 255;

/// Codec and quality used for images that are still uncompressed.
#[derive(Clone, Copy)]
pub struct EncodeSettings<'a> {
    pub codec: &'a dyn ImageCodec,
    pub quality: QualityLevel,
}

/// Serializes transactions against an injected schema.
#[derive(Debug, Clone, Copy)]
pub struct Encoder<'s> {
    schema: &'s Schema,
}

struct ImageData<'r> {
    bytes: Cow<'r, [u8]>,
    /// Set when the encoder compressed the image itself.
    algorithm: Option<CompressionAlgorithm>,
}

impl<'s> Encoder<'s> {
    pub fn new(schema: &'s Schema) -> Self {
        Self { schema }
    }

    /// Encode a transaction whose images are all in wire form already, such
    /// as one produced by the decoder.
    pub fn encode(&self, transaction: &Transaction) -> Result<Vec<u8>> {
        self.encode_inner(transaction, None)
    }

    /// Encode, compressing pending captures with `settings`.
    pub fn encode_with(
        &self,
        transaction: &Transaction,
        settings: &EncodeSettings<'_>,
    ) -> Result<Vec<u8>> {
        self.encode_inner(transaction, Some(settings))
    }

    #[instrument(skip_all, fields(records = transaction.records().len()))]
    fn encode_inner(
        &self,
        transaction: &Transaction,
        settings: Option<&EncodeSettings<'_>>,
    ) -> Result<Vec<u8>> {
        let mut content = vec![vec![
            b"1".to_vec(),
            transaction.records().len().to_string().into_bytes(),
        ]];
        let mut body = Vec::new();

        for (index, record) in transaction.records().iter().enumerate() {
            let descriptor = self.schema.require(record.record_type())?;
            let idc = record.idc().ok_or_else(|| {
                EftError::EncodeError(format!(
                    "record {} ({}) has no numeric IDC",
                    index + 1,
                    descriptor.name
                ))
            })?;
            content.push(vec![
                record.record_type().to_string().into_bytes(),
                format!("{idc:02}").into_bytes(),
            ]);

            let image = image_data(descriptor, record, settings)?;
            let bytes = if descriptor.is_binary() {
                encode_binary(descriptor, record, image)?
            } else {
                encode_tagged(descriptor, record, image, None, 0)?
            };
            debug!(
                record_type = record.record_type(),
                idc,
                len = bytes.len(),
                "encoded record"
            );
            body.extend_from_slice(&bytes);
        }

        let content = Field::from_parts(
            FieldTag::new(HEADER_RECORD_TYPE, CONTENT_FIELD),
            FieldValue::Structured(content),
        );
        let header_descriptor = self.schema.require(HEADER_RECORD_TYPE)?;
        let mut out = encode_tagged(
            header_descriptor,
            transaction.header(),
            None,
            Some(content.encoded_value()),
            body.len(),
        )?;
        out.extend_from_slice(&body);
        debug!(len = out.len(), "encoded transaction");
        Ok(out)
    }
}

fn image_data<'r>(
    descriptor: &RecordDescriptor,
    record: &'r Record,
    settings: Option<&EncodeSettings<'_>>,
) -> Result<Option<ImageData<'r>>> {
    if descriptor.image_field().is_none() {
        return Ok(None);
    }
    match record.image() {
        None => Err(EftError::EncodeError(format!(
            "{} (IDC {}) has no image data",
            descriptor.name,
            record.idc().unwrap_or_default()
        ))),
        Some(ImagePayload::Encoded(bytes)) => Ok(Some(ImageData {
            bytes: Cow::Borrowed(bytes),
            algorithm: None,
        })),
        Some(ImagePayload::Pending(raw)) => {
            let settings = settings.ok_or_else(|| {
                EftError::EncodeError(format!(
                    "{} holds an uncompressed capture but no codec was supplied",
                    descriptor.name
                ))
            })?;
            let bytes = settings.codec.compress(raw, settings.quality)?;
            Ok(Some(ImageData {
                bytes: Cow::Owned(bytes),
                algorithm: Some(settings.codec.algorithm()),
            }))
        }
    }
}

fn check_required(descriptor: &RecordDescriptor, present: impl Fn(u16) -> bool) -> Result<()> {
    let missing: Vec<String> = descriptor
        .required_fields()
        .filter(|spec| !present(spec.number))
        .map(|spec| {
            format!(
                "{} ({})",
                FieldTag::new(descriptor.record_type, spec.number),
                spec.mnemonic
            )
        })
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(EftError::EncodeError(format!(
            "{} is missing required fields: {}",
            descriptor.name,
            missing.join(", ")
        )))
    }
}

fn write_tag(out: &mut Vec<u8>, record_type: u8, field_number: u16) {
    out.extend_from_slice(format!("{record_type}.{field_number:03}:").as_bytes());
}

fn tag_len(record_type: u8, field_number: u16) -> usize {
    format!("{record_type}.{field_number:03}:").len()
}

fn decimal_digits(mut value: usize) -> usize {
    let mut digits = 1;
    while value >= 10 {
        value /= 10;
        digits += 1;
    }
    digits
}

/// Smallest self-consistent value of a length field whose record is `fixed`
/// bytes long without the length digits.
fn stable_length(fixed: usize) -> Result<usize> {
    let mut guess = 0;
    for _ in 0..MAX_LENGTH_PASSES {
        let measured = fixed + decimal_digits(guess);
        if measured == guess {
            return Ok(guess);
        }
        guess = measured;
    }
    Err(EftError::EncodeError(format!(
        "record length did not settle after {MAX_LENGTH_PASSES} passes"
    )))
}

/// Serialize a tagged record. `trailing` is the number of bytes that follow
/// this record and count towards its length field (non-zero for the header).
fn encode_tagged(
    descriptor: &RecordDescriptor,
    record: &Record,
    image: Option<ImageData<'_>>,
    content: Option<Cow<'_, [u8]>>,
    trailing: usize,
) -> Result<Vec<u8>> {
    let record_type = descriptor.record_type;
    let mut values: BTreeMap<u16, Cow<'_, [u8]>> = record
        .fields()
        .filter(|field| field.field_number() != LENGTH_FIELD)
        .map(|field| (field.field_number(), field.encoded_value()))
        .collect();
    if let Some(content) = content {
        values.insert(CONTENT_FIELD, content);
    }
    if let (Some(number), Some(algorithm)) = (
        descriptor.compression_field(),
        image.as_ref().and_then(|image| image.algorithm),
    ) {
        values.insert(number, Cow::Borrowed(algorithm.label().as_bytes()));
    }

    check_required(descriptor, |number| values.contains_key(&number))?;
    for (number, value) in &values {
        if value.iter().any(|b| *b == GS || *b == FS) {
            return Err(EftError::EncodeError(format!(
                "field {} contains a field or record separator",
                FieldTag::new(record_type, *number)
            )));
        }
    }

    let image = match (descriptor.image_field(), image) {
        (Some(number), Some(image)) => Some((number, image.bytes)),
        _ => None,
    };

    let fixed = tag_len(record_type, LENGTH_FIELD)
        + values
            .iter()
            .map(|(number, value)| 1 + tag_len(record_type, *number) + value.len())
            .sum::<usize>()
        + image
            .as_ref()
            .map_or(0, |(number, bytes)| 1 + tag_len(record_type, *number) + bytes.len())
        + 1
        + trailing;
    let length = stable_length(fixed)?;

    let mut out = Vec::with_capacity(length - trailing);
    write_tag(&mut out, record_type, LENGTH_FIELD);
    out.extend_from_slice(length.to_string().as_bytes());
    for (number, value) in &values {
        out.push(GS);
        write_tag(&mut out, record_type, *number);
        out.extend_from_slice(value);
    }
    if let Some((number, bytes)) = &image {
        out.push(GS);
        write_tag(&mut out, record_type, *number);
        out.extend_from_slice(bytes);
    }
    out.push(FS);

    if out.len() + trailing != length {
        return Err(EftError::EncodeError(format!(
            "type-{record_type} record measured {} bytes but declares {length}",
            out.len() + trailing
        )));
    }
    Ok(out)
}

/// Serialize a binary image record: an 18-byte big-endian header followed by
/// the image data.
fn encode_binary(
    descriptor: &RecordDescriptor,
    record: &Record,
    image: Option<ImageData<'_>>,
) -> Result<Vec<u8>> {
    let record_type = descriptor.record_type;
    let image = image.ok_or_else(|| {
        EftError::EncodeError(format!("{} has no image data", descriptor.name))
    })?;
    let cga_override = image.algorithm.map(|algorithm| algorithm.code());
    check_required(descriptor, |number| {
        record.field(number).is_some()
            || (Some(number) == descriptor.compression_field() && cga_override.is_some())
    })?;

    let number = |field_number: u16| -> Result<u32> {
        let tag = FieldTag::new(record_type, field_number);
        let text = record
            .text(field_number)
            .ok_or_else(|| EftError::EncodeError(format!("field {tag} is missing")))?;
        text.trim().parse().map_err(|_| {
            EftError::EncodeError(format!("field {tag} value '{text}' is not a number"))
        })
    };
    let byte = |field_number: u16| -> Result<u8> {
        let value = number(field_number)?;
        u8::try_from(value).map_err(|_| {
            EftError::EncodeError(format!(
                "field {} value {value} does not fit in one byte",
                FieldTag::new(record_type, field_number)
            ))
        })
    };
    let short = |field_number: u16| -> Result<u16> {
        let value = number(field_number)?;
        u16::try_from(value).map_err(|_| {
            EftError::EncodeError(format!(
                "field {} value {value} does not fit in two bytes",
                FieldTag::new(record_type, field_number)
            ))
        })
    };

    let fgp_tag = FieldTag::new(record_type, 4);
    let positions: Vec<&[u8]> = record
        .field(4)
        .and_then(Field::subfields)
        .map(|subfields| subfields.iter().flatten().map(Vec::as_slice).collect())
        .unwrap_or_default();
    if positions.len() > FGP_SLOTS {
        return Err(EftError::EncodeError(format!(
            "field {fgp_tag} lists {} positions; at most {FGP_SLOTS} fit",
            positions.len()
        )));
    }
    let mut fgp = [UNUSED_FGP; FGP_SLOTS];
    for (slot, item) in fgp.iter_mut().zip(&positions) {
        *slot = std::str::from_utf8(item)
            .ok()
            .and_then(|text| text.trim().parse().ok())
            .ok_or_else(|| {
                EftError::EncodeError(format!(
                    "field {fgp_tag} item '{}' is not a position code",
                    String::from_utf8_lossy(item)
                ))
            })?;
    }

    let total = BINARY_HEADER_LEN + image.bytes.len();
    let length = u32::try_from(total).map_err(|_| {
        EftError::EncodeError(format!("{} of {total} bytes is too long", descriptor.name))
    })?;
    let cga = match cga_override {
        Some(code) => code,
        None => byte(8)?,
    };

    let mut out = Vec::with_capacity(total);
    out.extend_from_slice(&length.to_be_bytes());
    out.push(byte(2)?);
    out.push(byte(3)?);
    out.extend_from_slice(&fgp);
    out.push(byte(5)?);
    out.extend_from_slice(&short(6)?.to_be_bytes());
    out.extend_from_slice(&short(7)?.to_be_bytes());
    out.push(cga);
    out.extend_from_slice(&image.bytes);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{StubCodec, sample_transaction};
    use openeft_core::types::RawImage;

    fn declared_length(record: &[u8]) -> usize {
        let colon = record.iter().position(|b| *b == b':').unwrap();
        let end = record
            .iter()
            .position(|b| *b == GS || *b == FS)
            .unwrap();
        std::str::from_utf8(&record[colon + 1..end])
            .unwrap()
            .parse()
            .unwrap()
    }

    #[test]
    fn header_length_matches_output() {
        let schema = Schema::standard();
        let bytes = Encoder::new(schema)
            .encode(&sample_transaction(schema, 1))
            .unwrap();
        assert!(bytes.starts_with(b"1.001:"));
        assert_eq!(declared_length(&bytes), bytes.len());
    }

    #[test]
    fn content_field_lists_records() {
        let schema = Schema::standard();
        let bytes = Encoder::new(schema)
            .encode(&sample_transaction(schema, 2))
            .unwrap();
        let text = String::from_utf8_lossy(&bytes);
        assert!(text.contains("1.003:1\u{1f}3\u{1e}2\u{1f}00\u{1e}14\u{1f}01\u{1e}14\u{1f}02"));
    }

    #[test]
    fn stable_length_crosses_digit_boundary() {
        assert_eq!(stable_length(995).unwrap(), 998);
        assert_eq!(stable_length(996).unwrap(), 999);
        // 997 + 3 = 1000 has four digits, so the record settles at 1001.
        assert_eq!(stable_length(997).unwrap(), 1001);
        assert_eq!(stable_length(998).unwrap(), 1002);
        assert_eq!(stable_length(8).unwrap(), 9);
        assert_eq!(stable_length(9).unwrap(), 11);
    }

    #[test]
    fn record_at_thousand_byte_boundary_is_self_consistent() {
        let schema = Schema::standard();
        let encoder = Encoder::new(schema);
        for padding in 940..1010 {
            let mut transaction = sample_transaction(schema, 0);
            let demographics = transaction.record_of_type_mut(2).unwrap();
            demographics
                .set_text(schema, 500, "X".repeat(padding))
                .unwrap();
            let bytes = encoder.encode(&transaction).unwrap();
            let header_end = bytes.iter().position(|b| *b == FS).unwrap() + 1;
            let record = &bytes[header_end..];
            assert_eq!(declared_length(record), record.len(), "padding {padding}");
            assert_eq!(declared_length(&bytes), bytes.len());
        }
    }

    #[test]
    fn missing_required_field_is_encode_error() {
        let schema = Schema::standard();
        let mut transaction = sample_transaction(schema, 0);
        transaction.header_mut().remove(9);
        let err = Encoder::new(schema).encode(&transaction).unwrap_err();
        match err {
            EftError::EncodeError(detail) => assert!(detail.contains("1.009 (TCN)")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn image_record_without_image_is_encode_error() {
        let schema = Schema::standard();
        let mut transaction = sample_transaction(schema, 0);
        let mut slap = Record::new(schema, 14).unwrap();
        for (number, value) in [(2, "01"), (3, "0"), (4, "X"), (5, "20260101")] {
            slap.set_text(schema, number, value).unwrap();
        }
        transaction.push(schema, slap).unwrap();
        assert!(matches!(
            Encoder::new(schema).encode(&transaction),
            Err(EftError::EncodeError(_))
        ));
    }

    #[test]
    fn pending_image_needs_codec() {
        let schema = Schema::standard();
        let mut transaction = sample_transaction(schema, 1);
        let raw = RawImage::new(vec![7u8; 16], 4, 4).unwrap();
        let slap = transaction.record_of_type_mut(14).unwrap();
        slap.set_image(schema, ImagePayload::Pending(raw)).unwrap();
        let encoder = Encoder::new(schema);
        assert!(matches!(
            encoder.encode(&transaction),
            Err(EftError::EncodeError(_))
        ));

        let codec = StubCodec::with_sizes(&[(50, 40)]);
        let bytes = encoder
            .encode_with(
                &transaction,
                &EncodeSettings {
                    codec: &codec,
                    quality: QualityLevel(50),
                },
            )
            .unwrap();
        let text = String::from_utf8_lossy(&bytes);
        assert!(text.contains("14.011:WSQ20"));
        assert_eq!(declared_length(&bytes), bytes.len());
    }

    #[test]
    fn separator_in_opaque_value_is_rejected() {
        let schema = Schema::standard();
        let mut transaction = sample_transaction(schema, 0);
        let demographics = transaction.record_of_type_mut(2).unwrap();
        let field = Field::from_parts(
            FieldTag::new(2, 600),
            FieldValue::Opaque(b"a\x1db".to_vec()),
        );
        demographics.set_field(field).unwrap();
        assert!(matches!(
            Encoder::new(schema).encode(&transaction),
            Err(EftError::EncodeError(_))
        ));
    }

    #[test]
    fn binary_record_header_layout() {
        let schema = Schema::standard();
        let mut transaction = sample_transaction(schema, 0);
        let mut rolled = Record::new(schema, 4).unwrap();
        for (number, value) in [(2, "3"), (3, "1"), (5, "0"), (6, "800"), (7, "750"), (8, "1")] {
            rolled.set_text(schema, number, value).unwrap();
        }
        rolled.set_text(schema, 4, "2").unwrap();
        rolled
            .set_image(schema, ImagePayload::Encoded(vec![0xFF, 0xA0, 1, 2]))
            .unwrap();
        transaction.push(schema, rolled).unwrap();

        let bytes = Encoder::new(schema).encode(&transaction).unwrap();
        let record = &bytes[bytes.len() - 22..];
        assert_eq!(&record[..4], &22u32.to_be_bytes());
        assert_eq!(record[4], 3);
        assert_eq!(record[5], 1);
        assert_eq!(&record[6..12], &[2, 255, 255, 255, 255, 255]);
        assert_eq!(record[12], 0);
        assert_eq!(&record[13..15], &800u16.to_be_bytes());
        assert_eq!(&record[15..17], &750u16.to_be_bytes());
        assert_eq!(record[17], 1);
        assert_eq!(&record[18..], &[0xFF, 0xA0, 1, 2]);
    }

    #[test]
    fn binary_field_out_of_range_is_encode_error() {
        let schema = Schema::standard();
        let mut transaction = sample_transaction(schema, 0);
        let mut rolled = Record::new(schema, 4).unwrap();
        for (number, value) in [(2, "1"), (3, "1"), (4, "1"), (5, "0"), (6, "70000"), (7, "750"), (8, "1")] {
            rolled.set_text(schema, number, value).unwrap();
        }
        rolled
            .set_image(schema, ImagePayload::Encoded(vec![0]))
            .unwrap();
        transaction.push(schema, rolled).unwrap();
        assert!(matches!(
            Encoder::new(schema).encode(&transaction),
            Err(EftError::EncodeError(_))
        ));
    }
}
