// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Record-type schema table.
//
// The table is built once per process and only ever read afterwards. It is
// passed by reference into the model constructors, the encoder and the
// decoder rather than consulted as a global from inside them.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use openeft_core::error::{EftError, Result};

use crate::field::FieldTag;

/// Record type of the transaction header.
pub const HEADER_RECORD_TYPE: u8 = 1;
/// Every record's self-describing length field.
pub const LENGTH_FIELD: u16 = 1;
/// Header field listing the records that follow (CNT).
pub const CONTENT_FIELD: u16 = 3;
/// Field number carrying image data in image records.
pub const IMAGE_FIELD: u16 = 999;

/// What the decoder does with field numbers the table does not list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnknownFields {
    /// Keep them verbatim so edit-and-resave preserves them.
    Permit,
    /// Treat them as a malformed transaction.
    Reject,
}

/// How a record type is laid out on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordLayout {
    /// `T.NNN:value` fields separated by GS and terminated by FS.
    Tagged { unknown_fields: UnknownFields },
    /// Fixed big-endian header followed by image data (Type-4).
    Binary,
}

/// One field the schema knows about.
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub number: u16,
    pub mnemonic: &'static str,
    pub required: bool,
}

const fn spec(number: u16, mnemonic: &'static str, required: bool) -> FieldSpec {
    FieldSpec {
        number,
        mnemonic,
        required,
    }
}

/// Descriptor for one record type.
#[derive(Debug, Clone)]
pub struct RecordDescriptor {
    pub record_type: u8,
    pub name: &'static str,
    pub layout: RecordLayout,
    /// At most one record of this type per transaction.
    pub unique: bool,
    fields: &'static [FieldSpec],
    /// Fields the encoder computes and callers may never supply.
    computed: &'static [u16],
    image_field: Option<u16>,
    compression_field: Option<u16>,
}

impl RecordDescriptor {
    pub fn field_spec(&self, number: u16) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.number == number)
    }

    pub fn mnemonic(&self, number: u16) -> Option<&'static str> {
        if Some(number) == self.image_field {
            return Some("DATA");
        }
        self.field_spec(number).map(|f| f.mnemonic)
    }

    /// Listed, computed, or image field.
    pub fn knows(&self, number: u16) -> bool {
        self.field_spec(number).is_some() || Some(number) == self.image_field
    }

    pub fn is_computed(&self, number: u16) -> bool {
        self.computed.contains(&number)
    }

    pub fn permits_unknown(&self) -> bool {
        matches!(
            self.layout,
            RecordLayout::Tagged {
                unknown_fields: UnknownFields::Permit
            }
        )
    }

    pub fn is_binary(&self) -> bool {
        self.layout == RecordLayout::Binary
    }

    pub fn image_field(&self) -> Option<u16> {
        self.image_field
    }

    /// Field the encoder stamps with the codec that produced the image.
    pub fn compression_field(&self) -> Option<u16> {
        self.compression_field
    }

    pub fn required_fields(&self) -> impl Iterator<Item = &FieldSpec> {
        self.fields.iter().filter(|f| f.required)
    }

    /// Whether a caller may store a value under `number` in this record type.
    pub fn accepts(&self, number: u16) -> bool {
        number > LENGTH_FIELD
            && !self.is_computed(number)
            && Some(number) != self.image_field
            && (self.field_spec(number).is_some() || self.permits_unknown())
    }
}

/// Immutable lookup from record type to descriptor.
#[derive(Debug, Clone)]
pub struct Schema {
    records: BTreeMap<u8, RecordDescriptor>,
}

static STANDARD: LazyLock<Schema> = LazyLock::new(|| {
    Schema::new([
        type1_descriptor(),
        type2_descriptor(),
        type4_descriptor(),
        type14_descriptor(),
    ])
});

impl Schema {
    pub fn new(descriptors: impl IntoIterator<Item = RecordDescriptor>) -> Self {
        Self {
            records: descriptors
                .into_iter()
                .map(|d| (d.record_type, d))
                .collect(),
        }
    }

    /// Header, demographic, and fingerprint image record types.
    pub fn standard() -> &'static Schema {
        &STANDARD
    }

    pub fn descriptor(&self, record_type: u8) -> Option<&RecordDescriptor> {
        self.records.get(&record_type)
    }

    /// Descriptor for `record_type`, or `SchemaViolation` if unknown.
    pub fn require(&self, record_type: u8) -> Result<&RecordDescriptor> {
        self.descriptor(record_type).ok_or_else(|| {
            EftError::SchemaViolation(format!("record type {record_type} is not in the schema"))
        })
    }

    /// Validate that a caller may build a field with this tag.
    pub fn check_field(&self, tag: FieldTag) -> Result<&RecordDescriptor> {
        let descriptor = self.require(tag.record_type)?;
        if tag.field_number < LENGTH_FIELD {
            return Err(EftError::SchemaViolation(format!(
                "field {tag} would sort before the length field"
            )));
        }
        if descriptor.is_computed(tag.field_number) {
            return Err(EftError::SchemaViolation(format!(
                "field {tag} is computed by the encoder"
            )));
        }
        if Some(tag.field_number) == descriptor.image_field {
            return Err(EftError::SchemaViolation(format!(
                "field {tag} holds image data; attach it as the record's image"
            )));
        }
        if !descriptor.accepts(tag.field_number) {
            return Err(EftError::SchemaViolation(format!(
                "field {tag} is not defined for {}",
                descriptor.name
            )));
        }
        Ok(descriptor)
    }

    pub fn record_types(&self) -> impl Iterator<Item = &RecordDescriptor> {
        self.records.values()
    }
}

static TYPE1_FIELDS: [FieldSpec; 15] = [
    spec(1, "LEN", false),
    spec(2, "VER", true),
    spec(3, "CNT", false),
    spec(4, "TOT", true),
    spec(5, "DAT", true),
    spec(6, "PRY", false),
    spec(7, "DAI", true),
    spec(8, "ORI", true),
    spec(9, "TCN", true),
    spec(10, "TCR", false),
    spec(11, "NSR", true),
    spec(12, "NTR", true),
    spec(13, "DOM", false),
    spec(14, "GMT", false),
    spec(15, "DCS", false),
];

static TYPE2_FIELDS: [FieldSpec; 20] = [
    spec(1, "LEN", false),
    spec(2, "IDC", true),
    spec(5, "RET", false),
    spec(16, "SOC", false),
    spec(18, "NAM", false),
    spec(19, "AKA", false),
    spec(20, "POB", false),
    spec(21, "CTZ", false),
    spec(22, "DOB", false),
    spec(24, "SEX", false),
    spec(25, "RAC", false),
    spec(27, "HGT", false),
    spec(29, "WGT", false),
    spec(31, "EYE", false),
    spec(32, "HAI", false),
    spec(37, "RFP", false),
    spec(38, "DPR", false),
    spec(41, "RES", false),
    spec(73, "CRI", false),
    spec(84, "AMP", false),
];

static TYPE4_FIELDS: [FieldSpec; 8] = [
    spec(1, "LEN", false),
    spec(2, "IDC", true),
    spec(3, "IMP", true),
    spec(4, "FGP", true),
    spec(5, "ISR", true),
    spec(6, "HLL", true),
    spec(7, "VLL", true),
    spec(8, "CGA", true),
];

static TYPE14_FIELDS: [FieldSpec; 28] = [
    spec(1, "LEN", false),
    spec(2, "IDC", true),
    spec(3, "IMP", true),
    spec(4, "SRC", true),
    spec(5, "FCD", true),
    spec(6, "HLL", true),
    spec(7, "VLL", true),
    spec(8, "SLC", true),
    spec(9, "THPS", true),
    spec(10, "TVPS", true),
    spec(11, "CGA", true),
    spec(12, "BPX", true),
    spec(13, "FGP", true),
    spec(14, "PPD", false),
    spec(15, "PPC", false),
    spec(16, "SHPS", false),
    spec(17, "SVPS", false),
    spec(18, "AMP", false),
    spec(20, "COM", false),
    spec(21, "SEG", false),
    spec(22, "NQM", false),
    spec(23, "SQM", false),
    spec(24, "FQM", false),
    spec(25, "ASEG", false),
    spec(26, "SCF", false),
    spec(27, "SIF", false),
    spec(30, "DMM", false),
    spec(31, "FAP", false),
];

fn type1_descriptor() -> RecordDescriptor {
    RecordDescriptor {
        record_type: HEADER_RECORD_TYPE,
        name: "Type-1 transaction information record",
        layout: RecordLayout::Tagged {
            unknown_fields: UnknownFields::Reject,
        },
        unique: true,
        fields: &TYPE1_FIELDS,
        computed: &[LENGTH_FIELD, CONTENT_FIELD],
        image_field: None,
        compression_field: None,
    }
}

fn type2_descriptor() -> RecordDescriptor {
    RecordDescriptor {
        record_type: 2,
        name: "Type-2 user-defined descriptive text record",
        layout: RecordLayout::Tagged {
            unknown_fields: UnknownFields::Permit,
        },
        unique: true,
        fields: &TYPE2_FIELDS,
        computed: &[LENGTH_FIELD],
        image_field: None,
        compression_field: None,
    }
}

fn type4_descriptor() -> RecordDescriptor {
    RecordDescriptor {
        record_type: 4,
        name: "Type-4 high-resolution grayscale fingerprint image record",
        layout: RecordLayout::Binary,
        unique: false,
        fields: &TYPE4_FIELDS,
        computed: &[LENGTH_FIELD],
        image_field: Some(IMAGE_FIELD),
        compression_field: Some(8),
    }
}

fn type14_descriptor() -> RecordDescriptor {
    RecordDescriptor {
        record_type: 14,
        name: "Type-14 variable-resolution fingerprint image record",
        layout: RecordLayout::Tagged {
            unknown_fields: UnknownFields::Reject,
        },
        unique: false,
        fields: &TYPE14_FIELDS,
        computed: &[LENGTH_FIELD],
        image_field: Some(IMAGE_FIELD),
        compression_field: Some(11),
    }
}
