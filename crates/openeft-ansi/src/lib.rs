// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// OpenEFT ANSI: transaction model, wire encoder and decoder, and the
// compression fitter for ANSI/NIST-ITL fingerprint transactions.

pub mod decoder;
pub mod display;
pub mod edit;
pub mod encoder;
pub mod extract;
pub mod field;
pub mod fitter;
pub mod integrity;
pub mod record;
pub mod schema;
pub mod separators;
pub mod transaction;

#[cfg(test)]
pub(crate) mod testing;

pub use decoder::Decoder;
pub use display::{DisplayKey, render_for_display, text_dump};
pub use edit::{update_display_fields, update_fields};
pub use encoder::{EncodeSettings, Encoder};
pub use extract::{ExtractedImage, extract_images, sniff_format};
pub use field::{Field, FieldTag, FieldValue};
pub use fitter::{FitOutcome, Fitter};
pub use integrity::hash_bytes;
pub use record::{ImagePayload, Record};
pub use schema::Schema;
pub use transaction::Transaction;
