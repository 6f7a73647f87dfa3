// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Shared fixtures for unit tests.

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::time::Duration;

use openeft_core::codec::ImageCodec;
use openeft_core::error::{EftError, Result};
use openeft_core::types::{CompressionAlgorithm, QualityLevel, RawImage};

use crate::record::{ImagePayload, Record};
use crate::schema::Schema;
use crate::transaction::Transaction;

/// Codec returning a fixed number of bytes per quality level, optionally
/// timing out on the first few calls.
pub struct StubCodec {
    sizes: BTreeMap<u16, usize>,
    timeouts_left: Mutex<usize>,
    calls: Mutex<Vec<QualityLevel>>,
}

impl StubCodec {
    pub fn with_sizes(sizes: &[(u16, usize)]) -> Self {
        Self {
            sizes: sizes.iter().copied().collect(),
            timeouts_left: Mutex::new(0),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn timing_out(mut self, times: usize) -> Self {
        self.timeouts_left = Mutex::new(times);
        self
    }

    pub fn calls(&self) -> Vec<QualityLevel> {
        self.calls.lock().unwrap().clone()
    }
}

impl ImageCodec for StubCodec {
    fn algorithm(&self) -> CompressionAlgorithm {
        CompressionAlgorithm::Wsq20
    }

    fn name(&self) -> &str {
        "stub"
    }

    fn compress(&self, _image: &RawImage, quality: QualityLevel) -> Result<Vec<u8>> {
        self.calls.lock().unwrap().push(quality);
        let mut timeouts = self.timeouts_left.lock().unwrap();
        if *timeouts > 0 {
            *timeouts -= 1;
            return Err(EftError::CodecTimeout {
                codec: "stub".into(),
                deadline: Duration::from_millis(1),
            });
        }
        let size = self
            .sizes
            .get(&quality.0)
            .copied()
            .ok_or_else(|| EftError::Codec(format!("no size for quality {quality}")))?;
        Ok(vec![0xA5; size])
    }
}

/// Header, demographics and `slaps` Type-14 records with small encoded images.
pub fn sample_transaction(schema: &Schema, slaps: usize) -> Transaction {
    let mut header = Record::new(schema, 1).unwrap();
    for (number, value) in [
        (2, "0200"),
        (4, "FAUF"),
        (5, "20260104"),
        (6, "5"),
        (7, "WVIAFIS0Z"),
        (8, "WVATF0800"),
        (9, "260104-JQD-07"),
        (11, "00.00"),
        (12, "00.00"),
    ] {
        header.set_text(schema, number, value).unwrap();
    }
    let mut transaction = Transaction::new(header).unwrap();

    let mut demographics = Record::new(schema, 2).unwrap();
    for (number, value) in [
        (2, "00"),
        (5, "N"),
        (18, "DOE, JOHN Q"),
        (22, "19800131"),
        (24, "M"),
        (37, "Firearms"),
        (73, "WVATF0800"),
    ] {
        demographics.set_text(schema, number, value).unwrap();
    }
    transaction.push(schema, demographics).unwrap();

    for index in 0..slaps {
        let mut slap = Record::new(schema, 14).unwrap();
        let idc = format!("{:02}", index + 1);
        let position = (13 + index % 3).to_string();
        for (number, value) in [
            (2, idc.as_str()),
            (3, "0"),
            (4, "WVATF0800"),
            (5, "20260103"),
            (6, "16"),
            (7, "8"),
            (8, "1"),
            (9, "500"),
            (10, "500"),
            (11, "NONE"),
            (12, "8"),
            (13, position.as_str()),
        ] {
            slap.set_text(schema, number, value).unwrap();
        }
        slap.set_image(schema, ImagePayload::Encoded(vec![0x80; 128]))
            .unwrap();
        transaction.push(schema, slap).unwrap();
    }
    transaction
}
