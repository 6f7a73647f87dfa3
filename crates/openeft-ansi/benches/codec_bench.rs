// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Criterion benchmarks for transaction encoding and decoding in the
// openeft-ansi crate.

use criterion::{Criterion, black_box, criterion_group, criterion_main};

use openeft_ansi::{Decoder, Encoder, Fitter, ImagePayload, Record, Schema, Transaction};
use openeft_core::ImageCodec;
use openeft_core::error::Result;
use openeft_core::types::{CompressionAlgorithm, QualityLevel, RawImage};

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

/// Header, demographics and three slap records each carrying `image`.
fn slap_transaction(schema: &Schema, image: ImagePayload) -> Transaction {
    let mut header = Record::new(schema, 1).expect("header");
    for (number, value) in [
        (2, "0200"),
        (4, "FAUF"),
        (5, "20260104"),
        (7, "WVIAFIS0Z"),
        (8, "WVATF0800"),
        (9, "260104-JQD-07"),
        (11, "00.00"),
        (12, "00.00"),
    ] {
        header.set_text(schema, number, value).expect("header field");
    }
    let mut transaction = Transaction::new(header).expect("transaction");

    let mut demographics = Record::new(schema, 2).expect("type 2");
    demographics.set_text(schema, 2, "00").expect("idc");
    demographics.set_text(schema, 18, "DOE, JOHN Q").expect("name");
    transaction.push(schema, demographics).expect("push type 2");

    for (index, position) in ["13", "14", "15"].into_iter().enumerate() {
        let mut slap = Record::new(schema, 14).expect("type 14");
        let idc = format!("{:02}", index + 1);
        for (number, value) in [
            (2, idc.as_str()),
            (3, "0"),
            (4, "WVATF0800"),
            (5, "20260103"),
            (6, "1600"),
            (7, "1000"),
            (8, "1"),
            (9, "500"),
            (10, "500"),
            (11, "WSQ20"),
            (12, "8"),
            (13, position),
        ] {
            slap.set_text(schema, number, value).expect("slap field");
        }
        slap.set_image(schema, image.clone()).expect("image");
        transaction.push(schema, slap).expect("push slap");
    }
    transaction
}

/// Codec whose output is `quality` KiB, so the fitter's walk is predictable.
struct SizedCodec;

impl ImageCodec for SizedCodec {
    fn algorithm(&self) -> CompressionAlgorithm {
        CompressionAlgorithm::Wsq20
    }

    fn name(&self) -> &str {
        "sized"
    }

    fn compress(&self, _image: &RawImage, quality: QualityLevel) -> Result<Vec<u8>> {
        Ok(vec![0xA5; quality.0 as usize * 1024])
    }
}

// ---------------------------------------------------------------------------
// Benchmarks
// ---------------------------------------------------------------------------

/// Encode at image sizes from a tightly compressed slap to an uncompressed one.
fn bench_encode(c: &mut Criterion) {
    let schema = Schema::standard();
    let encoder = Encoder::new(schema);
    let mut group = c.benchmark_group("encode_transaction");
    for &(label, size) in &[("64 KiB", 64 * 1024), ("1 MiB", 1024 * 1024), ("4 MiB", 4 * 1024 * 1024)] {
        let transaction = slap_transaction(schema, ImagePayload::Encoded(vec![0xA5; size]));
        group.bench_function(label, |b| {
            b.iter(|| {
                let bytes = encoder.encode(black_box(&transaction)).expect("encode");
                black_box(bytes);
            });
        });
    }
    group.finish();
}

/// Decode the same transactions back into the model.
fn bench_decode(c: &mut Criterion) {
    let schema = Schema::standard();
    let decoder = Decoder::new(schema);
    let mut group = c.benchmark_group("decode_transaction");
    for &(label, size) in &[("64 KiB", 64 * 1024), ("1 MiB", 1024 * 1024), ("4 MiB", 4 * 1024 * 1024)] {
        let bytes = Encoder::new(schema)
            .encode(&slap_transaction(schema, ImagePayload::Encoded(vec![0xA5; size])))
            .expect("encode");
        group.bench_function(label, |b| {
            b.iter(|| {
                let transaction = decoder.decode(black_box(&bytes)).expect("decode");
                black_box(transaction);
            });
        });
    }
    group.finish();
}

/// Walk a seven-step ladder where only the last level fits.
fn bench_fit(c: &mut Criterion) {
    let schema = Schema::standard();
    let raw = RawImage::new(vec![0u8; 512 * 512], 512, 512).expect("raw");
    let transaction = slap_transaction(schema, ImagePayload::Pending(raw));
    let levels: Vec<QualityLevel> = [350u16, 300, 250, 200, 150, 100, 75]
        .into_iter()
        .map(QualityLevel)
        .collect();
    let fitter = Fitter::new(schema);

    c.bench_function("fit_transaction (7 levels)", |b| {
        b.iter(|| {
            let outcome = fitter
                .fit(black_box(&transaction), &SizedCodec, 300 * 1024, &levels)
                .expect("fit");
            black_box(outcome);
        });
    });
}

criterion_group!(benches, bench_encode, bench_decode, bench_fit);
criterion_main!(benches);
