// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Compression fitter: walks a descending quality ladder until the encoded
// transaction fits the agency's size ceiling.

use openeft_core::codec::ImageCodec;
use openeft_core::config::validate_ladder;
use openeft_core::error::{EftError, Result};
use openeft_core::human_errors::classify_error;
use openeft_core::types::{ErrorClass, FitAttempt, QualityLevel};
use tracing::{debug, info, instrument, warn};

use crate::encoder::{EncodeSettings, Encoder};
use crate::integrity::hash_bytes;
use crate::schema::Schema;
use crate::transaction::Transaction;

/// The accepted encoding and how it was reached.
#[derive(Debug, Clone)]
pub struct FitOutcome {
    pub bytes: Vec<u8>,
    pub quality: QualityLevel,
    /// Every level tried, in order, including the accepted one.
    pub attempts: Vec<FitAttempt>,
    /// SHA-256 of `bytes`, hex encoded.
    pub sha256: String,
}

/// First-fit search over quality levels, best first.
///
/// The first level whose output is within the ceiling wins, even if a lower
/// level would have been smaller. Codec output is assumed to shrink as the
/// quality drops.
#[derive(Debug, Clone, Copy)]
pub struct Fitter<'s> {
    encoder: Encoder<'s>,
}

impl<'s> Fitter<'s> {
    pub fn new(schema: &'s Schema) -> Self {
        Self {
            encoder: Encoder::new(schema),
        }
    }

    #[instrument(skip_all, fields(codec = codec.name(), max_bytes = max_bytes, levels = levels.len()))]
    pub fn fit(
        &self,
        transaction: &Transaction,
        codec: &dyn ImageCodec,
        max_bytes: u64,
        levels: &[QualityLevel],
    ) -> Result<FitOutcome> {
        validate_ladder(levels)?;
        let mut attempts = Vec::with_capacity(levels.len());

        for &quality in levels {
            let bytes = self.encode_at(transaction, codec, quality)?;
            let encoded_len = bytes.len();
            attempts.push(FitAttempt {
                quality,
                encoded_len,
            });

            if encoded_len as u64 <= max_bytes {
                let sha256 = hash_bytes(&bytes);
                info!(%quality, encoded_len, %sha256, "transaction fits size ceiling");
                return Ok(FitOutcome {
                    bytes,
                    quality,
                    attempts,
                    sha256,
                });
            }
            debug!(%quality, encoded_len, "over size ceiling");
        }

        warn!(attempts = attempts.len(), "no quality level fits size ceiling");
        Err(EftError::SizeUnattainable {
            max_bytes,
            attempts,
        })
    }

    /// Encode once at `quality`, retrying a single time if the codec stalled.
    fn encode_at(
        &self,
        transaction: &Transaction,
        codec: &dyn ImageCodec,
        quality: QualityLevel,
    ) -> Result<Vec<u8>> {
        let settings = EncodeSettings { codec, quality };
        match self.encoder.encode_with(transaction, &settings) {
            Err(err) if classify_error(&err) == ErrorClass::Transient => {
                warn!(%quality, error = %err, "codec failed transiently, retrying once");
                self.encoder.encode_with(transaction, &settings)
            }
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::ImagePayload;
    use crate::testing::{StubCodec, sample_transaction};
    use openeft_core::types::RawImage;

    const MB: usize = 1_000_000;

    fn pending_transaction() -> Transaction {
        let schema = Schema::standard();
        let mut transaction = sample_transaction(schema, 1);
        let raw = RawImage::new(vec![0u8; 64], 8, 8).unwrap();
        transaction
            .record_of_type_mut(14)
            .unwrap()
            .set_image(schema, ImagePayload::Pending(raw))
            .unwrap();
        transaction
    }

    fn ladder(levels: &[u16]) -> Vec<QualityLevel> {
        levels.iter().copied().map(QualityLevel).collect()
    }

    #[test]
    fn first_level_under_ceiling_wins() {
        let codec = StubCodec::with_sizes(&[(90, 15 * MB), (70, 9 * MB), (50, 6 * MB), (30, 4 * MB)]);
        let outcome = Fitter::new(Schema::standard())
            .fit(&pending_transaction(), &codec, 12_000_000, &ladder(&[90, 70, 50, 30]))
            .unwrap();
        assert_eq!(outcome.quality, QualityLevel(70));
        assert_eq!(outcome.attempts.len(), 2);
        assert!(outcome.bytes.len() > 9 * MB && outcome.bytes.len() <= 12_000_000);
        assert_eq!(outcome.sha256, hash_bytes(&outcome.bytes));
        assert_eq!(codec.calls(), ladder(&[90, 70]));
    }

    #[test]
    fn exhaustion_reports_every_attempt() {
        let codec = StubCodec::with_sizes(&[(90, 15 * MB), (70, 14 * MB), (50, 13 * MB), (30, 12 * MB)]);
        let err = Fitter::new(Schema::standard())
            .fit(&pending_transaction(), &codec, 12_000_000, &ladder(&[90, 70, 50, 30]))
            .unwrap_err();
        match err {
            EftError::SizeUnattainable {
                max_bytes,
                attempts,
            } => {
                assert_eq!(max_bytes, 12_000_000);
                let tried: Vec<u16> = attempts.iter().map(|a| a.quality.0).collect();
                assert_eq!(tried, vec![90, 70, 50, 30]);
                assert!(attempts.iter().all(|a| a.encoded_len > 12_000_000));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn timeout_retried_once_at_same_level() {
        let codec = StubCodec::with_sizes(&[(90, 1000)]).timing_out(1);
        let outcome = Fitter::new(Schema::standard())
            .fit(&pending_transaction(), &codec, 12_000_000, &ladder(&[90]))
            .unwrap();
        assert_eq!(outcome.quality, QualityLevel(90));
        assert_eq!(codec.calls(), ladder(&[90, 90]));
    }

    #[test]
    fn second_timeout_escalates() {
        let codec = StubCodec::with_sizes(&[(90, 1000), (70, 500)]).timing_out(2);
        let err = Fitter::new(Schema::standard())
            .fit(&pending_transaction(), &codec, 12_000_000, &ladder(&[90, 70]))
            .unwrap_err();
        assert!(matches!(err, EftError::CodecTimeout { .. }));
        assert_eq!(codec.calls(), ladder(&[90, 90]));
    }

    #[test]
    fn codec_failure_is_not_retried() {
        let codec = StubCodec::with_sizes(&[]);
        let err = Fitter::new(Schema::standard())
            .fit(&pending_transaction(), &codec, 12_000_000, &ladder(&[90]))
            .unwrap_err();
        assert!(matches!(err, EftError::Codec(_)));
        assert_eq!(codec.calls().len(), 1);
    }

    #[test]
    fn ladder_must_descend() {
        let codec = StubCodec::with_sizes(&[(90, 10)]);
        let fitter = Fitter::new(Schema::standard());
        for levels in [ladder(&[]), ladder(&[50, 90]), ladder(&[70, 70])] {
            assert!(matches!(
                fitter.fit(&pending_transaction(), &codec, 100, &levels),
                Err(EftError::InvalidConfig(_))
            ));
        }
        assert!(codec.calls().is_empty());
    }
}
