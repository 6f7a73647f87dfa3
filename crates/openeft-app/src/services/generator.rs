// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Transaction generation: assembles header, demographic and image records
// from operator input and fits the result under the agency size ceiling.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::NaiveDate;
use openeft_ansi::{Field, FieldTag, Fitter, ImagePayload, Record, Schema, Transaction};
use openeft_core::EftConfig;
use openeft_core::codec::{ImageCodec, QualityScorer, Segmenter};
use openeft_core::config::CodecChoice;
use openeft_core::error::{EftError, Result};
use openeft_core::types::{
    FingerPosition, FingerSegment, ImpressionType, QualityLevel, RawImage, RecordMode,
};
use openeft_imaging::processor::{crop_segment, normalise_type4};
use openeft_imaging::{CwsqCodec, JpegCodec, NfiqScorer, NfsegSegmenter, TimedCodec, Uncompressed};
use rand::Rng;
use tracing::{debug, info, instrument, warn};

use super::demographics::{self, NAME};

/// Score written to 14.024 when the scorer could not grade a capture.
pub const UNSCORED: u8 = 255;

const DEMOGRAPHIC_RECORD: u8 = 2;
const SEGMENT_FIELD: u16 = 21;
const SEGMENT_QUALITY_FIELD: u16 = 23;
const QUALITY_METRIC_FIELD: u16 = 24;

/// One grayscale capture and the position it was taken at.
#[derive(Debug, Clone)]
pub struct Capture {
    pub position: FingerPosition,
    pub image: RawImage,
}

/// Per-call inputs that are not part of the persistent configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenerateRequest {
    /// Written to 1.005, 2.038 and 14.005, and the first half of the TCN.
    pub capture_date: NaiveDate,
    /// Two-digit TCN suffix; random 1-99 when absent.
    pub sequence: Option<u8>,
    /// Leave 2.016 empty whatever the operator entered.
    pub bypass_ssn: bool,
}

impl GenerateRequest {
    /// Dated the day before the local date, random sequence.
    pub fn today() -> Self {
        let today = chrono::Local::now().date_naive();
        Self {
            capture_date: today.pred_opt().unwrap_or(today),
            sequence: None,
            bypass_ssn: false,
        }
    }
}

/// A finished submission.
#[derive(Debug, Clone)]
pub struct GeneratedEft {
    /// Transaction control number (1.009).
    pub tcn: String,
    /// `<tcn>.eft`
    pub file_name: String,
    pub bytes: Vec<u8>,
    /// Ladder level the images were compressed at; `None` when they were
    /// embedded uncompressed.
    pub quality: Option<QualityLevel>,
    pub sha256: String,
}

/// Builds and fits EFT submissions with the configured codec.
#[derive(Clone)]
pub struct EftService {
    config: EftConfig,
    schema: &'static Schema,
    codec: Arc<dyn ImageCodec>,
    scorer: Option<Arc<dyn QualityScorer>>,
    segmenter: Option<Arc<dyn Segmenter>>,
}

impl EftService {
    /// Service using the codec and scorer named in `config`.
    pub fn new(config: EftConfig) -> Result<Self> {
        config.validate()?;
        let deadline = config.codec_timeout();
        let codec: Arc<dyn ImageCodec> = match config.codec {
            CodecChoice::Wsq => Arc::new(CwsqCodec::new(
                config.cwsq_program.as_str(),
                config.pixels_per_inch,
                deadline,
            )),
            CodecChoice::Jpeg => Arc::new(TimedCodec::new(Arc::new(JpegCodec), deadline)),
        };
        let scorer: Option<Arc<dyn QualityScorer>> = config.score_quality.then(|| {
            Arc::new(NfiqScorer::new(config.nfiq_program.as_str(), deadline))
                as Arc<dyn QualityScorer>
        });
        let segmenter: Option<Arc<dyn Segmenter>> = config.segment_slaps.then(|| {
            Arc::new(NfsegSegmenter::new(config.nfseg_program.as_str(), deadline))
                as Arc<dyn Segmenter>
        });
        info!(
            codec = codec.name(),
            scoring = scorer.is_some(),
            segmenting = segmenter.is_some(),
            "EFT service initialised"
        );
        Ok(Self {
            config,
            schema: Schema::standard(),
            codec,
            scorer,
            segmenter,
        })
    }

    /// Service with a caller-supplied codec, no scorer and no segmenter.
    pub fn with_codec(config: EftConfig, codec: Arc<dyn ImageCodec>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            schema: Schema::standard(),
            codec,
            scorer: None,
            segmenter: None,
        })
    }

    pub fn with_scorer(mut self, scorer: Arc<dyn QualityScorer>) -> Self {
        self.scorer = Some(scorer);
        self
    }

    pub fn with_segmenter(mut self, segmenter: Arc<dyn Segmenter>) -> Self {
        self.segmenter = Some(segmenter);
        self
    }

    pub fn config(&self) -> &EftConfig {
        &self.config
    }

    /// Generate a submission dated yesterday with a random TCN sequence.
    pub fn generate(
        &self,
        fields: &BTreeMap<FieldTag, String>,
        captures: &[Capture],
        max_bytes: u64,
    ) -> Result<GeneratedEft> {
        self.generate_with(fields, captures, max_bytes, &GenerateRequest::today())
    }

    /// Build the transaction, then encode it uncompressed if that fits and
    /// is enabled, otherwise walk the configured quality ladder.
    #[instrument(skip_all, fields(captures = captures.len(), max_bytes = max_bytes))]
    pub fn generate_with(
        &self,
        fields: &BTreeMap<FieldTag, String>,
        captures: &[Capture],
        max_bytes: u64,
        request: &GenerateRequest,
    ) -> Result<GeneratedEft> {
        let (transaction, tcn) = self.build_transaction(fields, captures, request)?;
        let fitter = Fitter::new(self.schema);

        if self.config.try_uncompressed_first {
            match fitter.fit(&transaction, &Uncompressed, max_bytes, &[QualityLevel::MAX]) {
                Ok(outcome) => {
                    info!(%tcn, size = outcome.bytes.len(), "transaction fits uncompressed");
                    return Ok(GeneratedEft::new(tcn, outcome.bytes, None, outcome.sha256));
                }
                Err(EftError::SizeUnattainable { attempts, .. }) => {
                    debug!(
                        size = attempts.first().map(|a| a.encoded_len),
                        "uncompressed transaction over ceiling"
                    );
                }
                Err(err) => return Err(err),
            }
        }

        let outcome = fitter.fit(
            &transaction,
            &*self.codec,
            max_bytes,
            &self.config.quality_levels(),
        )?;
        info!(%tcn, quality = %outcome.quality, size = outcome.bytes.len(), "transaction generated");
        Ok(GeneratedEft::new(
            tcn,
            outcome.bytes,
            Some(outcome.quality),
            outcome.sha256,
        ))
    }

    fn build_transaction(
        &self,
        fields: &BTreeMap<FieldTag, String>,
        captures: &[Capture],
        request: &GenerateRequest,
    ) -> Result<(Transaction, String)> {
        let schema = self.schema;
        if let Some(tag) = fields.keys().find(|t| t.record_type != DEMOGRAPHIC_RECORD) {
            return Err(EftError::SchemaViolation(format!(
                "demographic field {tag} must belong to the Type-2 record"
            )));
        }
        let normalised = demographics::normalise_demographics(fields, request.bypass_ssn);

        let name = normalised.get(&NAME).map(String::as_str).unwrap_or_default();
        let sequence = request
            .sequence
            .unwrap_or_else(|| rand::rng().random_range(1..=99));
        let tcn = demographics::transaction_control_number(
            request.capture_date,
            &demographics::initials(name),
            sequence,
        );
        let date = request.capture_date.format("%Y%m%d").to_string();
        let agency = &self.config.agency;

        let mut header = Record::new(schema, 1)?;
        header.set_text(schema, 2, &agency.version)?;
        header.set_text(schema, 4, &agency.transaction_type)?;
        header.set_text(schema, 5, &date)?;
        header.set_text(schema, 6, agency.priority.to_string())?;
        header.set_text(schema, 7, &agency.destination_agency)?;
        header.set_text(schema, 8, &agency.originating_agency)?;
        header.set_text(schema, 9, &tcn)?;
        header.set_text(schema, 11, &agency.native_scanning_resolution)?;
        header.set_text(schema, 12, &agency.nominal_transmitting_resolution)?;
        let mut transaction = Transaction::new(header)?;

        let mut demographic = Record::new(schema, DEMOGRAPHIC_RECORD)?;
        for (tag, value) in &normalised {
            demographic.set_field(Field::text(schema, *tag, value)?)?;
        }
        demographic.set_text(schema, 2, "00")?;
        demographic.set_text(schema, 5, &agency.retention_code)?;
        demographic.set_text(schema, 37, &agency.reason_fingerprinted)?;
        demographic.set_text(schema, 38, &date)?;
        demographic.set_text(schema, 73, &agency.originating_agency)?;
        transaction.push(schema, demographic)?;

        let mode = self.config.record_mode;
        let mut accepted = 0usize;
        for capture in captures {
            if !mode.accepts(capture.position) {
                warn!(position = %capture.position, ?mode, "capture does not belong in this record mode, skipped");
                continue;
            }
            accepted += 1;
            let record = match mode {
                RecordMode::Slaps => self.slap_record(capture, accepted, &date)?,
                RecordMode::Rolled => self.rolled_record(capture)?,
            };
            debug!(position = %capture.position, record_type = record.record_type(), "image record built");
            transaction.push(schema, record)?;
        }
        if accepted == 0 {
            return Err(EftError::EncodeError(format!(
                "no captures suitable for {mode:?} records"
            )));
        }
        Ok((transaction, tcn))
    }

    /// Type-14 record for a slap or thumbs capture.
    fn slap_record(&self, capture: &Capture, idc: usize, date: &str) -> Result<Record> {
        let schema = self.schema;
        let ppi = self.config.pixels_per_inch.to_string();
        let mut record = Record::new(schema, 14)?;
        record.set_text(schema, 2, format!("{idc:02}"))?;
        record.set_text(schema, 3, impression(capture))?;
        record.set_text(schema, 4, &self.config.agency.originating_agency)?;
        record.set_text(schema, 5, date)?;
        record.set_text(schema, 6, capture.image.width().to_string())?;
        record.set_text(schema, 7, capture.image.height().to_string())?;
        record.set_text(schema, 8, "1")?;
        record.set_text(schema, 9, &ppi)?;
        record.set_text(schema, 10, &ppi)?;
        record.set_text(schema, 12, "8")?;
        record.set_text(schema, 13, capture.position.to_string())?;

        let segments = self.segments(capture);
        if !segments.is_empty() {
            let boxes = segments
                .iter()
                .map(|segment| {
                    [
                        segment.position.code().into(),
                        segment.x,
                        segment.right(),
                        segment.y,
                        segment.bottom(),
                    ]
                    .map(|n: u32| n.to_string().into_bytes())
                    .to_vec()
                })
                .collect();
            record.set_field(Field::new(schema, FieldTag::new(14, SEGMENT_FIELD), boxes)?)?;
        }
        for metric in self.quality_metrics(capture, &segments)? {
            record.set_field(metric)?;
        }
        record.set_image(schema, ImagePayload::Pending(capture.image.clone()))?;
        Ok(record)
    }

    /// Type-4 record for an individual finger, scaled to the fixed size for
    /// its position. IDC is the position code.
    fn rolled_record(&self, capture: &Capture) -> Result<Record> {
        let schema = self.schema;
        let image = normalise_type4(&capture.image, capture.position)?;
        let position = capture.position.to_string();
        let mut record = Record::new(schema, 4)?;
        record.set_text(schema, 2, &position)?;
        record.set_text(schema, 3, impression(capture))?;
        record.set_text(schema, 4, &position)?;
        record.set_text(schema, 5, "0")?;
        record.set_text(schema, 6, image.width().to_string())?;
        record.set_text(schema, 7, image.height().to_string())?;
        record.set_image(schema, ImagePayload::Pending(image))?;
        Ok(record)
    }

    /// Fingers found in a slap, clipped to the capture. Empty when
    /// segmentation is off or fails.
    fn segments(&self, capture: &Capture) -> Vec<FingerSegment> {
        let Some(segmenter) = self.segmenter.as_ref().filter(|_| capture.position.is_slap()) else {
            return Vec::new();
        };
        let (width, height) = (capture.image.width(), capture.image.height());
        match segmenter.segment(&capture.image, capture.position) {
            Ok(segments) => segments
                .iter()
                .filter_map(|segment| segment.clamped(width, height))
                .collect(),
            Err(err) => {
                warn!(position = %capture.position, error = %err, "segmentation failed");
                Vec::new()
            }
        }
    }

    /// Quality entries `position␟score␟organisation␟algorithm`. With
    /// segments, each finger is scored on its own crop and the list goes to
    /// both 14.023 and 14.024; without, the whole capture is scored once
    /// into 14.024. A failed score is recorded as [`UNSCORED`].
    fn quality_metrics(&self, capture: &Capture, segments: &[FingerSegment]) -> Result<Vec<Field>> {
        let Some(scorer) = &self.scorer else {
            return Ok(Vec::new());
        };
        let entry = |position: FingerPosition, score: u8| {
            [
                position.quality_position().to_string(),
                score.to_string(),
                scorer.organization_id().to_string(),
                scorer.algorithm_id().to_string(),
            ]
            .map(String::into_bytes)
            .to_vec()
        };

        if segments.is_empty() {
            let score = grade(scorer.as_ref(), Ok(capture.image.clone()), capture.position);
            let metric = Field::new(
                self.schema,
                FieldTag::new(14, QUALITY_METRIC_FIELD),
                vec![entry(capture.position, score)],
            )?;
            return Ok(vec![metric]);
        }

        let entries: Vec<_> = segments
            .iter()
            .map(|segment| {
                let crop = crop_segment(&capture.image, segment);
                entry(segment.position, grade(scorer.as_ref(), crop, segment.position))
            })
            .collect();
        [SEGMENT_QUALITY_FIELD, QUALITY_METRIC_FIELD]
            .into_iter()
            .map(|number| Field::new(self.schema, FieldTag::new(14, number), entries.clone()))
            .collect()
    }
}

impl GeneratedEft {
    fn new(tcn: String, bytes: Vec<u8>, quality: Option<QualityLevel>, sha256: String) -> Self {
        Self {
            file_name: format!("{tcn}.eft"),
            tcn,
            bytes,
            quality,
            sha256,
        }
    }
}

fn grade(scorer: &dyn QualityScorer, image: Result<RawImage>, position: FingerPosition) -> u8 {
    image
        .and_then(|image| scorer.score(&image))
        .unwrap_or_else(|err| {
            warn!(%position, error = %err, "quality scoring failed");
            UNSCORED
        })
}

fn impression(capture: &Capture) -> String {
    ImpressionType::for_position(capture.position)
        .code()
        .to_string()
}
