// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Seams for the external image tools. The transaction codec decides when and
// how hard to compress; implementations in `openeft-imaging` do the pixels.

use std::sync::Arc;

use crate::error::Result;
use crate::types::{CompressionAlgorithm, FingerPosition, FingerSegment, QualityLevel, RawImage};

/// Compresses a grayscale capture at a requested quality.
///
/// Implementations must be deterministic: the same image and quality always
/// produce the same bytes, otherwise fitted sizes are meaningless.
pub trait ImageCodec: Send + Sync {
    /// Algorithm recorded in the image record's compression field.
    fn algorithm(&self) -> CompressionAlgorithm;

    /// Short name used in logs and timeout errors.
    fn name(&self) -> &str;

    /// Compress `image` at `quality`.
    fn compress(&self, image: &RawImage, quality: QualityLevel) -> Result<Vec<u8>>;
}

impl<C: ImageCodec + ?Sized> ImageCodec for Arc<C> {
    fn algorithm(&self) -> CompressionAlgorithm {
        (**self).algorithm()
    }

    fn name(&self) -> &str {
        (**self).name()
    }

    fn compress(&self, image: &RawImage, quality: QualityLevel) -> Result<Vec<u8>> {
        (**self).compress(image, quality)
    }
}

/// Fingerprint image quality metric (NFIQ: 1 best .. 5 worst).
pub trait QualityScorer: Send + Sync {
    /// Vendor identifier written alongside the score.
    fn organization_id(&self) -> &str;

    /// Algorithm identifier written alongside the score.
    fn algorithm_id(&self) -> &str;

    fn score(&self, image: &RawImage) -> Result<u8>;
}

/// Locates the individual fingers in a slap or two-thumb capture.
pub trait Segmenter: Send + Sync {
    fn name(&self) -> &str;

    /// Boxes for the fingers found in `image`, captured at `position`.
    fn segment(&self, image: &RawImage, position: FingerPosition) -> Result<Vec<FingerSegment>>;
}
