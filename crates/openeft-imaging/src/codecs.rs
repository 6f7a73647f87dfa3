// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// In-process image codecs.

use image::GrayImage;
use image::codecs::jpeg::JpegEncoder;
use openeft_core::codec::ImageCodec;
use openeft_core::error::{EftError, Result};
use openeft_core::types::{CompressionAlgorithm, QualityLevel, RawImage};
use tracing::{debug, instrument};

/// Embeds the raster as-is. Quality is ignored.
#[derive(Debug, Clone, Copy, Default)]
pub struct Uncompressed;

impl ImageCodec for Uncompressed {
    fn algorithm(&self) -> CompressionAlgorithm {
        CompressionAlgorithm::None
    }

    fn name(&self) -> &str {
        "uncompressed"
    }

    fn compress(&self, image: &RawImage, _quality: QualityLevel) -> Result<Vec<u8>> {
        Ok(image.pixels().to_vec())
    }
}

/// Baseline JPEG through the `image` crate. Quality is clamped to 1-100.
#[derive(Debug, Clone, Copy, Default)]
pub struct JpegCodec;

impl ImageCodec for JpegCodec {
    fn algorithm(&self) -> CompressionAlgorithm {
        CompressionAlgorithm::Jpeg
    }

    fn name(&self) -> &str {
        "jpeg"
    }

    #[instrument(skip_all, fields(width = image.width(), height = image.height(), quality = quality.0))]
    fn compress(&self, image: &RawImage, quality: QualityLevel) -> Result<Vec<u8>> {
        let quality = quality.0.clamp(1, 100) as u8;
        let gray = GrayImage::from_raw(image.width(), image.height(), image.pixels().to_vec())
            .ok_or_else(|| EftError::ImageError("raster does not match its dimensions".into()))?;
        let mut buffer = Vec::new();
        let encoder = JpegEncoder::new_with_quality(&mut buffer, quality);
        gray.write_with_encoder(encoder)
            .map_err(|err| EftError::Codec(format!("JPEG encoding failed: {err}")))?;
        debug!(encoded_len = buffer.len(), "JPEG encoded");
        Ok(buffer)
    }
}
