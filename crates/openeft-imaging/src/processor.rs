// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Capture processor: decodes scanner output and normalises it to the 8-bit
// grayscale raster the codecs expect.

use std::path::Path;

use image::{DynamicImage, GrayImage, ImageFormat};
use openeft_core::error::{EftError, Result};
use openeft_core::types::{FingerPosition, FingerSegment, RawImage};
use tracing::{debug, info, instrument};

/// A single capture being prepared for embedding.
///
/// Methods consume `self` and return the transformed processor so steps can
/// be chained:
///
/// ```ignore
/// let raw = CaptureProcessor::open("right_slap.png")?
///     .grayscale()
///     .to_raw_image()?;
/// ```
pub struct CaptureProcessor {
    image: DynamicImage,
}

impl CaptureProcessor {
    // -- Construction ---------------------------------------------------------

    /// Load a capture from disk. The format is detected from the content.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let data = std::fs::read(path.as_ref())?;
        let processor = Self::from_bytes(&data).map_err(|err| {
            EftError::ImageError(format!("{}: {err}", path.as_ref().display()))
        })?;
        info!(
            width = processor.width(),
            height = processor.height(),
            "Capture loaded"
        );
        Ok(processor)
    }

    /// Decode an encoded capture (PNG, JPEG, BMP, TIFF...).
    #[instrument(skip(data), fields(data_len = data.len()))]
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let image = image::load_from_memory(data)
            .map_err(|err| EftError::ImageError(format!("failed to decode image: {err}")))?;
        debug!(
            width = image.width(),
            height = image.height(),
            "Capture decoded"
        );
        Ok(Self { image })
    }

    pub fn from_dynamic(image: DynamicImage) -> Self {
        Self { image }
    }

    /// Wrap a grayscale raster, e.g. to preview what a codec was given.
    pub fn from_raw_image(raw: &RawImage) -> Result<Self> {
        let gray = GrayImage::from_raw(raw.width(), raw.height(), raw.pixels().to_vec())
            .ok_or_else(|| EftError::ImageError("raster does not match its dimensions".into()))?;
        Ok(Self {
            image: DynamicImage::ImageLuma8(gray),
        })
    }

    // -- Accessors ------------------------------------------------------------

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    // -- Transformations ------------------------------------------------------

    /// Convert to 8-bit luma.
    #[instrument(skip(self))]
    pub fn grayscale(self) -> Self {
        debug!("Converting to grayscale");
        Self {
            image: DynamicImage::ImageLuma8(self.image.to_luma8()),
        }
    }

    /// Scale to exactly `width` x `height`, ignoring aspect ratio.
    #[instrument(skip(self))]
    pub fn resize_exact(self, width: u32, height: u32) -> Self {
        debug!(from_w = self.width(), from_h = self.height(), "Resizing capture");
        Self {
            image: self
                .image
                .resize_exact(width, height, image::imageops::FilterType::Lanczos3),
        }
    }

    /// Cut out a rectangle. Bounds are clamped to the image.
    #[instrument(skip(self))]
    pub fn crop(self, x: u32, y: u32, width: u32, height: u32) -> Self {
        let x = x.min(self.width().saturating_sub(1));
        let y = y.min(self.height().saturating_sub(1));
        let width = width.min(self.width() - x);
        let height = height.min(self.height() - y);
        Self {
            image: self.image.crop_imm(x, y, width, height),
        }
    }

    // -- Output ---------------------------------------------------------------

    /// Row-major 8-bit grayscale pixels, converting first if needed.
    pub fn to_raw_image(&self) -> Result<RawImage> {
        let gray = self.image.to_luma8();
        let (width, height) = gray.dimensions();
        RawImage::new(gray.into_raw(), width, height)
    }

    pub fn to_png_bytes(&self) -> Result<Vec<u8>> {
        let mut buffer = Vec::new();
        let mut cursor = std::io::Cursor::new(&mut buffer);
        self.image
            .write_to(&mut cursor, ImageFormat::Png)
            .map_err(|err| EftError::ImageError(format!("PNG encoding failed: {err}")))?;
        Ok(buffer)
    }
}

/// Load and normalise a capture file in one step.
pub fn load_capture(path: impl AsRef<Path>) -> Result<RawImage> {
    CaptureProcessor::open(path)?.grayscale().to_raw_image()
}

/// Scale a capture to the fixed Type-4 size for its position. Positions
/// without one, and captures already that size, are returned unchanged.
pub fn normalise_type4(raw: &RawImage, position: FingerPosition) -> Result<RawImage> {
    match position.type4_dimensions() {
        Some((width, height)) if (raw.width(), raw.height()) != (width, height) => {
            info!(%position, width, height, "Scaling capture for Type-4");
            CaptureProcessor::from_raw_image(raw)?
                .resize_exact(width, height)
                .to_raw_image()
        }
        _ => Ok(raw.clone()),
    }
}

/// The pixels inside one finger segment.
pub fn crop_segment(raw: &RawImage, segment: &FingerSegment) -> Result<RawImage> {
    let segment = segment.clamped(raw.width(), raw.height()).ok_or_else(|| {
        EftError::ImageError(format!(
            "segment for finger {} lies outside the capture",
            segment.position
        ))
    })?;
    CaptureProcessor::from_raw_image(raw)?
        .crop(segment.x, segment.y, segment.width, segment.height)
        .to_raw_image()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn colour_png() -> Vec<u8> {
        let img = RgbImage::from_fn(6, 4, |x, _| {
            if x < 3 { Rgb([255, 255, 255]) } else { Rgb([0, 0, 0]) }
        });
        CaptureProcessor::from_dynamic(DynamicImage::ImageRgb8(img))
            .to_png_bytes()
            .expect("encode png")
    }

    #[test]
    fn colour_capture_normalised_to_gray() {
        let raw = CaptureProcessor::from_bytes(&colour_png())
            .expect("decode")
            .grayscale()
            .to_raw_image()
            .expect("raw");
        assert_eq!((raw.width(), raw.height()), (6, 4));
        assert_eq!(raw.pixels().len(), 24);
        assert_eq!(raw.pixels()[0], 255);
        assert_eq!(raw.pixels()[5], 0);
    }

    #[test]
    fn garbage_is_image_error() {
        assert!(matches!(
            CaptureProcessor::from_bytes(b"not an image"),
            Err(EftError::ImageError(_))
        ));
    }

    #[test]
    fn raw_image_round_trips_through_png() {
        let raw = RawImage::new((0u8..12).collect::<Vec<_>>(), 4, 3).expect("raw");
        let png = CaptureProcessor::from_raw_image(&raw)
            .expect("wrap")
            .to_png_bytes()
            .expect("png");
        let back = CaptureProcessor::from_bytes(&png)
            .expect("decode")
            .to_raw_image()
            .expect("raw");
        assert_eq!(back, raw);
    }

    #[test]
    fn load_capture_reads_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("slap.png");
        std::fs::write(&path, colour_png()).expect("write");
        let raw = load_capture(&path).expect("load");
        assert_eq!(raw.width(), 6);
        assert!(load_capture(dir.path().join("missing.png")).is_err());
    }

    #[test]
    fn type4_captures_scaled_to_position_size() {
        let raw = RawImage::new(vec![0x80; 40 * 30], 40, 30).expect("raw");
        let rolled = normalise_type4(&raw, FingerPosition::new(4).expect("position")).expect("scale");
        assert_eq!((rolled.width(), rolled.height()), (800, 750));
        assert_eq!(rolled.pixels().len(), 800 * 750);

        let thumb = normalise_type4(&raw, FingerPosition::PLAIN_RIGHT_THUMB).expect("scale");
        assert_eq!((thumb.width(), thumb.height()), (400, 572));

        let unchanged = normalise_type4(&raw, FingerPosition::BOTH_THUMBS).expect("scale");
        assert_eq!(unchanged, raw);
    }

    #[test]
    fn segment_crop_takes_the_boxed_pixels() {
        let raw = RawImage::new((0u8..64).collect::<Vec<_>>(), 8, 8).expect("raw");
        let segment = FingerSegment {
            position: FingerPosition::new(2).expect("position"),
            x: 2,
            y: 1,
            width: 3,
            height: 2,
        };
        let crop = crop_segment(&raw, &segment).expect("crop");
        assert_eq!((crop.width(), crop.height()), (3, 2));
        assert_eq!(crop.pixels(), &[10, 11, 12, 18, 19, 20]);

        let outside = FingerSegment { x: 8, ..segment };
        assert!(matches!(crop_segment(&raw, &outside), Err(EftError::ImageError(_))));
    }
}
