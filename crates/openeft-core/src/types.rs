// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types shared by the codec, imaging, and application crates.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{EftError, Result};

/// Compression-strength parameter handed to an image codec.
///
/// Higher values always mean better fidelity. The unit is codec specific:
/// JPEG reads it as a 1-100 quality, WSQ as hundredths of a bit per pixel
/// (`225` = 2.25 bpp).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QualityLevel(pub u16);

impl QualityLevel {
    /// Best fidelity a codec can be asked for.
    pub const MAX: QualityLevel = QualityLevel(u16::MAX);
}

impl std::fmt::Display for QualityLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Image compression algorithms an image record can declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompressionAlgorithm {
    /// Uncompressed 8-bit grayscale.
    None,
    /// FBI Wavelet Scalar Quantization.
    Wsq20,
    /// Baseline JPEG.
    Jpeg,
    /// JPEG 2000.
    Jpeg2000,
    /// Portable Network Graphics.
    Png,
}

impl CompressionAlgorithm {
    /// Label written into tagged image records (e.g. `14.011`).
    pub fn label(&self) -> &'static str {
        match self {
            Self::None => "NONE",
            Self::Wsq20 => "WSQ20",
            Self::Jpeg => "JPEGB",
            Self::Jpeg2000 => "JP2",
            Self::Png => "PNG",
        }
    }

    /// One-byte code written into binary image records (Type-4 CGA).
    pub fn code(&self) -> u8 {
        match self {
            Self::None => 0,
            Self::Wsq20 => 1,
            Self::Jpeg => 2,
            Self::Jpeg2000 => 4,
            Self::Png => 6,
        }
    }

    /// Parse a tagged-record label. Accepts the historical `WSQ` spelling.
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_uppercase().as_str() {
            "NONE" => Some(Self::None),
            "WSQ" | "WSQ20" => Some(Self::Wsq20),
            "JPEGB" | "JPEGL" => Some(Self::Jpeg),
            "JP2" | "JP2L" => Some(Self::Jpeg2000),
            "PNG" => Some(Self::Png),
            _ => None,
        }
    }

    /// Parse a binary-record CGA code.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::None),
            1 => Some(Self::Wsq20),
            2 | 3 => Some(Self::Jpeg),
            4 | 5 => Some(Self::Jpeg2000),
            6 => Some(Self::Png),
            _ => None,
        }
    }

    /// File extension used when an embedded image is written out on its own.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::None => "raw",
            Self::Wsq20 => "wsq",
            Self::Jpeg => "jpg",
            Self::Jpeg2000 => "jp2",
            Self::Png => "png",
        }
    }
}

/// Friction ridge position code (FGP).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct FingerPosition(u8);

impl FingerPosition {
    pub const UNKNOWN: FingerPosition = FingerPosition(0);
    pub const RIGHT_THUMB: FingerPosition = FingerPosition(1);
    pub const LEFT_THUMB: FingerPosition = FingerPosition(6);
    pub const PLAIN_RIGHT_THUMB: FingerPosition = FingerPosition(11);
    pub const PLAIN_LEFT_THUMB: FingerPosition = FingerPosition(12);
    pub const RIGHT_SLAP: FingerPosition = FingerPosition(13);
    pub const LEFT_SLAP: FingerPosition = FingerPosition(14);
    pub const BOTH_THUMBS: FingerPosition = FingerPosition(15);

    /// Positions 0-15 are defined for ten-print captures.
    pub fn new(code: u8) -> Option<Self> {
        (code <= 15).then_some(Self(code))
    }

    pub fn code(&self) -> u8 {
        self.0
    }

    /// Individual rolled fingers are positions 1-10.
    pub fn is_rolled_finger(&self) -> bool {
        (1..=10).contains(&self.0)
    }

    /// The four-finger slaps and the two-thumb slap.
    pub fn is_slap(&self) -> bool {
        (13..=15).contains(&self.0)
    }

    /// Position reported in quality metrics. Plain thumbs are scored under
    /// their rolled counterparts.
    pub fn quality_position(&self) -> FingerPosition {
        match *self {
            Self::PLAIN_RIGHT_THUMB => Self::RIGHT_THUMB,
            Self::PLAIN_LEFT_THUMB => Self::LEFT_THUMB,
            other => other,
        }
    }

    /// Pixel dimensions a Type-4 image at this position is scaled to:
    /// 800x750 rolled, 400x572 plain thumb, 1600x1000 four-finger plain.
    pub fn type4_dimensions(&self) -> Option<(u32, u32)> {
        match self.0 {
            1..=10 => Some((800, 750)),
            11 | 12 => Some((400, 572)),
            13 | 14 => Some((1600, 1000)),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self.0 {
            0 => "unknown finger",
            1 => "right thumb",
            2 => "right index",
            3 => "right middle",
            4 => "right ring",
            5 => "right little",
            6 => "left thumb",
            7 => "left index",
            8 => "left middle",
            9 => "left ring",
            10 => "left little",
            11 => "plain right thumb",
            12 => "plain left thumb",
            13 => "plain right four fingers",
            14 => "plain left four fingers",
            _ => "plain thumbs",
        }
    }
}

impl TryFrom<u8> for FingerPosition {
    type Error = String;

    fn try_from(code: u8) -> std::result::Result<Self, Self::Error> {
        Self::new(code).ok_or_else(|| format!("finger position {code} is out of range 0-15"))
    }
}

impl From<FingerPosition> for u8 {
    fn from(position: FingerPosition) -> u8 {
        position.0
    }
}

impl std::fmt::Display for FingerPosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Impression type (IMP).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImpressionType {
    LiveScanPlain,
    LiveScanRolled,
    NonLiveScanPlain,
    NonLiveScanRolled,
}

impl ImpressionType {
    pub fn code(&self) -> u8 {
        match self {
            Self::LiveScanPlain => 0,
            Self::LiveScanRolled => 1,
            Self::NonLiveScanPlain => 2,
            Self::NonLiveScanRolled => 3,
        }
    }

    /// Live-scan impression matching how a position is normally captured.
    pub fn for_position(position: FingerPosition) -> Self {
        if position.is_rolled_finger() {
            Self::LiveScanRolled
        } else {
            Self::LiveScanPlain
        }
    }
}

/// Which image record family a generated transaction carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordMode {
    /// Type-14 records for the two four-finger slaps and the thumbs.
    Slaps,
    /// Type-4 binary records for individual rolled and plain fingers.
    Rolled,
}

impl RecordMode {
    /// Whether an image at `position` belongs in a transaction of this mode.
    pub fn accepts(&self, position: FingerPosition) -> bool {
        match self {
            Self::Slaps => position.is_slap(),
            Self::Rolled => (1..=14).contains(&position.code()),
        }
    }
}

/// Uncompressed 8-bit grayscale raster handed to image codecs.
///
/// Pixel storage is reference counted so a capture can be moved onto a codec
/// worker thread without copying.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawImage {
    pixels: Arc<[u8]>,
    width: u32,
    height: u32,
}

impl RawImage {
    /// Wrap row-major grayscale pixels. The buffer must hold exactly
    /// `width * height` bytes.
    pub fn new(pixels: impl Into<Arc<[u8]>>, width: u32, height: u32) -> Result<Self> {
        let pixels = pixels.into();
        let expected = width as usize * height as usize;
        if width == 0 || height == 0 || pixels.len() != expected {
            return Err(EftError::ImageError(format!(
                "{width}x{height} grayscale image needs {expected} bytes, got {}",
                pixels.len()
            )));
        }
        Ok(Self {
            pixels,
            width,
            height,
        })
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }
}

/// Axis-aligned box around one finger found in a slap capture, in pixels
/// from the slap's top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FingerSegment {
    pub position: FingerPosition,
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl FingerSegment {
    /// The box clipped to a `width` x `height` raster, or `None` if nothing
    /// of it remains.
    pub fn clamped(&self, width: u32, height: u32) -> Option<Self> {
        let right = self.x.saturating_add(self.width).min(width);
        let bottom = self.y.saturating_add(self.height).min(height);
        (self.x < right && self.y < bottom).then(|| Self {
            width: right - self.x,
            height: bottom - self.y,
            ..*self
        })
    }

    pub fn right(&self) -> u32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> u32 {
        self.y + self.height
    }
}

/// One encoding pass made by the compression fitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FitAttempt {
    pub quality: QualityLevel,
    pub encoded_len: usize,
}

/// Classification of errors for retry logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorClass {
    /// A tool stalled or was interrupted; the same call may succeed again.
    Transient,
    /// The operator must supply or correct something.
    UserAction,
    /// Retrying cannot help.
    Permanent,
}
