// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// FD-258 fingerprint card rendered as a single-page PDF with `printpdf` 0.8.
//
// Layout coordinates are fractions of the 8 x 8 inch card measured from its
// top-left corner; they are flipped to PDF's bottom-left origin when placed.

use std::collections::BTreeMap;

use image::{DynamicImage, GrayImage};
use openeft_core::error::{EftError, Result};
use openeft_core::types::{FingerPosition, RawImage};
use printpdf::{
    BuiltinFont, Mm, Op, PdfDocument, PdfPage, PdfSaveOptions, PdfWarnMsg, Point, Pt, RawImageData,
    RawImageFormat, TextItem, XObjectTransform,
};
use tracing::{debug, info, instrument, warn};

/// Card edge (8 inches).
const CARD_PT: f32 = 576.0;
const CARD_MM: f32 = 203.2;
const LARGE_FONT: f32 = 0.018;
const SMALL_FONT: f32 = 0.015;
const MISSING: &str = "MISSING";

/// Printed text blocks on the card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CardField {
    Name,
    Aliases,
    OriginatingAgency,
    DateOfBirth,
    Sex,
    Race,
    Height,
    Weight,
    Eyes,
    Hair,
    PlaceOfBirth,
    Citizenship,
    Residence,
    Date,
    Reason,
    Ssn,
}

impl CardField {
    /// `(x, y, size)` of the text's top-left corner and its nominal height.
    fn anchor(self) -> (f32, f32, f32) {
        match self {
            Self::Name => (0.38, 0.050, 0.024),
            Self::Aliases => (0.05, 0.115, 0.018),
            Self::OriginatingAgency => (0.53, 0.115, 0.018),
            Self::DateOfBirth => (0.81, 0.140, 0.018),
            Self::Sex => (0.55, 0.172, 0.018),
            Self::Race => (0.58, 0.172, 0.018),
            Self::Height => (0.62, 0.172, 0.018),
            Self::Weight => (0.67, 0.172, 0.018),
            Self::Eyes => (0.71, 0.172, 0.018),
            Self::Hair => (0.76, 0.172, 0.018),
            Self::PlaceOfBirth => (0.86, 0.172, 0.018),
            Self::Citizenship => (0.36, 0.172, 0.018),
            Self::Residence => (0.02, 0.155, 0.018),
            Self::Date => (0.00, 0.190, 0.010),
            Self::Reason => (0.02, 0.320, 0.018),
            Self::Ssn => (0.36, 0.310, 0.024),
        }
    }

    /// Point size: the large face for headings, the small one for the rest.
    fn font_size(self) -> f32 {
        let (_, _, size) = self.anchor();
        CARD_PT * if size >= SMALL_FONT { LARGE_FONT } else { SMALL_FONT }
    }
}

/// A print box, as fractions of the card from its top-left corner.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PrintBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl PrintBox {
    const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }

    /// Box for a finger position. Rolled fingers fill the top two rows, plain
    /// impressions the bottom one. The combined two-thumb image has no box.
    pub fn for_position(position: FingerPosition) -> Option<Self> {
        const COLUMNS: [f32; 5] = [0.010, 0.205, 0.400, 0.595, 0.790];
        let code = position.code();
        match code {
            1..=5 => Some(Self::new(COLUMNS[usize::from(code - 1)], 0.370, 0.190, 0.180)),
            6..=10 => Some(Self::new(COLUMNS[usize::from(code - 6)], 0.555, 0.190, 0.180)),
            11 => Some(Self::new(0.500, 0.745, 0.095, 0.230)),
            12 => Some(Self::new(0.400, 0.745, 0.095, 0.230)),
            13 => Some(Self::new(0.600, 0.745, 0.385, 0.230)),
            14 => Some(Self::new(0.010, 0.745, 0.385, 0.230)),
            _ => None,
        }
    }

    /// Bottom-left corner and size in PDF points.
    fn to_points(self) -> (f32, f32, f32, f32) {
        let width = self.width * CARD_PT;
        let height = self.height * CARD_PT;
        (self.x * CARD_PT, CARD_PT - self.y * CARD_PT - height, width, height)
    }
}

/// Demographic text and captures for one card.
#[derive(Debug, Clone)]
pub struct Fd258Card {
    text: BTreeMap<CardField, String>,
    prints: BTreeMap<FingerPosition, RawImage>,
    pixels_per_inch: u32,
}

impl Fd258Card {
    /// Empty card; captures are taken to be scanned at `pixels_per_inch`.
    pub fn new(pixels_per_inch: u32) -> Self {
        Self {
            text: BTreeMap::new(),
            prints: BTreeMap::new(),
            pixels_per_inch: pixels_per_inch.max(1),
        }
    }

    /// Set a text block. Empty values leave the block blank.
    pub fn set_text(&mut self, field: CardField, value: impl Into<String>) {
        let value = value.into();
        if value.trim().is_empty() {
            self.text.remove(&field);
        } else {
            self.text.insert(field, value);
        }
    }

    /// Place a capture in its position's box. Positions without a box are
    /// refused.
    pub fn set_print(&mut self, position: FingerPosition, image: RawImage) -> Result<()> {
        if PrintBox::for_position(position).is_none() {
            return Err(EftError::ImageError(format!(
                "the FD-258 card has no box for {}",
                position.name()
            )));
        }
        self.prints.insert(position, image);
        Ok(())
    }

    pub fn text(&self, field: CardField) -> Option<&str> {
        self.text.get(&field).map(String::as_str)
    }

    /// Render the card. Boxes without a capture are labelled `MISSING`.
    #[instrument(skip_all, fields(prints = self.prints.len(), fields = self.text.len()))]
    pub fn render(&self) -> Result<Vec<u8>> {
        let mut doc = PdfDocument::new("FD-258");
        let mut ops = Vec::new();

        for (field, value) in &self.text {
            let (x, y, _) = field.anchor();
            let size = field.font_size();
            push_text(&mut ops, x * CARD_PT, CARD_PT - y * CARD_PT - size, size, value);
        }

        for code in 1..=14 {
            let Some(position) = FingerPosition::new(code) else {
                continue;
            };
            let Some(target) = PrintBox::for_position(position) else {
                continue;
            };
            let (x, y, width, height) = target.to_points();
            match self.prints.get(&position) {
                Some(image) => {
                    let raw = pdf_image(image)?;
                    let placement = fit_in_box(
                        (image.width(), image.height()),
                        self.pixels_per_inch,
                        (x, y, width, height),
                    );
                    let id = doc.add_image(&raw);
                    ops.push(Op::UseXobject {
                        id,
                        transform: XObjectTransform {
                            translate_x: Some(Pt(placement.x)),
                            translate_y: Some(Pt(placement.y)),
                            scale_x: Some(placement.scale),
                            scale_y: Some(placement.scale),
                            dpi: Some(self.pixels_per_inch as f32),
                            rotate: None,
                        },
                    });
                    debug!(%position, scale = placement.scale, "print placed");
                }
                None => {
                    let size = CARD_PT * SMALL_FONT;
                    push_text(&mut ops, x + 4.0, y + height / 2.0, size, MISSING);
                }
            }
        }

        doc.with_pages(vec![PdfPage::new(Mm(CARD_MM), Mm(CARD_MM), ops)]);
        let mut warnings: Vec<PdfWarnMsg> = Vec::new();
        let bytes = doc.save(&PdfSaveOptions::default(), &mut warnings);
        if !warnings.is_empty() {
            warn!(count = warnings.len(), "PDF writer reported warnings");
        }
        info!(size = bytes.len(), "FD-258 card rendered");
        Ok(bytes)
    }
}

/// Where a capture lands inside its box.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Placement {
    x: f32,
    y: f32,
    scale: f32,
}

/// Centre a `pixels`-sized capture in `target`, shrinking it to fit but
/// never enlarging it.
fn fit_in_box(pixels: (u32, u32), pixels_per_inch: u32, target: (f32, f32, f32, f32)) -> Placement {
    let (x, y, width, height) = target;
    let ppi = pixels_per_inch as f32;
    let native_w = pixels.0 as f32 / ppi * 72.0;
    let native_h = pixels.1 as f32 / ppi * 72.0;
    let scale = (width / native_w).min(height / native_h).min(1.0);
    Placement {
        x: x + (width - native_w * scale) / 2.0,
        y: y + (height - native_h * scale) / 2.0,
        scale,
    }
}

/// RGB copy of a capture. Dark captures (light ridges) are inverted so
/// ridges print black.
fn pdf_image(image: &RawImage) -> Result<printpdf::RawImage> {
    let mut gray = GrayImage::from_raw(image.width(), image.height(), image.pixels().to_vec())
        .ok_or_else(|| EftError::ImageError("raster does not match its dimensions".into()))?;
    if mean(image.pixels()) < 128.0 {
        image::imageops::invert(&mut gray);
    }
    let rgb = DynamicImage::ImageLuma8(gray).to_rgb8();
    Ok(printpdf::RawImage {
        pixels: RawImageData::U8(rgb.into_raw()),
        width: image.width() as usize,
        height: image.height() as usize,
        data_format: RawImageFormat::RGB8,
        tag: Vec::new(),
    })
}

fn mean(pixels: &[u8]) -> f64 {
    if pixels.is_empty() {
        return 0.0;
    }
    pixels.iter().map(|p| f64::from(*p)).sum::<f64>() / pixels.len() as f64
}

fn push_text(ops: &mut Vec<Op>, x: f32, y: f32, size: f32, text: &str) {
    ops.push(Op::StartTextSection);
    ops.push(Op::SetTextCursor {
        pos: Point { x: Pt(x), y: Pt(y) },
    });
    ops.push(Op::SetFontSizeBuiltinFont {
        size: Pt(size),
        font: BuiltinFont::Helvetica,
    });
    ops.push(Op::WriteTextBuiltinFont {
        items: vec![TextItem::Text(text.to_string())],
        font: BuiltinFont::Helvetica,
    });
    ops.push(Op::EndTextSection);
}

/// `YYYYMMDD` as printed on the card, `MM/DD/YYYY`. Anything else is
/// returned as given.
pub fn card_date(raw: &str) -> String {
    let raw = raw.trim();
    if raw.len() == 8 && raw.bytes().all(|b| b.is_ascii_digit()) {
        format!("{}/{}/{}", &raw[4..6], &raw[6..8], &raw[..4])
    } else {
        raw.to_string()
    }
}
