//! Signature capture.
//!
//! A `SignaturePad` is a fixed-size monochrome raster. Strokes are drawn
//! straight into the raster as they arrive; no stroke vectors are kept.
//! `save()` produces a `data:image/png;base64,...` URL, which is what gets
//! stored on the contract row.

use anyhow::{bail, Result};
use base64::Engine as _;
use chrono::{DateTime, NaiveDate, Utc};
use thiserror::Error;
use tracing::info;

use crate::backend::Backend;
use crate::models::{ActivityKind, Contract, NewActivity, Signer};
use crate::repo::{ActivityRepo, ContractRepo, StudentRepo};

pub const DATA_URL_PREFIX: &str = "data:image/png;base64,";

const INK: u8 = 0x00;
const PAPER: u8 = 0xff;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("Signature is empty")]
    Empty,

    #[error("Signature pad must be at least 1x1, got {width}x{height}")]
    InvalidSize { width: u32, height: u32 },

    #[error("Signature image is not a PNG data URL")]
    NotADataUrl,

    #[error("Failed to encode signature image: {0}")]
    Encode(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone)]
pub struct SignaturePad {
    width: u32,
    height: u32,
    pen_width: u32,
    pixels: Vec<bool>,
    cursor: Option<Point>,
    inked: bool,
}

impl SignaturePad {
    pub fn new(width: u32, height: u32) -> Result<Self, SignatureError> {
        if width == 0 || height == 0 {
            return Err(SignatureError::InvalidSize { width, height });
        }
        Ok(Self {
            width,
            height,
            pen_width: 2,
            pixels: vec![false; width as usize * height as usize],
            cursor: None,
            inked: false,
        })
    }

    pub fn with_pen_width(mut self, pen_width: u32) -> Self {
        self.pen_width = pen_width.max(1);
        self
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn is_empty(&self) -> bool {
        !self.inked
    }

    pub fn is_drawing(&self) -> bool {
        self.cursor.is_some()
    }

    pub fn is_set(&self, x: u32, y: u32) -> bool {
        x < self.width && y < self.height && self.pixels[(y * self.width + x) as usize]
    }

    pub fn begin_stroke(&mut self, at: Point) {
        self.dab(at);
        self.cursor = Some(at);
    }

    /// Draw a segment from the previous point. Ignored outside a stroke.
    pub fn extend_stroke(&mut self, to: Point) {
        let Some(from) = self.cursor else {
            return;
        };
        self.line(from, to);
        self.cursor = Some(to);
    }

    pub fn end_stroke(&mut self) {
        self.cursor = None;
    }

    pub fn clear(&mut self) {
        self.pixels.fill(false);
        self.cursor = None;
        self.inked = false;
    }

    /// Encode the raster as a PNG data URL.
    pub fn save(&self) -> Result<String, SignatureError> {
        if self.is_empty() {
            return Err(SignatureError::Empty);
        }
        let png = self.encode_png()?;
        Ok(format!(
            "{}{}",
            DATA_URL_PREFIX,
            base64::engine::general_purpose::STANDARD.encode(png)
        ))
    }

    /// Clamp a point to within one pen width of the canvas.
    fn clamp(&self, p: Point) -> (i64, i64) {
        let margin = i64::from(self.pen_width);
        (
            i64::from(p.x).clamp(-margin, i64::from(self.width) + margin),
            i64::from(p.y).clamp(-margin, i64::from(self.height) + margin),
        )
    }

    // Bresenham; every visited point is stamped with the pen.
    fn line(&mut self, from: Point, to: Point) {
        let (mut x, mut y) = self.clamp(from);
        let (to_x, to_y) = self.clamp(to);
        let dx = (to_x - x).abs();
        let dy = -(to_y - y).abs();
        let sx = if x < to_x { 1 } else { -1 };
        let sy = if y < to_y { 1 } else { -1 };
        let mut err = dx + dy;
        loop {
            self.stamp(x, y);
            if x == to_x && y == to_y {
                break;
            }
            let e2 = 2 * err;
            if e2 >= dy {
                err += dy;
                x += sx;
            }
            if e2 <= dx {
                err += dx;
                y += sy;
            }
        }
    }

    fn dab(&mut self, center: Point) {
        let (x, y) = self.clamp(center);
        self.stamp(x, y);
    }

    fn stamp(&mut self, cx: i64, cy: i64) {
        let pen = i64::from(self.pen_width);
        let reach = (pen - 1) / 2;
        let extra = (pen - 1) - reach;
        let (width, height) = (i64::from(self.width), i64::from(self.height));
        for y in (cy - reach).max(0)..=(cy + extra).min(height - 1) {
            for x in (cx - reach).max(0)..=(cx + extra).min(width - 1) {
                self.pixels[(y * width + x) as usize] = true;
                self.inked = true;
            }
        }
    }

    // 8-bit grayscale
    fn encode_png(&self) -> Result<Vec<u8>, SignatureError> {
        let data: Vec<u8> = self
            .pixels
            .iter()
            .map(|&on| if on { INK } else { PAPER })
            .collect();

        let mut out = Vec::new();
        let mut encoder = png::Encoder::new(&mut out, self.width, self.height);
        encoder.set_color(png::ColorType::Grayscale);
        encoder.set_depth(png::BitDepth::Eight);
        let mut writer = encoder
            .write_header()
            .map_err(|e| SignatureError::Encode(e.to_string()))?;
        writer
            .write_image_data(&data)
            .map_err(|e| SignatureError::Encode(e.to_string()))?;
        writer
            .finish()
            .map_err(|e| SignatureError::Encode(e.to_string()))?;
        Ok(out)
    }
}

/// Record a captured signature on a contract and log it.
///
/// Whether the student signs is decided from their recorded age on
/// `today`; a student signature on a minor's contract is refused.
pub async fn sign_contract(
    backend: &dyn Backend,
    contract_id: &str,
    signer: Signer,
    image: &str,
    signed_at: DateTime<Utc>,
    today: NaiveDate,
) -> Result<Contract> {
    if !image.starts_with(DATA_URL_PREFIX) {
        return Err(SignatureError::NotADataUrl.into());
    }
    let contracts = ContractRepo::new(backend);
    let contract = contracts.get(contract_id).await?;
    let student = StudentRepo::new(backend).get(&contract.student_id).await?;
    let student_signs = student.is_signing_age(today);
    if signer == Signer::Student && !student_signs {
        bail!(
            "{} is not of signing age; the contract is signed by the parent",
            student.full_name()
        );
    }

    let updated = contracts
        .record_signature(contract_id, signer, image, signed_at, student_signs)
        .await?;

    ActivityRepo::new(backend)
        .log(
            &NewActivity::new(
                ActivityKind::ContractSigned,
                format!(
                    "Contract {} signed by {}",
                    updated.contract_number,
                    signer.label()
                ),
            )
            .student(&updated.student_id)
            .contract(&updated.id)
            .meta("signer", signer.label())
            .meta("status", updated.status.to_string()),
        )
        .await?;

    info!(contract_id = %updated.id, signer = %signer, status = %updated.status, "Signature recorded");
    Ok(updated)
}
