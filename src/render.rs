//! Drawing helpers for the display frame and the summary composite.
//!
//! Text uses a TrueType font when one is configured and a built-in 5x7
//! bitmap font otherwise, scaled up in whole pixels.

use ab_glyph::{FontArc, PxScale};
use anyhow::{anyhow, Context, Result};
use image::{imageops, Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;
use std::path::Path;

use crate::detect::BoundingBox;
use crate::track::ObjectId;

pub const DETECTION_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
pub const CONFIRMED_COLOR: Rgb<u8> = Rgb([0, 255, 255]);
pub const TEXT_COLOR: Rgb<u8> = Rgb([255, 255, 255]);

pub const SUMMARY_WIDTH: u32 = 1500;
pub const SUMMARY_HEIGHT: u32 = 500;
const SUMMARY_IMAGE_TOP: u32 = 30;
const SUMMARY_LABEL_GAP: u32 = 10;
const SUMMARY_LINE_HEIGHT: u32 = 30;
const SUMMARY_PADDING: u32 = 10;
const SUMMARY_MIN_SLOT: u32 = 100;

const CAPTION_SCALE: f32 = 22.0;
const LABEL_SCALE: f32 = 16.0;
const BOX_THICKNESS: i32 = 2;

const GLYPH_WIDTH: i32 = 5;
const GLYPH_HEIGHT: i32 = 7;
const GLYPH_ADVANCE: i32 = 6;

#[derive(Clone, Default)]
pub struct Painter {
    font: Option<FontArc>,
}

impl Painter {
    /// Painter using the built-in bitmap font.
    pub fn bitmap() -> Self {
        Self::default()
    }

    pub fn with_font(font: FontArc) -> Self {
        Self { font: Some(font) }
    }

    pub fn load(font_path: Option<&Path>) -> Result<Self> {
        let Some(path) = font_path else {
            return Ok(Self::bitmap());
        };
        let bytes =
            std::fs::read(path).with_context(|| format!("read font {}", path.display()))?;
        let font = FontArc::try_from_vec(bytes)
            .map_err(|_| anyhow!("invalid font file {}", path.display()))?;
        Ok(Self::with_font(font))
    }

    pub fn draw_box(&self, canvas: &mut RgbImage, bbox: &BoundingBox, color: Rgb<u8>) {
        if bbox.width == 0 || bbox.height == 0 {
            return;
        }
        for inset in 0..BOX_THICKNESS {
            let w = bbox.width as i32 - 2 * inset;
            let h = bbox.height as i32 - 2 * inset;
            if w <= 0 || h <= 0 {
                break;
            }
            let rect = Rect::at(bbox.x as i32 + inset, bbox.y as i32 + inset)
                .of_size(w as u32, h as u32);
            draw_hollow_rect_mut(canvas, rect, color);
        }
    }

    /// Draw `text` with its baseline area ending at `y`.
    pub fn draw_caption(&self, canvas: &mut RgbImage, x: i32, y: i32, text: &str, color: Rgb<u8>) {
        self.draw_text(canvas, x, y - CAPTION_SCALE as i32, CAPTION_SCALE, text, color);
    }

    fn draw_text(
        &self,
        canvas: &mut RgbImage,
        x: i32,
        y: i32,
        scale: f32,
        text: &str,
        color: Rgb<u8>,
    ) {
        match &self.font {
            Some(font) => draw_text_mut(canvas, color, x, y, PxScale::from(scale), font, text),
            None => draw_bitmap_text(canvas, x, y, scale, text, color),
        }
    }
}

/// Draw `text` with its top-left corner at `(x, y)`, each glyph cell sized to fit `scale`.
fn draw_bitmap_text(
    canvas: &mut RgbImage,
    x: i32,
    y: i32,
    scale: f32,
    text: &str,
    color: Rgb<u8>,
) {
    let cell = ((scale / GLYPH_HEIGHT as f32) as i32).max(1);
    for (i, ch) in text.chars().enumerate() {
        let origin_x = x + i as i32 * GLYPH_ADVANCE * cell;
        for (row, bits) in glyph(ch).iter().enumerate() {
            for col in 0..GLYPH_WIDTH {
                if (bits >> (GLYPH_WIDTH - 1 - col)) & 1 == 0 {
                    continue;
                }
                let rect = Rect::at(origin_x + col * cell, y + row as i32 * cell)
                    .of_size(cell as u32, cell as u32);
                draw_filled_rect_mut(canvas, rect, color);
            }
        }
    }
}

/// 5x7 rows, most significant of the low five bits on the left. Letters are
/// drawn in upper case; anything unknown is an outlined box.
fn glyph(ch: char) -> [u8; 7] {
    match ch.to_ascii_uppercase() {
        'A' => [0x0e, 0x11, 0x11, 0x1f, 0x11, 0x11, 0x11],
        'B' => [0x1e, 0x11, 0x11, 0x1e, 0x11, 0x11, 0x1e],
        'C' => [0x0e, 0x11, 0x10, 0x10, 0x10, 0x11, 0x0e],
        'D' => [0x1e, 0x11, 0x11, 0x11, 0x11, 0x11, 0x1e],
        'E' => [0x1f, 0x10, 0x10, 0x1e, 0x10, 0x10, 0x1f],
        'F' => [0x1f, 0x10, 0x10, 0x1e, 0x10, 0x10, 0x10],
        'G' => [0x0e, 0x11, 0x10, 0x17, 0x11, 0x11, 0x0f],
        'H' => [0x11, 0x11, 0x11, 0x1f, 0x11, 0x11, 0x11],
        'I' => [0x0e, 0x04, 0x04, 0x04, 0x04, 0x04, 0x0e],
        'J' => [0x07, 0x02, 0x02, 0x02, 0x02, 0x12, 0x0c],
        'K' => [0x11, 0x12, 0x14, 0x18, 0x14, 0x12, 0x11],
        'L' => [0x10, 0x10, 0x10, 0x10, 0x10, 0x10, 0x1f],
        'M' => [0x11, 0x1b, 0x15, 0x15, 0x11, 0x11, 0x11],
        'N' => [0x11, 0x19, 0x15, 0x13, 0x11, 0x11, 0x11],
        'O' => [0x0e, 0x11, 0x11, 0x11, 0x11, 0x11, 0x0e],
        'P' => [0x1e, 0x11, 0x11, 0x1e, 0x10, 0x10, 0x10],
        'Q' => [0x0e, 0x11, 0x11, 0x11, 0x15, 0x12, 0x0d],
        'R' => [0x1e, 0x11, 0x11, 0x1e, 0x14, 0x12, 0x11],
        'S' => [0x0f, 0x10, 0x10, 0x0e, 0x01, 0x01, 0x1e],
        'T' => [0x1f, 0x04, 0x04, 0x04, 0x04, 0x04, 0x04],
        'U' => [0x11, 0x11, 0x11, 0x11, 0x11, 0x11, 0x0e],
        'V' => [0x11, 0x11, 0x11, 0x11, 0x11, 0x0a, 0x04],
        'W' => [0x11, 0x11, 0x11, 0x15, 0x15, 0x1b, 0x11],
        'X' => [0x11, 0x11, 0x0a, 0x04, 0x0a, 0x11, 0x11],
        'Y' => [0x11, 0x11, 0x11, 0x0a, 0x04, 0x04, 0x04],
        'Z' => [0x1f, 0x01, 0x02, 0x04, 0x08, 0x10, 0x1f],
        '0' => [0x0e, 0x11, 0x13, 0x15, 0x19, 0x11, 0x0e],
        '1' => [0x04, 0x0c, 0x04, 0x04, 0x04, 0x04, 0x0e],
        '2' => [0x0e, 0x11, 0x01, 0x02, 0x04, 0x08, 0x1f],
        '3' => [0x1f, 0x02, 0x04, 0x02, 0x01, 0x11, 0x0e],
        '4' => [0x02, 0x06, 0x0a, 0x12, 0x1f, 0x02, 0x02],
        '5' => [0x1f, 0x10, 0x1e, 0x01, 0x01, 0x11, 0x0e],
        '6' => [0x06, 0x08, 0x10, 0x1e, 0x11, 0x11, 0x0e],
        '7' => [0x1f, 0x01, 0x02, 0x04, 0x08, 0x08, 0x08],
        '8' => [0x0e, 0x11, 0x11, 0x0e, 0x11, 0x11, 0x0e],
        '9' => [0x0e, 0x11, 0x11, 0x0f, 0x01, 0x02, 0x0c],
        ' ' => [0x00; 7],
        '=' => [0x00, 0x00, 0x1f, 0x00, 0x1f, 0x00, 0x00],
        '/' => [0x01, 0x01, 0x02, 0x04, 0x08, 0x10, 0x10],
        '-' => [0x00, 0x00, 0x00, 0x1f, 0x00, 0x00, 0x00],
        '_' => [0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x1f],
        '.' => [0x00, 0x00, 0x00, 0x00, 0x00, 0x0c, 0x0c],
        ':' => [0x00, 0x0c, 0x0c, 0x00, 0x0c, 0x0c, 0x00],
        '%' => [0x19, 0x1a, 0x02, 0x04, 0x08, 0x0b, 0x13],
        _ => [0x1f, 0x11, 0x11, 0x11, 0x11, 0x11, 0x1f],
    }
}

/// Overlay caption for a confirmed object on the display frame.
pub fn object_caption(id: ObjectId, seen_secs: u64, since_last_secs: u64) -> String {
    format!("Id={} / {}s / {}s", id, seen_secs, since_last_secs)
}

/// Side-by-side composite of confirmed object snapshots.
///
/// Rebuilt from scratch every cycle. Each object gets a horizontal slot of at
/// least `SUMMARY_MIN_SLOT` pixels followed by `SUMMARY_PADDING`.
pub struct SummaryCanvas {
    image: RgbImage,
    offset: u32,
    slots: Vec<(ObjectId, u32)>,
}

impl SummaryCanvas {
    pub fn new() -> Self {
        Self {
            image: RgbImage::new(SUMMARY_WIDTH, SUMMARY_HEIGHT),
            offset: 0,
            slots: Vec::new(),
        }
    }

    /// Place one object at the current offset and advance past it.
    ///
    /// `slot_width` is the object's current box width; anything outside the
    /// canvas is clipped.
    pub fn place(
        &mut self,
        painter: &Painter,
        id: ObjectId,
        snapshot: &RgbImage,
        labels: &[String],
        slot_width: u32,
    ) {
        let x = self.offset;
        imageops::replace(&mut self.image, snapshot, x as i64, SUMMARY_IMAGE_TOP as i64);
        painter.draw_caption(
            &mut self.image,
            x as i32,
            (SUMMARY_IMAGE_TOP - 5) as i32,
            &format!("Id={}", id),
            TEXT_COLOR,
        );

        let mut label_y = SUMMARY_IMAGE_TOP + snapshot.height() + SUMMARY_LABEL_GAP;
        for label in labels {
            painter.draw_text(
                &mut self.image,
                x as i32,
                label_y as i32,
                LABEL_SCALE,
                label,
                TEXT_COLOR,
            );
            label_y += SUMMARY_LINE_HEIGHT;
        }

        self.slots.push((id, x));
        self.offset = self
            .offset
            .saturating_add(slot_width.max(SUMMARY_MIN_SLOT))
            .saturating_add(SUMMARY_PADDING);
    }

    /// Objects placed so far with their horizontal offsets.
    pub fn slots(&self) -> &[(ObjectId, u32)] {
        &self.slots
    }

    pub fn into_image(self) -> RgbImage {
        self.image
    }
}

impl Default for SummaryCanvas {
    fn default() -> Self {
        Self::new()
    }
}
