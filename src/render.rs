//! Frame overlay and the display surface contract.

use std::path::Path;

use ab_glyph::{FontVec, PxScale};
use anyhow::{anyhow, Context, Result};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;

use crate::alert::qualifying;
use crate::detect::{BoundingBox, Detection};
use crate::frame::Frame;
use crate::notify::ReportSink;

pub const BOX_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
pub const BOX_THICKNESS: u32 = 2;
pub const CAPTION_COLOR: Rgb<u8> = Rgb([0, 0, 0]);
pub const CAPTION_SCALE: f32 = 16.0;
/// Gap between the caption tab and the top of its box.
pub const CAPTION_OFFSET: i32 = 10;

const CAPTION_PADDING: u32 = 2;
// Tab size per character when no font is loaded.
const FALLBACK_GLYPH_WIDTH: u32 = 8;
const FALLBACK_GLYPH_HEIGHT: u32 = 12;

/// Fonts tried when no caption font is configured.
const SYSTEM_FONTS: [&str; 5] = [
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

/// Where the session pushes everything the user sees.
///
/// Warnings and errors arrive through the [`ReportSink`] half, which notifier
/// threads share.
pub trait Surface: ReportSink {
    /// Show an annotated frame with the captions of its drawn boxes.
    fn show_frame(&mut self, frame: &Frame, captions: &[String]);

    /// Show or clear the alert banner.
    fn set_alert(&mut self, active: bool);

    /// Replace the rolling log display.
    fn show_log(&mut self, lines: &[String]);

    /// Session status changes (started, stopped, threshold).
    fn status(&mut self, message: &str) {
        log::info!("{}", message);
    }
}

/// Draws boxes and captions for qualifying detections.
///
/// Each caption sits on a filled tab just above its box. Without a font the
/// tab is drawn empty, sized to the caption.
#[derive(Default)]
pub struct Renderer {
    font: Option<FontVec>,
}

impl Renderer {
    pub fn new(font: Option<FontVec>) -> Self {
        Self { font }
    }

    pub fn from_font_file(path: &Path) -> Result<Self> {
        let data = std::fs::read(path)
            .with_context(|| format!("failed to read caption font {}", path.display()))?;
        let font = FontVec::try_from_vec(data)
            .map_err(|e| anyhow!("invalid caption font {}: {}", path.display(), e))?;
        Ok(Self::new(Some(font)))
    }

    /// Load `path` if given, else the first usable system font.
    pub fn load(path: Option<&Path>) -> Self {
        if let Some(path) = path {
            match Self::from_font_file(path) {
                Ok(renderer) => return renderer,
                Err(e) => log::warn!("{:#}; falling back to system fonts", e),
            }
        }
        for candidate in SYSTEM_FONTS.iter().map(Path::new) {
            if !candidate.exists() {
                continue;
            }
            match Self::from_font_file(candidate) {
                Ok(renderer) => {
                    log::debug!("caption font {}", candidate.display());
                    return renderer;
                }
                Err(e) => log::debug!("{:#}", e),
            }
        }
        log::info!("no caption font found; captions are drawn as blank tabs");
        Self::new(None)
    }

    pub fn has_font(&self) -> bool {
        self.font.is_some()
    }

    /// Draw a box and caption for every qualifying detection and return the
    /// captions.
    pub fn annotate(
        &self,
        frame: &mut Frame,
        detections: &[Detection],
        threshold: f32,
    ) -> Vec<String> {
        let mut captions = Vec::new();
        for det in qualifying(detections, threshold) {
            let caption = det.caption();
            draw_rect(frame.image_mut(), &det.bbox, BOX_COLOR, BOX_THICKNESS);
            self.draw_caption(frame.image_mut(), &det.bbox, &caption);
            captions.push(caption);
        }
        captions
    }

    fn draw_caption(&self, img: &mut RgbImage, bbox: &BoundingBox, caption: &str) {
        let scale = PxScale::from(CAPTION_SCALE);
        let (text_w, text_h) = match &self.font {
            Some(font) => text_size(scale, font, caption),
            None => (
                FALLBACK_GLYPH_WIDTH * caption.chars().count() as u32,
                FALLBACK_GLYPH_HEIGHT,
            ),
        };
        let tab_w = text_w + 2 * CAPTION_PADDING;
        let tab_h = text_h + 2 * CAPTION_PADDING;
        // Above the box when there is room, otherwise just inside its top edge.
        let above = bbox.y1 - CAPTION_OFFSET - tab_h as i32;
        let top = if above >= 0 { above } else { bbox.y1 };
        draw_filled_rect_mut(img, Rect::at(bbox.x1, top).of_size(tab_w, tab_h), BOX_COLOR);
        if let Some(font) = &self.font {
            let pad = CAPTION_PADDING as i32;
            draw_text_mut(
                img,
                CAPTION_COLOR,
                bbox.x1 + pad,
                top + pad,
                scale,
                font,
                caption,
            );
        }
    }
}

/// Draw a rectangle border with given thickness, clipped to the image.
pub fn draw_rect(img: &mut RgbImage, bbox: &BoundingBox, color: Rgb<u8>, thickness: u32) {
    let (w, h) = img.dimensions();
    if w == 0 || h == 0 {
        return;
    }
    let clamp = |v: i32, max: u32| -> u32 { v.clamp(0, max as i32 - 1) as u32 };
    let (x0, y0) = (clamp(bbox.x1, w), clamp(bbox.y1, h));
    let (x1, y1) = (clamp(bbox.x2, w), clamp(bbox.y2, h));
    for t in 0..thickness {
        let xx0 = x0.saturating_add(t);
        let yy0 = y0.saturating_add(t);
        let xx1 = x1.saturating_sub(t);
        let yy1 = y1.saturating_sub(t);
        if xx0 > xx1 || yy0 > yy1 {
            break;
        }
        for x in xx0..=xx1 {
            img.put_pixel(x, yy0, color);
            img.put_pixel(x, yy1, color);
        }
        for y in yy0..=yy1 {
            img.put_pixel(xx0, y, color);
            img.put_pixel(xx1, y, color);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn det(label: &str, confidence: f32, bbox: [i32; 4]) -> Detection {
        let [x1, y1, x2, y2] = bbox;
        Detection::new(BoundingBox::new(x1, y1, x2, y2).unwrap(), label, confidence)
    }

    #[test]
    fn draws_box_corners() {
        let mut img = RgbImage::new(40, 40);
        let bbox = BoundingBox::new(5, 5, 10, 10).unwrap();
        draw_rect(&mut img, &bbox, BOX_COLOR, 2);
        for (x, y) in [(5, 5), (10, 5), (5, 10), (10, 10), (6, 6)] {
            assert_eq!(img.get_pixel(x, y), &BOX_COLOR);
        }
        assert_eq!(img.get_pixel(8, 8), &Rgb([0, 0, 0]));
    }

    #[test]
    fn boxes_past_the_edge_are_clipped() {
        let mut img = RgbImage::new(10, 10);
        let bbox = BoundingBox::new(-4, 2, 30, 8).unwrap();
        draw_rect(&mut img, &bbox, BOX_COLOR, 1);
        assert_eq!(img.get_pixel(0, 2), &BOX_COLOR);
        assert_eq!(img.get_pixel(9, 8), &BOX_COLOR);
    }

    fn lit_pixels(
        img: &RgbImage,
        rows: std::ops::Range<u32>,
        cols: std::ops::Range<u32>,
    ) -> usize {
        rows.flat_map(|y| cols.clone().map(move |x| (x, y)))
            .filter(|&(x, y)| img.get_pixel(x, y) != &Rgb([0, 0, 0]))
            .count()
    }

    #[test]
    fn annotate_only_draws_qualifying_detections() {
        let mut frame = Frame::new(RgbImage::new(50, 50), 1);
        let captions = Renderer::default().annotate(
            &mut frame,
            &[
                det("cat", 0.4, [1, 1, 10, 10]),
                det("horse", 0.6, [20, 20, 30, 30]),
                det("person", 0.9, [40, 40, 48, 48]),
            ],
            0.5,
        );
        assert_eq!(captions, vec!["horse (0.60)".to_string()]);
        assert_eq!(frame.image().get_pixel(20, 20), &BOX_COLOR);
        assert_eq!(frame.image().get_pixel(1, 1), &Rgb([0, 0, 0]));
        assert_eq!(frame.image().get_pixel(40, 40), &Rgb([0, 0, 0]));
    }

    #[test]
    fn caption_tab_sits_above_the_box() {
        let mut frame = Frame::new(RgbImage::new(100, 100), 1);
        let bbox = BoundingBox::new(20, 40, 80, 90).unwrap();
        Renderer::default().annotate(&mut frame, &[Detection::new(bbox, "horse", 0.6)], 0.5);
        assert!(lit_pixels(frame.image(), 20..40, 0..100) > 0);
        // Nothing above the tab and nothing left of the box.
        assert_eq!(lit_pixels(frame.image(), 0..10, 0..100), 0);
        assert_eq!(lit_pixels(frame.image(), 0..100, 0..20), 0);
    }

    #[test]
    fn caption_moves_inside_box_at_top_edge() {
        let mut frame = Frame::new(RgbImage::new(100, 100), 1);
        let bbox = BoundingBox::new(10, 2, 90, 60).unwrap();
        Renderer::default().annotate(&mut frame, &[Detection::new(bbox, "cow", 0.9)], 0.5);
        assert_eq!(frame.image().get_pixel(15, 8), &BOX_COLOR);
    }

    #[test]
    fn font_draws_caption_text_on_the_tab() {
        let renderer = Renderer::load(None);
        if !renderer.has_font() {
            return;
        }
        let mut frame = Frame::new(RgbImage::new(200, 100), 1);
        let bbox = BoundingBox::new(20, 50, 180, 95).unwrap();
        renderer.annotate(&mut frame, &[Detection::new(bbox, "horse", 0.6)], 0.5);
        let blended = (0..50)
            .flat_map(|y| (20..180).map(move |x| (x, y)))
            .filter(|&(x, y)| {
                let px = frame.image().get_pixel(x, y);
                px != &BOX_COLOR && px != &Rgb([0, 0, 0])
            })
            .count();
        assert!(blended > 0);
    }

    #[test]
    fn missing_font_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Renderer::from_font_file(&dir.path().join("none.ttf")).is_err());
        assert!(!Renderer::default().has_font());
    }
}
