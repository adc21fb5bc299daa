//! Result rendering
//!
//! Draws every processed detection box onto a copy of the normalized source
//! image for operator review: green outline for a created event, warning
//! orange for a skipped one, with the label and confidence above the box
//! when a font is available.

use ab_glyph::{FontVec, PxScale};
use anyhow::{Context, Result};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect as PixelRect;
use std::io::Cursor;
use tracing::{debug, warn};

use crate::config::RenderConfig;
use crate::vision::DetectionBox;

const SUCCESS_COLOR: Rgb<u8> = Rgb([0, 200, 83]);
const FAILURE_COLOR: Rgb<u8> = Rgb([255, 111, 0]);

/// Annotated-image renderer.
pub struct ResultRenderer {
    font: Option<FontVec>,
    font_scale: f32,
    outline_px: u32,
}

impl ResultRenderer {
    pub fn new(config: &RenderConfig) -> Self {
        let font = config.font_path.as_ref().and_then(|path| {
            match std::fs::read(path).ok().and_then(|data| FontVec::try_from_vec(data).ok()) {
                Some(font) => Some(font),
                None => {
                    warn!("label font {:?} unavailable, boxes drawn without text", path);
                    None
                }
            }
        });
        Self {
            font,
            font_scale: config.font_scale,
            outline_px: config.outline_px.max(1),
        }
    }

    /// Draw all boxes with their success verdicts and encode as JPEG.
    pub fn annotate(
        &self,
        source: &RgbImage,
        boxes: &[(DetectionBox, bool)],
    ) -> Result<Vec<u8>> {
        let mut canvas = source.clone();
        for (detection, success) in boxes {
            let color = if *success { SUCCESS_COLOR } else { FAILURE_COLOR };
            self.draw_box(&mut canvas, detection, color);
        }

        let mut bytes = Vec::new();
        canvas
            .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Jpeg)
            .context("Failed to encode annotated image")?;
        debug!("annotated image encoded ({} KiB)", bytes.len() / 1024);
        Ok(bytes)
    }

    fn draw_box(&self, canvas: &mut RgbImage, detection: &DetectionBox, color: Rgb<u8>) {
        let rect = &detection.rect;
        let x = rect.x_top.max(0.0) as i32;
        let y = rect.y_top.max(0.0) as i32;
        let w = rect.width().max(1.0) as u32;
        let h = rect.height().max(1.0) as u32;

        // Inset rings stand in for stroke width.
        for inset in 0..self.outline_px as i32 {
            let (w, h) = (
                w.saturating_sub(2 * inset as u32),
                h.saturating_sub(2 * inset as u32),
            );
            if w < 2 || h < 2 {
                break;
            }
            draw_hollow_rect_mut(
                canvas,
                PixelRect::at(x + inset, y + inset).of_size(w, h),
                color,
            );
        }

        if let Some(font) = &self.font {
            let text = format!("{} {:.2}", detection.label, detection.score);
            let text_y = (y - self.font_scale as i32 - 4).max(0);
            draw_text_mut(
                canvas,
                color,
                x,
                text_y,
                PxScale::from(self.font_scale),
                font,
                &text,
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vision::{Rect, SlotLabel};

    #[test]
    fn test_annotate_without_font_produces_jpeg() {
        let renderer = ResultRenderer::new(&RenderConfig {
            font_path: None,
            ..RenderConfig::default()
        });
        let image = RgbImage::new(600, 400);
        let boxes = vec![
            (
                DetectionBox {
                    label: SlotLabel::Ava,
                    score: 0.97,
                    rect: Rect::new(50.0, 50.0, 250.0, 200.0),
                },
                true,
            ),
            (
                DetectionBox {
                    label: SlotLabel::Group,
                    score: 0.95,
                    rect: Rect::new(300.0, 50.0, 550.0, 200.0),
                },
                false,
            ),
        ];

        let bytes = renderer.annotate(&image, &boxes).unwrap();
        // JPEG SOI marker.
        assert_eq!(&bytes[..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn test_box_at_image_edge_does_not_panic() {
        let renderer = ResultRenderer::new(&RenderConfig {
            font_path: None,
            ..RenderConfig::default()
        });
        let image = RgbImage::new(200, 200);
        let boxes = vec![(
            DetectionBox {
                label: SlotLabel::Bella,
                score: 0.99,
                rect: Rect::new(0.0, 0.0, 199.0, 199.0),
            },
            true,
        )];
        assert!(renderer.annotate(&image, &boxes).is_ok());
    }
}
