//! ONNX grid-slot detector
//!
//! Runs the exported schedule-grid detection model. The working image is
//! letterboxed down to the training resolution for inference and predicted
//! rectangles are remapped back through the same aspect/offset correction.

use anyhow::{Context, Result};
use async_trait::async_trait;
use image::{imageops::FilterType, RgbImage};
use ndarray::Array4;
use ort::session::{builder::GraphOptimizationLevel, Session};
use std::sync::Mutex;
use std::time::Instant;
use tracing::{debug, info};

use crate::config::ModelConfig;
use crate::vision::{DetectionBox, Detector, Rect, SlotLabel};

/// Letterbox correction between two resolutions.
#[derive(Debug, Clone, Copy, PartialEq)]
struct AspectCorrection {
    x_offset: f32,
    y_offset: f32,
    aspect: f32,
}

impl AspectCorrection {
    /// Scale factor and centering offsets that fit `src` into `dst` while
    /// preserving aspect ratio.
    fn fit(src_w: f32, src_h: f32, dst_w: f32, dst_h: f32) -> Self {
        let width_aspect = dst_w / src_w;
        let height_aspect = dst_h / src_h;
        if height_aspect < width_aspect {
            Self {
                aspect: height_aspect,
                x_offset: (dst_w - src_w * height_aspect) / 2.0,
                y_offset: 0.0,
            }
        } else {
            Self {
                aspect: width_aspect,
                x_offset: 0.0,
                y_offset: (dst_h - src_h * width_aspect) / 2.0,
            }
        }
    }

    /// Map a model-space coordinate back to source space.
    fn unmap(&self, x: f32, y: f32) -> (f32, f32) {
        ((x - self.x_offset) / self.aspect, (y - self.y_offset) / self.aspect)
    }
}

/// Detection model wrapper.
pub struct GridDetector {
    session: Mutex<Session>,
    class_names: Vec<String>,
    input_width: u32,
    input_height: u32,
}

impl GridDetector {
    pub fn new(config: &ModelConfig) -> Result<Self> {
        info!("loading detection model from {:?}", config.path);
        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(ort::Error::<()>::from)?
            .with_intra_threads(4)
            .map_err(ort::Error::<()>::from)?
            .commit_from_file(&config.path)
            .with_context(|| format!("Failed to load model {:?}", config.path))?;

        Ok(Self {
            session: Mutex::new(session),
            class_names: config.class_names.clone(),
            input_width: config.input_width,
            input_height: config.input_height,
        })
    }

    /// Blocking inference on a working-resolution image.
    fn infer(&self, image: &RgbImage) -> Result<Vec<DetectionBox>> {
        let start = Instant::now();
        let (src_w, src_h) = (image.width() as f32, image.height() as f32);
        let correction = AspectCorrection::fit(
            src_w,
            src_h,
            self.input_width as f32,
            self.input_height as f32,
        );

        // Letterbox resize onto the model input canvas.
        let scaled_w = (src_w * correction.aspect) as u32;
        let scaled_h = (src_h * correction.aspect) as u32;
        let scaled = image::imageops::resize(image, scaled_w, scaled_h, FilterType::Triangle);
        let mut canvas = RgbImage::new(self.input_width, self.input_height);
        image::imageops::overlay(
            &mut canvas,
            &scaled,
            correction.x_offset as i64,
            correction.y_offset as i64,
        );

        // NCHW float tensor in [0, 1].
        let input = Array4::from_shape_fn(
            (1, 3, self.input_height as usize, self.input_width as usize),
            |(_, c, y, x)| canvas.get_pixel(x as u32, y as u32).0[c] as f32 / 255.0,
        );

        let mut session = self.session.lock().expect("detector session poisoned");
        let outputs = session.run(ort::inputs![
            ort::value::Tensor::from_array(input)?
        ])?;

        let (_, boxes) = outputs[0]
            .try_extract_tensor::<f32>()
            .context("model output 0 is not a float tensor")?;
        let (_, labels) = outputs[1]
            .try_extract_tensor::<i64>()
            .context("model output 1 is not an int tensor")?;
        let (_, scores) = outputs[2]
            .try_extract_tensor::<f32>()
            .context("model output 2 is not a float tensor")?;

        let mut detections = Vec::with_capacity(scores.len());
        for (i, score) in scores.iter().enumerate() {
            let coords = &boxes[i * 4..i * 4 + 4];
            let Some(rect) = remap_box(&correction, coords, src_w, src_h) else {
                continue;
            };
            let class = labels[i] as usize;
            let label = self
                .class_names
                .get(class)
                .map(|name| SlotLabel::from_class_name(name))
                .unwrap_or(SlotLabel::Other);
            detections.push(DetectionBox {
                label,
                score: *score,
                rect,
            });
        }

        debug!(
            "inference complete in {:?}: {} boxes",
            start.elapsed(),
            detections.len()
        );
        Ok(detections)
    }
}

/// Remap one predicted box from model space to source space, clamped to the
/// frame. The degeneracy check runs after clamping: a box lying wholly
/// outside the frame collapses to zero area and is dropped, never turned
/// into an invalid rectangle.
fn remap_box(
    correction: &AspectCorrection,
    coords: &[f32],
    src_w: f32,
    src_h: f32,
) -> Option<Rect> {
    let (x_top, y_top) = correction.unmap(coords[0], coords[1]);
    let (x_bottom, y_bottom) = correction.unmap(coords[2], coords[3]);
    let x_top = x_top.clamp(0.0, src_w);
    let y_top = y_top.clamp(0.0, src_h);
    let x_bottom = x_bottom.clamp(0.0, src_w);
    let y_bottom = y_bottom.clamp(0.0, src_h);
    if x_bottom <= x_top || y_bottom <= y_top {
        return None;
    }
    Some(Rect::new(x_top, y_top, x_bottom, y_bottom))
}

#[async_trait]
impl Detector for GridDetector {
    async fn detect(&self, image: &RgbImage) -> Result<Vec<DetectionBox>> {
        // Inference is CPU-bound; keep it off the async executor threads.
        tokio::task::block_in_place(|| self.infer(image))
    }
}
